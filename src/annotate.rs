use crate::detector::Detection;
use ab_glyph::{FontRef, PxScale};
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use thiserror::Error;

static FONT_DATA: &[u8] = include_bytes!("../fonts/DejaVuSans.ttf");

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const LINE_WIDTH: i32 = 2;
const LABEL_HEIGHT: f32 = 16.0;

#[derive(Error, Debug)]
pub enum AnnotateError {
    #[error("failed to load embedded font: {0}")]
    Font(#[from] ab_glyph::InvalidFont),
}

/// Draws detection boxes and labels onto a copy of the source image.
/// Color, font and line width are fixed.
pub struct Annotator {
    font: FontRef<'static>,
}

impl Annotator {
    pub fn new() -> Result<Self, AnnotateError> {
        let font = FontRef::try_from_slice(FONT_DATA)?;
        Ok(Self { font })
    }

    pub fn annotate(&self, image: &DynamicImage, detections: &[Detection]) -> RgbImage {
        let mut img = image.to_rgb8();
        let (width, height) = img.dimensions();
        let scale = PxScale::from(LABEL_HEIGHT);

        for det in detections {
            let x_min = det.x1.min(det.x2).clamp(0, width as i32 - 1);
            let y_min = det.y1.min(det.y2).clamp(0, height as i32 - 1);
            let x_max = det.x1.max(det.x2).clamp(0, width as i32);
            let y_max = det.y1.max(det.y2).clamp(0, height as i32);
            let box_width = (x_max - x_min).max(1) as u32;
            let box_height = (y_max - y_min).max(1) as u32;

            draw_hollow_rect_mut(
                &mut img,
                Rect::at(x_min, y_min).of_size(box_width, box_height),
                BOX_COLOR,
            );
            for t in 1..LINE_WIDTH {
                let inner_width = box_width.saturating_sub(2 * t as u32).max(1);
                let inner_height = box_height.saturating_sub(2 * t as u32).max(1);
                draw_hollow_rect_mut(
                    &mut img,
                    Rect::at(x_min + t, y_min + t).of_size(inner_width, inner_height),
                    BOX_COLOR,
                );
            }

            let label_y = (y_min - LABEL_HEIGHT as i32 - 2).max(0);
            draw_text_mut(
                &mut img,
                BOX_COLOR,
                x_min,
                label_y,
                scale,
                &self.font,
                &det.label,
            );
        }

        img
    }
}
