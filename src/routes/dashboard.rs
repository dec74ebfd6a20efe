use crate::server::SharedState;
use axum::{extract::State, response::Html};
use tracing::instrument;

/// Dashboard view: the full detection history, newest first. The sort is
/// string-lexicographic over the timestamp, which is correct because the
/// format is fixed-width and zero-padded.
#[instrument(skip(state))]
pub async fn dashboard(State(state): State<SharedState>) -> Html<String> {
    let mut records = state.log.read_all();
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    let mut rows = String::new();
    for record in &records {
        rows.push_str(&format!(
            "<tr>\
             <td><a href=\"/static/detections/{file}\">\
             <img src=\"/static/detections/{file}\" alt=\"{name}\" height=\"120\"></a></td>\
             <td>{name}</td>\
             <td>{time}</td>\
             <td>{date}</td>\
             </tr>\n",
            file = record.filename,
            name = record.detection_name(),
            time = record.time_display,
            date = record.date_display,
        ));
    }

    Html(format!(
        "<!DOCTYPE html>\n<html>\n<head><title>Detection Dashboard</title></head>\n\
         <body>\n<h1>Detection Dashboard</h1>\n\
         <table border=\"1\">\n\
         <tr><th>Image</th><th>Detection</th><th>Time</th><th>Date</th></tr>\n\
         {rows}</table>\n</body>\n</html>\n"
    ))
}
