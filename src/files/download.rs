use std::sync::Arc;

use axum::{
    body::Body,
    debug_handler,
    extract::{Path, State},
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
};
use tokio_util::io::ReaderStream;

use crate::{AppResult, error::ChatError, hub::Hub};

use super::FileId;

#[debug_handler(state = crate::AppState)]
pub(crate) async fn download(
    Path(file_id): Path<String>,
    State(hub): State<Arc<Hub>>,
) -> AppResult<Response> {
    let Some(id) = FileId::parse(&file_id) else {
        return Err(ChatError::FileNotFound(file_id).into());
    };

    let (record, file) = hub.files.retrieve(id).await?;

    let content_type = HeaderValue::from_str(&record.media_type)
        .ok()
        .filter(|_| !record.media_type.is_empty())
        .unwrap_or(HeaderValue::from_static("application/octet-stream"));
    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"",
        header_safe(&record.original_name)
    ))
    .unwrap_or(HeaderValue::from_static("attachment"));

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_LENGTH, HeaderValue::from(record.size)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response())
}

// printable ASCII only, no quotes or backslashes
fn header_safe(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect()
}
