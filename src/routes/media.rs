use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/media/{file}", get(serve))
}

/// Serve an uploaded image by its stored file name.
pub async fn serve(State(state): State<AppState>, Path(file): Path<String>) -> Response {
    if !is_plain_file_name(&file) {
        return StatusCode::NOT_FOUND.into_response();
    }

    let path = state.config.uploads_path().join(&file);
    match tokio::fs::read(&path).await {
        Ok(data) => {
            let mime = mime_guess::from_path(&file).first_or_octet_stream();
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, mime.as_ref().to_string()),
                    (header::CACHE_CONTROL, "public, max-age=86400".to_string()),
                ],
                data,
            )
                .into_response()
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            tracing::error!("Failed to read {}: {}", path.display(), e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(['/', '\\']) && !name.contains("..")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_traversal() {
        assert!(is_plain_file_name("0190a1b2c3.png"));
        assert!(!is_plain_file_name(""));
        assert!(!is_plain_file_name(".."));
        assert!(!is_plain_file_name("../photoalbum.db"));
        assert!(!is_plain_file_name("a\\b.png"));
        assert!(!is_plain_file_name("a/b.png"));
    }
}
