pub mod account;
pub mod auth;
pub mod media;
pub mod photos;

use askama::Template;
use axum::extract::DefaultBodyLimit;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::MethodRouter;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::extractors::CurrentUser;
use crate::flash::Flash;
use crate::state::AppState;

/// Wrapper to render askama templates as axum responses
pub struct Html<T: Template>(pub T);

impl<T: Template> IntoResponse for Html<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(body) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                body,
            )
                .into_response(),
            Err(e) => {
                tracing::error!("Template render error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
            }
        }
    }
}

/// Header data shared by every page: who is signed in and any pending notice.
#[derive(Debug, Clone, Default)]
pub struct Nav {
    pub username: Option<String>,
    pub flash: Option<String>,
}

impl Nav {
    pub fn new(user: Option<&CurrentUser>, flash: &Flash) -> Self {
        Self {
            username: user.map(|u| u.username.clone()),
            flash: flash.message().map(str::to_string),
        }
    }

    pub fn anonymous(flash: &Flash) -> Self {
        Self::new(None, flash)
    }
}

/// Register `path` with and without its trailing slash.
pub(crate) fn route_both(
    router: Router<AppState>,
    path: &str,
    method: MethodRouter<AppState>,
) -> Router<AppState> {
    let alternate = match path.strip_suffix('/') {
        Some("") => return router.route(path, method),
        Some(trimmed) => trimmed.to_string(),
        None => format!("{path}/"),
    };
    router.route(path, method.clone()).route(&alternate, method)
}

/// The complete application with state, body limit and request tracing.
pub fn app(state: AppState) -> Router {
    let body_limit = state.config.storage.max_upload_bytes;

    Router::new()
        .merge(auth::router())
        .merge(account::router())
        .merge(photos::router())
        .merge(media::router())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
