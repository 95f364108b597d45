use axum::extract::{FromRequestParts, Path};
use axum::http::request::Parts;

use crate::auth::session;
use crate::error::AppError;
use crate::state::AppState;

/// Represents the currently authenticated user.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
    /// Token of the session that authenticated this request
    pub token: String,
}

/// Extractor that requires authentication.
/// Anonymous requests are redirected to the login page with `next` set to
/// the path they asked for.
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match resolve_session(parts, state)? {
            Some(user) => Ok(user),
            None => Err(AppError::LoginRequired {
                next: parts
                    .uri
                    .path_and_query()
                    .map(|pq| pq.as_str().to_string())
                    .unwrap_or_else(|| "/".to_string()),
            }),
        }
    }
}

/// Optional user extractor: `None` instead of a redirect when anonymous.
pub struct MaybeUser(pub Option<CurrentUser>);

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(resolve_session(parts, state)?))
    }
}

/// Integer photo id from the URL. Anything else names no photo, so it is a
/// 404 rather than axum's 400 path rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhotoId(pub i64);

impl<S: Send + Sync> FromRequestParts<S> for PhotoId {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|_| AppError::NotFound)?;
        parse_photo_id(&raw).map(PhotoId).ok_or(AppError::NotFound)
    }
}

fn parse_photo_id(raw: &str) -> Option<i64> {
    // Only plain digits, like the URL converter it replaces: no sign, no spaces.
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

fn resolve_session(parts: &Parts, state: &AppState) -> Result<Option<CurrentUser>, AppError> {
    let Some(token) = session::get_cookie_value(&parts.headers, &state.config.auth.cookie_name)
    else {
        return Ok(None);
    };
    if token.is_empty() {
        return Ok(None);
    }

    let conn = state.db.get()?;
    Ok(session::lookup(&conn, token)?.map(|(id, username)| CurrentUser {
        id,
        username,
        token: token.to_string(),
    }))
}
