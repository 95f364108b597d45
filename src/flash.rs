//! One-shot notices carried across a redirect in a cookie.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;
use axum::response::{AppendHeaders, IntoResponse, Redirect, Response};
use percent_encoding::{percent_decode_str, utf8_percent_encode, NON_ALPHANUMERIC};

use crate::auth::session::get_cookie_value;

pub const FLASH_COOKIE: &str = "photoalbum_flash";

/// Message left by the previous response, if any.
#[derive(Debug, Clone, Default)]
pub struct Flash(pub Option<String>);

impl<S: Send + Sync> FromRequestParts<S> for Flash {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let message = get_cookie_value(&parts.headers, FLASH_COOKIE)
            .filter(|raw| !raw.is_empty())
            .map(|raw| percent_decode_str(raw).decode_utf8_lossy().into_owned());
        Ok(Flash(message))
    }
}

impl Flash {
    pub fn message(&self) -> Option<&str> {
        self.0.as_deref()
    }

    /// Attach the cookie removal once the message has been shown.
    pub fn consume(&self, response: impl IntoResponse) -> Response {
        if self.0.is_some() {
            (
                AppendHeaders([(header::SET_COOKIE, clear_flash_cookie())]),
                response,
            )
                .into_response()
        } else {
            response.into_response()
        }
    }
}

pub fn flash_cookie(message: &str) -> String {
    format!(
        "{FLASH_COOKIE}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age=300",
        utf8_percent_encode(message, NON_ALPHANUMERIC)
    )
}

pub fn clear_flash_cookie() -> String {
    format!("{FLASH_COOKIE}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0")
}

/// 303 to `to` with a notice for the next page.
pub fn redirect_with(to: &str, message: &str) -> Response {
    (
        AppendHeaders([(header::SET_COOKIE, flash_cookie(message))]),
        Redirect::to(to),
    )
        .into_response()
}
