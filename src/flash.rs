//! One-shot messages carried across a redirect in a cookie.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::response::{AppendHeaders, IntoResponse, Response};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;

use crate::extractors::cookie_value;

pub const FLASH_COOKIE: &str = "guidepost_flash";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashKind {
    Success,
    Error,
    Info,
}

impl FlashKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlashKind::Success => "success",
            FlashKind::Error => "error",
            FlashKind::Info => "info",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashMessage {
    pub kind: FlashKind,
    pub message: String,
}

impl FlashMessage {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Error,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Info,
            message: message.into(),
        }
    }
}

/// Messages set by the previous response. Unreadable cookies yield none.
#[derive(Debug, Default)]
pub struct Flashes(pub Vec<FlashMessage>);

impl<S: Send + Sync> FromRequestParts<S> for Flashes {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let messages = cookie_value(&parts.headers, FLASH_COOKIE)
            .and_then(decode)
            .unwrap_or_default();
        Ok(Flashes(messages))
    }
}

impl Flashes {
    /// Render `page` and drop the flash cookie if anything was shown.
    pub fn consume(self, page: impl IntoResponse) -> Response {
        if self.0.is_empty() {
            page.into_response()
        } else {
            (AppendHeaders([(header::SET_COOKIE, clear_cookie())]), page).into_response()
        }
    }
}

/// 303 to `location`, carrying `messages` to the next page.
pub fn redirect(location: &str, messages: &[FlashMessage]) -> Response {
    let mut response = (
        StatusCode::SEE_OTHER,
        [(header::LOCATION, location.to_string())],
    )
        .into_response();

    if !messages.is_empty() {
        if let Some(value) = set_cookie(messages)
            .ok()
            .and_then(|c| header::HeaderValue::from_str(&c).ok())
        {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }
    response
}

pub fn set_cookie(messages: &[FlashMessage]) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string(messages)?;
    let encoded: String = url::form_urlencoded::byte_serialize(json.as_bytes()).collect();
    Ok(format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age=300",
        FLASH_COOKIE, encoded
    ))
}

pub fn clear_cookie() -> String {
    format!(
        "{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0",
        FLASH_COOKIE
    )
}

fn decode(raw: &str) -> Option<Vec<FlashMessage>> {
    let json: String = url::form_urlencoded::parse(format!("v={}", raw).as_bytes())
        .find(|(key, _)| key == "v")
        .map(|(_, value)| value.into_owned())?;
    serde_json::from_str(&json).ok()
}
