//! Anonymous learner identity carried in a cookie

use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use crate::config::SessionConfig;

/// Longest cookie value accepted as a user id
const MAX_ID_LEN: usize = 64;

/// Read the user id from the request cookies. Values that do not look like
/// an id are ignored.
pub fn user_id_from_headers(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == cookie_name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| is_valid_id(value))
}

fn is_valid_id(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= MAX_ID_LEN
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// `Set-Cookie` value for a user id
pub fn session_cookie(config: &SessionConfig, user_id: &str) -> String {
    format!(
        "{}={}; Path=/; Max-Age={}; SameSite=Lax",
        config.cookie_name,
        user_id,
        config.max_age_secs()
    )
}

/// The user behind a request, minted on first contact
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub user_id: String,
    /// True when the id was created for this request and must be sent back
    pub is_new: bool,
}

impl Session {
    /// Existing user only; read-only endpoints never mint ids
    pub fn existing(headers: &HeaderMap, config: &SessionConfig) -> Option<String> {
        user_id_from_headers(headers, &config.cookie_name)
    }

    pub fn resolve(headers: &HeaderMap, config: &SessionConfig) -> Self {
        match user_id_from_headers(headers, &config.cookie_name) {
            Some(user_id) => Self {
                user_id,
                is_new: false,
            },
            None => Self {
                user_id: Uuid::new_v4().to_string(),
                is_new: true,
            },
        }
    }

    /// Attach the cookie to a response when the id is new
    pub fn respond(&self, config: &SessionConfig, body: impl IntoResponse) -> Response {
        let mut response = body.into_response();
        if self.is_new {
            match HeaderValue::from_str(&session_cookie(config, &self.user_id)) {
                Ok(value) => {
                    response.headers_mut().append(header::SET_COOKIE, value);
                }
                Err(e) => log::warn!("Could not encode session cookie: {}", e),
            }
        }
        response
    }
}
