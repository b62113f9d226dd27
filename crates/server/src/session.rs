use axum::http::{header, HeaderMap};
use shared::domain::SessionId;

pub const SESSION_COOKIE: &str = "form_session";

const MAX_SESSION_ID_LEN: usize = 64;

/// Reads the session id from the `Cookie` header. Malformed ids are ignored
/// so the caller starts a fresh session.
pub fn session_from_headers(headers: &HeaderMap) -> Option<SessionId> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .find_map(|cookie| {
            let (name, value) = cookie.trim().split_once('=')?;
            (name == SESSION_COOKIE && is_valid_session_id(value)).then(|| SessionId::from(value))
        })
}

pub fn session_cookie(session_id: &SessionId) -> String {
    format!("{SESSION_COOKIE}={session_id}; Path=/; HttpOnly; SameSite=Lax")
}

fn is_valid_session_id(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= MAX_SESSION_ID_LEN
        && value
            .bytes()
            .all(|byte| byte.is_ascii_alphanumeric() || byte == b'-')
}
