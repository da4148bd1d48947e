use axum::async_trait;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequestParts, State};
use axum::headers::{Cookie as CookieHeader, HeaderMapExt};
use axum::http::header::SET_COOKIE;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use axum::Json;
use cookie::{Cookie, SameSite};
use serde::Deserialize;
use serde_json::json;

use super::error::ApiError;
use super::AppState;

pub const SESSION_COOKIE: &str = "admin";
const SESSION_DAYS: i64 = 7;

/// Shared-password admin login.
#[derive(Debug, Clone)]
pub struct AdminAuth {
    pub password: Option<String>,
    pub secure_cookies: bool,
}

/// Present when the request carries the admin cookie.
#[derive(Debug, Clone, Copy)]
pub struct AdminSession;

#[async_trait]
impl<S> FromRequestParts<S> for AdminSession
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let cookies = parts.headers.typed_get::<CookieHeader>();
        match cookies.as_ref().and_then(|c| c.get(SESSION_COOKIE)) {
            Some("1") => Ok(AdminSession),
            _ => Err(ApiError::Unauthorized("admin session required")),
        }
    }
}

#[derive(Deserialize)]
pub struct LoginBody {
    #[serde(default)]
    password: String,
}

fn session_cookie(value: &str, max_age: cookie::time::Duration, secure: bool) -> String {
    let mut cookie = Cookie::new(SESSION_COOKIE, value.to_owned());
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_secure(secure);
    cookie.set_max_age(max_age);
    cookie.to_string()
}

pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::validation(e.body_text()))?;
    let expected = state
        .auth
        .password
        .as_deref()
        .ok_or_else(|| ApiError::Internal("ADMIN_PASSWORD is not configured".to_owned()))?;
    if body.password.is_empty() || body.password != expected {
        tracing::info!("Rejected admin login");
        return Err(ApiError::Unauthorized("wrong password"));
    }
    tracing::info!("Admin logged in");
    let cookie = session_cookie(
        "1",
        cookie::time::Duration::days(SESSION_DAYS),
        state.auth.secure_cookies,
    );
    Ok(([(SET_COOKIE, cookie)], Json(json!({ "ok": true }))).into_response())
}

pub async fn logout(State(state): State<AppState>) -> Response {
    let cookie = session_cookie("", cookie::time::Duration::ZERO, state.auth.secure_cookies);
    ([(SET_COOKIE, cookie)], Json(json!({ "ok": true }))).into_response()
}

pub async fn status(session: Option<AdminSession>) -> Json<serde_json::Value> {
    Json(json!({ "ok": true, "authenticated": session.is_some() }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_cookie_attributes() {
        let cookie = session_cookie("1", cookie::time::Duration::days(7), true);
        assert!(cookie.starts_with("admin=1"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Secure"));
        assert!(cookie.contains("Path=/"));
        assert!(cookie.contains("Max-Age=604800"));
    }

    #[test]
    fn cleared_cookie_expires_immediately() {
        let cookie = session_cookie("", cookie::time::Duration::ZERO, false);
        assert!(cookie.starts_with("admin="));
        assert!(cookie.contains("Max-Age=0"));
        assert!(!cookie.contains("Secure"));
    }
}
