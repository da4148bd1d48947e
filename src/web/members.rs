use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::db::models::{MemberFilter, NewMember, Role};

use super::auth::AdminSession;
use super::error::ApiError;
use super::AppState;

/// Raw insert body. Fields stay loosely typed so that numbers, numeric
/// strings and nulls coerce the same way the admin form sends them.
#[derive(Debug, Default, Deserialize)]
pub struct MemberPayload {
    #[serde(default)]
    pub name: Option<Value>,
    #[serde(default)]
    pub role: Option<Value>,
    #[serde(default)]
    pub facebook_url: Option<Value>,
    #[serde(default)]
    pub avatar_url: Option<Value>,
    #[serde(default)]
    pub sort_order: Option<Value>,
}

fn text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.trim().to_owned(),
        Some(v) => v.to_string(),
    }
}

fn optional_text(value: Option<&Value>) -> Option<String> {
    Some(text(value)).filter(|s| !s.is_empty())
}

/// Non-numeric input falls back to 0. Fractions truncate toward zero.
fn sort_order(value: Option<&Value>) -> i32 {
    let n = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) if s.trim().is_empty() => Some(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match n {
        Some(n) if n.is_finite() => n.trunc().clamp(i32::MIN as f64, i32::MAX as f64) as i32,
        _ => 0,
    }
}

fn is_web_link(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    ["http://", "https://"]
        .iter()
        .any(|scheme| lower.len() > scheme.len() && lower.starts_with(scheme))
}

/// Links rendered into `href`/`src` on public pages must be plain web links.
/// Images may also point at files stored by the upload endpoint.
pub fn is_safe_link(url: &str, allow_uploads: bool) -> bool {
    is_web_link(url) || (allow_uploads && url.starts_with("/uploads/") && !url.contains(".."))
}

fn checked_link(
    value: Option<&Value>,
    allow_uploads: bool,
    message: &'static str,
) -> Result<Option<String>, ApiError> {
    match optional_text(value) {
        Some(url) if !is_safe_link(&url, allow_uploads) => Err(ApiError::validation(message)),
        url => Ok(url),
    }
}

impl MemberPayload {
    pub fn validate(&self) -> Result<NewMember, ApiError> {
        let name = text(self.name.as_ref());
        if name.is_empty() {
            return Err(ApiError::validation("name is required"));
        }
        let role: Role = text(self.role.as_ref())
            .parse()
            .map_err(|e: crate::db::models::InvalidRole| ApiError::validation(e.to_string()))?;
        Ok(NewMember {
            name,
            role,
            facebook_url: checked_link(
                self.facebook_url.as_ref(),
                false,
                "facebook_url must be an http(s) link",
            )?,
            avatar_url: checked_link(
                self.avatar_url.as_ref(),
                true,
                "avatar_url must be an http(s) link or an /uploads/ path",
            )?,
            sort_order: sort_order(self.sort_order.as_ref()),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub role: Option<String>,
    pub q: Option<String>,
}

impl ListQuery {
    /// `None` when the role filter names no known role, so nothing can match.
    pub fn filter(&self) -> Option<MemberFilter> {
        let role = match self.role.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(role) => Some(role.parse::<Role>().ok()?),
        };
        let query = self
            .q
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_owned);
        Some(MemberFilter { role, query })
    }
}

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    pub id: Option<String>,
}

pub fn parse_id(raw: Option<&str>) -> Result<Uuid, ApiError> {
    match raw.map(str::trim) {
        None | Some("") => Err(ApiError::validation("id is required")),
        Some(id) => Uuid::parse_str(id).map_err(|_| ApiError::validation("id is invalid")),
    }
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Value>, ApiError> {
    let members = match query.filter() {
        Some(filter) => state.store.list_members(&filter).await?,
        None => {
            tracing::debug!("No members can match role filter {:?}", query.role);
            Vec::new()
        }
    };
    Ok(Json(json!({ "ok": true, "data": members })))
}

pub async fn create(
    State(state): State<AppState>,
    _session: AdminSession,
    body: Result<Json<MemberPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(payload) = body.map_err(|e| ApiError::validation(e.body_text()))?;
    let new = payload.validate()?;
    let member = state.store.insert_member(&new).await?;
    tracing::info!("Added {} `{}` ({})", member.role, member.name, member.id);
    Ok((StatusCode::CREATED, Json(json!({ "ok": true, "data": member }))))
}

pub async fn remove(
    State(state): State<AppState>,
    _session: AdminSession,
    Query(query): Query<DeleteQuery>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(query.id.as_deref())?;
    match state.store.deactivate_member(id).await? {
        Some(member) => tracing::info!("Removed member `{}` ({id})", member.name),
        None => tracing::debug!("Remove for unknown member {id}"),
    }
    Ok(Json(json!({ "ok": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(v: Value) -> MemberPayload {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn valid_payload_defaults() {
        let new = payload(json!({ "name": "  Alice ", "role": "founder" }))
            .validate()
            .unwrap();
        assert_eq!(new.name, "Alice");
        assert_eq!(new.role, Role::Founder);
        assert_eq!(new.sort_order, 0);
        assert_eq!(new.facebook_url, None);
        assert_eq!(new.avatar_url, None);
    }

    #[test]
    fn blank_urls_become_null() {
        let new = payload(json!({
            "name": "Bob",
            "role": "member",
            "facebook_url": "   ",
            "avatar_url": " https://img/bob.png ",
        }))
        .validate()
        .unwrap();
        assert_eq!(new.facebook_url, None);
        assert_eq!(new.avatar_url.as_deref(), Some("https://img/bob.png"));
    }

    #[test]
    fn rejects_missing_name_and_bad_role() {
        let err = payload(json!({ "name": " ", "role": "founder" }))
            .validate()
            .unwrap_err();
        assert_eq!(err.to_string(), "name is required");
        for role in [json!("owner"), json!("Founder"), json!(null), json!(3)] {
            let err = payload(json!({ "name": "Alice", "role": role }))
                .validate()
                .unwrap_err();
            assert_eq!(err.to_string(), "role must be founder/leader/member");
        }
    }

    #[test]
    fn links_must_be_web_or_uploads() {
        let err = payload(json!({
            "name": "Mallory",
            "role": "member",
            "facebook_url": "javascript:alert(document.cookie)",
        }))
        .validate()
        .unwrap_err();
        assert_eq!(err.to_string(), "facebook_url must be an http(s) link");

        let err = payload(json!({ "name": "Mallory", "role": "member", "avatar_url": "data:text/html,x" }))
            .validate()
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "avatar_url must be an http(s) link or an /uploads/ path"
        );

        let new = payload(json!({
            "name": "Bob",
            "role": "member",
            "facebook_url": "HTTPS://facebook.com/bob",
            "avatar_url": "/uploads/abc.png",
        }))
        .validate()
        .unwrap();
        assert_eq!(new.avatar_url.as_deref(), Some("/uploads/abc.png"));

        assert!(!is_safe_link("/uploads/abc.png", false));
        assert!(!is_safe_link("/uploads/../config.yaml", true));
        assert!(!is_safe_link("https://", false));
    }

    #[test]
    fn sort_order_coercion() {
        assert_eq!(sort_order(None), 0);
        assert_eq!(sort_order(Some(&json!(null))), 0);
        assert_eq!(sort_order(Some(&json!(7))), 7);
        assert_eq!(sort_order(Some(&json!("-3"))), -3);
        assert_eq!(sort_order(Some(&json!(""))), 0);
        assert_eq!(sort_order(Some(&json!("abc"))), 0);
        assert_eq!(sort_order(Some(&json!(2.9))), 2);
        assert_eq!(sort_order(Some(&json!(1e12))), i32::MAX);
    }

    #[test]
    fn list_query_filters() {
        let filter = ListQuery {
            role: Some("leader".to_owned()),
            q: Some("  ".to_owned()),
        }
        .filter()
        .unwrap();
        assert_eq!(filter.role, Some(Role::Leader));
        assert_eq!(filter.query, None);
        assert!(ListQuery {
            role: Some("boss".to_owned()),
            q: None
        }
        .filter()
        .is_none());
        assert!(ListQuery {
            role: Some(String::new()),
            q: None
        }
        .filter()
        .unwrap()
        .role
        .is_none());
    }

    #[test]
    fn delete_id_parsing() {
        assert_eq!(parse_id(None).unwrap_err().to_string(), "id is required");
        assert_eq!(parse_id(Some(" ")).unwrap_err().to_string(), "id is required");
        assert_eq!(parse_id(Some("42")).unwrap_err().to_string(), "id is invalid");
        let id = Uuid::new_v4();
        assert_eq!(parse_id(Some(&id.to_string())).unwrap(), id);
    }
}
