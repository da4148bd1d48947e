use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::services::ServeDir;

use crate::config::{Config, MusicInfo, SiteInfo};
use crate::db::Store;

use self::auth::AdminAuth;

pub mod auth;
pub mod error;
pub mod gangs;
pub mod layout;
pub mod members;
pub mod pages;
pub mod upload;

#[derive(Debug, Clone)]
pub struct AppState {
    pub store: Store,
    pub auth: Arc<AdminAuth>,
    pub site: Arc<SiteInfo>,
    pub music: Arc<MusicInfo>,
    pub uploads_dir: Arc<PathBuf>,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn from_config(config: &Config, store: Store) -> Self {
        let password = config.admin_password();
        if password.is_none() {
            tracing::warn!("ADMIN_PASSWORD is not set, admin login is disabled");
        }
        AppState {
            store,
            auth: Arc::new(AdminAuth {
                password,
                secure_cookies: config.secure_cookies,
            }),
            site: Arc::new(config.site.clone()),
            music: Arc::new(config.music.clone()),
            uploads_dir: Arc::new(config.uploads_dir.clone()),
            max_upload_bytes: config.max_upload_bytes,
        }
    }
}

pub fn router(state: AppState, assets_dir: &Path) -> Router {
    let uploads = ServeDir::new(state.uploads_dir.as_path());
    Router::new()
        .route("/", get(pages::directory))
        .route("/gangs/:slug", get(pages::gang_page))
        .route("/admin", get(pages::login_page))
        .route("/admin/dashboard", get(pages::dashboard))
        .route("/admin/members", post(pages::add_member_form))
        .route("/admin/members/:id/remove", post(pages::remove_member_form))
        .route(
            "/api/members",
            get(members::list)
                .post(members::create)
                .delete(members::remove),
        )
        .route("/api/gangs", get(gangs::list).put(gangs::put))
        .route("/api/login", post(auth::login))
        .route(
            "/api/auth",
            get(auth::status).post(auth::login).delete(auth::logout),
        )
        .route(
            "/api/upload",
            post(upload::upload).layer(DefaultBodyLimit::max(state.max_upload_bytes)),
        )
        .nest_service("/assets", ServeDir::new(assets_dir))
        .nest_service("/uploads", uploads)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::response::Response;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::db::memory::MemoryStore;

    const PASSWORD: &str = "hunter2";

    fn test_app() -> (Router, Store, PathBuf) {
        let store = Store::memory(MemoryStore::default());
        let uploads_dir = std::env::temp_dir().join(format!("uploads-{}", uuid::Uuid::new_v4()));
        let state = AppState {
            store: store.clone(),
            auth: Arc::new(AdminAuth {
                password: Some(PASSWORD.to_owned()),
                secure_cookies: false,
            }),
            site: Arc::new(SiteInfo::default()),
            music: Arc::new(MusicInfo::default()),
            uploads_dir: Arc::new(uploads_dir.clone()),
            max_upload_bytes: 64,
        };
        (router(state, Path::new("public")), store, uploads_dir)
    }

    fn admin(builder: axum::http::request::Builder) -> axum::http::request::Builder {
        builder.header(header::COOKIE, "admin=1")
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        admin(Request::builder().method(method).uri(uri))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn send(app: &Router, req: Request<Body>) -> Response {
        app.clone().oneshot(req).await.unwrap()
    }

    async fn body_text(resp: Response) -> String {
        let bytes = hyper::body::to_bytes(resp.into_body()).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn body_json(resp: Response) -> Value {
        serde_json::from_str(&body_text(resp).await).unwrap()
    }

    #[tokio::test]
    async fn add_list_remove_scenario() {
        let (app, _, _) = test_app();
        let resp = send(
            &app,
            json_request("POST", "/api/members", json!({ "name": "Alice", "role": "founder" })),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created = body_json(resp).await;
        assert_eq!(created["ok"], true);
        assert_eq!(created["data"]["is_active"], true);
        assert_eq!(created["data"]["sort_order"], 0);
        assert_eq!(created["data"]["facebook_url"], Value::Null);
        let id = created["data"]["id"].as_str().unwrap().to_owned();

        let listed = body_json(send(&app, get_request("/api/members?role=founder")).await).await;
        let data = listed["data"].as_array().unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data[0]["name"], "Alice");

        let resp = send(
            &app,
            admin(Request::builder().method("DELETE").uri(format!("/api/members?id={id}")))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await, json!({ "ok": true }));

        let listed = body_json(send(&app, get_request("/api/members?role=founder")).await).await;
        assert_eq!(listed["data"], json!([]));
    }

    #[tokio::test]
    async fn invalid_role_does_not_touch_store() {
        let (app, store, _) = test_app();
        let resp = send(
            &app,
            json_request("POST", "/api/members", json!({ "name": "Eve", "role": "owner" })),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = body_json(resp).await;
        assert_eq!(body["ok"], false);
        assert_eq!(body["message"], "role must be founder/leader/member");
        let all = store.list_members(&Default::default()).await.unwrap();
        assert!(all.is_empty());
    }

    #[tokio::test]
    async fn malformed_body_is_bad_request() {
        let (app, _, _) = test_app();
        let req = admin(Request::builder().method("POST").uri("/api/members"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let resp = send(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["ok"], false);
    }

    #[tokio::test]
    async fn listing_orders_by_sort_order_then_creation() {
        let (app, _, _) = test_app();
        for (name, order) in [("c", 5), ("a", 1), ("b", 1), ("z", -2)] {
            let resp = send(
                &app,
                json_request(
                    "POST",
                    "/api/members",
                    json!({ "name": name, "role": "member", "sort_order": order }),
                ),
            )
            .await;
            assert_eq!(resp.status(), StatusCode::CREATED);
        }
        let listed = body_json(send(&app, get_request("/api/members")).await).await;
        let names: Vec<&str> = listed["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, ["z", "a", "b", "c"]);
    }

    #[tokio::test]
    async fn name_search_is_case_insensitive() {
        let (app, _, _) = test_app();
        for name in ["Matoom Wellesley", "Somchai"] {
            send(
                &app,
                json_request("POST", "/api/members", json!({ "name": name, "role": "leader" })),
            )
            .await;
        }
        let listed = body_json(send(&app, get_request("/api/members?q=WELL")).await).await;
        assert_eq!(listed["data"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_role_filter_matches_nothing() {
        let (app, _, _) = test_app();
        send(
            &app,
            json_request("POST", "/api/members", json!({ "name": "Somchai", "role": "leader" })),
        )
        .await;
        let resp = send(&app, get_request("/api/members?role=boss")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await, json!({ "ok": true, "data": [] }));
        let listed = body_json(send(&app, get_request("/api/members?role=")).await).await;
        assert_eq!(listed["data"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn script_links_are_rejected() {
        let (app, store, _) = test_app();
        let resp = send(
            &app,
            json_request(
                "POST",
                "/api/members",
                json!({ "name": "Mallory", "role": "member", "facebook_url": "javascript:alert(document.cookie)" }),
            ),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["message"], "facebook_url must be an http(s) link");
        assert!(store.list_members(&Default::default()).await.unwrap().is_empty());
        let html = body_text(send(&app, get_request("/")).await).await;
        assert!(!html.contains("javascript:alert"));

        let resp = send(
            &app,
            json_request(
                "PUT",
                "/api/gangs",
                json!({ "slug": "x", "name": "X", "members": [{ "name": "M", "image": "javascript:1" }] }),
            ),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn delete_requires_valid_id() {
        let (app, _, _) = test_app();
        let missing = admin(Request::builder().method("DELETE").uri("/api/members"))
            .body(Body::empty())
            .unwrap();
        let resp = send(&app, missing).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["message"], "id is required");
    }

    #[tokio::test]
    async fn deleting_unknown_id_is_acknowledged() {
        let (app, _, _) = test_app();
        let req = admin(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/members?id={}", uuid::Uuid::new_v4())),
        )
        .body(Body::empty())
        .unwrap();
        let resp = send(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await, json!({ "ok": true }));
    }

    #[tokio::test]
    async fn mutations_need_admin_cookie() {
        let (app, _, _) = test_app();
        let req = Request::builder()
            .method("POST")
            .uri("/api/members")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({ "name": "A", "role": "member" }).to_string()))
            .unwrap();
        assert_eq!(send(&app, req).await.status(), StatusCode::UNAUTHORIZED);
        let resp = send(&app, get_request("/admin/dashboard")).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(resp.headers()[header::LOCATION], "/admin");
    }

    #[tokio::test]
    async fn login_sets_session_cookie() {
        let (app, _, _) = test_app();
        let login = |password: &str| {
            Request::builder()
                .method("POST")
                .uri("/api/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({ "password": password }).to_string()))
                .unwrap()
        };
        let resp = send(&app, login("nope")).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert!(resp.headers().get(header::SET_COOKIE).is_none());

        let resp = send(&app, login(PASSWORD)).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let cookie = resp.headers()[header::SET_COOKIE].to_str().unwrap().to_owned();
        assert!(cookie.starts_with("admin=1"));
        assert!(cookie.contains("Max-Age=604800"));

        let status = send(&app, admin(Request::builder().uri("/api/auth")).body(Body::empty()).unwrap()).await;
        assert_eq!(body_json(status).await["authenticated"], true);
        let status = send(&app, get_request("/api/auth")).await;
        assert_eq!(body_json(status).await["authenticated"], false);
    }

    #[tokio::test]
    async fn logout_clears_session_cookie() {
        let (app, _, _) = test_app();
        let req = admin(Request::builder().method("DELETE").uri("/api/auth"))
            .body(Body::empty())
            .unwrap();
        let resp = send(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let cookie = resp.headers()[header::SET_COOKIE].to_str().unwrap().to_owned();
        assert!(cookie.starts_with("admin="));
        assert!(!cookie.starts_with("admin=1"));
        assert!(cookie.contains("Max-Age=0"));
        assert_eq!(body_json(resp).await, json!({ "ok": true }));
    }

    #[tokio::test]
    async fn login_without_configured_password_fails() {
        let store = Store::memory(MemoryStore::default());
        let state = AppState {
            store,
            auth: Arc::new(AdminAuth {
                password: None,
                secure_cookies: false,
            }),
            site: Arc::new(SiteInfo::default()),
            music: Arc::new(MusicInfo::default()),
            uploads_dir: Arc::new(std::env::temp_dir()),
            max_upload_bytes: 64,
        };
        let app = router(state, Path::new("public"));
        let req = Request::builder()
            .method("POST")
            .uri("/api/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({ "password": "anything" }).to_string()))
            .unwrap();
        let resp = send(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(resp.headers().get(header::SET_COOKIE).is_none());
        assert_eq!(body_json(resp).await["ok"], false);
    }

    #[tokio::test]
    async fn dashboard_form_adds_and_removes() {
        let (app, store, _) = test_app();
        let req = admin(Request::builder().method("POST").uri("/admin/members"))
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("name=Bob&role=leader&facebook_url=&avatar_url=&sort_order=2"))
            .unwrap();
        let resp = send(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        let members = store.list_members(&Default::default()).await.unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].sort_order, 2);

        let req = admin(Request::builder().method("POST").uri(format!("/admin/members/{}/remove", members[0].id)))
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(&app, req).await.status(), StatusCode::SEE_OTHER);
        assert!(store.list_members(&Default::default()).await.unwrap().is_empty());

        let req = admin(Request::builder().method("POST").uri("/admin/members"))
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("name=&role=leader"))
            .unwrap();
        let resp = send(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(resp).await.contains("name is required"));
    }

    #[tokio::test]
    async fn directory_page_groups_members() {
        let (app, _, _) = test_app();
        for (name, role) in [("Alice", "founder"), ("Bob", "member")] {
            send(
                &app,
                json_request("POST", "/api/members", json!({ "name": name, "role": role })),
            )
            .await;
        }
        let resp = send(&app, get_request("/")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let html = body_text(resp).await;
        assert!(html.contains("FOUNDERS"));
        assert!(html.contains("/ 01"));
        assert!(html.contains("Alice"));
        assert_eq!(html.matches("id=\"music\"").count(), 1);

        let html = body_text(send(&app, get_request("/?q=bob")).await).await;
        assert!(html.contains("Bob"));
        assert!(!html.contains("Alice"));
    }

    #[tokio::test]
    async fn gangs_put_and_lookup() {
        let (app, _, _) = test_app();
        let resp = send(
            &app,
            json_request(
                "PUT",
                "/api/gangs",
                json!({ "slug": "Meenpro", "name": "Meenpro", "members": [{ "name": "Boss", "role": "owner" }] }),
            ),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let listed = body_json(send(&app, get_request("/api/gangs")).await).await;
        assert_eq!(listed["data"][0]["slug"], "Meenpro");

        let resp = send(&app, get_request("/gangs/meenpro")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(body_text(resp).await.contains("Boss"));
        let resp = send(&app, get_request("/gangs/unknown")).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = send(&app, json_request("PUT", "/api/gangs", json!({ "slug": " ", "name": "x" }))).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["error"], "slug is required");
    }

    #[tokio::test]
    async fn upload_stores_image() {
        let (app, _, dir) = test_app();
        let req = admin(Request::builder().method("POST").uri("/api/upload?filename=me.png"))
            .body(Body::from(vec![1u8, 2, 3]))
            .unwrap();
        let resp = send(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let url = body_json(resp).await["url"].as_str().unwrap().to_owned();
        let name = url.strip_prefix("/uploads/").unwrap();
        assert!(name.ends_with(".png"));
        assert_eq!(std::fs::read(dir.join(name)).unwrap(), [1u8, 2, 3]);

        let req = admin(Request::builder().method("POST").uri("/api/upload?filename=x.exe"))
            .body(Body::from(vec![1u8]))
            .unwrap();
        assert_eq!(send(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = admin(Request::builder().method("POST").uri("/api/upload?filename=big.png"))
            .body(Body::from(vec![0u8; 65]))
            .unwrap();
        assert_eq!(send(&app, req).await.status(), StatusCode::PAYLOAD_TOO_LARGE);
        std::fs::remove_dir_all(dir).unwrap();
    }
}
