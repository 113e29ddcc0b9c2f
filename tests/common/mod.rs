#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use babyvision::auth::session;
use babyvision::config::Config;
use babyvision::db;
use babyvision::email::MockEmailProvider;
use babyvision::routes;
use babyvision::state::{AppState, DbPool};
use babyvision::voucher::MockEntitlementGranter;
use http_body_util::BodyExt;
use rusqlite::params;
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

pub struct TestApp {
    pub router: Router,
    pub pool: DbPool,
    pub mailer: Arc<MockEmailProvider>,
    pub entitlements: Arc<MockEntitlementGranter>,
    _tmp: TempDir,
}

pub struct TestUser {
    pub id: String,
    pub token: String,
}

impl TestApp {
    pub fn spawn() -> Self {
        Self::with_providers(MockEmailProvider::new(), MockEntitlementGranter::new())
    }

    pub fn with_providers(mailer: MockEmailProvider, entitlements: MockEntitlementGranter) -> Self {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.database.path = Some(tmp.path().join("test.db"));

        let pool = db::create_pool(&config.db_path()).expect("Failed to create test database");
        db::run_migrations(&pool).expect("Failed to run migrations");

        let mailer = Arc::new(mailer);
        let entitlements = Arc::new(entitlements);
        let state = AppState::new(pool.clone(), config)
            .with_mailer(mailer.clone())
            .with_entitlements(entitlements.clone());

        TestApp {
            router: routes::app(state),
            pool,
            mailer,
            entitlements,
            _tmp: tmp,
        }
    }

    /// Insert a user directly and open a session for them.
    pub fn user(&self, username: &str, is_admin: bool) -> TestUser {
        let id = uuid::Uuid::now_v7().to_string();
        {
            let conn = self.pool.get().unwrap();
            conn.execute(
                "INSERT INTO users (id, username, email, is_admin) VALUES (?1, ?2, ?3, ?4)",
                params![id, username, format!("{}@example.com", username), is_admin],
            )
            .unwrap();
        }
        let token = session::create_session(&self.pool, &id, 24).unwrap();
        TestUser { id, token }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    /// Create a profile over HTTP and return its document id.
    pub async fn profile(&self, token: &str, name: &str) -> String {
        let (status, body) = self
            .post(
                "/api/baby-profiles",
                Some(token),
                serde_json::json!({ "name": name, "birthdate": "2024-01-15" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["data"]["documentId"].as_str().unwrap().to_string()
    }

    pub fn count(&self, sql: &str) -> i64 {
        let conn = self.pool.get().unwrap();
        conn.query_row(sql, [], |row| row.get(0)).unwrap()
    }
}
