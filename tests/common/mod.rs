#![allow(dead_code)]

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::{Duration, Local, NaiveDate};
use serde_json::Value;
use tower::ServiceExt;

use vaccination_portal::auth::{Role, TokenService};
use vaccination_portal::config::AppConfig;
use vaccination_portal::database::MemoryStore;
use vaccination_portal::{app, AppState};

pub const SECRET: &str = "integration-test-secret";
pub const ADMIN: (&str, &str) = ("admin", "admin-pass");
pub const NURSE: (&str, &str) = ("nurse", "nurse-pass");

/// The full router over a fresh in-memory store with one admin and one user account
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

impl TestApp {
    pub async fn spawn() -> Result<Self> {
        Self::spawn_with(AppConfig::development()).await
    }

    pub async fn spawn_with(mut config: AppConfig) -> Result<Self> {
        config.security.jwt_secret = SECRET.to_string();
        config.api.enable_request_logging = false;

        let tokens = TokenService::from_config(&config.security)?;
        let state = AppState::new(Arc::new(MemoryStore::new()), tokens, config);

        let auth = state.auth_service();
        auth.create_user(ADMIN.0, ADMIN.1, Role::Admin)
            .await
            .context("seed admin")?;
        auth.create_user(NURSE.0, NURSE.1, Role::User)
            .await
            .context("seed user")?;

        Ok(Self {
            router: app(state.clone()),
            state,
        })
    }

    pub async fn send(&self, request: Request<Body>) -> Result<(StatusCode, Value)> {
        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).context("response body is not JSON")?
        };
        Ok((status, body))
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&json)?))?,
            None => builder.body(Body::empty())?,
        };
        self.send(request).await
    }

    pub async fn login(&self, (username, password): (&str, &str)) -> Result<String> {
        let (status, body) = self
            .request(
                Method::POST,
                "/login",
                None,
                Some(serde_json::json!({"username": username, "password": password})),
            )
            .await?;
        anyhow::ensure!(status == StatusCode::OK, "login failed: {} {}", status, body);
        body["data"]["access_token"]
            .as_str()
            .map(str::to_string)
            .context("no access_token in login response")
    }

    pub async fn admin_token(&self) -> Result<String> {
        self.login(ADMIN).await
    }

    pub async fn user_token(&self) -> Result<String> {
        self.login(NURSE).await
    }

    /// Upload `csv` to the bulk endpoint as multipart field `field`
    pub async fn upload(&self, token: &str, field: &str, csv: &str) -> Result<(StatusCode, Value)> {
        let boundary = "portal-test-boundary";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"{f}\"; filename=\"students.csv\"\r\n\
             Content-Type: text/csv\r\n\r\n{csv}\r\n--{b}--\r\n",
            b = boundary,
            f = field,
            csv = csv
        );
        let request = Request::builder()
            .method(Method::POST)
            .uri("/students/bulk")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", boundary))
            .body(Body::from(body))?;
        self.send(request).await
    }
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// `today + days` as `YYYY-MM-DD`
pub fn days_from_today(days: i64) -> String {
    (today() + Duration::days(days)).to_string()
}
