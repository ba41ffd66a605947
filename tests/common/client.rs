//! HTTP client for end-to-end tests
//!
//! This module provides a high-level HTTP client that wraps reqwest
//! and provides methods for all catalog-server endpoints.
//!
//! When API routes or request formats change, update only this file.

use super::constants::*;
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response};
use serde_json::{json, Value};
use std::time::Duration;

/// HTTP test client, optionally carrying a bearer token
pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
    token: Option<String>,
}

impl TestClient {
    /// Creates a new unauthenticated client
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self {
            client,
            base_url,
            token: None,
        }
    }

    /// Creates a client sending `token` on every request
    pub fn with_token(base_url: String, token: &str) -> Self {
        Self {
            token: Some(token.to_string()),
            ..Self::new(base_url)
        }
    }

    /// Creates a client authenticated as the admin user
    pub fn admin(base_url: String) -> Self {
        Self::with_token(base_url, ADMIN_TOKEN)
    }

    /// Creates a client authenticated as the second editor
    pub fn editor(base_url: String) -> Self {
        Self::with_token(base_url, EDITOR_TOKEN)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(builder: RequestBuilder) -> Response {
        builder.send().await.expect("Request failed")
    }

    // ========================================================================
    // Misc
    // ========================================================================

    /// GET /
    pub async fn home(&self) -> Response {
        Self::send(self.request(reqwest::Method::GET, "/")).await
    }

    /// GET /v1/me
    pub async fn me(&self) -> Response {
        Self::send(self.request(reqwest::Method::GET, "/v1/me")).await
    }

    /// GET an arbitrary path, e.g. a media URL
    pub async fn get_path(&self, path: &str) -> Response {
        Self::send(self.request(reqwest::Method::GET, path)).await
    }

    // ========================================================================
    // Cultivars
    // ========================================================================

    /// GET /v1/cultivars
    pub async fn list_cultivars(&self, order: Option<&str>) -> Response {
        let mut builder = self.request(reqwest::Method::GET, "/v1/cultivars");
        if let Some(order) = order {
            builder = builder.query(&[("order", order)]);
        }
        Self::send(builder).await
    }

    /// GET /v1/cultivars/{id}
    pub async fn get_cultivar(&self, id: &str) -> Response {
        Self::send(self.request(reqwest::Method::GET, &format!("/v1/cultivars/{}", id))).await
    }

    /// GET /v1/cultivars/{id}, decoded
    pub async fn get_cultivar_json(&self, id: &str) -> Value {
        let response = self.get_cultivar(id).await;
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        response.json().await.expect("Invalid cultivar JSON")
    }

    /// POST /v1/cultivars
    pub async fn create_cultivar(&self, profile: &Value) -> Response {
        Self::send(self.request(reqwest::Method::POST, "/v1/cultivars").json(profile)).await
    }

    /// POST /v1/cultivars with a minimal valid profile, returning the new id
    pub async fn create_named(&self, name: &str) -> String {
        let response = self
            .create_cultivar(&json!({"name": name, "genetics": "Hybrid"}))
            .await;
        assert_eq!(response.status(), reqwest::StatusCode::CREATED);
        let body: Value = response.json().await.expect("Invalid cultivar JSON");
        body["id"].as_str().expect("Missing id").to_string()
    }

    /// PUT /v1/cultivars/{id}
    pub async fn update_cultivar(&self, id: &str, patch: &Value) -> Response {
        Self::send(
            self.request(reqwest::Method::PUT, &format!("/v1/cultivars/{}", id))
                .json(patch),
        )
        .await
    }

    /// PUT /v1/cultivars/{id}/status
    pub async fn set_status(&self, id: &str, status: &str) -> Response {
        Self::send(
            self.request(reqwest::Method::PUT, &format!("/v1/cultivars/{}/status", id))
                .json(&json!({ "status": status })),
        )
        .await
    }

    /// PUT /v1/cultivars/status
    pub async fn set_status_bulk(&self, ids: &[&str], status: &str) -> Response {
        Self::send(
            self.request(reqwest::Method::PUT, "/v1/cultivars/status")
                .json(&json!({ "ids": ids, "status": status })),
        )
        .await
    }

    /// POST /v1/cultivars/{id}/reviews
    pub async fn add_review(
        &self,
        id: &str,
        author: &str,
        rating: i64,
        experience: &str,
    ) -> Response {
        Self::send(
            self.request(reqwest::Method::POST, &format!("/v1/cultivars/{}/reviews", id))
                .json(&json!({
                    "author": author,
                    "rating": rating,
                    "experience": experience,
                })),
        )
        .await
    }

    /// POST /v1/cultivars/{id}/images
    pub async fn add_image(&self, id: &str, bytes: &[u8], alt: Option<&str>) -> Response {
        let mut form = Form::new().part(
            "file",
            Part::bytes(bytes.to_vec()).file_name("upload.png"),
        );
        if let Some(alt) = alt {
            form = form.text("alt", alt.to_string());
        }
        Self::send(
            self.request(reqwest::Method::POST, &format!("/v1/cultivars/{}/images", id))
                .multipart(form),
        )
        .await
    }

    /// DELETE /v1/cultivars/{id}/images/{image_id}
    pub async fn remove_image(&self, id: &str, image_id: &str) -> Response {
        Self::send(self.request(
            reqwest::Method::DELETE,
            &format!("/v1/cultivars/{}/images/{}", id, image_id),
        ))
        .await
    }

    /// POST /v1/cultivars/{id}/info/{category}
    pub async fn add_info(
        &self,
        id: &str,
        category: &str,
        file_name: &str,
        bytes: &[u8],
    ) -> Response {
        let form = Form::new().part(
            "file",
            Part::bytes(bytes.to_vec()).file_name(file_name.to_string()),
        );
        Self::send(
            self.request(
                reqwest::Method::POST,
                &format!("/v1/cultivars/{}/info/{}", id, category),
            )
            .multipart(form),
        )
        .await
    }

    /// DELETE /v1/cultivars/{id}/info/{category}/{file_id}
    pub async fn remove_info(&self, id: &str, category: &str, file_id: &str) -> Response {
        Self::send(self.request(
            reqwest::Method::DELETE,
            &format!("/v1/cultivars/{}/info/{}/{}", id, category, file_id),
        ))
        .await
    }

    // ========================================================================
    // Audit Log
    // ========================================================================

    /// GET /v1/logs with raw query parameters
    pub async fn logs(&self, params: &[(&str, &str)]) -> Response {
        Self::send(self.request(reqwest::Method::GET, "/v1/logs").query(params)).await
    }

    /// GET /v1/logs, decoded
    pub async fn logs_json(&self, params: &[(&str, &str)]) -> Value {
        let response = self.logs(params).await;
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        response.json().await.expect("Invalid log page JSON")
    }
}
