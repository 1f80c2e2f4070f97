#![allow(dead_code)]

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde_json::Value;

use backoffice_api::auth::{generate_jwt, Claims};
use backoffice_api::config::{AppConfig, StorageBackend};
use backoffice_api::state::AppState;

pub const JWT_SECRET: &str = "test-secret";

/// In-process server on its own port with an empty memory store
pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    pub state: AppState,
    pub token: String,
    client: reqwest::Client,
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::development();
    config.database.backend = StorageBackend::Memory;
    config.api.host = "127.0.0.1".to_string();
    config.security.jwt_secret = JWT_SECRET.to_string();
    config.security.enable_audit_logging = true;
    config
}

impl TestServer {
    pub async fn spawn() -> Result<Self> {
        Self::spawn_with(test_config()).await
    }

    /// Start with a caller-adjusted config; the port is always replaced
    pub async fn spawn_with(mut config: AppConfig) -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        config.api.port = port;

        let state = AppState::memory(config);
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .context("failed to bind test listener")?;
        let app = backoffice_api::app(state.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let claims = Claims::new(1, "Test Admin", vec!["Super Admin".into()], 1);
        let token = generate_jwt(&claims, JWT_SECRET)?;

        let server = Self {
            port,
            base_url: format!("http://127.0.0.1:{}", port),
            state,
            token,
            client: reqwest::Client::new(),
        };
        server.wait_ready(Duration::from_secs(10)).await?;
        Ok(server)
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Ok(resp) = self.client.get(self.url("/health")).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Anonymous request
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, self.url(path))
    }

    /// Request carrying the admin bearer token
    pub fn authed(&self, method: Method, path: &str) -> RequestBuilder {
        self.request(method, path).bearer_auth(&self.token)
    }

    pub async fn get(&self, path: &str) -> Result<(StatusCode, Value)> {
        read(self.authed(Method::GET, path).send().await?).await
    }

    pub async fn post(&self, path: &str, body: Value) -> Result<(StatusCode, Value)> {
        read(self.authed(Method::POST, path).json(&body).send().await?).await
    }

    pub async fn put(&self, path: &str, body: Value) -> Result<(StatusCode, Value)> {
        read(self.authed(Method::PUT, path).json(&body).send().await?).await
    }

    pub async fn delete(&self, path: &str) -> Result<(StatusCode, Value)> {
        read(self.authed(Method::DELETE, path).send().await?).await
    }

    pub async fn public_get(&self, path: &str) -> Result<(StatusCode, Value)> {
        read(self.request(Method::GET, path).send().await?).await
    }

    /// Create a menu item and return its id
    pub async fn create_menu_item(&self, body: Value) -> Result<i64> {
        let (status, json) = self.post("/system/menu/items", body).await?;
        anyhow::ensure!(status == StatusCode::CREATED, "create failed: {} {}", status, json);
        id_of(&json["data"])
    }
}

pub async fn read(resp: Response) -> Result<(StatusCode, Value)> {
    let status = resp.status();
    let text = resp.text().await?;
    let body = if text.is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&text).with_context(|| format!("non-JSON body: {}", text))?
    };
    Ok((status, body))
}

/// Ids are numbers on records and strings on menu nodes
pub fn id_of(value: &Value) -> Result<i64> {
    match &value["id"] {
        Value::Number(n) => n.as_i64().context("id is not an integer"),
        Value::String(s) => s.parse().context("id is not numeric"),
        other => anyhow::bail!("missing id in {}", other),
    }
}
