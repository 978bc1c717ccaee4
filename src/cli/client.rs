use anyhow::{anyhow, Context};
use reqwest::{multipart, Method, RequestBuilder, Response};
use serde::Serialize;
use serde_json::Value;
use std::path::Path;

use crate::cli::config::EnvironmentConfig;

/// Thin JSON client over the feed API for the current CLI session.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(env: &EnvironmentConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: env.server_url.trim_end_matches('/').to_string(),
            token: env.token.clone(),
        }
    }

    /// Fails early with a hint instead of letting the server answer 401.
    pub fn require_token(&self) -> anyhow::Result<()> {
        if self.token.is_none() {
            return Err(anyhow!("Not logged in; run `feed auth login <email>` first"));
        }
        Ok(())
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, format!("{}{}", self.base_url, path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    pub async fn get(&self, path: &str) -> anyhow::Result<Value> {
        self.send(self.request(Method::GET, path)).await
    }

    pub async fn delete(&self, path: &str) -> anyhow::Result<Value> {
        self.send(self.request(Method::DELETE, path)).await
    }

    pub async fn json<T: Serialize>(&self, method: Method, path: &str, body: &T) -> anyhow::Result<Value> {
        self.send(self.request(method, path).json(body)).await
    }

    pub async fn multipart(&self, method: Method, path: &str, form: multipart::Form) -> anyhow::Result<Value> {
        self.send(self.request(method, path).multipart(form)).await
    }

    async fn send(&self, builder: RequestBuilder) -> anyhow::Result<Value> {
        let response = builder
            .send()
            .await
            .with_context(|| format!("failed to reach {}", self.base_url))?;
        decode(response).await
    }
}

async fn decode(response: Response) -> anyhow::Result<Value> {
    let status = response.status();
    let body: Value = response.json().await.unwrap_or(Value::Null);

    if status.is_success() {
        return Ok(body);
    }

    let message = body
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed"));

    let details: Vec<String> = body
        .get("data")
        .and_then(Value::as_array)
        .map(|errors| {
            errors
                .iter()
                .filter_map(|e| {
                    let path = e.get("path")?.as_str()?;
                    let msg = e.get("msg")?.as_str()?;
                    Some(format!("{}: {}", path, msg))
                })
                .collect()
        })
        .unwrap_or_default();

    if details.is_empty() {
        Err(anyhow!("{} ({})", message, status.as_u16()))
    } else {
        Err(anyhow!("{} ({}): {}", message, status.as_u16(), details.join(", ")))
    }
}

/// Build the multipart part for an image file, typed from its extension.
pub async fn image_part(path: &Path) -> anyhow::Result<multipart::Part> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload")
        .to_string();

    let part = multipart::Part::bytes(bytes)
        .file_name(file_name)
        .mime_str(mime_for(path))?;
    Ok(part)
}

fn mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}
