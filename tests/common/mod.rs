#![allow(dead_code)]

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::{multipart, StatusCode};
use serde_json::{json, Value};

pub const PASSWORD: &str = "tester";

/// A server process on its own port with a fresh in-memory store and
/// image directory. Killed on drop.
pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    pub images_dir: PathBuf,
    pub client: reqwest::Client,
    child: Child,
}

impl TestServer {
    pub async fn start() -> Result<Self> {
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);
        let images_dir = std::env::temp_dir().join(format!("feed-it-{}", port));

        let child = Command::new(env!("CARGO_BIN_EXE_feed-api-rust"))
            .env("FEED_API_PORT", port.to_string())
            .env("FEED_STORAGE", "memory")
            .env("FEED_IMAGES_DIR", &images_dir)
            .env("JWT_SECRET", "integration-test-secret")
            .env("SECURITY_BCRYPT_COST", "4")
            .env_remove("DATABASE_URL")
            .env_remove("APP_ENV")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .spawn()
            .context("failed to spawn server binary")?;

        let server = Self {
            port,
            base_url,
            images_dir,
            client: reqwest::Client::new(),
            child,
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
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn signup(&self, email: &str, name: &str) -> Result<String> {
        let res = self
            .client
            .put(self.url("/auth/signup"))
            .json(&json!({ "email": email, "name": name, "password": PASSWORD }))
            .send()
            .await?;
        anyhow::ensure!(res.status() == StatusCode::CREATED, "signup failed: {}", res.status());
        let body: Value = res.json().await?;
        Ok(body["userId"].as_str().context("missing userId")?.to_string())
    }

    pub async fn login(&self, email: &str) -> Result<String> {
        let res = self
            .client
            .post(self.url("/auth/login"))
            .json(&json!({ "email": email, "password": PASSWORD }))
            .send()
            .await?;
        anyhow::ensure!(res.status() == StatusCode::OK, "login failed: {}", res.status());
        let body: Value = res.json().await?;
        Ok(body["token"].as_str().context("missing token")?.to_string())
    }

    /// Sign up and log in, returning `(user_id, token)`.
    pub async fn user(&self, email: &str, name: &str) -> Result<(String, String)> {
        let user_id = self.signup(email, name).await?;
        let token = self.login(email).await?;
        Ok((user_id, token))
    }

    pub async fn create_post(&self, token: &str, title: &str) -> Result<Value> {
        let form = post_form(title, "Some post content", Some(png_part("duck.png")?));
        let res = self
            .client
            .post(self.url("/feed/post"))
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await?;
        anyhow::ensure!(res.status() == StatusCode::CREATED, "create failed: {}", res.status());
        Ok(res.json().await?)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        let _ = std::fs::remove_dir_all(&self.images_dir);
    }
}

pub const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

pub fn png_part(name: &str) -> Result<multipart::Part> {
    Ok(multipart::Part::bytes(PNG_BYTES.to_vec())
        .file_name(name.to_string())
        .mime_str("image/png")?)
}

pub fn post_form(title: &str, content: &str, image: Option<multipart::Part>) -> multipart::Form {
    let form = multipart::Form::new()
        .text("title", title.to_string())
        .text("content", content.to_string());
    match image {
        Some(part) => form.part("image", part),
        None => form,
    }
}
