//! Async HTTP client for the vault's file endpoints.

use std::time::Duration;

use reqwest::{Client, StatusCode, header};

use crate::{Error, Result};

/// Connection settings for a vault.
#[derive(Debug, Clone)]
pub struct VaultConfig {
  pub base_url: String,
  pub token:    String,
}

/// Async HTTP client for a vault's REST API.
///
/// Cheap to clone — the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct VaultClient {
  client: Client,
  config: VaultConfig,
}

impl VaultClient {
  pub fn new(config: VaultConfig) -> Result<Self> {
    if config.base_url.trim().is_empty() {
      return Err(Error::Config("vault base URL is empty".into()));
    }
    let client = Client::builder()
      .timeout(Duration::from_secs(30))
      .build()?;
    Ok(Self { client, config })
  }

  /// `{base}/vault/{path}` with each path segment percent-encoded, so note
  /// paths may carry spaces or unicode without mangling the URL structure.
  pub fn url(&self, path: &str) -> String {
    let encoded = path
      .split('/')
      .map(|seg| urlencoding::encode(seg).into_owned())
      .collect::<Vec<_>>()
      .join("/");
    format!(
      "{}/vault/{encoded}",
      self.config.base_url.trim_end_matches('/')
    )
  }

  /// `GET /vault/<path>` — fetch a note's full text.
  ///
  /// A missing note (404) is `Ok(None)`; any other non-success status is an
  /// error.
  pub async fn read_note(&self, path: &str) -> Result<Option<String>> {
    let resp = self
      .client
      .get(self.url(path))
      .bearer_auth(&self.config.token)
      .send()
      .await?;

    match resp.status() {
      StatusCode::NOT_FOUND => Ok(None),
      status if status.is_success() => Ok(Some(resp.text().await?)),
      status => Err(Error::Status { status, path: path.to_owned() }),
    }
  }

  /// `PUT /vault/<path>` — replace a note's content wholesale.
  pub async fn write_note(&self, path: &str, content: &str) -> Result<()> {
    let resp = self
      .client
      .put(self.url(path))
      .bearer_auth(&self.config.token)
      .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
      .body(content.to_owned())
      .send()
      .await?;

    let status = resp.status();
    if !status.is_success() {
      return Err(Error::Status { status, path: path.to_owned() });
    }
    tracing::debug!(path, bytes = content.len(), "wrote vault note");
    Ok(())
  }
}
