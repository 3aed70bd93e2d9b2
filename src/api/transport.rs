use color_eyre::{eyre::eyre, Result};
use futures::future::BoxFuture;
use reqwest::Method;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

use super::error::ApiError;
use crate::config::ApiConfig;

/// Request shape handed to a transport.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
  pub url: String,
  pub method: Method,
  pub headers: BTreeMap<String, String>,
  pub data: Option<Value>,
}

/// Fetch capability used by `ApiMiddleware`.
///
/// Futures are `'static` so they can run on a spawned task.
pub trait Transport: Send + Sync {
  fn fetch(&self, request: TransportRequest) -> BoxFuture<'static, Result<Value, ApiError>>;
}

/// HTTP transport backed by reqwest
#[derive(Clone)]
pub struct HttpTransport {
  client: reqwest::Client,
  base_url: Url,
}

impl HttpTransport {
  pub fn new(config: &ApiConfig) -> Result<Self> {
    let base_url = Url::parse(&config.base_url)
      .map_err(|e| eyre!("Invalid api.base_url {}: {}", config.base_url, e))?;

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { client, base_url })
  }
}

impl Transport for HttpTransport {
  fn fetch(&self, request: TransportRequest) -> BoxFuture<'static, Result<Value, ApiError>> {
    let client = self.client.clone();
    let url = self.base_url.join(&request.url);

    Box::pin(async move {
      let url = url.map_err(|e| ApiError::Transport(format!("invalid url {}: {}", request.url, e)))?;

      let mut builder = client.request(request.method, url);
      for (name, value) in &request.headers {
        builder = builder.header(name, value);
      }
      if let Some(data) = &request.data {
        builder = builder.json(data);
      }

      let response = builder
        .send()
        .await
        .map_err(|e| ApiError::Transport(e.to_string()))?;

      let status = response.status();
      if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::Response {
          status: status.as_u16(),
          body,
        });
      }

      response
        .json::<Value>()
        .await
        .map_err(|e| ApiError::Decode(e.to_string()))
    })
  }
}
