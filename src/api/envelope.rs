//! Declarative description of a remote request and its lifecycle actions.

use reqwest::Method;
use serde_json::Value;
use std::collections::BTreeMap;

use super::error::ApiError;
use super::transport::TransportRequest;
use crate::clock::Timestamp;
use crate::store::Action;

/// Builds the success action from a response body and the completion time.
pub type SuccessFn = fn(Value, Timestamp) -> serde_json::Result<Action>;

/// Typed constructors for the three outcomes of a request.
///
/// When `on_error` is `None` failures surface as `Action::ApiCallFailed`.
#[derive(Debug, Clone, Copy)]
pub struct Lifecycle {
  pub on_start: fn() -> Action,
  pub on_success: SuccessFn,
  pub on_error: Option<fn(ApiError) -> Action>,
}

impl Lifecycle {
  /// Resolve a failure to the action that reports it.
  pub fn error_action(&self, error: ApiError) -> Action {
    match self.on_error {
      Some(on_error) => on_error(error),
      None => Action::ApiCallFailed(error),
    }
  }
}

/// "Please fetch this" envelope intercepted by `ApiMiddleware`.
#[derive(Debug, Clone)]
pub struct ApiRequest {
  pub url: String,
  pub method: Method,
  pub headers: BTreeMap<String, String>,
  pub data: Option<Value>,
  pub lifecycle: Lifecycle,
}

impl ApiRequest {
  pub fn get(url: impl Into<String>, lifecycle: Lifecycle) -> Self {
    Self {
      url: url.into(),
      method: Method::GET,
      headers: BTreeMap::new(),
      data: None,
      lifecycle,
    }
  }

  pub fn with_method(mut self, method: Method) -> Self {
    self.method = method;
    self
  }

  pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.headers.insert(name.into(), value.into());
    self
  }

  pub fn with_data(mut self, data: Value) -> Self {
    self.data = Some(data);
    self
  }

  /// The transport-facing part of the envelope.
  pub fn transport_request(&self) -> TransportRequest {
    TransportRequest {
      url: self.url.clone(),
      method: self.method.clone(),
      headers: self.headers.clone(),
      data: self.data.clone(),
    }
  }
}
