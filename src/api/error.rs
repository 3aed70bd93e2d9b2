use thiserror::Error;

/// Failure of a remote request, carried as an action payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
  /// Network or connection failure
  #[error("transport error: {0}")]
  Transport(String),
  /// Remote endpoint answered with a non-success status
  #[error("request failed with status {status}: {body}")]
  Response { status: u16, body: String },
  /// Response body could not be parsed into the expected shape
  #[error("failed to decode response: {0}")]
  Decode(String),
}

impl From<serde_json::Error> for ApiError {
  fn from(e: serde_json::Error) -> Self {
    ApiError::Decode(e.to_string())
  }
}
