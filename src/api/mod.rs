//! Remote request plumbing: the request envelope, transports, and the
//! middleware that turns envelopes into lifecycle actions.

mod envelope;
mod error;
mod middleware;
pub mod mock;
mod transport;

pub use envelope::{ApiRequest, Lifecycle, SuccessFn};
pub use error::ApiError;
pub use middleware::ApiMiddleware;
pub use mock::MockTransport;
pub use transport::{HttpTransport, Transport, TransportRequest};
