//! Call configuration and interceptors.
//!
//! - [`CallOptions`]: per-call deadline, cancellation token and headers
//! - [`Intercept`]: the interceptor trait, composed with [`Chain`]
//! - [`DeadlineInterceptor`]: global deadline enforcement
//! - [`MetadataInterceptor`] and [`HeaderInterceptor`]: outgoing header rewriting

mod deadline;
mod interceptor;
mod metadata;
mod options;

pub use deadline::{DEFAULT_TIMEOUT, DeadlineInterceptor, DeadlineOptions};
pub use interceptor::{Chain, HeaderInterceptor, Intercept};
pub use metadata::{MapMetadata, MetadataInterceptor, MetadataTransform};
pub use options::CallOptions;
