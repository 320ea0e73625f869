//! Per-call context handed through the interceptor chain.

use crate::config::CallOptions;
use crate::method::Method;

/// Everything an interceptor can see about an outgoing call before it is
/// sent: the target method, the host and the call options.
///
/// Interceptors receive the context by value and pass a (possibly rebuilt)
/// context on to the continuation. The transport only ever observes the
/// context produced by the innermost interceptor.
#[derive(Debug, Clone)]
pub struct CallContext {
    method: Method,
    host: Option<String>,
    options: CallOptions,
}

impl CallContext {
    /// Create a new call context.
    pub fn new(method: Method, host: Option<String>, options: CallOptions) -> Self {
        Self {
            method,
            host,
            options,
        }
    }

    /// The method being called.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The target host, if the client was configured with one.
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// The call options.
    pub fn options(&self) -> &CallOptions {
        &self.options
    }

    /// Mutable access to the call options.
    pub fn options_mut(&mut self) -> &mut CallOptions {
        &mut self.options
    }

    /// Replace the call options, keeping the method and host.
    pub fn with_options(self, options: CallOptions) -> Self {
        Self { options, ..self }
    }

    /// Decompose into method, host and options.
    pub fn into_parts(self) -> (Method, Option<String>, CallOptions) {
        (self.method, self.host, self.options)
    }
}
