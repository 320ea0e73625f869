//! Client builder.
//!
//! Provides a fluent API for registering interceptors and building a [`Client`].

use std::sync::Arc;

use rpc_interceptors_core::{Metadata, Status};

use crate::client::{Client, ClientInner};
use crate::config::{
    Chain, DeadlineInterceptor, DeadlineOptions, Intercept, MetadataInterceptor,
};

/// Builder for creating a [`Client`].
///
/// The builder is generic over the interceptor chain `I`. Each registration
/// wraps the chain built so far, so the first interceptor registered is the
/// outermost one and sees every call first.
///
/// # Example
///
/// ```ignore
/// use rpc_interceptors_client::{ClientBuilder, DeadlineOptions};
///
/// let client = ClientBuilder::new(transport)
///     .host("greeter.local:50051")
///     .with_metadata(|mut metadata| {
///         metadata.insert("x-trace", "abc")?;
///         Ok(metadata)
///     })
///     .with_global_deadline(DeadlineOptions::from_secs(4))
///     .build();
/// ```
pub struct ClientBuilder<T, I = ()> {
    transport: T,
    host: Option<String>,
    interceptor: I,
}

impl<T, I: std::fmt::Debug> std::fmt::Debug for ClientBuilder<T, I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("host", &self.host)
            .field("interceptor", &self.interceptor)
            .finish_non_exhaustive()
    }
}

impl<T> ClientBuilder<T, ()> {
    /// Create a builder for a client over `transport`, with no interceptors.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            host: None,
            interceptor: (),
        }
    }
}

impl<T, I> ClientBuilder<T, I> {
    /// Set the host reported in every call's context.
    pub fn host<S: Into<String>>(mut self, host: S) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Register an interceptor inside the ones already registered.
    pub fn with_interceptor<N: Intercept>(self, interceptor: N) -> ClientBuilder<T, Chain<I, N>> {
        ClientBuilder {
            transport: self.transport,
            host: self.host,
            interceptor: Chain(self.interceptor, interceptor),
        }
    }

    /// Enforce a global deadline on every call.
    pub fn with_global_deadline(
        self,
        options: DeadlineOptions,
    ) -> ClientBuilder<T, Chain<I, DeadlineInterceptor>> {
        self.with_interceptor(DeadlineInterceptor::new(options))
    }

    /// Rewrite the outgoing metadata of every call with `transform`.
    pub fn with_metadata<F>(self, transform: F) -> ClientBuilder<T, Chain<I, MetadataInterceptor<F>>>
    where
        F: Fn(Metadata) -> Result<Metadata, Status> + Send + Sync,
    {
        self.with_interceptor(MetadataInterceptor::new(transform))
    }

    /// Build the client.
    pub fn build(self) -> Client<T, I> {
        Client::from_inner(Arc::new(ClientInner {
            transport: self.transport,
            host: self.host,
            interceptor: self.interceptor,
        }))
    }
}
