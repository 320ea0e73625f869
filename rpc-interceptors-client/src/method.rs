//! Method descriptors.

/// The invocation pattern of an RPC method.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MethodType {
    /// One request, one response.
    Unary,
    /// Request stream, one response.
    ClientStreaming,
    /// One request, response stream.
    ServerStreaming,
    /// Request stream and response stream.
    DuplexStreaming,
}

impl MethodType {
    /// Get the name used in tracing spans.
    pub fn as_str(&self) -> &'static str {
        match self {
            MethodType::Unary => "unary",
            MethodType::ClientStreaming => "client_stream",
            MethodType::ServerStreaming => "server_stream",
            MethodType::DuplexStreaming => "bidi_stream",
        }
    }
}

/// Describes the remote method a call targets.
///
/// Descriptors are usually declared once as constants next to the client
/// stub that uses them.
///
/// ```
/// use rpc_interceptors_client::{Method, MethodType};
///
/// const SAY_HELLO: Method = Method::new("greet.Greeter", "SayHello", MethodType::Unary);
///
/// assert_eq!(SAY_HELLO.procedure(), "greet.Greeter/SayHello");
/// assert_eq!(SAY_HELLO.full_name(), "/greet.Greeter/SayHello");
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Method {
    service: &'static str,
    name: &'static str,
    kind: MethodType,
}

impl Method {
    /// Create a new method descriptor.
    pub const fn new(service: &'static str, name: &'static str, kind: MethodType) -> Self {
        Self {
            service,
            name,
            kind,
        }
    }

    /// The fully-qualified service name (e.g., "greet.Greeter").
    pub fn service(&self) -> &'static str {
        self.service
    }

    /// The method name (e.g., "SayHello").
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The invocation pattern of this method.
    pub fn kind(&self) -> MethodType {
        self.kind
    }

    /// The procedure path without a leading slash (e.g., "greet.Greeter/SayHello").
    pub fn procedure(&self) -> String {
        format!("{}/{}", self.service, self.name)
    }

    /// The request path with a leading slash (e.g., "/greet.Greeter/SayHello").
    pub fn full_name(&self) -> String {
        format!("/{}/{}", self.service, self.name)
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.service, self.name)
    }
}
