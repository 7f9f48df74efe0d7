//! Transport seam between the resilience core and the RPC stack.
//!
//! # Responsibilities
//! - Dial the configured server and hand back a callable channel
//! - Issue the unary greeter call with metadata, deadline and compression
//! - Translate transport and status failures into [`CallError`]/[`ConnectError`]
//!
//! # Design Decisions
//! - The core only sees the [`Transport`] and [`GreeterChannel`] traits, so
//!   tests can inject scripted transports
//! - Dropping the last handle to a channel closes the underlying connection

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tonic::client::Grpc;
use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::metadata::MetadataValue;
use tonic::transport::{Channel, Endpoint};
use tonic::{Code, Request};

use crate::net::compression::Codec;
use crate::net::error::{CallError, ConnectError};
use crate::net::proto::{HelloReply, HelloRequest, SAY_HELLO_PATH};
use crate::net::request_id::REQUEST_ID_KEY;

/// Everything needed to dial the server.
#[derive(Debug, Clone)]
pub struct DialTarget {
    /// `host:port` or a full `http://` URI.
    pub address: String,
    /// Per-call compression, `None` for uncompressed.
    pub compression: Option<Codec>,
    /// Upper bound for establishing the connection.
    pub connect_timeout: Duration,
    /// TCP keep-alive interval.
    pub tcp_keepalive: Option<Duration>,
}

/// A single unary call.
#[derive(Debug, Clone)]
pub struct HelloCall {
    pub name: String,
    pub request_id: Option<String>,
    /// Deadline advertised to the server.
    pub deadline: Duration,
}

impl HelloCall {
    pub fn new(name: impl Into<String>, deadline: Duration) -> Self {
        Self {
            name: name.into(),
            request_id: None,
            deadline,
        }
    }

    pub fn with_request_id(mut self, request_id: Option<String>) -> Self {
        self.request_id = request_id;
        self
    }
}

/// Dials the remote service.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn dial(&self, target: &DialTarget) -> Result<Arc<dyn GreeterChannel>, ConnectError>;
}

/// An established channel capable of the unary greeter call.
#[async_trait]
pub trait GreeterChannel: Send + Sync {
    async fn say_hello(&self, call: HelloCall) -> Result<String, CallError>;
}

/// Normalize a configured address into an endpoint URI.
pub fn endpoint_uri(address: &str) -> Result<String, ConnectError> {
    let address = address.trim();
    if address.is_empty() {
        return Err(ConnectError::InvalidAddress {
            address: address.to_string(),
            reason: "address is empty".to_string(),
        });
    }

    if address.contains("://") {
        Ok(address.to_string())
    } else {
        Ok(format!("http://{}", address))
    }
}

/// gRPC transport over HTTP/2.
#[derive(Debug, Default, Clone, Copy)]
pub struct TonicTransport;

#[async_trait]
impl Transport for TonicTransport {
    async fn dial(&self, target: &DialTarget) -> Result<Arc<dyn GreeterChannel>, ConnectError> {
        let uri = endpoint_uri(&target.address)?;
        let endpoint = Endpoint::from_shared(uri).map_err(|e| ConnectError::InvalidAddress {
            address: target.address.clone(),
            reason: describe(&e),
        })?;

        let channel = endpoint
            .connect_timeout(target.connect_timeout)
            .tcp_keepalive(target.tcp_keepalive)
            .connect()
            .await
            .map_err(|e| ConnectError::Transport(describe(&e)))?;

        Ok(Arc::new(TonicGreeter {
            channel,
            compression: target.compression,
        }))
    }
}

struct TonicGreeter {
    channel: Channel,
    compression: Option<Codec>,
}

#[async_trait]
impl GreeterChannel for TonicGreeter {
    async fn say_hello(&self, call: HelloCall) -> Result<String, CallError> {
        let mut grpc = Grpc::new(self.channel.clone());
        if let Some(codec) = self.compression {
            grpc = grpc
                .send_compressed(codec.encoding())
                .accept_compressed(codec.encoding());
        }

        grpc.ready()
            .await
            .map_err(|e| CallError::transient(format!("service not ready: {}", describe(&e))))?;

        let mut request = Request::new(HelloRequest { name: call.name });
        request.set_timeout(call.deadline);
        if let Some(id) = call.request_id.as_deref() {
            let value = MetadataValue::try_from(id).map_err(|e| CallError::Fatal {
                code: Code::InvalidArgument,
                message: format!("request id is not valid metadata: {}", e),
            })?;
            request.metadata_mut().insert(REQUEST_ID_KEY, value);
        }

        let codec: ProstCodec<HelloRequest, HelloReply> = ProstCodec::default();
        let path = PathAndQuery::from_static(SAY_HELLO_PATH);
        let response = grpc.unary(request, path, codec).await?;

        Ok(response.into_inner().message)
    }
}

/// Render an error with its full source chain.
fn describe(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
