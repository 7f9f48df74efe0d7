//! Wire messages for the greeter service.
//!
//! Hand-maintained equivalents of the `helloworld.Greeter` protobuf
//! definitions; only the unary call is consumed.

/// Fully-qualified path of the unary call.
pub const SAY_HELLO_PATH: &str = "/helloworld.Greeter/SayHello";

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HelloRequest {
    #[prost(string, tag = "1")]
    pub name: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HelloReply {
    #[prost(string, tag = "1")]
    pub message: String,
}
