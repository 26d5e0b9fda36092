//! Block command sink adapters.
//!
//! The in-process adapter lives in `node-runtime`, next to the gateway it
//! calls.

pub mod http;

pub use http::HttpGatewayClient;
