//! # Adapter Implementations
//!
//! Port implementations that only make sense once the components live in the
//! same process.
//!
//! | Port | Owner | Adapter |
//! |------|-------|---------|
//! | `BlockCommandSink` | dsa-03 | [`LocalGatewaySink`] -> dsa-04 `IngestionGateway::block` |

pub mod local_gateway;

pub use local_gateway::LocalGatewaySink;
