//! Outbound port to the gateway's Block operation.

use crate::error::SinkError;
use async_trait::async_trait;

/// Where block decisions go.
///
/// The detector never writes the block store directly; the gateway is the
/// only writer.
#[async_trait]
pub trait BlockCommandSink: Send + Sync {
    async fn block(&self, source_address: &str) -> Result<(), SinkError>;
}
