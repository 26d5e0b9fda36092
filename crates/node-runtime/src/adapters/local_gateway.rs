//! In-process Block command sink.

use async_trait::async_trait;
use dsa_03_detector::{BlockCommandSink, SinkError};
use dsa_04_ingestion_gateway::IngestionGateway;
use shared_types::{Classify, ErrorClass};
use std::sync::Arc;

/// Calls the gateway's Block operation directly, without a network hop.
///
/// The gateway stays the only writer of block flags either way.
pub struct LocalGatewaySink {
    gateway: Arc<IngestionGateway>,
}

impl LocalGatewaySink {
    pub fn new(gateway: Arc<IngestionGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl BlockCommandSink for LocalGatewaySink {
    async fn block(&self, source_address: &str) -> Result<(), SinkError> {
        self.gateway.block(source_address).await.map_err(|e| match e.class() {
            ErrorClass::MalformedInput => SinkError::Rejected(e.to_string()),
            _ => SinkError::Unavailable(e.to_string()),
        })
    }
}
