// Sensor state publishers shipped with the daemon.
//
// - `log`: one structured tracing event per sensor update
// - `json`: one JSON document per line on stdout, for piping into other tools

use async_trait::async_trait;
use postnl_core::sensor::SensorState;
use postnl_core::traits::StatePublisher;
use postnl_core::{Error, Result};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::info;

/// Publishes sensor state as tracing events
#[derive(Debug, Default)]
pub struct LogPublisher;

#[async_trait]
impl StatePublisher for LogPublisher {
    async fn publish(&self, state: &SensorState) -> Result<()> {
        info!(
            unique_id = %state.unique_id,
            state = state.state,
            enroute = state.attributes.enroute.len(),
            delivered = state.attributes.delivered.len(),
            "{}: {} {}",
            state.name,
            state.state,
            state.unit_of_measurement
        );
        Ok(())
    }
}

/// Publishes sensor state as JSON lines
pub struct JsonLinesPublisher<W> {
    writer: Mutex<W>,
}

impl JsonLinesPublisher<tokio::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

impl<W> JsonLinesPublisher<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> StatePublisher for JsonLinesPublisher<W> {
    async fn publish(&self, state: &SensorState) -> Result<()> {
        let mut line = serde_json::to_vec(state)?;
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer.write_all(&line).await.map_err(Error::from)?;
        writer.flush().await.map_err(Error::from)?;
        Ok(())
    }
}
