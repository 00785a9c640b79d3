// # Poller and Publisher Traits
//
// The two capabilities the update engine is polymorphic over:
//
// - [`Poller`]: produce a fresh data snapshot (`refresh`)
// - [`StatePublisher`]: receive entity state whenever it changes
//
// The engine owns scheduling; pollers own nothing but one refresh.

use async_trait::async_trait;

use crate::sensor::SensorState;

/// Periodic-refresh capability
///
/// # Contract
///
/// - One call = one complete cycle. Either the whole snapshot is returned
///   or the cycle fails; partial results are never returned.
/// - No sleeping, retrying or spawning of long-lived tasks. Interval and
///   failure handling belong to [`crate::engine::UpdateCoordinator`].
#[async_trait]
pub trait Poller: Send + Sync {
    /// The snapshot type produced by one cycle
    type Data: Clone + Send + Sync + 'static;

    /// Run one refresh cycle
    async fn refresh(&self) -> Result<Self::Data, crate::Error>;

    /// Name used in logs
    fn name(&self) -> &str;
}

/// Publish-state capability
#[async_trait]
pub trait StatePublisher: Send + Sync {
    /// Publish one sensor's current state
    async fn publish(&self, state: &SensorState) -> Result<(), crate::Error>;
}
