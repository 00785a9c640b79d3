//! Polling update engine
//!
//! The UpdateCoordinator is responsible for:
//! - Running a [`Poller`] on a fixed interval
//! - Keeping the last successful snapshot visible
//! - Notifying subscribers when a new snapshot arrives
//! - Emitting events for monitoring/logging
//!
//! ## Architecture
//!
//! ```text
//!   interval tick
//!        │
//!        ▼
//! ┌───────────────────┐  refresh()  ┌──────────┐
//! │ UpdateCoordinator │────────────►│  Poller  │
//! └───────────────────┘             └──────────┘
//!        │
//!        ├── Ok(data) ──► watch channel ──► sensor platform
//!        │
//!        └── Err(e)  ──► CoordinatorEvent::UpdateFailed (last data kept)
//! ```
//!
//! ## Failure handling
//!
//! A failed cycle never clears data. Subscribers keep seeing the last
//! successful snapshot until the next successful cycle.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, error, info, warn};

use crate::config::{EngineConfig, MIN_UPDATE_INTERVAL_SECS};
use crate::error::{Error, Result};
use crate::traits::Poller;

/// Events emitted by the UpdateCoordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorEvent {
    /// Engine loop started
    Started {
        poller: String,
        interval_secs: u64,
    },

    /// A refresh cycle produced new data
    UpdateSucceeded {
        poller: String,
    },

    /// A refresh cycle failed; previous data is kept
    UpdateFailed {
        poller: String,
        error: String,
    },

    /// Credentials were rejected; the entry needs re-authorization
    ReauthRequired {
        poller: String,
        error: String,
    },

    /// Engine loop stopped
    Stopped {
        reason: String,
    },
}

/// Drives a [`Poller`] on a fixed interval
///
/// ## Lifecycle
///
/// 1. Create with [`UpdateCoordinator::new()`]
/// 2. Call [`UpdateCoordinator::first_refresh()`] during setup
/// 3. Run with [`UpdateCoordinator::run()`] until shutdown
///
/// ## Threading
///
/// Cycles never overlap: the loop awaits each refresh before the next tick.
pub struct UpdateCoordinator<P: Poller> {
    poller: Arc<P>,

    /// Time between refresh cycles
    interval: Duration,

    /// Delay before the first scheduled tick
    startup_delay: Duration,

    /// Latest successful snapshot
    data_tx: watch::Sender<Option<P::Data>>,

    /// Whether the most recent cycle succeeded
    last_update_success: AtomicBool,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<CoordinatorEvent>,
}

impl<P: Poller> UpdateCoordinator<P> {
    /// Create a new update coordinator
    ///
    /// # Returns
    ///
    /// A tuple of (coordinator, event_receiver)
    ///
    /// # Errors
    ///
    /// `Error::Config` if `interval` is shorter than the minimum update
    /// interval.
    pub fn new(
        poller: Arc<P>,
        interval: Duration,
        config: &EngineConfig,
    ) -> Result<(Self, mpsc::Receiver<CoordinatorEvent>)> {
        if interval < Duration::from_secs(MIN_UPDATE_INTERVAL_SECS) {
            return Err(Error::config(format!(
                "Update interval must be at least {} seconds. Got: {:?}",
                MIN_UPDATE_INTERVAL_SECS, interval
            )));
        }

        let (event_tx, event_rx) = mpsc::channel(config.event_channel_capacity.max(1));
        let (data_tx, _) = watch::channel(None);

        let coordinator = Self {
            poller,
            interval,
            startup_delay: Duration::from_secs(config.startup_delay_secs),
            data_tx,
            last_update_success: AtomicBool::new(false),
            event_tx,
        };

        Ok((coordinator, event_rx))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn poller(&self) -> &Arc<P> {
        &self.poller
    }

    /// Latest successful snapshot, if any cycle succeeded yet
    pub fn data(&self) -> Option<P::Data> {
        self.data_tx.borrow().clone()
    }

    pub fn last_update_success(&self) -> bool {
        self.last_update_success.load(Ordering::SeqCst)
    }

    /// Subscribe to snapshot changes
    pub fn subscribe(&self) -> watch::Receiver<Option<P::Data>> {
        self.data_tx.subscribe()
    }

    /// Snapshot changes as a stream (yields the current value first)
    pub fn updates(&self) -> WatchStream<Option<P::Data>> {
        WatchStream::new(self.subscribe())
    }

    /// First refresh during setup
    ///
    /// # Errors
    ///
    /// - `Error::ReauthRequired`: passed through unchanged
    /// - `Error::NotReady`: any other failure; setup should be retried later
    pub async fn first_refresh(&self) -> Result<P::Data> {
        match self.refresh().await {
            Ok(data) => Ok(data),
            Err(e @ Error::ReauthRequired(_)) => Err(e),
            Err(e) => Err(Error::not_ready(format!(
                "First refresh of {} failed: {}",
                self.poller.name(),
                e
            ))),
        }
    }

    /// Run one refresh cycle
    ///
    /// On success the snapshot is published to subscribers. On failure the
    /// previous snapshot stays in place and the error is returned.
    pub async fn refresh(&self) -> Result<P::Data> {
        let name = self.poller.name().to_string();
        debug!("Refreshing {}", name);

        match self.poller.refresh().await {
            Ok(data) => {
                self.data_tx.send_replace(Some(data.clone()));
                self.last_update_success.store(true, Ordering::SeqCst);
                self.emit_event(CoordinatorEvent::UpdateSucceeded { poller: name });
                Ok(data)
            }
            Err(e) => {
                self.last_update_success.store(false, Ordering::SeqCst);
                match &e {
                    Error::ReauthRequired(_) => {
                        warn!("{} needs re-authentication: {}", name, e);
                        self.emit_event(CoordinatorEvent::ReauthRequired {
                            poller: name,
                            error: e.to_string(),
                        });
                    }
                    _ => {
                        error!("Error fetching {} data: {}", name, e);
                        self.emit_event(CoordinatorEvent::UpdateFailed {
                            poller: name,
                            error: e.to_string(),
                        });
                    }
                }
                Err(e)
            }
        }
    }

    /// Run the polling loop until SIGINT
    pub async fn run(&self) -> Result<()> {
        self.run_internal(None).await
    }

    /// Run the polling loop until the given shutdown signal fires
    ///
    /// Used by the daemon (which owns signal handling) and by tests.
    pub async fn run_with_shutdown(&self, shutdown_rx: oneshot::Receiver<()>) -> Result<()> {
        self.run_internal(Some(shutdown_rx)).await
    }

    async fn run_internal(&self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        self.emit_event(CoordinatorEvent::Started {
            poller: self.poller.name().to_string(),
            interval_secs: self.interval.as_secs(),
        });
        info!(
            "Polling {} every {}s",
            self.poller.name(),
            self.interval.as_secs()
        );

        let shutdown = async move {
            match shutdown_rx {
                Some(rx) => {
                    let _ = rx.await;
                }
                None => {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        error!("Failed to listen for shutdown signal: {}", e);
                    }
                }
            }
        };
        tokio::pin!(shutdown);

        let start = Instant::now() + self.startup_delay + self.interval;
        let mut ticker = tokio::time::interval_at(start, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // Failure is already logged and reported; keep polling
                    let _ = self.refresh().await;
                }

                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    self.emit_event(CoordinatorEvent::Stopped {
                        reason: "Shutdown signal".to_string(),
                    });
                    break;
                }
            }
        }

        Ok(())
    }

    fn emit_event(&self, event: CoordinatorEvent) {
        if self.event_tx.try_send(event).is_err() {
            warn!("Event channel full or closed, dropping event.");
        }
    }
}
