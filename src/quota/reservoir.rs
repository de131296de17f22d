//! Serialized daily quota reservations.
//!
//! Every operation is sent to a single worker task that owns the store handle.
//! The worker processes one message at a time, in arrival order, so the
//! read-check-increment-persist sequence of a reservation never interleaves
//! with another operation.

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::clock::{CalendarDay, Clock, LocalClock};
use super::config::{validate_resources, ConfigError, QuotaConfig, ResourceSpec};
use super::record::UsageRecord;
use super::store::{KeyValueStore, StoreError};
use super::summary::UsageSummary;

/// Store key holding the serialized usage record.
pub const USAGE_KEY: &str = "quota_usage";

const COMMAND_BUFFER: usize = 64;

/// Errors returned by the quota reservoir.
#[derive(Error, Debug)]
pub enum QuotaError {
    /// The resource list is unusable.
    #[error("Invalid quota configuration: {0}")]
    Configuration(#[from] ConfigError),

    /// The usage record could not be read from the store.
    #[error("Failed to read usage record: {0}")]
    Load(#[source] StoreError),

    /// The updated usage record could not be saved; nothing was granted.
    #[error("Failed to persist usage record: {0}")]
    Persistence(#[source] StoreError),

    /// The stored usage record is not valid JSON.
    #[error("Corrupt usage record: {0}")]
    Corrupt(#[from] serde_json::Error),

    /// The reservoir worker has shut down.
    #[error("Quota reservoir is closed")]
    Closed,
}

/// Result type for quota operations.
pub type QuotaResult<T> = Result<T, QuotaError>;

/// A single granted unit of a resource's daily capacity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Grant {
    /// Resource the unit was taken from
    pub resource: String,
    /// Day the unit counts against
    pub day: CalendarDay,
    /// Count for the day including this grant
    pub used: u32,
    /// Daily capacity of the resource
    pub capacity: u32,
}

impl Grant {
    /// Units left on this resource for the day.
    pub fn remaining(&self) -> u32 {
        self.capacity.saturating_sub(self.used)
    }
}

/// Outcome of a reservation attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Reservation {
    /// A unit was reserved and persisted.
    Granted(Grant),
    /// Every resource is at capacity for the day.
    Exhausted { day: CalendarDay },
}

impl Reservation {
    /// Check if a unit was granted.
    pub fn is_granted(&self) -> bool {
        matches!(self, Reservation::Granted(_))
    }

    /// Name of the granted resource, if any.
    pub fn resource(&self) -> Option<&str> {
        match self {
            Reservation::Granted(grant) => Some(&grant.resource),
            Reservation::Exhausted { .. } => None,
        }
    }

    /// The grant, if any.
    pub fn grant(&self) -> Option<&Grant> {
        match self {
            Reservation::Granted(grant) => Some(grant),
            Reservation::Exhausted { .. } => None,
        }
    }
}

/// Result of [`QuotaReservoir::run_reserved`].
#[derive(Debug)]
pub enum Dispatch<T> {
    /// The work ran against the granted resource.
    Completed { grant: Grant, output: T },
    /// Nothing was reserved and the work did not run.
    Exhausted { day: CalendarDay },
}

enum Command {
    Reserve {
        reply: oneshot::Sender<QuotaResult<Reservation>>,
    },
    Usage {
        reply: oneshot::Sender<QuotaResult<UsageRecord>>,
    },
    Summary {
        reply: oneshot::Sender<QuotaResult<UsageSummary>>,
    },
    Prune {
        retention_days: u64,
        reply: oneshot::Sender<QuotaResult<usize>>,
    },
}

/// Handle to a quota reservoir.
///
/// Cloning the handle is cheap; all clones talk to the same worker. The
/// worker stops once every handle is dropped.
#[derive(Debug, Clone)]
pub struct QuotaReservoir {
    resources: Arc<[ResourceSpec]>,
    sender: mpsc::Sender<Command>,
}

impl QuotaReservoir {
    /// Create a reservoir over `resources` (in priority order) using the local
    /// date for day bucketing.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(resources: Vec<ResourceSpec>, store: Arc<dyn KeyValueStore>) -> QuotaResult<Self> {
        Self::with_clock(resources, store, Arc::new(LocalClock))
    }

    /// Create a reservoir with an explicit clock.
    pub fn with_clock(
        resources: Vec<ResourceSpec>,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
    ) -> QuotaResult<Self> {
        validate_resources(&resources)?;
        let resources: Arc<[ResourceSpec]> = resources.into();

        let (sender, receiver) = mpsc::channel(COMMAND_BUFFER);
        let worker = ReservoirWorker {
            resources: Arc::clone(&resources),
            store,
            clock,
        };
        tokio::spawn(worker.run(receiver));

        Ok(Self { resources, sender })
    }

    /// Create a reservoir from loaded configuration.
    pub fn from_config(config: &QuotaConfig, store: Arc<dyn KeyValueStore>) -> QuotaResult<Self> {
        Self::new(config.resources.clone(), store)
    }

    /// Configured resources in priority order.
    pub fn resources(&self) -> &[ResourceSpec] {
        &self.resources
    }

    /// Reserve one unit from the first resource with capacity left today.
    ///
    /// Returns `Reservation::Exhausted` when every resource is at capacity.
    /// A `Granted` result means the new count has already been persisted.
    pub async fn reserve(&self) -> QuotaResult<Reservation> {
        self.request(|reply| Command::Reserve { reply }).await
    }

    /// Snapshot of every recorded count.
    pub async fn current_usage(&self) -> QuotaResult<UsageRecord> {
        self.request(|reply| Command::Usage { reply }).await
    }

    /// Today's usage per resource.
    pub async fn summary(&self) -> QuotaResult<UsageSummary> {
        self.request(|reply| Command::Summary { reply }).await
    }

    /// Remove usage older than `retention_days` days; returns days removed.
    ///
    /// A retention of zero keeps all history. Today's counts are never removed.
    pub async fn prune(&self, retention_days: u64) -> QuotaResult<usize> {
        self.request(|reply| Command::Prune {
            retention_days,
            reply,
        })
        .await
    }

    /// Reserve a unit and, only if granted, run `work` against it.
    pub async fn run_reserved<F, Fut, T>(&self, work: F) -> QuotaResult<Dispatch<T>>
    where
        F: FnOnce(Grant) -> Fut,
        Fut: Future<Output = T>,
    {
        match self.reserve().await? {
            Reservation::Granted(grant) => {
                let output = work(grant.clone()).await;
                Ok(Dispatch::Completed { grant, output })
            }
            Reservation::Exhausted { day } => Ok(Dispatch::Exhausted { day }),
        }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<QuotaResult<T>>) -> Command,
    ) -> QuotaResult<T> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(build(reply))
            .await
            .map_err(|_| QuotaError::Closed)?;
        response.await.map_err(|_| QuotaError::Closed)?
    }
}

struct ReservoirWorker {
    resources: Arc<[ResourceSpec]>,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
}

impl ReservoirWorker {
    async fn run(self, mut receiver: mpsc::Receiver<Command>) {
        // Replies are dropped silently when the caller has gone away; the
        // operation itself has already run to completion.
        while let Some(command) = receiver.recv().await {
            match command {
                Command::Reserve { reply } => {
                    let _ = reply.send(self.reserve().await);
                }
                Command::Usage { reply } => {
                    let _ = reply.send(self.load().await);
                }
                Command::Summary { reply } => {
                    let _ = reply.send(self.summary().await);
                }
                Command::Prune {
                    retention_days,
                    reply,
                } => {
                    let _ = reply.send(self.prune(retention_days).await);
                }
            }
        }
        debug!("quota reservoir worker stopped");
    }

    async fn reserve(&self) -> QuotaResult<Reservation> {
        let day = self.clock.today();
        let mut record = self.load().await?;

        let Some(resource) = self
            .resources
            .iter()
            .find(|r| record.count(&r.name, day) < r.daily_capacity)
        else {
            info!(%day, "all quota resources exhausted");
            return Ok(Reservation::Exhausted { day });
        };

        let used = record.increment(&resource.name, day);
        self.save(&record).await?;

        debug!(
            resource = %resource.name,
            %day,
            used,
            capacity = resource.daily_capacity,
            "quota reserved"
        );
        Ok(Reservation::Granted(Grant {
            resource: resource.name.clone(),
            day,
            used,
            capacity: resource.daily_capacity,
        }))
    }

    async fn summary(&self) -> QuotaResult<UsageSummary> {
        let record = self.load().await?;
        Ok(UsageSummary::from_record(
            &self.resources,
            &record,
            self.clock.today(),
        ))
    }

    async fn prune(&self, retention_days: u64) -> QuotaResult<usize> {
        let mut record = self.load().await?;
        let removed = record.prune(self.clock.today(), retention_days);
        if removed > 0 {
            self.save(&record).await?;
            info!(removed, retention_days, "pruned quota usage history");
        }
        Ok(removed)
    }

    async fn load(&self) -> QuotaResult<UsageRecord> {
        match self.store.get(USAGE_KEY).await.map_err(QuotaError::Load)? {
            Some(content) => Ok(serde_json::from_str(&content)?),
            None => Ok(UsageRecord::new()),
        }
    }

    async fn save(&self, record: &UsageRecord) -> QuotaResult<()> {
        let json = serde_json::to_string(record)?;
        self.store.set(USAGE_KEY, &json).await.map_err(|err| {
            warn!(error = %err, "failed to persist quota usage");
            QuotaError::Persistence(err)
        })
    }
}
