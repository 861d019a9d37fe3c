use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::watch;
use tokio::time;
use url::Url;

use crate::cache::RemoteImageCache;
use crate::migrator::Migrator;
use crate::models::ImageRecord;
use crate::resolver::inflight::{Claim, InFlight, InFlightGuard, Outcome};
use crate::resolver::ResolverError;

enum Wait {
    Finished(Outcome),
    // The owner went away without publishing anything
    Abandoned,
}

/// Runs remote conversions so that each identifier is converted by at most
/// one task at a time, with concurrent requesters sharing that outcome.
pub struct ConversionCoordinator {
    migrator: Arc<dyn Migrator>,
    remote: Arc<RemoteImageCache>,
    in_flight: Arc<InFlight>,
    max_wait: Duration,
}

impl ConversionCoordinator {
    pub fn new(migrator: Arc<dyn Migrator>, remote: Arc<RemoteImageCache>, max_wait: Duration) -> Self {
        Self {
            migrator,
            remote,
            in_flight: Arc::new(InFlight::new()),
            max_wait,
        }
    }

    pub fn in_flight(&self) -> &InFlight {
        &self.in_flight
    }

    pub fn remote_cache(&self) -> &RemoteImageCache {
        &self.remote
    }

    pub async fn resolve_remote(&self, id: &str, source: &Url) -> Result<ImageRecord, ResolverError> {
        // One budget per caller, however many owners come and go
        let deadline = time::Instant::now() + self.max_wait;

        loop {
            if let Some(record) = self.remote.get(id) {
                return Ok(record);
            }

            match self.in_flight.claim(id) {
                Claim::Owner(guard) => return self.convert(guard, source).await,
                Claim::Waiter(receiver) => {
                    debug!("{} is already being converted, waiting", id);

                    match self.wait(id, receiver, deadline).await? {
                        Wait::Finished(outcome) => return outcome,
                        Wait::Abandoned => {
                            warn!("Conversion of {} was abandoned, trying again", id);
                        }
                    }
                }
            }
        }
    }

    async fn wait(
        &self,
        id: &str,
        mut receiver: watch::Receiver<Option<Outcome>>,
        deadline: time::Instant,
    ) -> Result<Wait, ResolverError> {
        let waited = time::timeout_at(deadline, receiver.wait_for(Option::is_some)).await;

        match waited {
            Ok(Ok(published)) => {
                let outcome = (*published).clone();
                Ok(outcome.map_or(Wait::Abandoned, Wait::Finished))
            }
            Ok(Err(_)) => Ok(Wait::Abandoned),
            Err(_) => {
                warn!("Timed out after {}s waiting for {}", self.max_wait.as_secs(), id);
                Err(ResolverError::Timeout {
                    id: id.to_string(),
                    waited: self.max_wait,
                })
            }
        }
    }

    async fn convert(&self, guard: InFlightGuard, source: &Url) -> Result<ImageRecord, ResolverError> {
        let id = guard.id().to_string();

        // Another owner may have finished between our cache check and the claim
        if let Some(record) = self.remote.get(&id) {
            guard.complete(Ok(record.clone()));
            return Ok(record);
        }

        let migrator = Arc::clone(&self.migrator);
        let remote = Arc::clone(&self.remote);
        let source = source.clone();

        // Detached so a requester that goes away does not cancel the conversion
        let task = tokio::spawn(async move {
            let outcome = run_migrator(migrator.as_ref(), &remote, guard.id(), &source).await;
            guard.complete(outcome.clone());
            outcome
        });

        match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Conversion task for {} failed: {}", id, e);
                Err(ResolverError::conversion(&id, "conversion task aborted"))
            }
        }
    }
}

async fn run_migrator(migrator: &dyn Migrator, remote: &RemoteImageCache, id: &str, source: &Url) -> Outcome {
    info!("Converting {} from {}", id, source);

    let path = migrator.convert(id, source).await.map_err(|e| {
        error!("Unable to access {} ({})", id, e);
        ResolverError::conversion(id, e)
    })?;

    let size = tokio::fs::metadata(&path).await.map(|meta| meta.len()).unwrap_or(0);
    if size == 0 {
        warn!("Conversion of {} produced an empty file at {}", id, path.display());
        let _ = tokio::fs::remove_file(&path).await;
        return Err(ResolverError::conversion(id, format!("An error occurred processing file: {}", source)));
    }

    let record = ImageRecord::remote(id, path, source.as_str());

    // Cached before the in-flight entry goes away so status never reads NOT_FOUND in between
    remote.store(record.clone());
    info!("Cached {} ({} bytes)", id, size);

    Ok(record)
}
