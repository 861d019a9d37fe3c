//! Registry of identifiers whose conversion is currently running.
//!
//! Claiming an identifier is a single check-and-insert under one lock, so two
//! callers can never both become the converting owner. Each entry carries a
//! watch channel on which the owner publishes the outcome; the entry is
//! removed when the owner's guard is dropped, whatever the exit path.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::models::ImageRecord;
use crate::resolver::ResolverError;

pub type Outcome = Result<ImageRecord, ResolverError>;

#[derive(Default)]
pub struct InFlight {
    entries: Mutex<HashMap<String, watch::Receiver<Option<Outcome>>>>,
}

pub enum Claim {
    /// The caller now owns the conversion and must run it.
    Owner(InFlightGuard),
    /// Somebody else is converting; wait on this for their outcome.
    Waiter(watch::Receiver<Option<Outcome>>),
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn claim(self: &Arc<Self>, id: &str) -> Claim {
        let mut entries = self.entries.lock();

        if let Some(receiver) = entries.get(id) {
            return Claim::Waiter(receiver.clone());
        }

        let (sender, receiver) = watch::channel(None);
        entries.insert(id.to_string(), receiver);

        Claim::Owner(InFlightGuard {
            registry: Arc::clone(self),
            id: id.to_string(),
            sender,
        })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

pub struct InFlightGuard {
    registry: Arc<InFlight>,
    id: String,
    sender: watch::Sender<Option<Outcome>>,
}

impl InFlightGuard {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Hands the outcome to every waiter, then releases the identifier.
    pub fn complete(self, outcome: Outcome) {
        self.sender.send_replace(Some(outcome));
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.registry.entries.lock().remove(&self.id);
    }
}
