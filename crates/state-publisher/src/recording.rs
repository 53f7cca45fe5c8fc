use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tracing::info;

use crate::{PublishError, StateSink, StateUpdate};

/// In-memory sink that keeps every update it receives.
///
/// Used for dry runs and tests. When failing, updates are rejected and not recorded.
#[derive(Debug, Default)]
pub struct RecordingSink {
    updates: Mutex<Vec<StateUpdate>>,
    failing: Mutex<bool>,
    limit: Option<usize>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps only the most recent `limit` updates.
    pub fn bounded(limit: usize) -> Self {
        Self {
            limit: Some(limit.max(1)),
            ..Self::default()
        }
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap_or_else(PoisonError::into_inner) = failing;
    }

    pub fn updates(&self) -> Vec<StateUpdate> {
        self.updates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Most recent update for the entity, if any.
    pub fn latest(&self, entity_id: &str) -> Option<StateUpdate> {
        self.updates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .rev()
            .find(|update| update.entity_id == entity_id)
            .cloned()
    }
}

#[async_trait]
impl StateSink for RecordingSink {
    async fn set_state(&self, update: &StateUpdate) -> Result<(), PublishError> {
        if *self.failing.lock().unwrap_or_else(PoisonError::into_inner) {
            return Err(PublishError::Unavailable(format!(
                "rejected update for {}",
                update.entity_id
            )));
        }

        info!(entity_id = %update.entity_id, state = %update.state, "recorded state");
        let mut updates = self.updates.lock().unwrap_or_else(PoisonError::into_inner);
        updates.push(update.clone());
        if let Some(limit) = self.limit {
            let excess = updates.len().saturating_sub(limit);
            updates.drain(..excess);
        }
        Ok(())
    }
}
