use crate::domain::ports::OperationEntry;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

#[derive(Default)]
struct VisibilityState {
    /// session_id -> operations hidden for that session.
    hidden: HashMap<String, HashSet<String>>,
    /// confirmation operation name -> owning session.
    confirmation_owners: HashMap<String, String>,
}

/// Per-session filtered view over the host's operation catalog.
///
/// The list-change flow hides an operation for the initiating session while
/// its payment is pending and claims the one-off confirmation operation for
/// that session. [`VisibilityController::filter`] applies both: other
/// sessions never see a foreign confirmation operation, and a session's
/// hidden set never leaks. With no session context the catalog is returned
/// unfiltered.
#[derive(Default)]
pub struct VisibilityController {
    state: RwLock<VisibilityState>,
}

impl VisibilityController {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn hide(&self, session_id: &str, operation: &str) {
        self.state
            .write()
            .await
            .hidden
            .entry(session_id.to_string())
            .or_default()
            .insert(operation.to_string());
    }

    pub async fn unhide(&self, session_id: &str, operation: &str) {
        let mut state = self.state.write().await;
        if let Some(set) = state.hidden.get_mut(session_id) {
            set.remove(operation);
            if set.is_empty() {
                state.hidden.remove(session_id);
            }
        }
    }

    pub async fn is_hidden(&self, session_id: &str, operation: &str) -> bool {
        self.state
            .read()
            .await
            .hidden
            .get(session_id)
            .is_some_and(|set| set.contains(operation))
    }

    pub async fn claim_confirmation(&self, operation: &str, session_id: &str) {
        self.state
            .write()
            .await
            .confirmation_owners
            .insert(operation.to_string(), session_id.to_string());
    }

    pub async fn release_confirmation(&self, operation: &str) {
        self.state.write().await.confirmation_owners.remove(operation);
    }

    pub async fn confirmation_owner(&self, operation: &str) -> Option<String> {
        self.state
            .read()
            .await
            .confirmation_owners
            .get(operation)
            .cloned()
    }

    /// Filters the host's full catalog for one caller.
    pub async fn filter(
        &self,
        session_id: Option<&str>,
        catalog: Vec<OperationEntry>,
    ) -> Vec<OperationEntry> {
        let Some(session_id) = session_id else {
            return catalog;
        };
        let state = self.state.read().await;
        let hidden = state.hidden.get(session_id);
        catalog
            .into_iter()
            .filter(|entry| {
                if hidden.is_some_and(|set| set.contains(&entry.name)) {
                    return false;
                }
                match state.confirmation_owners.get(&entry.name) {
                    Some(owner) => owner == session_id,
                    None => true,
                }
            })
            .collect()
    }
}
