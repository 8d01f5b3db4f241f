//! Connection status snapshot for UI-style consumers.
//!
//! This module folds [`LifecycleEvent`]s into the small piece of state a
//! front end needs to decide whether command controls should be enabled.

use crate::lifecycle::{ConnectionFault, LifecycleEvent};

use serde::Serialize;

/// Latest known connection state.
///
/// Starts out loading. An error keeps the client in the loading state until a
/// later `Connected` clears both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    loading: bool,
    error: Option<ConnectionFault>,
    error_str: Option<String>,
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self {
            loading: true,
            error: None,
            error_str: None,
        }
    }
}

impl ConnectionStatus {
    /// Fold one event into the snapshot.
    pub fn apply(&mut self, event: &LifecycleEvent) {
        match event {
            LifecycleEvent::Loading => {
                self.loading = true;
            }
            LifecycleEvent::Error(fault) => {
                self.error_str = Some(fault.to_string());
                self.error = Some(fault.clone());
                self.loading = true;
            }
            LifecycleEvent::Connected => {
                self.error = None;
                self.error_str = None;
                self.loading = false;
            }
            LifecycleEvent::ServerTime(_) => {}
        }
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&ConnectionFault> {
        self.error.as_ref()
    }

    /// `"{error_code}: {error}"` of the last fault, cleared on connect.
    pub fn error_str(&self) -> Option<&str> {
        self.error_str.as_deref()
    }

    /// Whether commands should be disabled in a UI: still loading or in error.
    pub fn is_disabled(&self) -> bool {
        self.loading || self.error.is_some()
    }
}
