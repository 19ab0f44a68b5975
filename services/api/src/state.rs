//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds the tutor service
//! and the registry of open workspaces.

use crate::workspace::Workspaces;
use lingo_core::tutor::Tutor;
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub tutor: Arc<Tutor>,
    pub workspaces: Workspaces,
}

impl AppState {
    pub fn new(tutor: Tutor) -> Self {
        Self {
            tutor: Arc::new(tutor),
            workspaces: Workspaces::default(),
        }
    }

    pub fn with_workspaces(mut self, workspaces: Workspaces) -> Self {
        self.workspaces = workspaces;
        self
    }
}
