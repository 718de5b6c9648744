//! HTTP API
//!
//! Three routes: send a message into a conversation, read a conversation
//! back, and clear everything the caller owns. Identity comes from the
//! `x-user-id` header; every operation is scoped to it.

mod handlers;
mod types;

pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::runtime::ConversationEngine;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ConversationEngine>,
}

impl AppState {
    pub fn new(engine: ConversationEngine) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }
}
