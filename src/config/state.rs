// Application state module
// Process-wide read-only state built once before serving begins

use super::types::Config;
use crate::render::Templates;
use crate::store::PageStore;

/// Application state
///
/// Shared between connection tasks behind an `Arc`; nothing in here is
/// mutated after startup. The page files are the only state that changes.
pub struct AppState {
    pub config: Config,
    pub templates: Templates,
    pub store: PageStore,
}

impl AppState {
    pub const fn new(config: Config, templates: Templates, store: PageStore) -> Self {
        Self {
            config,
            templates,
            store,
        }
    }

    /// Whether access logging is enabled
    pub const fn access_log(&self) -> bool {
        self.config.logging.access_log
    }
}
