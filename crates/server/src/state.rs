//! Application state shared across handlers.

use std::sync::Arc;

use vibefront_engine::MemoryStore;
use vibefront_engine::assembler::PageAssembler;

use crate::config::ServerConfig;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the
/// store, the page assembler, and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    store: MemoryStore,
    assembler: Arc<PageAssembler<MemoryStore>>,
}

impl AppState {
    /// Create a new application state and start the cache invalidation
    /// listener on the store's change feed.
    #[must_use]
    pub fn new(config: ServerConfig, store: MemoryStore) -> Self {
        let assembler = Arc::new(PageAssembler::new(store.clone(), config.render_options()));
        assembler.spawn_invalidation_listener();

        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                assembler,
            }),
        }
    }

    /// Get a reference to the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Get a reference to the data store.
    #[must_use]
    pub fn store(&self) -> &MemoryStore {
        &self.inner.store
    }

    /// Get a reference to the page assembler.
    #[must_use]
    pub fn assembler(&self) -> &PageAssembler<MemoryStore> {
        &self.inner.assembler
    }
}
