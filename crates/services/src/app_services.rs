use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::config::EngineConfig;
use crate::error::AppServicesError;
use crate::llm::LlmProvider;
use crate::sessions::SessionEngine;
use crate::submission::TestSubmissionService;

/// Wires the session engine and the submission flow onto one store and one
/// LLM provider.
#[derive(Clone)]
pub struct AdaptiveServices {
    storage: Storage,
    engine: Arc<SessionEngine>,
    submissions: Arc<TestSubmissionService>,
}

impl AdaptiveServices {
    /// Build services backed by `SQLite` storage, running migrations first.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the database cannot be opened or migrated.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        llm: Arc<dyn LlmProvider>,
        config: EngineConfig,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(storage, clock, llm, config))
    }

    /// Build services on top of the in-memory store.
    #[must_use]
    pub fn in_memory(clock: Clock, llm: Arc<dyn LlmProvider>, config: EngineConfig) -> Self {
        Self::from_storage(Storage::in_memory(), clock, llm, config)
    }

    #[must_use]
    pub fn from_storage(
        storage: Storage,
        clock: Clock,
        llm: Arc<dyn LlmProvider>,
        config: EngineConfig,
    ) -> Self {
        let engine = Arc::new(SessionEngine::new(
            &storage,
            Arc::clone(&llm),
            clock,
            config,
        ));
        let submissions = Arc::new(TestSubmissionService::new(&storage, llm, clock, config));
        Self {
            storage,
            engine,
            submissions,
        }
    }

    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    #[must_use]
    pub fn engine(&self) -> Arc<SessionEngine> {
        Arc::clone(&self.engine)
    }

    #[must_use]
    pub fn submissions(&self) -> Arc<TestSubmissionService> {
        Arc::clone(&self.submissions)
    }
}
