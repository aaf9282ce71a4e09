use std::env;
use std::future::Future;
use std::time::Duration;

use tokio::time::timeout;

use crate::error::EngineError;

/// Candidates fetched per lookup when nothing else is configured.
pub const DEFAULT_CANDIDATE_BATCH: u32 = 20;

/// Runtime knobs shared by the engine components.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Bound on every individual store or LLM call. `None` leaves calls unbounded.
    pub io_timeout: Option<Duration>,
    /// Maximum candidates fetched per question lookup.
    pub candidate_batch: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            io_timeout: None,
            candidate_batch: DEFAULT_CANDIDATE_BATCH,
        }
    }
}

impl EngineConfig {
    /// Defaults, overridden by `QUIZ_IO_TIMEOUT_MS` and `QUIZ_CANDIDATE_BATCH`.
    #[must_use]
    pub fn from_env() -> Self {
        let io_timeout = env::var("QUIZ_IO_TIMEOUT_MS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis);
        let candidate_batch = env::var("QUIZ_CANDIDATE_BATCH")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_CANDIDATE_BATCH);
        Self {
            io_timeout,
            candidate_batch,
        }
    }
}

/// Await `fut`, failing with `EngineError::Timeout` once `limit` elapses.
pub(crate) async fn bounded<F, T, E>(limit: Option<Duration>, fut: F) -> Result<T, EngineError>
where
    F: Future<Output = Result<T, E>>,
    EngineError: From<E>,
{
    match limit {
        Some(limit) => match timeout(limit, fut).await {
            Ok(result) => result.map_err(EngineError::from),
            Err(_) => Err(EngineError::Timeout),
        },
        None => fut.await.map_err(EngineError::from),
    }
}
