use crate::error::{OrderflowError, Result};

/// Runtime configuration for the order execution pipeline.
///
/// Defaults mirror production settings; every field can be overridden from
/// the environment via `from_env`.
#[derive(Debug, Clone)]
pub struct OrderflowConfig {
    pub database_url: String,
    /// Number of concurrent workers pulling from the queue
    pub worker_concurrency: usize,
    /// Attempt ceiling per order before it is failed terminally
    pub max_retry_attempts: i32,
    /// Base delay for exponential backoff
    pub backoff_base_ms: u64,
    /// Backoff cap before jitter
    pub backoff_max_ms: u64,
    /// Idle worker poll interval
    pub poll_interval_ms: u64,
    /// Completed-job retention: keep at most this many
    pub completed_retention_count: i64,
    /// Completed-job retention: keep at most this long
    pub completed_retention_secs: i64,
    /// Failed-job retention: keep at most this many
    pub failed_retention_count: i64,
    /// Failed-job retention: keep at most this long (longer than completed)
    pub failed_retention_secs: i64,
    /// Cache entry time-to-live
    pub cache_ttl_secs: u64,
    /// Bound on the per-order status-update history list
    pub update_history_limit: usize,
}

impl Default for OrderflowConfig {
    fn default() -> Self {
        Self {
            database_url: "postgresql://localhost/orderflow_development".to_string(),
            worker_concurrency: 5,
            max_retry_attempts: 3,
            backoff_base_ms: 1000,
            backoff_max_ms: 30_000,
            poll_interval_ms: 250,
            completed_retention_count: 100,
            completed_retention_secs: 3600,
            failed_retention_count: 50,
            failed_retention_secs: 7200,
            cache_ttl_secs: 300,
            update_history_limit: 50,
        }
    }
}

impl OrderflowConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(db_url) = std::env::var("DATABASE_URL") {
            config.database_url = db_url;
        }

        if let Ok(concurrency) = std::env::var("ORDERFLOW_WORKER_CONCURRENCY") {
            config.worker_concurrency = parse_var("ORDERFLOW_WORKER_CONCURRENCY", &concurrency)?;
        }

        if let Ok(attempts) = std::env::var("ORDERFLOW_MAX_RETRY_ATTEMPTS") {
            config.max_retry_attempts = parse_var("ORDERFLOW_MAX_RETRY_ATTEMPTS", &attempts)?;
        }

        if let Ok(base) = std::env::var("ORDERFLOW_BACKOFF_BASE_MS") {
            config.backoff_base_ms = parse_var("ORDERFLOW_BACKOFF_BASE_MS", &base)?;
        }

        if let Ok(max) = std::env::var("ORDERFLOW_BACKOFF_MAX_MS") {
            config.backoff_max_ms = parse_var("ORDERFLOW_BACKOFF_MAX_MS", &max)?;
        }

        if let Ok(ttl) = std::env::var("ORDERFLOW_CACHE_TTL_SECS") {
            config.cache_ttl_secs = parse_var("ORDERFLOW_CACHE_TTL_SECS", &ttl)?;
        }

        Ok(config)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e| OrderflowError::configuration(format!("Invalid {name}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OrderflowConfig::default();
        assert_eq!(config.max_retry_attempts, 3);
        assert_eq!(config.backoff_base_ms, 1000);
        assert_eq!(config.backoff_max_ms, 30_000);
        // Failed jobs are retained longer than completed ones
        assert!(config.failed_retention_secs > config.completed_retention_secs);
    }

    #[test]
    fn test_parse_var_rejects_garbage() {
        let result: Result<usize> = parse_var("ORDERFLOW_WORKER_CONCURRENCY", "not-a-number");
        assert!(matches!(
            result,
            Err(OrderflowError::Configuration { .. })
        ));
    }
}
