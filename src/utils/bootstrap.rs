//! Bootstrap utilities.

use std::future::Future;
use std::time::Duration;

use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LOG_ENV_VAR;

/// Initialize tracing with the EVSTORE_LOG environment variable.
///
/// Defaults to "info" level if EVSTORE_LOG is not set.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env(LOG_ENV_VAR)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Connect with exponential backoff retry.
///
/// # Arguments
/// * `target` - Human-readable name for logging
/// * `address` - Where the connection goes, already safe to log
/// * `attempts` - Total attempts, at least one
/// * `connect` - Async function that attempts to establish a connection
pub async fn connect_with_retry<T, E, F, Fut>(
    target: &str,
    address: &str,
    attempts: u32,
    connect: F,
) -> Result<T, E>
where
    E: std::fmt::Display,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    const INITIAL_DELAY: Duration = Duration::from_millis(100);
    const MAX_DELAY: Duration = Duration::from_secs(5);

    let attempts = attempts.max(1);
    let mut delay = INITIAL_DELAY;
    let mut attempt = 0;

    loop {
        attempt += 1;
        match connect().await {
            Ok(client) => {
                tracing::info!("Connected to {} at {}", target, address);
                return Ok(client);
            }
            Err(e) if attempt < attempts => {
                warn!(
                    "Failed to connect to {} (attempt {}/{}): {}. Retrying in {:?}...",
                    target, attempt, attempts, e, delay
                );
                tokio::time::sleep(delay).await;
                delay = std::cmp::min(delay * 2, MAX_DELAY);
            }
            Err(e) => {
                tracing::error!(
                    "Failed to connect to {} after {} attempts: {}",
                    target,
                    attempts,
                    e
                );
                return Err(e);
            }
        }
    }
}
