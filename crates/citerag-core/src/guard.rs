//! Single-attempt, time-bounded calls into external services.

use std::future::Future;
use std::time::Duration;

use crate::error::{Error, Result};

/// Run `fut` once, failing with [`Error::Timeout`] after `limit` and mapping
/// any service error into [`Error::Upstream`]. No retries.
pub async fn bounded<T, F>(service: &str, limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = anyhow::Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(Error::upstream(service, format!("{e:#}"))),
        Err(_) => Err(Error::Timeout { service: service.to_string(), after: limit }),
    }
}
