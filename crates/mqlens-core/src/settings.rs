// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runtime knobs handed to every adapter at construction.

use std::future::Future;
use std::time::Duration;

use crate::error::MqError;

/// Timeouts and batch sizes shared by all adapters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterSettings {
    /// Upper bound for establishing a broker session.
    pub connect_timeout: Duration,
    /// Upper bound for any single broker request.
    pub operation_timeout: Duration,
    /// Get-with-wait interval used when polling for the next message.
    pub receive_wait: Duration,
    /// Messages moved per round trip during drain, replay and leasing.
    pub batch_size: usize,
    /// Prefix for the temporary queues used by drain-and-replay.
    pub holding_queue_prefix: String,
    /// How long leased messages stay invisible to other consumers.
    pub lease_duration: Duration,
}

impl Default for AdapterSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            operation_timeout: Duration::from_secs(10),
            receive_wait: Duration::from_secs(1),
            batch_size: 50,
            holding_queue_prefix: "mqlens.holding".to_string(),
            lease_duration: Duration::from_secs(30),
        }
    }
}

impl AdapterSettings {
    /// A unique holding queue name for one drain-and-replay invocation.
    pub fn holding_queue_name(&self) -> String {
        format!(
            "{}.{}",
            self.holding_queue_prefix,
            uuid::Uuid::new_v4().simple()
        )
    }

    /// True when `name` belongs to a holding queue; listings hide these.
    pub fn is_holding_queue(&self, name: &str) -> bool {
        name.starts_with(&format!("{}.", self.holding_queue_prefix))
    }
}

/// Runs `fut` under `duration`, surfacing an elapsed wait as
/// [`MqError::Timeout`].
pub async fn bounded<T, F>(duration: Duration, fut: F) -> Result<T, MqError>
where
    F: Future<Output = Result<T, MqError>>,
{
    match tokio::time::timeout(duration, fut).await {
        Ok(result) => result,
        Err(_) => Err(MqError::Timeout { duration }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn holding_names_are_unique_and_recognized() {
        let settings = AdapterSettings::default();
        let a = settings.holding_queue_name();
        let b = settings.holding_queue_name();
        assert_ne!(a, b);
        assert!(a.starts_with("mqlens.holding."));
        assert!(settings.is_holding_queue(&a));
        assert!(!settings.is_holding_queue("orders"));
    }

    #[tokio::test(start_paused = true)]
    async fn bounded_reports_timeout() {
        let result: Result<(), MqError> = bounded(Duration::from_millis(50), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(MqError::Timeout { .. })));
    }

    #[tokio::test]
    async fn bounded_passes_through_result() {
        let value = bounded(Duration::from_secs(1), async { Ok::<_, MqError>(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }
}
