use crate::domain::provider::Provider;
use crate::domain::rules::{HealthUpdate, ProviderPriority};
use crate::ports::ProviderHealthStoreRef;
use anyhow::Result;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub const LATENCY_ALPHA: f64 = 0.1;
pub const SUCCESS_RATE_ALPHA: f64 = 0.01;

pub fn ema_latency(previous: Option<f64>, latency_ms: f64) -> f64 {
    match previous {
        Some(old) => LATENCY_ALPHA * latency_ms + (1.0 - LATENCY_ALPHA) * old,
        None => latency_ms,
    }
}

/// Success rate is a percentage in `[0, 100]`.
pub fn ema_success_rate(previous: Option<f64>, success: bool) -> f64 {
    let sample = if success { 100.0 } else { 0.0 };
    match previous {
        Some(old) => (1.0 - SUCCESS_RATE_ALPHA) * old + SUCCESS_RATE_ALPHA * sample,
        None => sample,
    }
}

pub fn next_health(
    current: Option<&ProviderPriority>,
    latency_ms: i64,
    success: bool,
    now: DateTime<Utc>,
) -> HealthUpdate {
    let prev_latency = current.and_then(|c| c.avg_latency_ms);
    let prev_rate = current.and_then(|c| c.success_rate);
    HealthUpdate {
        avg_latency_ms: ema_latency(prev_latency, latency_ms as f64),
        success_rate: ema_success_rate(prev_rate, success),
        last_success_at: if success { Some(now) } else { current.and_then(|c| c.last_success_at) },
        last_failure_at: if success { current.and_then(|c| c.last_failure_at) } else { Some(now) },
    }
}

/// Trailing health signal fed after every provider submission. The failover
/// path reads these rows; nothing checks providers synchronously.
#[derive(Clone)]
pub struct HealthFeedback {
    pub store: ProviderHealthStoreRef,
}

impl HealthFeedback {
    /// Read-modify-write without a lock. Concurrent sessions may lose an
    /// update; the value is an approximate signal.
    pub async fn record(&self, profile_id: Uuid, provider: Provider, latency_ms: i64, success: bool) -> Result<()> {
        let current = self.store.get_health(profile_id, provider).await?;
        let Some(current) = current else {
            return Ok(());
        };
        let update = next_health(Some(&current), latency_ms, success, Utc::now());
        self.store.save_health(profile_id, provider, &update).await?;
        tracing::debug!(
            %profile_id,
            %provider,
            avg_latency_ms = update.avg_latency_ms,
            success_rate = update.success_rate,
            "provider health updated"
        );
        Ok(())
    }
}
