use super::SyncQueueStatus;
use chrono::{DateTime, Duration, Utc};

/// 失敗時の指数バックオフと最大試行回数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 0 は上限なし
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            base_delay_ms,
            max_delay_ms: max_delay_ms.max(base_delay_ms),
        }
    }

    pub fn unlimited(base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self::new(0, base_delay_ms, max_delay_ms)
    }

    pub fn backoff_ms(&self, attempts: u32) -> u64 {
        let exponent = attempts.saturating_sub(1).min(32);
        self.base_delay_ms
            .saturating_mul(1u64 << exponent)
            .min(self.max_delay_ms)
    }

    /// 直前の状態とエラーから次の状態を決める
    pub fn on_failure(
        &self,
        previous: &SyncQueueStatus,
        error: &str,
        now: DateTime<Utc>,
    ) -> SyncQueueStatus {
        let attempts = previous.attempts() + 1;
        if self.max_attempts > 0 && attempts >= self.max_attempts {
            return SyncQueueStatus::DeadLetter {
                attempts,
                last_error: error.to_string(),
            };
        }
        let delay = Duration::milliseconds(self.backoff_ms(attempts).min(i64::MAX as u64) as i64);
        SyncQueueStatus::Failed {
            attempts,
            last_error: error.to_string(),
            retry_at: now + delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, 1_000, 300_000)
    }
}
