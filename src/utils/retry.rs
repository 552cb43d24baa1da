//! 重试执行器
//!
//! 对单个工作单元做有上限的指数退避重试：
//! `Attempting -> { Success | Retrying -> Attempting | ExhaustedFailure }`
//!
//! 同一个工作单元的各次尝试严格串行；退避期间只挂起当前任务，不阻塞其他并发任务。

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{AppError, AppResult};

/// 判断某个错误是否值得重试
pub type ShouldRetry = Arc<dyn Fn(&AppError) -> bool + Send + Sync>;

/// 重试策略
#[derive(Clone)]
pub struct RetryPolicy {
    /// 失败后最多再重试几次，总尝试次数为 `retries + 1`
    pub retries: u32,
    /// 退避倍数
    pub factor: f64,
    pub min_timeout: Duration,
    pub max_timeout: Duration,
    pub should_retry: ShouldRetry,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            factor: 2.0,
            min_timeout: Duration::from_millis(1000),
            max_timeout: Duration::from_millis(10_000),
            // 结构校验失败用同样的输入重试也不会变好，只会浪费配额
            should_retry: Arc::new(|err: &AppError| !err.is_validation()),
        }
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("retries", &self.retries)
            .field("factor", &self.factor)
            .field("min_timeout", &self.min_timeout)
            .field("max_timeout", &self.max_timeout)
            .finish_non_exhaustive()
    }
}

impl RetryPolicy {
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_timeouts(mut self, min_timeout: Duration, max_timeout: Duration) -> Self {
        self.min_timeout = min_timeout;
        self.max_timeout = max_timeout;
        self
    }

    pub fn with_should_retry(
        mut self,
        should_retry: impl Fn(&AppError) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.should_retry = Arc::new(should_retry);
        self
    }

    /// 第 `attempt_number` 次（从 1 开始）失败之后的等待时间
    ///
    /// `min(max_timeout, min_timeout * factor^(attempt_number - 1))`
    pub fn backoff(&self, attempt_number: u32) -> Duration {
        let exponent = attempt_number.saturating_sub(1) as i32;
        let millis = self.min_timeout.as_millis() as f64 * self.factor.powi(exponent);
        let capped = millis.min(self.max_timeout.as_millis() as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }
}

/// 一次失败尝试的信息，传给 `on_failed_attempt` 观察者
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedAttempt {
    pub attempt_number: u32,
    pub retries_left: u32,
    pub message: String,
}

/// 按策略执行 `operation`，返回第一次成功的结果或最后一次的错误
///
/// `operation` 接收当前尝试序号（从 1 开始）。每次失败后都会先调用
/// `on_failed_attempt`，再决定是否重试。
pub async fn retry<T, F, Fut, O>(
    policy: &RetryPolicy,
    mut on_failed_attempt: O,
    mut operation: F,
) -> AppResult<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = AppResult<T>>,
    O: FnMut(&FailedAttempt),
{
    let mut attempt_number = 1;

    loop {
        let err = match operation(attempt_number).await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        let retries_left = (policy.retries + 1).saturating_sub(attempt_number);
        on_failed_attempt(&FailedAttempt {
            attempt_number,
            retries_left,
            message: err.to_string(),
        });

        if retries_left == 0 || !(policy.should_retry)(&err) {
            return Err(err);
        }

        tokio::time::sleep(policy.backoff(attempt_number)).await;
        attempt_number += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(retries: u32) -> RetryPolicy {
        RetryPolicy::default()
            .with_retries(retries)
            .with_timeouts(Duration::from_millis(1), Duration::from_millis(5))
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_millis(1000));
        assert_eq!(policy.backoff(2), Duration::from_millis(2000));
        assert_eq!(policy.backoff(3), Duration::from_millis(4000));
        assert_eq!(policy.backoff(4), Duration::from_millis(8000));
        assert_eq!(policy.backoff(5), Duration::from_millis(10_000));
        assert_eq!(policy.backoff(30), Duration::from_millis(10_000));
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let calls = AtomicU32::new(0);
        let result = retry(&fast_policy(3), |_| {}, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, AppError>("ok") }
        })
        .await;

        assert_eq!(tokio_test::assert_ok!(result), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_retry_outside_async_test() {
        let result: AppResult<()> = tokio_test::block_on(retry(&fast_policy(1), |_| {}, |_| async {
            Err(AppError::storage("bucket missing"))
        }));
        let err = tokio_test::assert_err!(result);
        assert!(matches!(err, AppError::Storage(_)));
    }

    #[tokio::test]
    async fn test_transient_failures_then_success() {
        let calls = AtomicU32::new(0);
        let result = retry(&fast_policy(3), |_| {}, |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt <= 2 {
                    Err(AppError::external_api(format!("fail {}", attempt)))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_returns_last_error() {
        let calls = AtomicU32::new(0);
        let result: AppResult<()> = retry(&fast_policy(2), |_| {}, |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Err(AppError::external_api(format!("fail {}", attempt))) }
        })
        .await;

        assert_eq!(result.unwrap_err().to_string(), "fail 3");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_validation_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: AppResult<()> = retry(&fast_policy(5), |_| {}, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AppError::validation("思维导图", "root 缺失")) }
        })
        .await;

        assert!(result.unwrap_err().is_validation());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_retries_means_single_attempt() {
        let calls = AtomicU32::new(0);
        let result: AppResult<()> = retry(&fast_policy(0), |_| {}, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AppError::external_api("Service unavailable")) }
        })
        .await;

        assert_eq!(result.unwrap_err().to_string(), "Service unavailable");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_observer_sees_every_failed_attempt() {
        let mut seen = Vec::new();
        let _: AppResult<()> = retry(
            &fast_policy(2),
            |attempt| seen.push(attempt.clone()),
            |_| async { Err(AppError::timeout("生成", Duration::from_secs(1))) },
        )
        .await;

        let summary: Vec<(u32, u32)> = seen
            .iter()
            .map(|a| (a.attempt_number, a.retries_left))
            .collect();
        assert_eq!(summary, vec![(1, 2), (2, 1), (3, 0)]);
        assert_eq!(seen[0].message, "生成 超时 (1000 毫秒)");
    }

    #[tokio::test]
    async fn test_custom_should_retry() {
        let calls = AtomicU32::new(0);
        let policy = fast_policy(3).with_should_retry(|_| false);
        let _: AppResult<()> = retry(&policy, |_| {}, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AppError::external_api("boom")) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
