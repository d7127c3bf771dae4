//! 呼叫上下文：截止時間與取消信號
//!
//! 每次對快取層或載入器的呼叫都在 `CallContext` 之下執行，
//! 取消或逾時會以 `CacheError::Cancelled` / `CacheError::DeadlineExceeded` 返回。

use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::CacheError;

/// 呼叫上下文
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    deadline: Option<Instant>,
    cancel: Option<watch::Receiver<bool>>,
}

/// 取消句柄，丟棄時不會觸發取消
#[derive(Debug)]
pub struct CancelHandle {
    sender: watch::Sender<bool>,
}

impl CancelHandle {
    /// 取消所有使用此句柄建立的上下文
    pub fn cancel(&self) {
        let _ = self.sender.send(true);
    }
}

impl CallContext {
    /// 無截止時間、不可取消的上下文
    pub fn background() -> Self {
        Self::default()
    }

    /// 建立可取消的上下文
    pub fn cancellable() -> (Self, CancelHandle) {
        let (sender, receiver) = watch::channel(false);
        (
            Self {
                deadline: None,
                cancel: Some(receiver),
            },
            CancelHandle { sender },
        )
    }

    /// 設置相對逾時
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// 設置絕對截止時間，已有更早的截止時間時保留較早者
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) if existing < deadline => existing,
            _ => deadline,
        });
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// 上下文是否已結束（已取消或已逾時）
    pub fn err(&self) -> Option<CacheError> {
        if self.cancel.as_ref().is_some_and(|rx| *rx.borrow()) {
            return Some(CacheError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(CacheError::DeadlineExceeded),
            _ => None,
        }
    }

    /// 在此上下文之下執行 future
    pub async fn run<T, E, F>(&self, fut: F) -> Result<T, CacheError>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<CacheError>,
    {
        if let Some(err) = self.err() {
            return Err(err);
        }

        let cancelled = Self::cancelled(self.cancel.clone());
        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancelled => Err(CacheError::Cancelled),
            _ = expired => Err(CacheError::DeadlineExceeded),
            result = fut => result.map_err(Into::into),
        }
    }

    async fn cancelled(receiver: Option<watch::Receiver<bool>>) {
        let Some(mut rx) = receiver else {
            return std::future::pending().await;
        };
        // 發送端被丟棄時 wait_for 會返回錯誤，此時視為永不取消
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn test_background_runs_to_completion() {
        let ctx = CallContext::background();
        let result = ctx.run(async { Ok::<_, CacheError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_cancel_surfaces_error() {
        let (ctx, handle) = CallContext::cancellable();
        let task = tokio::spawn({
            let ctx = ctx.clone();
            async move {
                ctx.run(async {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok::<_, CacheError>(())
                })
                .await
            }
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.cancel();
        assert_matches!(task.await.unwrap(), Err(CacheError::Cancelled));
        assert_matches!(ctx.err(), Some(CacheError::Cancelled));
    }

    #[tokio::test]
    async fn test_dropped_handle_does_not_cancel() {
        let (ctx, handle) = CallContext::cancellable();
        drop(handle);
        let result = ctx
            .with_timeout(Duration::from_secs(5))
            .run(async { Ok::<_, CacheError>("done") })
            .await;
        assert_eq!(result.unwrap(), "done");
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_exceeded() {
        let ctx = CallContext::background().with_timeout(Duration::from_millis(50));
        let result = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok::<_, CacheError>(())
            })
            .await;
        assert_matches!(result, Err(CacheError::DeadlineExceeded));
    }

    #[test]
    fn test_earlier_deadline_wins() {
        let now = Instant::now();
        let ctx = CallContext::background()
            .with_deadline(now + Duration::from_secs(1))
            .with_deadline(now + Duration::from_secs(10));
        assert_eq!(ctx.deadline(), Some(now + Duration::from_secs(1)));
    }
}
