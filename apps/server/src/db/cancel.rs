//! Cancellation and deadlines for store operations
//!
//! A [`CancelToken`] is passed into every bulk write. Each store step runs
//! under [`CancelToken::guard`]; when the token fires first the step is
//! abandoned with [`Error::Cancelled`] and the caller rolls back.

use crate::{Error, Result, Stage};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{Duration, Instant};

#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    signal: Option<watch::Receiver<bool>>,
    deadline: Option<Instant>,
}

/// Fires the token(s) created alongside it.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl CancelToken {
    /// A token that never fires.
    pub fn none() -> Self {
        Self::default()
    }

    /// A token fired explicitly through the returned handle.
    pub fn new() -> (CancelHandle, Self) {
        let (tx, rx) = watch::channel(false);
        (
            CancelHandle { tx: Arc::new(tx) },
            Self {
                signal: Some(rx),
                deadline: None,
            },
        )
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            signal: None,
            deadline: Some(deadline),
        }
    }

    /// Same signal, with the deadline moved to at most `timeout` from now.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        Self {
            signal: self.signal.clone(),
            deadline: Some(match self.deadline {
                Some(existing) => existing.min(candidate),
                None => candidate,
            }),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        let signalled = self
            .signal
            .as_ref()
            .map(|rx| *rx.borrow())
            .unwrap_or(false);
        let expired = self
            .deadline
            .map(|deadline| Instant::now() >= deadline)
            .unwrap_or(false);
        signalled || expired
    }

    /// Resolves once the token fires; never resolves for [`CancelToken::none`].
    pub async fn cancelled(&self) {
        let signal = async {
            match &self.signal {
                Some(rx) => {
                    let mut rx = rx.clone();
                    // A dropped handle can no longer fire.
                    if rx.wait_for(|fired| *fired).await.is_err() {
                        std::future::pending::<()>().await;
                    }
                }
                None => std::future::pending::<()>().await,
            }
        };
        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = signal => {}
            _ = deadline => {}
        }
    }

    /// Run `fut`, abandoning it with `Error::Cancelled { stage }` if the token fires first.
    pub async fn guard<T, F>(&self, stage: Stage, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.is_cancelled() {
            return Err(Error::Cancelled { stage });
        }

        tokio::select! {
            biased;
            _ = self.cancelled() => Err(Error::Cancelled { stage }),
            res = fut => res,
        }
    }
}
