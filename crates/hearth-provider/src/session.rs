//! Exclusive, idle-timed inference context
//!
//! One context is shared by every duty. Calls are serialized through an
//! async mutex and the context is disposed after a period of inactivity;
//! the next call reopens it.

use crate::backend::{CompletionRequest, InferenceBackend, InferenceContext};
use anyhow::{anyhow, Result};
use hearth_types::CompletionResponse;
use std::sync::{Arc, Mutex as StdMutex, Weak};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

/// Default idle timeout before the context is released
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

struct OpenContext {
    context: Box<dyn InferenceContext>,
    last_used: Instant,
}

struct Inner {
    backend: Arc<dyn InferenceBackend>,
    slot: Mutex<Option<OpenContext>>,
    idle_timeout: Duration,
    idle_timer: StdMutex<Option<JoinHandle<()>>>,
}

/// Cloneable handle to the shared inference context
#[derive(Clone)]
pub struct SharedContext {
    inner: Arc<Inner>,
}

impl SharedContext {
    pub fn new(backend: Arc<dyn InferenceBackend>, idle_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend,
                slot: Mutex::new(None),
                idle_timeout,
                idle_timer: StdMutex::new(None),
            }),
        }
    }

    /// Acquire the context if needed. With `force`, a live context is
    /// disposed and reopened.
    pub async fn warm_up(&self, force: bool) -> Result<()> {
        let mut slot = self.inner.slot.lock().await;
        if slot.is_some() && !force {
            return Ok(());
        }
        if force && slot.is_some() {
            info!("Resetting inference context");
        }
        *slot = Some(OpenContext {
            context: self.inner.backend.open().await?,
            last_used: Instant::now(),
        });
        drop(slot);
        self.touch();
        Ok(())
    }

    /// Run one completion against the context, opening it on demand
    pub async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        let mut slot = self.inner.slot.lock().await;
        if slot.is_none() {
            debug!("Inference context was released, reopening");
            *slot = Some(OpenContext {
                context: self.inner.backend.open().await?,
                last_used: Instant::now(),
            });
        }

        let Some(open) = slot.as_mut() else {
            return Err(anyhow!("Inference context unavailable"));
        };
        let result = open.context.complete(request).await;
        open.last_used = Instant::now();
        drop(slot);

        self.touch();
        result
    }

    /// Whether a context is currently held
    pub async fn is_open(&self) -> bool {
        self.inner.slot.lock().await.is_some()
    }

    /// Dispose the context now
    pub async fn release(&self) {
        if self.inner.slot.lock().await.take().is_some() {
            info!("Inference context released");
        }
    }

    /// Reset the idle timer
    fn touch(&self) {
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let timeout = self.inner.idle_timeout;

        let handle = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let mut slot = inner.slot.lock().await;
            let idle = slot
                .as_ref()
                .map(|open| open.last_used.elapsed() >= timeout)
                .unwrap_or(false);
            if idle {
                *slot = None;
                info!("Inference context idle for {:?}, released", timeout);
            }
        });

        if let Ok(mut timer) = self.inner.idle_timer.lock() {
            if let Some(previous) = timer.replace(handle) {
                previous.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingBackend {
        opened: Arc<AtomicUsize>,
    }

    struct EchoContext;

    #[async_trait]
    impl InferenceContext for EchoContext {
        async fn complete(&mut self, request: &CompletionRequest) -> Result<CompletionResponse> {
            let last = request
                .messages
                .last()
                .map(|m| m.content.clone())
                .unwrap_or_default();
            Ok(CompletionResponse::text(last))
        }
    }

    #[async_trait]
    impl InferenceBackend for CountingBackend {
        async fn open(&self) -> Result<Box<dyn InferenceContext>> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(EchoContext))
        }
    }

    fn shared(timeout: Duration) -> (SharedContext, Arc<AtomicUsize>) {
        let opened = Arc::new(AtomicUsize::new(0));
        let backend = Arc::new(CountingBackend {
            opened: opened.clone(),
        });
        (SharedContext::new(backend, timeout), opened)
    }

    #[tokio::test]
    async fn test_warm_up_is_idempotent_unless_forced() {
        let (ctx, opened) = shared(Duration::from_secs(60));
        ctx.warm_up(false).await.unwrap();
        ctx.warm_up(false).await.unwrap();
        assert_eq!(opened.load(Ordering::SeqCst), 1);

        ctx.warm_up(true).await.unwrap();
        assert_eq!(opened.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_timeout_releases_context() {
        let (ctx, opened) = shared(Duration::from_secs(10));
        let request = CompletionRequest::new(
            vec![hearth_types::ChatMessage::user("hello")],
            Default::default(),
        );

        ctx.complete(&request).await.unwrap();
        assert!(ctx.is_open().await);

        tokio::time::sleep(Duration::from_secs(6)).await;
        // Using the context resets the timer
        ctx.complete(&request).await.unwrap();
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(ctx.is_open().await);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!ctx.is_open().await);

        ctx.complete(&request).await.unwrap();
        assert_eq!(opened.load(Ordering::SeqCst), 2);
    }
}
