//! Bounded pool of reusable headless-browser sessions
//!
//! The pool caps the number of live browser sessions regardless of how many
//! crawls run concurrently. Sessions are created lazily, handed out through a
//! [`PooledSession`] guard, and returned to the idle set when the guard drops,
//! on every exit path. All sessions are torn down together by [`PagePool::shutdown`].

use crate::state::{CrawlError, ErrorKind};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// One browser tab/context able to load and render pages
#[async_trait]
pub trait BrowserSession: Send {
    /// Navigates to a URL and waits for the load to finish
    async fn navigate(&mut self, url: &str) -> Result<(), CrawlError>;

    /// Returns the current rendered document markup
    async fn content(&mut self) -> Result<String, CrawlError>;

    /// Returns the current document title
    async fn title(&mut self) -> Result<Option<String>, CrawlError>;

    /// HTTP status of the current main document, if the browser exposes it
    async fn status(&mut self) -> Result<Option<u16>, CrawlError> {
        Ok(None)
    }

    /// URL of the current document after redirects, if the browser exposes it
    async fn url(&mut self) -> Result<Option<String>, CrawlError> {
        Ok(None)
    }

    /// Releases the session's browser resources
    async fn close(self: Box<Self>);
}

/// Creates browser sessions on demand
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn create(&self) -> Result<Box<dyn BrowserSession>, CrawlError>;

    /// Tears down the underlying browser once every session is closed
    async fn shutdown(&self) {}
}

type IdleSessions = Arc<Mutex<Vec<Box<dyn BrowserSession>>>>;

/// Bounded, reusing pool of browser sessions
pub struct PagePool {
    factory: Arc<dyn SessionFactory>,
    permits: Arc<Semaphore>,
    idle: IdleSessions,
    max_sessions: usize,
    acquire_timeout: Duration,
    created: AtomicUsize,
}

impl PagePool {
    /// Creates an empty pool
    ///
    /// # Arguments
    ///
    /// * `factory` - Source of new sessions
    /// * `max_sessions` - Maximum sessions alive at once
    /// * `acquire_timeout` - How long `acquire` waits for a free slot
    pub fn new(
        factory: Arc<dyn SessionFactory>,
        max_sessions: usize,
        acquire_timeout: Duration,
    ) -> Self {
        let max_sessions = max_sessions.max(1);
        Self {
            factory,
            permits: Arc::new(Semaphore::new(max_sessions)),
            idle: Arc::new(Mutex::new(Vec::new())),
            max_sessions,
            acquire_timeout,
            created: AtomicUsize::new(0),
        }
    }

    /// Checks out a session, reusing an idle one when possible
    ///
    /// Waits while all `max_sessions` sessions are checked out.
    ///
    /// # Returns
    ///
    /// * `Ok(PooledSession)` - A session owned by the caller until dropped
    /// * `Err(CrawlError)` - Timed out waiting, pool shut down, or creation failed
    pub async fn acquire(&self) -> Result<PooledSession, CrawlError> {
        let permit = match tokio::time::timeout(
            self.acquire_timeout,
            Arc::clone(&self.permits).acquire_owned(),
        )
        .await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => {
                return Err(CrawlError::new(ErrorKind::Unknown, "page pool is shut down"));
            }
            Err(_) => {
                return Err(CrawlError::timeout(format!(
                    "no browser session free within {:?}",
                    self.acquire_timeout
                )));
            }
        };

        let reused = self
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();

        let session = match reused {
            Some(session) => session,
            None => {
                let session = self.factory.create().await?;
                let total = self.created.fetch_add(1, Ordering::SeqCst) + 1;
                tracing::debug!("Created browser session ({}/{})", total, self.max_sessions);
                session
            }
        };

        Ok(PooledSession {
            session: Some(session),
            idle: Arc::clone(&self.idle),
            broken: false,
            _permit: permit,
        })
    }

    /// Closes every idle session and the underlying browser
    ///
    /// Later `acquire` calls fail. Must be called after all guards are dropped,
    /// so every session is back in the idle set.
    pub async fn shutdown(&self) {
        self.permits.close();

        let sessions: Vec<_> = self
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();

        tracing::info!("Closing {} browser session(s)", sessions.len());
        for session in sessions {
            session.close().await;
        }

        self.factory.shutdown().await;
    }

    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    /// Sessions created over the pool's lifetime
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Sessions currently waiting in the idle set
    pub fn idle_count(&self) -> usize {
        self.idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// A checked-out session; returns itself to the pool on drop
pub struct PooledSession {
    session: Option<Box<dyn BrowserSession>>,
    idle: IdleSessions,
    broken: bool,
    _permit: OwnedSemaphorePermit,
}

impl PooledSession {
    fn inner(&mut self) -> Result<&mut Box<dyn BrowserSession>, CrawlError> {
        self.session
            .as_mut()
            .ok_or_else(|| CrawlError::new(ErrorKind::Unknown, "browser session released"))
    }

    pub async fn navigate(&mut self, url: &str) -> Result<(), CrawlError> {
        self.inner()?.navigate(url).await
    }

    pub async fn content(&mut self) -> Result<String, CrawlError> {
        self.inner()?.content().await
    }

    pub async fn title(&mut self) -> Result<Option<String>, CrawlError> {
        self.inner()?.title().await
    }

    pub async fn status(&mut self) -> Result<Option<u16>, CrawlError> {
        self.inner()?.status().await
    }

    pub async fn url(&mut self) -> Result<Option<String>, CrawlError> {
        self.inner()?.url().await
    }

    /// Drops the session instead of returning it to the idle set
    ///
    /// Used when the session itself failed (crashed tab, lost connection).
    /// The slot is freed and the next `acquire` creates a fresh session.
    pub fn mark_broken(&mut self) {
        self.broken = true;
    }
}

impl Drop for PooledSession {
    fn drop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };

        if !self.broken {
            self.idle
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(session);
            return;
        }

        // Close needs an await; hand it to the runtime when one is running
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                session.close().await;
            });
        }
    }
}
