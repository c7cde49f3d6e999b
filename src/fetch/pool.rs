//! Bounded pool of reusable fetch sessions

use crate::fetch::PageFetcher;
use crate::state::OriginState;
use crate::FetchError;
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use url::Url;

/// One reusable fetch handle
///
/// A session is used by one worker at a time and paces its own requests:
/// consecutive fetches to the same origin are at least `delay` apart.
pub struct Session {
    id: usize,
    fetcher: Arc<dyn PageFetcher>,
    delay: Duration,
    origins: HashMap<String, OriginState>,
}

impl Session {
    fn new(id: usize, fetcher: Arc<dyn PageFetcher>, delay: Duration) -> Self {
        Self {
            id,
            fetcher,
            delay,
            origins: HashMap::new(),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Fetches a page, first waiting out the polite delay for its origin
    pub async fn fetch(&mut self, url: &Url) -> Result<String, FetchError> {
        let origin = crate::url::origin_key(url);
        let state = self.origins.entry(origin).or_default();

        if let Some(wait) = state.time_until_next_request(self.delay, Instant::now()) {
            tracing::trace!(session = self.id, wait_ms = wait.as_millis() as u64, "Polite delay");
            tokio::time::sleep(wait).await;
        }
        state.record_request(Instant::now());

        self.fetcher.fetch(url).await
    }
}

struct PoolInner {
    idle: Mutex<Vec<Session>>,
    permits: Arc<Semaphore>,
    size: usize,
}

/// A fixed set of sessions handed out to workers
///
/// At most `size` sessions are in use at once; `acquire` waits when all are
/// taken. Sessions return to the pool when their guard drops, whether the
/// worker finished, failed, panicked or was cancelled.
#[derive(Clone)]
pub struct SessionPool {
    inner: Arc<PoolInner>,
}

impl SessionPool {
    pub fn new(fetcher: Arc<dyn PageFetcher>, size: usize, delay: Duration) -> Self {
        let size = size.max(1);
        let sessions = (0..size)
            .map(|id| Session::new(id, Arc::clone(&fetcher), delay))
            .collect();

        Self {
            inner: Arc::new(PoolInner {
                idle: Mutex::new(sessions),
                permits: Arc::new(Semaphore::new(size)),
                size,
            }),
        }
    }

    pub fn size(&self) -> usize {
        self.inner.size
    }

    /// Number of sessions not currently handed out
    pub fn available(&self) -> usize {
        self.inner.permits.available_permits()
    }

    /// Waits for a free session
    ///
    /// Returns `None` once the pool has been closed.
    pub async fn acquire(&self) -> Option<SessionGuard> {
        let permit = Arc::clone(&self.inner.permits).acquire_owned().await.ok()?;
        let session = match self.inner.idle.lock() {
            Ok(mut idle) => idle.pop(),
            Err(poisoned) => poisoned.into_inner().pop(),
        }?;

        Some(SessionGuard {
            session: Some(session),
            pool: Arc::clone(&self.inner),
            _permit: permit,
        })
    }

    /// Wakes every waiter with `None`; sessions already handed out stay valid
    pub fn close(&self) {
        self.inner.permits.close();
    }

    /// Acquires a session, fetches one page and releases the session
    pub async fn fetch(&self, url: &Url) -> Result<String, crate::ItemError> {
        let mut session = self.acquire().await.ok_or(crate::ItemError::Cancelled)?;
        Ok(session.fetch(url).await?)
    }
}

/// Exclusive use of one session; returns it to the pool on drop
pub struct SessionGuard {
    session: Option<Session>,
    pool: Arc<PoolInner>,
    _permit: OwnedSemaphorePermit,
}

impl Deref for SessionGuard {
    type Target = Session;

    fn deref(&self) -> &Session {
        // Only taken in Drop
        self.session.as_ref().unwrap_or_else(|| unreachable!())
    }
}

impl DerefMut for SessionGuard {
    fn deref_mut(&mut self) -> &mut Session {
        self.session.as_mut().unwrap_or_else(|| unreachable!())
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            // A poisoned lock still holds a valid Vec
            let mut idle = match self.pool.idle.lock() {
                Ok(idle) => idle,
                Err(poisoned) => poisoned.into_inner(),
            };
            idle.push(session);
        }
        // The permit drops after this body, once the session is idle again
    }
}
