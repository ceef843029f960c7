//! Admission control shared by every request a client issues.
//!
//! A [`RequestGate`] admits a request once a concurrency slot is free and the rolling
//! request window has budget: at most `quota` admissions in any span of `window`. When the
//! host answers 429 the fetcher calls [`RequestGate::force_block`] and nothing is admitted
//! until a full window has passed.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

use crate::config::ClientConfig;
use crate::SourceError;

/// Concurrency cap plus rolling request window.
pub struct RequestGate {
    slots: Arc<Semaphore>,
    max_concurrent: usize,
    quota: usize,
    window: Duration,
    /// Admission times inside the current window, oldest first.
    admissions: Mutex<VecDeque<Instant>>,
    blocked_until: Mutex<Option<Instant>>,
}

/// Admission held for the duration of one request. Dropping it frees the slot.
#[derive(Debug)]
#[must_use = "the concurrency slot is released as soon as the permit is dropped"]
pub struct GatePermit {
    _slot: OwnedSemaphorePermit,
}

impl GatePermit {
    /// Frees the concurrency slot.
    pub fn release(self) {}
}

impl std::fmt::Debug for RequestGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestGate")
            .field("max_concurrent", &self.max_concurrent)
            .field("available_slots", &self.available_slots())
            .field("quota", &self.quota)
            .field("window", &self.window)
            .field("blocked", &self.is_blocked())
            .finish()
    }
}

impl RequestGate {
    pub fn new(max_concurrent: usize, quota_window: Duration, quota_limit: u32) -> Self {
        let max_concurrent = max_concurrent.max(1);
        let quota = quota_limit.max(1) as usize;
        Self {
            slots: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            quota,
            window: quota_window,
            admissions: Mutex::new(VecDeque::with_capacity(quota)),
            blocked_until: Mutex::new(None),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(
            config.max_concurrent_downloads,
            config.rate_window(),
            config.max_requests_per_minute,
        )
    }

    /// Waits for a concurrency slot, then for any forced block to expire, then for
    /// window budget.
    pub async fn acquire(&self) -> Result<GatePermit, SourceError> {
        let slot = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|_| SourceError::cancelled("request gate is closed"))?;

        loop {
            // A 429 seen by another request can extend the block while we sleep.
            if let Some(remaining) = self.blocked_remaining() {
                tokio::time::sleep(remaining).await;
                continue;
            }
            match self.try_admit() {
                Ok(()) => break,
                Err(wait) => tokio::time::sleep(wait).await,
            }
        }

        Ok(GatePermit { _slot: slot })
    }

    /// Exhausts the request window: nothing is admitted until `window` has elapsed.
    pub fn force_block(&self) {
        let until = Instant::now() + self.window;
        let mut blocked = self.lock_blocked();
        if blocked.map_or(true, |current| current < until) {
            *blocked = Some(until);
        }
        tracing::warn!(
            window_ms = self.window.as_millis() as u64,
            "request quota exceeded; blocking admissions for one window"
        );
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked_remaining().is_some()
    }

    /// Concurrency slots not currently held.
    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Admissions that still count against the current window.
    pub fn admitted_in_window(&self) -> usize {
        let mut admissions = self.lock_admissions();
        self.expire(&mut admissions, Instant::now());
        admissions.len()
    }

    /// Records an admission if the window has budget, otherwise returns how long until
    /// the oldest admission leaves the window.
    fn try_admit(&self) -> Result<(), Duration> {
        let now = Instant::now();
        let mut admissions = self.lock_admissions();
        self.expire(&mut admissions, now);

        if admissions.len() < self.quota {
            admissions.push_back(now);
            return Ok(());
        }

        let oldest = admissions.front().copied().unwrap_or(now);
        Err((oldest + self.window).saturating_duration_since(now))
    }

    fn expire(&self, admissions: &mut VecDeque<Instant>, now: Instant) {
        while admissions
            .front()
            .is_some_and(|admitted| now.saturating_duration_since(*admitted) >= self.window)
        {
            admissions.pop_front();
        }
    }

    fn blocked_remaining(&self) -> Option<Duration> {
        let mut blocked = self.lock_blocked();
        let until = (*blocked)?;
        let now = Instant::now();
        if until > now {
            Some(until - now)
        } else {
            *blocked = None;
            None
        }
    }

    fn lock_blocked(&self) -> MutexGuard<'_, Option<Instant>> {
        self.blocked_until
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_admissions(&self) -> MutexGuard<'_, VecDeque<Instant>> {
        self.admissions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
