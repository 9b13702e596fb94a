//! Per-credential rate limiting with round-robin rotation
//!
//! Each configured credential owns one `governor` direct limiter whose quota
//! is `burst` cells replenished at `requests-per-second`. `acquire` hands out
//! credentials round-robin among limiters that currently admit a request and
//! sleeps until the earliest one does when none do.

use crate::config::RateLimitConfig;
use governor::clock::{Clock, DefaultClock};
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::fmt;
use std::num::NonZeroU32;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Identifier used when no credentials are configured
pub const DIRECT_CREDENTIAL: &str = "direct";

type DirectLimiter<C> =
    RateLimiter<NotKeyed, InMemoryState, C, NoOpMiddleware<<C as Clock>::Instant>>;

/// An egress identity requests are issued under
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Credential {
    pub id: String,

    /// Proxy URL requests under this credential are routed through
    pub proxy: Option<String>,
}

impl Credential {
    /// The credential for direct, unproxied requests
    pub fn direct() -> Self {
        Self {
            id: DIRECT_CREDENTIAL.to_string(),
            proxy: None,
        }
    }
}

/// Quota of one credential: `burst` requests at once, refilled at `per_second`
pub fn credential_quota(burst: u32, per_second: f64) -> Quota {
    let burst = NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN);
    let period = if per_second.is_finite() && per_second > 0.0 {
        Duration::from_secs_f64(1.0 / per_second)
    } else {
        Duration::from_secs(1)
    };

    Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_second(NonZeroU32::MAX))
        .allow_burst(burst)
}

struct Lane<C: Clock> {
    credential: Credential,
    limiter: DirectLimiter<C>,
}

/// Run-scoped rotator over all credential limiters
///
/// Shared by every concurrent crawl of a batch run. Each limiter admits
/// requests atomically, so a cell is never issued twice.
pub struct KeyRotator<C: Clock = DefaultClock> {
    lanes: Vec<Lane<C>>,
    cursor: Mutex<usize>,
    clock: C,
}

impl KeyRotator {
    /// Creates a rotator with one full limiter per credential
    ///
    /// An empty credential list yields a single direct credential.
    pub fn new(credentials: Vec<Credential>, burst: u32, per_second: f64) -> Self {
        Self::with_clock(credentials, burst, per_second, DefaultClock::default())
    }

    /// Creates a rotator from the `[rate-limit]` section
    pub fn from_config(config: &RateLimitConfig) -> Self {
        let credentials = config
            .credentials
            .iter()
            .map(|entry| Credential {
                id: entry.id.clone(),
                proxy: entry.proxy.clone(),
            })
            .collect();

        Self::new(credentials, config.burst, config.requests_per_second)
    }
}

impl<C: Clock + Clone> KeyRotator<C> {
    /// Creates a rotator whose limiters read time from `clock`
    pub fn with_clock(credentials: Vec<Credential>, burst: u32, per_second: f64, clock: C) -> Self {
        let credentials = if credentials.is_empty() {
            vec![Credential::direct()]
        } else {
            credentials
        };

        let quota = credential_quota(burst, per_second);
        let lanes = credentials
            .into_iter()
            .map(|credential| Lane {
                credential,
                limiter: RateLimiter::direct_with_clock(quota, clock.clone()),
            })
            .collect();

        Self {
            lanes,
            cursor: Mutex::new(0),
            clock,
        }
    }

    /// All credentials in rotation order
    pub fn credentials(&self) -> Vec<Credential> {
        self.lanes.iter().map(|lane| lane.credential.clone()).collect()
    }

    /// Takes a cell from the next credential in rotation that admits one
    ///
    /// # Returns
    ///
    /// * `Ok(Credential)` - The credential the request is issued under
    /// * `Err(Duration)` - Every limiter is exhausted; time until the earliest admits again
    pub fn try_acquire(&self) -> Result<Credential, Duration> {
        let mut cursor = self.cursor.lock().unwrap_or_else(PoisonError::into_inner);
        let count = self.lanes.len();
        let now = self.clock.now();
        let mut wait: Option<Duration> = None;

        for offset in 0..count {
            let index = (*cursor + offset) % count;
            let lane = &self.lanes[index];

            match lane.limiter.check() {
                Ok(()) => {
                    *cursor = (index + 1) % count;
                    return Ok(lane.credential.clone());
                }
                Err(not_until) => {
                    let until = not_until.wait_time_from(now);
                    wait = Some(wait.map_or(until, |w| w.min(until)));
                }
            }
        }

        Err(wait.unwrap_or(Duration::ZERO))
    }

    /// Waits until some credential admits a request and returns it
    pub async fn acquire(&self) -> Credential {
        loop {
            match self.try_acquire() {
                Ok(credential) => return credential,
                Err(wait) => {
                    tracing::trace!("Rate limited, waiting {:?}", wait);
                    tokio::time::sleep(wait.max(Duration::from_millis(1))).await;
                }
            }
        }
    }
}

impl<C: Clock + Clone> fmt::Debug for KeyRotator<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyRotator")
            .field("credentials", &self.credentials())
            .finish()
    }
}
