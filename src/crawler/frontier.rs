//! Per-crawl URL frontier
//!
//! The frontier holds the URLs discovered but not yet fetched for one site
//! crawl. It keeps three collections:
//! - `visited`: URLs already handed out for fetching (terminal)
//! - `queued`: URLs waiting in the pending heap (prevents duplicate enqueue)
//! - `pending`: priority heap of queued URLs
//!
//! A URL moves `queued -> visited` exactly once. URLs a fetch was redirected
//! to are marked visited as well, so a page reached under several addresses
//! is harvested once.

use crate::url::{
    is_same_site, normalize_url, path_priority, prioritize, registrable_domain, should_skip,
};
use crate::{UrlError, UrlResult};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use url::Url;

/// A URL waiting in the frontier with its priority
#[derive(Debug, Clone)]
pub struct QueuedUrl {
    /// The normalized URL to fetch
    pub url: Url,

    /// Priority value (lower is higher priority)
    pub priority: u32,

    /// Discovery sequence, keeps equal-priority URLs in discovery order
    seq: u64,
}

// Lower priority values and earlier discoveries are popped first from BinaryHeap
impl Ord for QueuedUrl {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueuedUrl {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for QueuedUrl {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for QueuedUrl {}

/// Frontier of one site crawl, scoped to the seed's registrable domain
#[derive(Debug)]
pub struct Frontier {
    target_domain: String,
    visited: HashSet<String>,
    queued: HashSet<String>,
    pending: BinaryHeap<QueuedUrl>,
    next_seq: u64,
}

impl Frontier {
    /// Creates a frontier seeded with the site's root URL
    ///
    /// # Arguments
    ///
    /// * `seed` - The business website; its registrable domain scopes the crawl
    ///
    /// # Returns
    ///
    /// * `Ok(Frontier)` - Frontier holding only the normalized site root
    /// * `Err(UrlError)` - The seed is malformed or has no host
    pub fn new(seed: &str) -> UrlResult<Self> {
        let seed_url = normalize_url(seed)?;
        let host = seed_url.host_str().ok_or(UrlError::MissingDomain)?;
        let target_domain = registrable_domain(host);

        let mut root = seed_url.clone();
        root.set_path("/");
        root.set_query(None);

        let mut frontier = Self {
            target_domain,
            visited: HashSet::new(),
            queued: HashSet::new(),
            pending: BinaryHeap::new(),
            next_seq: 0,
        };
        frontier.push(root);

        Ok(frontier)
    }

    /// The registrable domain this crawl is scoped to
    pub fn target_domain(&self) -> &str {
        &self.target_domain
    }

    /// Enqueues a discovered URL
    ///
    /// # Returns
    ///
    /// `true` if the URL was added; `false` if it is malformed, matches a skip
    /// pattern, belongs to another site, or was already visited or queued.
    pub fn enqueue(&mut self, raw: &str) -> bool {
        if should_skip(raw) {
            return false;
        }

        match normalize_url(raw) {
            Ok(url) => self.enqueue_normalized(url),
            Err(_) => false,
        }
    }

    /// Enqueues a batch of discovered links in priority order
    ///
    /// Returns the number of URLs actually added.
    pub fn enqueue_all<'a, I>(&mut self, links: I) -> usize
    where
        I: IntoIterator<Item = &'a str>,
    {
        let candidates: Vec<Url> = links
            .into_iter()
            .filter(|link| !should_skip(link))
            .filter_map(|link| normalize_url(link).ok())
            .collect();

        prioritize(candidates)
            .into_iter()
            .filter(|url| self.enqueue_normalized(url.clone()))
            .count()
    }

    fn enqueue_normalized(&mut self, url: Url) -> bool {
        if !is_same_site(&url, &self.target_domain) || should_skip(url.as_str()) {
            return false;
        }

        let key = url.as_str();
        if self.visited.contains(key) || self.queued.contains(key) {
            return false;
        }

        self.push(url);
        true
    }

    fn push(&mut self, url: Url) {
        let priority = path_priority(&url);
        self.queued.insert(url.to_string());
        self.pending.push(QueuedUrl {
            url,
            priority,
            seq: self.next_seq,
        });
        self.next_seq += 1;
    }

    /// Takes the highest-priority pending URL and marks it visited
    pub fn next(&mut self) -> Option<QueuedUrl> {
        while let Some(next) = self.pending.pop() {
            let key = next.url.to_string();

            // Already landed on through a redirect
            if !self.queued.remove(&key) {
                continue;
            }

            self.visited.insert(key);
            return Some(next);
        }

        None
    }

    /// Marks a URL visited, normalizing it first
    ///
    /// A pending entry for the same URL is dropped. Returns `true` if the URL
    /// had not been visited before.
    pub fn mark_visited(&mut self, url: &Url) -> bool {
        let key = normalize_url(url.as_str()).map_or_else(|_| url.to_string(), String::from);
        self.queued.remove(&key);
        self.visited.insert(key)
    }

    /// Records where a fetch of `requested` was actually served from
    ///
    /// # Returns
    ///
    /// `false` if a redirect landed on a URL already visited in this crawl,
    /// meaning the content was harvested (or attempted) under that address.
    pub fn mark_landed(&mut self, requested: &Url, landed: &Url) -> bool {
        let same = normalize_url(landed.as_str()).is_ok_and(|u| u.as_str() == requested.as_str());
        same || self.mark_visited(landed)
    }

    pub fn is_visited(&self, url: &Url) -> bool {
        self.visited.contains(url.as_str())
    }

    pub fn is_queued(&self, url: &Url) -> bool {
        self.queued.contains(url.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.queued.is_empty()
    }

    pub fn pending_len(&self) -> usize {
        self.queued.len()
    }

    pub fn visited_len(&self) -> usize {
        self.visited.len()
    }
}
