//! Redirect loop guard.

use std::collections::HashMap;
use url::Url;

/// Visit counts per redirect target for one request chain.
///
/// Keys are the URL's serialization without fragment, so two equal URLs
/// always hit the same slot. The origin is remembered but its initial
/// request is not a redirect visit: a `Location` pointing back at it is
/// followed once, and any target reached a second time stops the chain.
#[derive(Debug, Clone, Default)]
pub struct RedirectVisitTable {
    origin: String,
    visits: HashMap<String, u32>,
}

/// Canonical table key for `url`.
pub fn canonical_key(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.into()
}

impl RedirectVisitTable {
    pub fn new(origin: &Url) -> Self {
        Self {
            origin: canonical_key(origin),
            visits: HashMap::new(),
        }
    }

    /// Canonical key of the URL that started the chain.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Times `url` has been reached through a redirect.
    pub fn visits(&self, url: &Url) -> u32 {
        self.visits.get(&canonical_key(url)).copied().unwrap_or(0)
    }

    /// Count one more visit to `url` and return the new count.
    pub fn record(&mut self, url: &Url) -> u32 {
        let count = self.visits.entry(canonical_key(url)).or_insert(0);
        *count += 1;
        *count
    }

    /// Record a visit and report whether the chain may continue to `url`.
    pub fn should_follow(&mut self, url: &Url) -> bool {
        self.record(url) < 2
    }

    /// Number of distinct redirect targets seen.
    pub fn len(&self) -> usize {
        self.visits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visits.is_empty()
    }
}
