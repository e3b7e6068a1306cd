//! Short, shareable recipe codes.
//!
//! A code is drawn uniformly from `[A-Za-z0-9]` and redrawn while the
//! caller reports it as taken. The unique index on `recipes.short_link`
//! remains the authority; this loop is only a pre-check.

use rand::distr::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::future::Future;
use std::sync::Mutex;
use thiserror::Error;

pub const DEFAULT_LENGTH: usize = 6;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 16;
/// Upper bound on code length, both for generation and for lookups.
pub const MAX_LENGTH: usize = 32;

#[derive(Debug, Error)]
pub enum ShortLinkError {
    #[error("Could not find a free short link after {0} attempts")]
    Exhausted(u32),

    #[error("Short link lookup failed: {0}")]
    Lookup(#[from] anyhow::Error),
}

pub struct ShortLinkGenerator {
    rng: Mutex<StdRng>,
    length: usize,
    max_attempts: u32,
}

impl ShortLinkGenerator {
    #[must_use]
    pub fn from_os_rng() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    /// Deterministic generator, used by tests.
    #[must_use]
    pub fn from_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            rng: Mutex::new(rng),
            length: DEFAULT_LENGTH,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    #[must_use]
    pub fn with_length(mut self, length: usize) -> Self {
        self.length = length.clamp(1, MAX_LENGTH);
        self
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    #[must_use]
    pub const fn length(&self) -> usize {
        self.length
    }

    /// Draws one candidate code without any uniqueness check.
    #[must_use]
    pub fn candidate(&self) -> String {
        let mut rng = self
            .rng
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        (0..self.length)
            .map(|_| char::from(rng.sample(Alphanumeric)))
            .collect()
    }

    /// Draws candidates until `exists` reports one as free.
    ///
    /// The RNG lock is released before `exists` is awaited.
    pub async fn generate<F, Fut>(&self, mut exists: F) -> Result<String, ShortLinkError>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = anyhow::Result<bool>>,
    {
        for attempt in 1..=self.max_attempts {
            let code = self.candidate();
            if !exists(code.clone()).await? {
                if attempt > 1 {
                    tracing::debug!(attempt, "Short link collision resolved");
                }
                return Ok(code);
            }
        }

        Err(ShortLinkError::Exhausted(self.max_attempts))
    }
}

impl Default for ShortLinkGenerator {
    fn default() -> Self {
        Self::from_os_rng()
    }
}

#[must_use]
pub fn is_valid_code(code: &str, length: usize) -> bool {
    code.len() == length && is_plausible_code(code)
}

/// Shape check for incoming codes. Length is not pinned to the configured
/// value so links issued under an older setting keep resolving.
#[must_use]
pub fn is_plausible_code(code: &str) -> bool {
    (1..=MAX_LENGTH).contains(&code.len()) && code.bytes().all(|b| b.is_ascii_alphanumeric())
}
