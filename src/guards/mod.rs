//! Uniqueness guards used while generating a batch of articles.
//!
//! Both guards read and write the [`GenerationBatch`] owned by the batch job.
//! The batch is not synchronized; a job that processes articles in parallel
//! must wrap it in a mutex rather than hand out copies.

pub mod duplicate;
pub mod image;

use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

pub use duplicate::{find_duplicate, is_duplicate, overlap_ratio, title_tokens};
pub use image::{acquire_unique_image, ImageSource, SourcedImage, UnsplashImageSource};

/// Working set of one bulk-generation run: titles accepted so far and image
/// URLs already handed out. Created at the start of a job, dropped at the end.
#[derive(Debug, Default)]
pub struct GenerationBatch {
    recent_titles: VecDeque<String>,
    window: usize,
    claimed_images: HashSet<String>,
}

impl GenerationBatch {
    pub fn new(window: usize) -> Self {
        Self {
            recent_titles: VecDeque::with_capacity(window),
            window,
            claimed_images: HashSet::new(),
        }
    }

    /// Starts a batch that already knows about previously persisted titles.
    /// `titles` are expected newest first, as returned by `Database::recent_titles`.
    pub fn seeded<I, S>(window: usize, titles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut batch = Self::new(window);
        let mut titles: Vec<String> = titles.into_iter().map(Into::into).collect();
        titles.truncate(window);
        for title in titles.into_iter().rev() {
            batch.remember_title(title);
        }
        batch
    }

    pub fn recent_titles(&self) -> impl Iterator<Item = &str> {
        self.recent_titles.iter().map(String::as_str)
    }

    pub fn title_count(&self) -> usize {
        self.recent_titles.len()
    }

    /// Records an accepted title, evicting the oldest once the window is full.
    pub fn remember_title(&mut self, title: impl Into<String>) {
        if self.window == 0 {
            return;
        }
        while self.recent_titles.len() >= self.window {
            self.recent_titles.pop_front();
        }
        self.recent_titles.push_back(title.into());
    }

    pub fn claimed_images(&self) -> &HashSet<String> {
        &self.claimed_images
    }

    pub fn is_image_claimed(&self, url: &str) -> bool {
        self.claimed_images.contains(url)
    }

    /// Returns false if the URL was already claimed in this batch.
    pub fn claim_image(&mut self, url: impl Into<String>) -> bool {
        self.claimed_images.insert(url.into())
    }

    /// Gives a claimed URL back, for an article that was never stored.
    pub fn release_image(&mut self, url: &str) -> bool {
        self.claimed_images.remove(url)
    }
}

/// Delay schedule between attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    Fixed(Duration),
    Exponential { initial: Duration, max: Duration },
}

impl Backoff {
    /// Delay after the given (1-based) failed attempt.
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Backoff::Fixed(delay) => delay,
            Backoff::Exponential { initial, max } => {
                let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
                initial.saturating_mul(factor).min(max)
            }
        }
    }
}

/// Bounded retry: how many attempts, and how long to wait between them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Fixed(delay),
        }
    }

    pub fn immediate(max_attempts: u32) -> Self {
        Self::fixed(max_attempts, Duration::ZERO)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(5, Duration::from_secs(1))
    }
}

/// Result of a single attempt inside [`retry_with`].
#[derive(Debug)]
pub enum Attempt<T> {
    Done(T),
    Retry,
    GiveUp,
}

/// Runs `attempt` until it is done, gives up, or the policy is exhausted.
/// The closure receives the 1-based attempt number.
pub async fn retry_with<T, F, Fut>(policy: &RetryPolicy, mut attempt: F) -> Option<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Attempt<T>>,
{
    for n in 1..=policy.max_attempts {
        match attempt(n).await {
            Attempt::Done(value) => return Some(value),
            Attempt::GiveUp => return None,
            Attempt::Retry => {
                if n < policy.max_attempts {
                    let delay = policy.backoff.delay(n);
                    if !delay.is_zero() {
                        sleep(delay).await;
                    }
                }
            }
        }
    }
    None
}
