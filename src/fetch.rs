//! External fetches (LLM text, TTS audio) behind a `Fetcher` trait, with a
//! bounded retry and a content-cache front.
//!
//! No HTTP client lives in this crate: the production fetcher runs a
//! configured external command that owns the network call.

use crate::cache::{CacheError, ContentCache};
use crate::models::FetchStats;
use serde::{Deserialize, Serialize};
use std::io::{ErrorKind, Write};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Exit code an external fetch command uses to signal rate limiting.
pub const EXIT_RATE_LIMITED: i32 = 75;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("fetch failed: {0}")]
    Failed(String),
    #[error("giving up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: Box<FetchError> },
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),
}

/// Something that can answer a query with an opaque payload.
pub trait Fetcher {
    fn fetch(&self, query: &str) -> Result<Vec<u8>, FetchError>;
}

impl<F: Fetcher + ?Sized> Fetcher for Box<F> {
    fn fetch(&self, query: &str) -> Result<Vec<u8>, FetchError> {
        (**self).fetch(query)
    }
}

/// Retry budget for one kind of external call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub pre_call_delay_ms: u64,    // Crude rate limiter before every attempt
    pub rate_limit_backoff_ms: u64, // Sleep after a rate-limited attempt
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::llm()
    }
}

impl RetryPolicy {
    pub fn llm() -> Self {
        Self {
            attempts: 3,
            pre_call_delay_ms: 100,
            rate_limit_backoff_ms: 20_000,
        }
    }

    pub fn tts() -> Self {
        Self {
            attempts: 3,
            pre_call_delay_ms: 500,
            rate_limit_backoff_ms: 20_000,
        }
    }

    /// No delays, for tests and local fakes.
    pub fn immediate(attempts: u32) -> Self {
        Self {
            attempts,
            pre_call_delay_ms: 0,
            rate_limit_backoff_ms: 0,
        }
    }

    pub fn pre_call_delay(&self) -> Duration {
        Duration::from_millis(self.pre_call_delay_ms)
    }

    pub fn rate_limit_backoff(&self) -> Duration {
        Duration::from_millis(self.rate_limit_backoff_ms)
    }
}

fn pause(duration: Duration) {
    if !duration.is_zero() {
        thread::sleep(duration);
    }
}

/// Send the same query until it succeeds or the budget is spent.
pub fn with_retry<F: Fetcher + ?Sized>(
    fetcher: &F,
    query: &str,
    policy: &RetryPolicy,
) -> Result<Vec<u8>, FetchError> {
    let attempts = policy.attempts.max(1);
    let mut last = FetchError::Failed("no attempt made".to_string());

    for attempt in 1..=attempts {
        pause(policy.pre_call_delay());

        match fetcher.fetch(query) {
            Ok(payload) => return Ok(payload),
            Err(e) => {
                warn!(attempt, attempts, error = %e, "fetch attempt failed");
                if matches!(e, FetchError::RateLimited(_)) && attempt < attempts {
                    pause(policy.rate_limit_backoff());
                }
                last = e;
            }
        }
    }

    Err(FetchError::Exhausted {
        attempts,
        last: Box::new(last),
    })
}

/// A payload served by `CachedFetcher::get`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    pub file_name: String,
    pub payload: Vec<u8>,
}

/// Cache-or-fetch wrapper: a hit makes no external call, a miss makes one
/// retried fetch followed by one cache write.
pub struct CachedFetcher<F> {
    cache: ContentCache,
    fetcher: F,
    policy: RetryPolicy,
    stats: FetchStats,
}

impl<F: Fetcher> CachedFetcher<F> {
    pub fn new(cache: ContentCache, fetcher: F, policy: RetryPolicy) -> Self {
        Self {
            cache,
            fetcher,
            policy,
            stats: FetchStats::default(),
        }
    }

    pub fn get(&mut self, key: &str, query: &str) -> Result<Fetched, FetchError> {
        if let Some(payload) = self.cache.lookup(key)? {
            self.stats.hits += 1;
            return Ok(Fetched {
                file_name: self.cache.file_name(key),
                payload,
            });
        }

        self.stats.misses += 1;
        debug!(key = %key, "cache miss, fetching");

        let payload = match with_retry(&self.fetcher, query, &self.policy) {
            Ok(payload) => payload,
            Err(e) => {
                self.stats.failures += 1;
                return Err(e);
            }
        };

        let file_name = self.cache.add(key, &payload)?;
        Ok(Fetched { file_name, payload })
    }

    pub fn stats(&self) -> FetchStats {
        self.stats
    }

    pub fn cache(&self) -> &ContentCache {
        &self.cache
    }
}

/// Runs an external program per query: the query goes to stdin, the
/// payload is read from stdout.
#[derive(Debug, Clone)]
pub struct CommandFetcher {
    program: String,
    args: Vec<String>,
}

impl CommandFetcher {
    /// Build from an argv list, `None` if it is empty.
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

impl Fetcher for CommandFetcher {
    fn fetch(&self, query: &str) -> Result<Vec<u8>, FetchError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| FetchError::Failed(format!("cannot run {}: {}", self.program, e)))?;

        // A child that exits without reading its input closes the pipe early;
        // its exit status still decides the outcome.
        let write_error = child.stdin.take().and_then(|mut stdin| {
            match stdin.write_all(query.as_bytes()) {
                Err(e) if e.kind() != ErrorKind::BrokenPipe => Some(e),
                _ => None,
            }
        });

        let output = child
            .wait_with_output()
            .map_err(|e| FetchError::Failed(format!("waiting for {}: {}", self.program, e)))?;

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if output.status.success() {
            if let Some(e) = write_error {
                return Err(FetchError::Failed(format!("writing query to {}: {}", self.program, e)));
            }
            if output.stdout.is_empty() {
                return Err(FetchError::Failed(format!("{} returned nothing", self.program)));
            }
            return Ok(output.stdout);
        }

        let rate_limited = output.status.code() == Some(EXIT_RATE_LIMITED)
            || stderr.contains("429")
            || stderr.to_lowercase().contains("quota");

        if rate_limited {
            Err(FetchError::RateLimited(stderr))
        } else {
            Err(FetchError::Failed(format!(
                "{} exited with {}: {}",
                self.program, output.status, stderr
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::time::Instant;

    /// Replays scripted results, counting and timing calls.
    struct Scripted {
        results: RefCell<Vec<Result<Vec<u8>, FetchError>>>,
        calls: Cell<usize>,
        times: RefCell<Vec<Instant>>,
    }

    impl Scripted {
        fn new(mut results: Vec<Result<Vec<u8>, FetchError>>) -> Self {
            results.reverse();
            Self {
                results: RefCell::new(results),
                calls: Cell::new(0),
                times: RefCell::new(Vec::new()),
            }
        }
    }

    impl Fetcher for Scripted {
        fn fetch(&self, _query: &str) -> Result<Vec<u8>, FetchError> {
            self.calls.set(self.calls.get() + 1);
            self.times.borrow_mut().push(Instant::now());
            self.results
                .borrow_mut()
                .pop()
                .unwrap_or_else(|| Err(FetchError::Failed("script exhausted".to_string())))
        }
    }

    #[test]
    fn test_retry_recovers() {
        let fetcher = Scripted::new(vec![
            Err(FetchError::RateLimited("429".to_string())),
            Ok(b"ok".to_vec()),
        ]);
        let payload = with_retry(&fetcher, "q", &RetryPolicy::immediate(3)).unwrap();
        assert_eq!(payload, b"ok");
        assert_eq!(fetcher.calls.get(), 2);
    }

    #[test]
    fn test_retry_exhausted() {
        let fetcher = Scripted::new(vec![]);
        let err = with_retry(&fetcher, "q", &RetryPolicy::immediate(2)).unwrap_err();
        assert!(matches!(err, FetchError::Exhausted { attempts: 2, .. }));
        assert_eq!(fetcher.calls.get(), 2);
    }

    #[test]
    fn test_retry_delays() {
        let policy = RetryPolicy {
            attempts: 3,
            pre_call_delay_ms: 10,
            rate_limit_backoff_ms: 300,
        };
        let fetcher = Scripted::new(vec![
            Err(FetchError::RateLimited("429".to_string())),
            Err(FetchError::Failed("500".to_string())),
            Err(FetchError::RateLimited("429".to_string())),
        ]);

        let start = Instant::now();
        let err = with_retry(&fetcher, "q", &policy).unwrap_err();
        let end = Instant::now();

        assert!(matches!(err, FetchError::Exhausted { attempts: 3, .. }));
        let times = fetcher.times.borrow();
        assert_eq!(times.len(), 3);

        // Pre-call delay before every attempt, backoff after the rate limit
        assert!(times[0] - start >= policy.pre_call_delay());
        assert!(times[1] - times[0] >= policy.pre_call_delay() + policy.rate_limit_backoff());
        // No backoff after a plain failure
        assert!(times[2] - times[1] >= policy.pre_call_delay());
        assert!(times[2] - times[1] < policy.rate_limit_backoff());
        // No backoff after the last attempt
        assert!(end - times[2] < policy.rate_limit_backoff());

        assert!(end - start >= policy.pre_call_delay() * 3 + policy.rate_limit_backoff());
    }

    #[test]
    fn test_cached_fetcher_fetches_once() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ContentCache::open(dir.path(), "mp3").unwrap();
        let fetcher = Scripted::new(vec![Ok(b"audio".to_vec())]);
        let mut cached = CachedFetcher::new(cache, fetcher, RetryPolicy::immediate(1));

        let first = cached.get("你好", "你 好").unwrap();
        let second = cached.get("你好", "你 好").unwrap();

        assert_eq!(first, second);
        assert!(first.file_name.ends_with(".mp3"));
        assert_eq!(cached.fetcher.calls.get(), 1);
        assert_eq!(
            cached.stats(),
            FetchStats {
                hits: 1,
                misses: 1,
                failures: 0
            }
        );
    }

    #[test]
    fn test_cached_fetcher_failure_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ContentCache::open(dir.path(), "json").unwrap();
        let fetcher = Scripted::new(vec![]);
        let mut cached = CachedFetcher::new(cache, fetcher, RetryPolicy::immediate(2));

        assert!(cached.get("k", "q").is_err());
        assert!(!cached.cache().contains("k"));
        assert_eq!(cached.stats().failures, 1);
    }

    #[test]
    fn test_command_fetcher_from_empty_argv() {
        assert!(CommandFetcher::from_argv(&[]).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_command_fetcher_echoes_stdin() {
        let fetcher = CommandFetcher::from_argv(&["cat".to_string()]).unwrap();
        assert_eq!(fetcher.fetch("你 好").unwrap(), "你 好".as_bytes());
    }

    #[cfg(unix)]
    #[test]
    fn test_command_fetcher_rate_limited() {
        let argv: Vec<String> = ["sh", "-c", "cat >/dev/null; exit 75"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let fetcher = CommandFetcher::from_argv(&argv).unwrap();
        assert!(matches!(fetcher.fetch("q"), Err(FetchError::RateLimited(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_fetcher_rate_limited_without_reading_query() {
        let argv: Vec<String> = ["sh", "-c", "echo '429 Too Many Requests' >&2; exit 75"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let fetcher = CommandFetcher::from_argv(&argv).unwrap();
        // Larger than a pipe buffer, so the write hits the closed pipe
        let query = "好".repeat(200_000);
        match fetcher.fetch(&query) {
            Err(FetchError::RateLimited(stderr)) => assert!(stderr.contains("429")),
            other => panic!("expected RateLimited, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_command_fetcher_quota_message() {
        let argv: Vec<String> = ["sh", "-c", "cat >/dev/null; echo 'Quota exceeded' >&2; exit 1"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let fetcher = CommandFetcher::from_argv(&argv).unwrap();
        assert!(matches!(fetcher.fetch("q"), Err(FetchError::RateLimited(_))));
    }
}
