//! Retry policy for hosted completions that come back without content.
//!
//! The hosted provider occasionally answers a chat completion with a null
//! message content. The default policy re-issues the request until content
//! arrives, with no upper bound: a prompt that never yields content blocks
//! the caller forever. Set a bound through `max_empty_retries` in the
//! configuration to turn that into a `RetriesExhausted` error instead.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryPolicy {
    /// Retry until content is returned.
    #[default]
    Unbounded,
    /// Give up after `max_attempts` requests in total (at least one is always made).
    Bounded { max_attempts: u32 },
}

impl RetryPolicy {
    pub fn bounded(max_attempts: u32) -> Self {
        RetryPolicy::Bounded { max_attempts }
    }

    /// `None` keeps the unbounded default.
    pub fn from_cap(cap: Option<u32>) -> Self {
        cap.map(Self::bounded).unwrap_or_default()
    }

    /// Whether another request may follow `attempts_made` content-less responses.
    pub fn allows_another(&self, attempts_made: u32) -> bool {
        match self {
            RetryPolicy::Unbounded => true,
            RetryPolicy::Bounded { max_attempts } => attempts_made < *max_attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_unbounded() {
        assert_eq!(RetryPolicy::default(), RetryPolicy::Unbounded);
        assert!(RetryPolicy::Unbounded.allows_another(1_000_000));
    }

    #[test]
    fn test_bounded_stops_at_cap() {
        let policy = RetryPolicy::from_cap(Some(3));
        assert!(policy.allows_another(1));
        assert!(policy.allows_another(2));
        assert!(!policy.allows_another(3));
    }

    #[test]
    fn test_zero_cap_still_makes_one_attempt() {
        assert!(!RetryPolicy::bounded(0).allows_another(1));
    }
}
