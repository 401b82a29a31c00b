//! Thread creation configuration.
//!
//! The default stack size for new threads is set via the `TABS_MIN_STACK`
//! environment variable (bytes). Unset, unparsable, or `0` means the OS default.
//! [`crate::thread::Builder::stack_size`] overrides it per thread.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Environment variable holding the default stack size in bytes.
pub const MIN_STACK_ENV: &str = "TABS_MIN_STACK";

// 0 = unresolved, 1 = OS default, n + 2 = explicit size n.
static CACHED_STACK: AtomicUsize = AtomicUsize::new(0);

const STACK_UNRESOLVED: usize = 0;
const STACK_OS_DEFAULT: usize = 1;

/// Parse a `TABS_MIN_STACK` value. Accepts decimal and `0x` hex, with `_`
/// separators.
#[must_use]
pub fn parse_stack_size(raw: &str) -> Option<usize> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != '_').collect();
    let parsed = match cleaned
        .strip_prefix("0x")
        .or_else(|| cleaned.strip_prefix("0X"))
    {
        Some(hex) => usize::from_str_radix(hex, 16).ok()?,
        None => cleaned.parse::<usize>().ok()?,
    };
    (parsed != 0).then_some(parsed)
}

fn encode(size: Option<usize>) -> usize {
    match size {
        Some(n) => n.saturating_add(2),
        None => STACK_OS_DEFAULT,
    }
}

fn decode(v: usize) -> Option<usize> {
    match v {
        STACK_UNRESOLVED | STACK_OS_DEFAULT => None,
        n => Some(n - 2),
    }
}

/// Default stack size for new threads (reads the env var on first call,
/// caches thereafter). `None` leaves the choice to the OS.
#[must_use]
pub fn default_stack_size() -> Option<usize> {
    let cached = CACHED_STACK.load(Ordering::Relaxed);
    if cached != STACK_UNRESOLVED {
        return decode(cached);
    }

    let size = std::env::var(MIN_STACK_ENV)
        .ok()
        .and_then(|v| parse_stack_size(&v));
    // Racing resolvers read the same env value, so last store wins harmlessly.
    CACHED_STACK.store(encode(size), Ordering::Relaxed);
    size
}

/// Per-thread creation options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThreadConfig {
    /// Requested stack size in bytes; `None` falls back to [`default_stack_size`].
    pub stack_size: Option<usize>,
}

impl ThreadConfig {
    /// Stack size to request from the OS, after applying the env default.
    #[must_use]
    pub fn effective_stack_size(self) -> Option<usize> {
        self.stack_size.or_else(default_stack_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_decimal_hex_and_separators() {
        assert_eq!(parse_stack_size("65536"), Some(65_536));
        assert_eq!(parse_stack_size(" 1_048_576 "), Some(1_048_576));
        assert_eq!(parse_stack_size("0x10000"), Some(65_536));
        assert_eq!(parse_stack_size("0X2_0000"), Some(131_072));
    }

    #[test]
    fn parse_rejects_zero_and_garbage() {
        assert_eq!(parse_stack_size("0"), None);
        assert_eq!(parse_stack_size(""), None);
        assert_eq!(parse_stack_size("big"), None);
        assert_eq!(parse_stack_size("-4096"), None);
    }

    #[test]
    fn cache_encoding_roundtrips() {
        assert_eq!(decode(encode(None)), None);
        assert_eq!(decode(encode(Some(4096))), Some(4096));
        assert_eq!(decode(STACK_UNRESOLVED), None);
    }

    #[test]
    fn explicit_stack_size_wins() {
        let cfg = ThreadConfig {
            stack_size: Some(256 * 1024),
        };
        assert_eq!(cfg.effective_stack_size(), Some(256 * 1024));
    }
}
