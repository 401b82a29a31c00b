//! Error taxonomy for the thread and mutex layers.
//!
//! Every failing operation maps to exactly one [`TabsError`] variant. The raw OS
//! error number is kept as an optional payload so callers can still get at the
//! platform diagnostic without the public contract naming OS-specific codes.

use std::fmt;

use thiserror::Error;

/// Raw OS error number reported by the native primitive.
///
/// On POSIX this is the value returned by the `pthread_*` call (they return
/// errno values directly rather than setting `errno`). On Win32 it is the
/// value of `GetLastError()` taken right after the failing call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OsCode(pub i32);

impl OsCode {
    /// The raw OS error number.
    #[must_use]
    pub const fn raw(self) -> i32 {
        self.0
    }

    /// Platform description of the code.
    #[must_use]
    pub fn message(self) -> String {
        std::io::Error::from(self).to_string()
    }
}

impl fmt::Display for OsCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "os error {}", self.0)
    }
}

impl From<OsCode> for std::io::Error {
    fn from(code: OsCode) -> Self {
        std::io::Error::from_raw_os_error(code.0)
    }
}

/// Failure kind, without the OS payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Creation,
    Join,
    Detach,
    Init,
    Destroy,
    Lock,
}

impl ErrorKind {
    /// Stable lowercase name, used in structured logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Creation => "creation",
            Self::Join => "join",
            Self::Detach => "detach",
            Self::Init => "init",
            Self::Destroy => "destroy",
            Self::Lock => "lock",
        }
    }
}

/// A failed thread or mutex operation.
///
/// A `None` payload means the layer rejected the call before reaching the OS
/// (absent entry point, storage in the wrong lifecycle state).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TabsError {
    #[error("thread creation failed{}", os_suffix(.0))]
    Creation(Option<OsCode>),
    #[error("thread join failed{}", os_suffix(.0))]
    Join(Option<OsCode>),
    #[error("thread detach failed{}", os_suffix(.0))]
    Detach(Option<OsCode>),
    #[error("mutex init failed{}", os_suffix(.0))]
    Init(Option<OsCode>),
    #[error("mutex destroy failed{}", os_suffix(.0))]
    Destroy(Option<OsCode>),
    #[error("mutex lock failed{}", os_suffix(.0))]
    Lock(Option<OsCode>),
}

fn os_suffix(code: &Option<OsCode>) -> String {
    match code {
        Some(code) => format!(": {} ({code})", code.message()),
        None => String::new(),
    }
}

impl TabsError {
    /// The failure kind.
    #[must_use]
    pub const fn kind(self) -> ErrorKind {
        match self {
            Self::Creation(_) => ErrorKind::Creation,
            Self::Join(_) => ErrorKind::Join,
            Self::Detach(_) => ErrorKind::Detach,
            Self::Init(_) => ErrorKind::Init,
            Self::Destroy(_) => ErrorKind::Destroy,
            Self::Lock(_) => ErrorKind::Lock,
        }
    }

    /// The OS diagnostic, if the failure came from the OS.
    #[must_use]
    pub const fn os_code(self) -> Option<OsCode> {
        match self {
            Self::Creation(code)
            | Self::Join(code)
            | Self::Detach(code)
            | Self::Init(code)
            | Self::Destroy(code)
            | Self::Lock(code) => code,
        }
    }

    /// Build an error of `kind` from a raw OS error number.
    #[must_use]
    pub const fn from_os(kind: ErrorKind, raw: i32) -> Self {
        Self::with_code(kind, Some(OsCode(raw)))
    }

    /// Build an error of `kind` for a precondition the layer rejected itself.
    #[must_use]
    pub const fn rejected(kind: ErrorKind) -> Self {
        Self::with_code(kind, None)
    }

    const fn with_code(kind: ErrorKind, code: Option<OsCode>) -> Self {
        match kind {
            ErrorKind::Creation => Self::Creation(code),
            ErrorKind::Join => Self::Join(code),
            ErrorKind::Detach => Self::Detach(code),
            ErrorKind::Init => Self::Init(code),
            ErrorKind::Destroy => Self::Destroy(code),
            ErrorKind::Lock => Self::Lock(code),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TabsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_and_payload_survive_construction() {
        let err = TabsError::from_os(ErrorKind::Join, 3);
        assert_eq!(err, TabsError::Join(Some(OsCode(3))));
        assert_eq!(err.kind(), ErrorKind::Join);
        assert_eq!(err.os_code().map(OsCode::raw), Some(3));

        let rejected = TabsError::rejected(ErrorKind::Lock);
        assert_eq!(rejected.kind(), ErrorKind::Lock);
        assert!(rejected.os_code().is_none());
    }

    #[test]
    fn display_includes_os_code_only_when_present() {
        let rejected = TabsError::rejected(ErrorKind::Init);
        assert_eq!(rejected.to_string(), "mutex init failed");

        let os = TabsError::from_os(ErrorKind::Creation, 11);
        let rendered = os.to_string();
        assert!(rendered.starts_with("thread creation failed: "), "{rendered}");
        assert!(rendered.ends_with("(os error 11)"), "{rendered}");
    }

    #[test]
    fn os_code_converts_to_io_error() {
        let io: std::io::Error = OsCode(2).into();
        assert_eq!(io.raw_os_error(), Some(2));
        assert_eq!(OsCode(2).message(), io.to_string());
    }

    #[test]
    fn kind_names_are_stable() {
        let names: Vec<_> = [
            ErrorKind::Creation,
            ErrorKind::Join,
            ErrorKind::Detach,
            ErrorKind::Init,
            ErrorKind::Destroy,
            ErrorKind::Lock,
        ]
        .iter()
        .map(|k| k.as_str())
        .collect();
        assert_eq!(
            names,
            ["creation", "join", "detach", "init", "destroy", "lock"]
        );
    }
}
