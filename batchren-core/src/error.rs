use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the rename engine
#[derive(Debug, Error)]
pub enum Error {
    /// An option value was rejected before any I/O happened
    #[error("invalid value for option '{name}': {message}")]
    Config { name: String, message: String },

    /// The source pattern could not be compiled
    #[error("invalid pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A directory could not be read during discovery
    #[error("cannot read {}: {source}", path.display())]
    Discovery {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A planned destination collides with another entry or an existing path
    #[error("conflict at {}: {reason}", path.display())]
    Conflict { path: PathBuf, reason: String },

    /// A rename failed on the filesystem
    #[error("failed to rename {} to {} ({kind}): {source}", from.display(), to.display())]
    Io {
        from: PathBuf,
        to: PathBuf,
        kind: IoErrorKind,
        #[source]
        source: io::Error,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub(crate) fn config(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config {
            name: name.into(),
            message: message.into(),
        }
    }

    pub(crate) fn io(from: PathBuf, to: PathBuf, source: io::Error) -> Self {
        Self::Io {
            kind: IoErrorKind::classify(&source),
            from,
            to,
            source,
        }
    }
}

/// Classification of a failed rename
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IoErrorKind {
    Permission,
    NotFound,
    CrossDevice,
    Other,
}

impl IoErrorKind {
    pub fn classify(err: &io::Error) -> Self {
        #[cfg(unix)]
        if err.raw_os_error() == Some(libc::EXDEV) {
            return Self::CrossDevice;
        }

        match err.kind() {
            io::ErrorKind::PermissionDenied => Self::Permission,
            io::ErrorKind::NotFound => Self::NotFound,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for IoErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Permission => "permission denied",
            Self::NotFound => "not found",
            Self::CrossDevice => "cross-device",
            Self::Other => "i/o error",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_io_errors() {
        let denied = io::Error::new(io::ErrorKind::PermissionDenied, "nope");
        assert_eq!(IoErrorKind::classify(&denied), IoErrorKind::Permission);

        let missing = io::Error::new(io::ErrorKind::NotFound, "gone");
        assert_eq!(IoErrorKind::classify(&missing), IoErrorKind::NotFound);

        let other = io::Error::new(io::ErrorKind::Other, "boom");
        assert_eq!(IoErrorKind::classify(&other), IoErrorKind::Other);
    }

    #[cfg(unix)]
    #[test]
    fn test_classify_cross_device() {
        let exdev = io::Error::from_raw_os_error(libc::EXDEV);
        assert_eq!(IoErrorKind::classify(&exdev), IoErrorKind::CrossDevice);
    }

    #[test]
    fn test_config_error_message() {
        let err = Error::config("countbase", "expected a non-negative integer");
        assert_eq!(
            err.to_string(),
            "invalid value for option 'countbase': expected a non-negative integer"
        );
    }
}
