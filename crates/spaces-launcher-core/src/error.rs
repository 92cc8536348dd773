use thiserror::Error;

/// Exit status when the command could not be found (shell convention)
pub const EXIT_COMMAND_NOT_FOUND: i32 = 127;

/// Exit status when the command exists but could not be executed
pub const EXIT_CANNOT_EXECUTE: i32 = 126;

/// Exit status for configuration and usage errors
pub const EXIT_USAGE: i32 = 2;

/// Errors raised by the launcher itself.
///
/// A child that crashes or exits non-zero is not an error; its status is reported
/// through [`crate::Outcome`].
#[derive(Error, Debug)]
pub enum LauncherError {
    #[error("failed to start `{command}`: {source}")]
    StartupFailure {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl LauncherError {
    pub fn startup_failure(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::StartupFailure {
            command: command.into(),
            source,
        }
    }

    /// Whether the child was never created
    pub fn is_startup_failure(&self) -> bool {
        matches!(self, LauncherError::StartupFailure { .. })
    }

    /// Process exit status to report for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            LauncherError::StartupFailure { source, .. } => match source.kind() {
                std::io::ErrorKind::NotFound => EXIT_COMMAND_NOT_FOUND,
                _ => EXIT_CANNOT_EXECUTE,
            },
            LauncherError::Configuration(_) => EXIT_USAGE,
            LauncherError::Io(_) | LauncherError::Other(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error, ErrorKind};

    #[test]
    fn test_startup_failure_exit_codes() {
        let missing = LauncherError::startup_failure("npm", Error::from(ErrorKind::NotFound));
        assert!(missing.is_startup_failure());
        assert_eq!(missing.exit_code(), 127);

        let denied =
            LauncherError::startup_failure("npm", Error::from(ErrorKind::PermissionDenied));
        assert_eq!(denied.exit_code(), 126);
    }

    #[test]
    fn test_other_exit_codes() {
        assert_eq!(LauncherError::Configuration("bad".into()).exit_code(), 2);
        assert_eq!(LauncherError::Io(Error::other("broken pipe")).exit_code(), 1);
        assert_eq!(LauncherError::Other(anyhow::anyhow!("boom")).exit_code(), 1);
        assert!(!LauncherError::Configuration("bad".into()).is_startup_failure());
    }

    #[test]
    fn test_error_display() {
        let error = LauncherError::startup_failure("npm", Error::new(ErrorKind::NotFound, "gone"));
        let display = format!("{error}");
        assert!(display.contains("failed to start `npm`"));
        assert!(display.contains("gone"));

        let error = LauncherError::Configuration("command must not be empty".to_string());
        assert!(format!("{error}").contains("Configuration error"));
    }
}
