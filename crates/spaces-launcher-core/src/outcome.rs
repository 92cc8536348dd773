use std::fmt;
use std::process::ExitStatus;

/// How a supervised run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The child exited on its own with this code
    Exited(i32),
    /// The child was terminated by this signal (Unix only)
    Signaled(i32),
    /// The launcher was asked to stop and shut the child down
    Interrupted,
}

impl Outcome {
    pub fn from_exit_status(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return Outcome::Exited(code);
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return Outcome::Signaled(signal);
            }
        }

        Outcome::Exited(1)
    }

    /// Exit status the launcher should report: the child's own code, `128 + N`
    /// for signal N, and 0 after an interrupt.
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::Exited(code) => *code,
            Outcome::Signaled(signal) => 128 + signal,
            Outcome::Interrupted => 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code() == 0
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Exited(code) => write!(f, "exited with code {code}"),
            Outcome::Signaled(signal) => write!(f, "terminated by signal {signal}"),
            Outcome::Interrupted => write!(f, "interrupted"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(Outcome::Exited(0).exit_code(), 0);
        assert_eq!(Outcome::Exited(3).exit_code(), 3);
        assert_eq!(Outcome::Signaled(15).exit_code(), 143);
        assert_eq!(Outcome::Interrupted.exit_code(), 0);
        assert!(Outcome::Interrupted.is_success());
        assert!(!Outcome::Signaled(9).is_success());
    }

    #[cfg(unix)]
    #[test]
    fn test_from_unix_exit_status() {
        use std::os::unix::process::ExitStatusExt;

        assert_eq!(
            Outcome::from_exit_status(ExitStatus::from_raw(42 << 8)),
            Outcome::Exited(42)
        );
        assert_eq!(
            Outcome::from_exit_status(ExitStatus::from_raw(9)),
            Outcome::Signaled(9)
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Outcome::Exited(2).to_string(), "exited with code 2");
        assert_eq!(Outcome::Signaled(15).to_string(), "terminated by signal 15");
    }
}
