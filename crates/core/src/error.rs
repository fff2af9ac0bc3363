use std::path::PathBuf;

/// Errors that can occur while running a snapbench sweep.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to load metric registry from {path}: {reason}")]
    RegistryLoad { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("trial failed with exit code {}", exit_code.map_or("none".to_string(), |c| c.to_string()))]
    TrialFailed { exit_code: Option<i32> },

    #[error("guest command '{command}' exited with code {exit_code}")]
    GuestCommand { command: String, exit_code: i32 },

    #[error("control plane error: {0}")]
    ControlPlane(String),

    #[error("trial timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns `true` if the error must abort the whole sweep rather than a
    /// single configuration.
    ///
    /// Without a registry seed no metric identity is known, so a registry
    /// failure ends the run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::RegistryLoad { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn error_display_registry_load() {
        let err = Error::RegistryLoad {
            path: PathBuf::from("performance_fields.json"),
            reason: "file not found".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "failed to load metric registry from performance_fields.json: file not found"
        );
    }

    #[test]
    fn error_display_trial_failed() {
        let err = Error::TrialFailed { exit_code: Some(2) };
        assert_eq!(err.to_string(), "trial failed with exit code 2");

        let err = Error::TrialFailed { exit_code: None };
        assert_eq!(err.to_string(), "trial failed with exit code none");
    }

    #[test]
    fn error_display_guest_command() {
        let err = Error::GuestCommand {
            command: "sync".to_string(),
            exit_code: 1,
        };
        assert_eq!(err.to_string(), "guest command 'sync' exited with code 1");
    }

    #[test]
    fn error_display_timeout() {
        let err = Error::Timeout(Duration::from_secs(30));
        assert_eq!(err.to_string(), "trial timed out after 30s");
    }

    #[test]
    fn error_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn only_registry_errors_are_fatal() {
        let fatal = Error::RegistryLoad {
            path: PathBuf::from("x.json"),
            reason: "bad".to_string(),
        };
        assert!(fatal.is_fatal());
        assert!(!Error::TrialFailed { exit_code: Some(1) }.is_fatal());
        assert!(!Error::Timeout(Duration::from_secs(1)).is_fatal());
    }
}
