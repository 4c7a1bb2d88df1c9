//! Exit codes following sysexits.h conventions.
//!
//! Scripts can tell "nothing recognized" apart from a broken install or an
//! unreadable photo.

use sightline_core::SightlineError;

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// General error (catch-all).
pub const GENERAL_ERROR: i32 = 1;

/// Command line usage error (invalid arguments).
/// Maps to EX_USAGE from sysexits.h.
pub const USAGE_ERROR: i32 = 64;

/// Nothing could be recognized in the photo.
/// Maps to EX_DATAERR from sysexits.h.
pub const NO_RESULT: i32 = 65;

/// Cannot open or decode the input image.
/// Maps to EX_NOINPUT from sysexits.h.
pub const INPUT_ERROR: i32 = 66;

/// Recognition ran out of time or was interrupted.
/// Maps to EX_UNAVAILABLE from sysexits.h.
pub const UNAVAILABLE: i32 = 69;

/// Cannot read or write the data directory.
/// Maps to EX_IOERR from sysexits.h.
pub const IO_ERROR: i32 = 74;

/// Invalid persisted or supplied configuration.
/// Maps to EX_CONFIG from sysexits.h.
pub const CONFIG_ERROR: i32 = 78;

/// Represents an exit code with optional error context.
pub struct ExitCode {
    pub code: i32,
    pub message: Option<String>,
}

impl ExitCode {
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let message = format!("{err:#}");

        let core = err
            .chain()
            .find_map(|cause| cause.downcast_ref::<SightlineError>());
        let code = match core {
            Some(SightlineError::NoResult) => NO_RESULT,
            Some(SightlineError::Timeout { .. } | SightlineError::Cancelled) => UNAVAILABLE,
            Some(SightlineError::Image(_)) => INPUT_ERROR,
            Some(SightlineError::Storage(_)) => IO_ERROR,
            Some(SightlineError::Config(_)) => CONFIG_ERROR,
            Some(_) => GENERAL_ERROR,
            None if message.contains("Failed to read image") => INPUT_ERROR,
            None if message.contains("data directory") => IO_ERROR,
            None => GENERAL_ERROR,
        };

        Self {
            code,
            message: Some(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_core_errors_are_classified_through_context() {
        let err = Err::<(), _>(SightlineError::NoResult)
            .context("Recognition failed")
            .unwrap_err();
        assert_eq!(ExitCode::from_anyhow(&err).code, NO_RESULT);

        let err = anyhow::Error::new(SightlineError::Timeout { elapsed_ms: 15_000 });
        assert_eq!(ExitCode::from_anyhow(&err).code, UNAVAILABLE);

        let err = anyhow::Error::new(SightlineError::Config("no methods enabled".into()));
        assert_eq!(ExitCode::from_anyhow(&err).code, CONFIG_ERROR);
    }

    #[test]
    fn test_plain_errors_fall_back_to_message() {
        let err = anyhow::anyhow!("Failed to read image: missing.jpg");
        let exit = ExitCode::from_anyhow(&err);
        assert_eq!(exit.code, INPUT_ERROR);
        assert!(exit.message.unwrap().contains("missing.jpg"));

        assert_eq!(
            ExitCode::from_anyhow(&anyhow::anyhow!("boom")).code,
            GENERAL_ERROR
        );
    }
}
