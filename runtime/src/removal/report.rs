//! Batch outcome and merged error.

use std::fmt;

use a3s_store_core::error::ErrorKind;

use super::batch::{PerTargetError, RemovalReport};

/// Exit code when every target was removed (or ignored).
pub const EXIT_SUCCESS: i32 = 0;

/// Exit code when every failure was a missing name.
pub const EXIT_NOT_FOUND: i32 = 1;

/// Exit code for any other failure.
pub const EXIT_FAILURE: i32 = 125;

/// Overall outcome of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    /// Some targets failed, others were removed
    PartialFailure,
    /// Targets failed and nothing was removed
    Failure,
}

impl ExitStatus {
    pub fn is_success(self) -> bool {
        self == ExitStatus::Success
    }
}

/// Classify a batch and stamp the report's exit code.
pub fn finalize(report: &mut RemovalReport, errors: &[PerTargetError]) -> ExitStatus {
    report.exit_code = exit_code(errors);

    if errors.is_empty() {
        ExitStatus::Success
    } else if report.is_empty() {
        ExitStatus::Failure
    } else {
        ExitStatus::PartialFailure
    }
}

/// Exit code for a set of per-target errors.
pub fn exit_code(errors: &[PerTargetError]) -> i32 {
    if errors.is_empty() {
        EXIT_SUCCESS
    } else if errors.iter().all(|e| e.kind == ErrorKind::NotFound) {
        EXIT_NOT_FOUND
    } else {
        EXIT_FAILURE
    }
}

/// All per-target errors of a batch, in request order.
#[derive(Debug)]
pub struct BatchError {
    errors: Vec<PerTargetError>,
}

impl BatchError {
    pub fn errors(&self) -> &[PerTargetError] {
        &self.errors
    }
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for BatchError {}

/// Merge per-target errors into one value; `None` when there are none.
pub fn join_errors(errors: Vec<PerTargetError>) -> Option<BatchError> {
    if errors.is_empty() {
        None
    } else {
        Some(BatchError { errors })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use a3s_store_core::error::StoreError;

    fn not_found(name: &str) -> PerTargetError {
        PerTargetError::new(name, StoreError::ImageNotFound(name.to_string()))
    }

    fn io_failure(name: &str) -> PerTargetError {
        PerTargetError::new(
            name,
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied").into(),
        )
    }

    #[test]
    fn test_success() {
        let mut report = RemovalReport {
            untagged: vec!["a".to_string()],
            ..Default::default()
        };
        assert_eq!(finalize(&mut report, &[]), ExitStatus::Success);
        assert_eq!(report.exit_code, EXIT_SUCCESS);
    }

    #[test]
    fn test_empty_batch_without_errors_is_success() {
        let mut report = RemovalReport::default();
        assert!(finalize(&mut report, &[]).is_success());
    }

    #[test]
    fn test_partial_failure() {
        let mut report = RemovalReport {
            deleted: vec!["sha256:abc".to_string()],
            ..Default::default()
        };
        let status = finalize(&mut report, &[not_found("missing")]);
        assert_eq!(status, ExitStatus::PartialFailure);
        assert_eq!(report.exit_code, EXIT_NOT_FOUND);
    }

    #[test]
    fn test_failure() {
        let mut report = RemovalReport::default();
        let status = finalize(&mut report, &[not_found("a"), io_failure("b")]);
        assert_eq!(status, ExitStatus::Failure);
        assert_eq!(report.exit_code, EXIT_FAILURE);
    }

    #[test]
    fn test_join_errors_preserves_order() {
        assert!(join_errors(Vec::new()).is_none());

        let merged = join_errors(vec![not_found("first"), io_failure("second")]).unwrap();
        assert_eq!(merged.errors().len(), 2);
        let text = merged.to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "first: image not known");
        assert!(lines[1].starts_with("second: I/O error"));
    }
}
