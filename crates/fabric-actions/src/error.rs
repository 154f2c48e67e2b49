//! Per-device failures and their fabric-wide aggregate.

use std::fmt;
use std::time::Duration;

use fabric_device::DeviceError;
use thiserror::Error;

/// Result type alias for fabric actions.
pub type ActionResult<T> = Result<T, ActionError>;

/// Errors raised by fabric workflows.
#[derive(Debug, Error)]
pub enum ActionError {
    /// A device, transport or resolution failure.
    #[error(transparent)]
    Device(#[from] DeviceError),

    /// A target failed the support check; no device was touched.
    #[error("Pre-flight check failed for {host}: {source}")]
    Preflight {
        /// The first unsupported target.
        host: String,
        #[source]
        source: DeviceError,
    },

    /// The management cluster never reached the intended membership.
    #[error("Management Cluster is not operational. Polling timed out")]
    ClusterNotOperational {
        /// How long polling ran.
        elapsed: Duration,
    },

    /// More members were requested than a management cluster supports.
    #[error("Management cluster is supported for a maximum of {max} nodes")]
    ClusterTooLarge {
        /// Requested member count.
        requested: usize,
        /// Supported maximum.
        max: usize,
    },

    /// A singleton the switch already carries under another name.
    #[error("{what} {name} already configured on switch")]
    AlreadyConfigured {
        /// What kind of object, e.g. `Overlay gateway`.
        what: &'static str,
        /// The name found on the switch.
        name: String,
    },

    /// A device task panicked or was aborted before reporting.
    #[error("Device task failed: {message}")]
    TaskFailed {
        /// Panic payload or abort reason.
        message: String,
    },

    /// One or more devices failed during a fan-out.
    #[error("{report}")]
    Aggregate {
        /// The rendered per-device failures.
        report: FanOutReport,
    },
}

impl ActionError {
    /// Creates a task failure error.
    pub fn task_failed(message: impl Into<String>) -> Self {
        Self::TaskFailed {
            message: message.into(),
        }
    }

    /// Returns true if this error indicates a transient condition
    /// that may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            ActionError::Device(e) => e.is_retryable(),
            ActionError::ClusterNotOperational { .. } => true,
            _ => false,
        }
    }
}

/// The unit of per-device failure reporting.
#[derive(Debug)]
pub struct OperationError {
    /// The sub-operation that failed, e.g. `Configure BGP Neighbor`.
    pub operation: String,
    pub host: String,
    pub error: ActionError,
}

impl OperationError {
    pub fn new(
        operation: impl Into<String>,
        host: impl Into<String>,
        error: impl Into<ActionError>,
    ) -> Self {
        Self {
            operation: operation.into(),
            host: host.into(),
            error: error.into(),
        }
    }
}

impl fmt::Display for OperationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{Host={},Operation={},Error={}}}",
            self.host, self.operation, self.error
        )
    }
}

impl std::error::Error for OperationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Multi-line rendering of every per-device failure of one fan-out.
///
/// This is a report for humans; callers that branch per device read the
/// [`OperationError`] list instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanOutReport {
    lines: Vec<String>,
}

impl FanOutReport {
    pub fn from_errors(errors: &[OperationError]) -> Self {
        Self {
            lines: errors
                .iter()
                .map(|e| {
                    format!(
                        "\tOn the device[{}], the operation[{}] has failed, with the reason:[{}]\n",
                        e.host, e.operation, e.error
                    )
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl fmt::Display for FanOutReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.lines.iter().try_for_each(|line| f.write_str(line))
    }
}

/// A failure inside a device operation, tagged with the step that raised it.
///
/// Steps without a tag are reported under the fan-out's operation name.
#[derive(Debug)]
pub struct StepFailure {
    pub step: Option<String>,
    pub error: ActionError,
}

impl From<ActionError> for StepFailure {
    fn from(error: ActionError) -> Self {
        Self { step: None, error }
    }
}

impl From<DeviceError> for StepFailure {
    fn from(error: DeviceError) -> Self {
        ActionError::from(error).into()
    }
}

/// Attaches a step name to a failing result.
pub trait StepContext<T> {
    fn step(self, name: &str) -> Result<T, StepFailure>;
}

impl<T, E: Into<ActionError>> StepContext<T> for Result<T, E> {
    fn step(self, name: &str) -> Result<T, StepFailure> {
        self.map_err(|e| StepFailure {
            step: Some(name.to_string()),
            error: e.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_operation_error_display() {
        let err = OperationError::new(
            "Configure Router BGP",
            "10.24.39.1",
            DeviceError::protocol("%Error: Invalid AS"),
        );
        assert_eq!(
            err.to_string(),
            "{Host=10.24.39.1,Operation=Configure Router BGP,Error=%Error: Invalid AS}"
        );
    }

    #[test]
    fn test_report_lines() {
        let errors = vec![
            OperationError::new("Login", "10.24.39.1", DeviceError::NotAuthorized),
            OperationError::new(
                "Poll for management cluster status",
                "10.24.39.2",
                ActionError::ClusterNotOperational {
                    elapsed: Duration::from_secs(90),
                },
            ),
        ];
        let report = FanOutReport::from_errors(&errors);
        assert_eq!(report.len(), 2);
        assert_eq!(
            report.to_string(),
            "\tOn the device[10.24.39.1], the operation[Login] has failed, with the reason:\
             [%Error: User is not authorized to perform this operation]\n\
             \tOn the device[10.24.39.2], the operation[Poll for management cluster status] \
             has failed, with the reason:[Management Cluster is not operational. Polling timed out]\n"
        );
    }

    #[test]
    fn test_step_context() {
        let failed: Result<(), DeviceError> = Err(DeviceError::Cancelled);
        let failure = failed.step("Configure Loopback").unwrap_err();
        assert_eq!(failure.step.as_deref(), Some("Configure Loopback"));

        let untagged: StepFailure = DeviceError::Cancelled.into();
        assert!(untagged.step.is_none());
    }

    #[test]
    fn test_already_configured_message() {
        let err = ActionError::AlreadyConfigured {
            what: "Overlay gateway",
            name: "old-fabric".to_string(),
        };
        assert_eq!(err.to_string(), "Overlay gateway old-fabric already configured on switch");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_cluster_limit_message() {
        let err = ActionError::ClusterTooLarge { requested: 3, max: 2 };
        assert_eq!(
            err.to_string(),
            "Management cluster is supported for a maximum of 2 nodes"
        );
    }
}
