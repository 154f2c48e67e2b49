//! Verification helpers over recorded device requests

use thiserror::Error;

use crate::scripted::{RequestKind, SessionLog};

/// Verification error types
#[derive(Error, Debug)]
pub enum VerificationError {
    #[error("No edit containing '{needle}' was sent")]
    EditNotFound { needle: String },

    #[error("Edit containing '{later}' was sent before '{earlier}'")]
    OutOfOrder { earlier: String, later: String },

    #[error("Expected {expected} {kind:?} requests, found {actual}")]
    CountMismatch {
        kind: RequestKind,
        expected: usize,
        actual: usize,
    },

    #[error("Session was not closed")]
    NotClosed,
}

/// Result type for verification operations
pub type VerifyResult<T> = Result<T, VerificationError>;

/// Assertions over one host's request log
pub struct RequestVerifier<'a> {
    log: &'a SessionLog,
}

impl<'a> RequestVerifier<'a> {
    pub fn new(log: &'a SessionLog) -> Self {
        Self { log }
    }

    /// Index of the first edit containing `needle`.
    pub fn edit_position(&self, needle: &str) -> VerifyResult<usize> {
        self.log
            .edits()
            .iter()
            .position(|edit| edit.contains(needle))
            .ok_or_else(|| VerificationError::EditNotFound {
                needle: needle.to_string(),
            })
    }

    /// Every needle was sent, each first occurrence after the previous one.
    pub fn assert_edit_order(&self, needles: &[&str]) -> VerifyResult<()> {
        let mut previous: Option<(usize, &str)> = None;
        for needle in needles {
            let position = self.edit_position(needle)?;
            if let Some((earlier_position, earlier)) = previous {
                if position < earlier_position {
                    return Err(VerificationError::OutOfOrder {
                        earlier: earlier.to_string(),
                        later: needle.to_string(),
                    });
                }
            }
            previous = Some((position, needle));
        }
        Ok(())
    }

    pub fn assert_no_edit(&self, needle: &str) -> VerifyResult<()> {
        match self.edit_position(needle) {
            Ok(_) => Err(VerificationError::CountMismatch {
                kind: RequestKind::EditConfig,
                expected: 0,
                actual: self
                    .log
                    .edits()
                    .iter()
                    .filter(|edit| edit.contains(needle))
                    .count(),
            }),
            Err(_) => Ok(()),
        }
    }

    pub fn assert_count(&self, kind: RequestKind, expected: usize) -> VerifyResult<()> {
        let actual = self.log.count(kind);
        if actual != expected {
            return Err(VerificationError::CountMismatch {
                kind,
                expected,
                actual,
            });
        }
        Ok(())
    }

    pub fn assert_closed(&self) -> VerifyResult<()> {
        if self.log.is_closed() {
            Ok(())
        } else {
            Err(VerificationError::NotClosed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripted::{DeviceScript, ScriptedTransport};
    use fabric_device::Transport;

    #[tokio::test]
    async fn test_edit_order() {
        let mut transport = ScriptedTransport::new("10.0.0.1", DeviceScript::new());
        transport.edit_config("<delete-neighbor/>").await.unwrap();
        transport.edit_config("<create-neighbor/>").await.unwrap();
        let log = transport.log();
        let verifier = RequestVerifier::new(&log);

        assert!(verifier.assert_edit_order(&["delete", "create"]).is_ok());
        assert!(matches!(
            verifier.assert_edit_order(&["create", "delete"]),
            Err(VerificationError::OutOfOrder { .. })
        ));
        assert!(verifier.assert_no_edit("router-id").is_ok());
        assert!(verifier.assert_count(RequestKind::EditConfig, 2).is_ok());
        assert!(matches!(verifier.assert_closed(), Err(VerificationError::NotClosed)));
    }
}
