use thiserror::Error;

/// Errors raised while validating or compiling resource-access declarations.
///
/// Every compile-time variant names the compute unit and the position of the
/// offending declaration so the caller can find it in their definition.
#[derive(Debug, Error, PartialEq)]
pub enum TetherAccessError {
    /// A declaration requested zero actions
    #[error("Declaration #{index} of '{unit}' grants no actions")]
    EmptyAccessGrant {
        /// Name of the compute unit being compiled.
        unit: String,
        /// Position of the declaration in the input list.
        index: usize,
    },

    /// A declaration did not describe exactly one known resource
    #[error("Declaration #{index} of '{unit}' is malformed: {reason}")]
    MalformedResourceAccess {
        /// Name of the compute unit being compiled.
        unit: String,
        /// Position of the declaration in the input list.
        index: usize,
        /// What was wrong with the declaration.
        reason: String,
    },

    /// A push-notification channel other than GCM was requested
    #[error("Declaration #{index} of '{unit}' uses unsupported notification channel '{channel}'")]
    UnsupportedNotificationChannel {
        /// Name of the compute unit being compiled.
        unit: String,
        /// Position of the declaration in the input list.
        index: usize,
        /// The requested channel kind.
        channel: String,
    },

    /// A resource-access declaration could not be constructed
    #[error("Invalid resource access: {0}")]
    InvalidDeclaration(String),

    /// Platform options could not be read
    #[error("Invalid platform options: {0}")]
    InvalidOptions(String),
}

impl TetherAccessError {
    /// Report the error against `unit` instead of the unit it was raised for.
    pub fn for_unit(self, unit: impl Into<String>) -> Self {
        match self {
            TetherAccessError::EmptyAccessGrant { index, .. } => {
                TetherAccessError::EmptyAccessGrant {
                    unit: unit.into(),
                    index,
                }
            }
            TetherAccessError::MalformedResourceAccess { index, reason, .. } => {
                TetherAccessError::MalformedResourceAccess {
                    unit: unit.into(),
                    index,
                    reason,
                }
            }
            TetherAccessError::UnsupportedNotificationChannel { index, channel, .. } => {
                TetherAccessError::UnsupportedNotificationChannel {
                    unit: unit.into(),
                    index,
                    channel,
                }
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn it_reattributes_declaration_errors() {
        let error = TetherAccessError::EmptyAccessGrant {
            unit: "ordersConsumer".into(),
            index: 2,
        };
        assert_eq!(
            error.for_unit("orders"),
            TetherAccessError::EmptyAccessGrant {
                unit: "orders".into(),
                index: 2,
            }
        );

        assert_eq!(
            TetherAccessError::InvalidOptions("bad".into()).for_unit("orders"),
            TetherAccessError::InvalidOptions("bad".into())
        );
    }
}
