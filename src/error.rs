use crate::runtime::form::Form;

/// Errors surfaced by the bridge.
///
/// Every variant that reaches a caller is recoverable. Two failure modes are
/// deliberately absent: dereferencing a plain [`Handle`](crate::runtime::handle::Handle)
/// after its region closed, or in a region of another session, cannot be
/// expressed (the invariant region lifetime forbids both), and [`Handle::unchecked_cast`](crate::runtime::handle::Handle::unchecked_cast)
/// has no dynamic signal at all.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BridgeError {
    #[error("guest runtime is not initialized")]
    NotInitialized,
    #[error("guest runtime is already initialized")]
    AlreadyInitialized,
    #[error("guest runtime has been torn down")]
    TornDown,
    /// The guest evaluator raised an error. `message` is the guest's own
    /// formatted text and is never rewritten.
    #[error("{message}")]
    GuestRuntime { message: String },
    #[error("expected a {expected} value, got {actual}")]
    TypeMismatch { expected: Form, actual: Form },
    #[error("expected a vector of length {expected}, got length {actual}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("{form} value is NA and the host type has no missing value")]
    MissingValue { form: Form },
    #[error("handle used after its region was released")]
    UseAfterRegionRelease,
    #[error("timed out waiting for the guest worker")]
    Timeout,
    #[error("guest worker stopped")]
    WorkerStopped,
    #[error("cannot submit guest work from the guest worker itself")]
    Reentrant,
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl BridgeError {
    /// Stable error code, shown in rendered diagnostics.
    pub fn code(&self) -> &'static str {
        match self {
            BridgeError::NotInitialized => "E2001",
            BridgeError::AlreadyInitialized => "E2002",
            BridgeError::TornDown => "E2003",
            BridgeError::GuestRuntime { .. } => "E2010",
            BridgeError::TypeMismatch { .. } => "E2020",
            BridgeError::LengthMismatch { .. } => "E2021",
            BridgeError::MissingValue { .. } => "E2022",
            BridgeError::UseAfterRegionRelease => "E2030",
            BridgeError::Timeout => "E2040",
            BridgeError::WorkerStopped => "E2041",
            BridgeError::Reentrant => "E2042",
            BridgeError::Config(_) => "E2050",
        }
    }

    /// Renders the error as `error[CODE]: message`.
    pub fn render(&self) -> String {
        format!("error[{}]: {}", self.code(), self)
    }

    pub fn type_mismatch(expected: Form, actual: Form) -> Self {
        BridgeError::TypeMismatch { expected, actual }
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guest_errors_display_verbatim() {
        let err = BridgeError::GuestRuntime {
            message: "Error in f() :\n  boom".to_string(),
        };
        assert_eq!(err.to_string(), "Error in f() :\n  boom");
    }

    #[test]
    fn render_prefixes_code() {
        let err = BridgeError::type_mismatch(Form::Real, Form::Int);
        assert_eq!(
            err.render(),
            "error[E2020]: expected a double value, got integer"
        );
    }

    #[test]
    fn codes_are_unique() {
        let all = [
            BridgeError::NotInitialized,
            BridgeError::AlreadyInitialized,
            BridgeError::TornDown,
            BridgeError::GuestRuntime {
                message: String::new(),
            },
            BridgeError::type_mismatch(Form::Nil, Form::Nil),
            BridgeError::LengthMismatch {
                expected: 1,
                actual: 0,
            },
            BridgeError::MissingValue { form: Form::Real },
            BridgeError::UseAfterRegionRelease,
            BridgeError::Timeout,
            BridgeError::WorkerStopped,
            BridgeError::Reentrant,
            BridgeError::Config(String::new()),
        ];
        let mut codes: Vec<_> = all.iter().map(BridgeError::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), all.len());
    }
}
