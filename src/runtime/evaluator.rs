use std::fmt;

use crate::{
    error::BridgeError,
    runtime::{form::forms, handle::Handle, region::Region},
};

/// The guest language front end a session runs.
///
/// Both methods run on the guest thread inside an open region. Everything
/// they allocate must go through `region` so it is protected until the
/// caller's region closes.
pub trait Evaluator {
    /// Parses `source` into an expression vector, one element per top-level
    /// expression.
    fn parse<'r>(
        &self,
        region: &Region<'r>,
        source: &str,
    ) -> Result<Handle<'r, forms::Expr>, BridgeError>;

    /// Evaluates one expression in `env`.
    fn eval<'r>(
        &self,
        region: &Region<'r>,
        expr: Handle<'r>,
        env: Handle<'r, forms::Env>,
    ) -> Result<Handle<'r>, BridgeError>;
}

/// A condition raised by guest code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestError {
    /// Deparsed call the error was raised in, if any.
    pub call: Option<String>,
    pub message: String,
}

impl GuestError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            call: None,
            message: message.into(),
        }
    }

    pub fn in_call(call: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            call: Some(call.into()),
            message: message.into(),
        }
    }
}

/// Renders the way the guest prints an uncaught error.
impl fmt::Display for GuestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.call {
            Some(call) => write!(f, "Error in {} :\n  {}", call, self.message),
            None => write!(f, "Error: {}", self.message),
        }
    }
}

impl From<GuestError> for BridgeError {
    fn from(err: GuestError) -> Self {
        BridgeError::GuestRuntime {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_with_call() {
        let err = GuestError::in_call("f(1)", "bad");
        assert_eq!(err.to_string(), "Error in f(1) :\n  bad");
    }

    #[test]
    fn renders_without_call() {
        let err: BridgeError = GuestError::new("object 'y' not found").into();
        assert_eq!(err.to_string(), "Error: object 'y' not found");
        assert_eq!(err.code(), "E2010");
    }
}
