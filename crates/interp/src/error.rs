//! Runtime error type for the IR interpreter.

use pas_core::EvalError;

/// Error raised while executing IR.
///
/// Carries the instruction pointer at which execution stopped so the
/// driver can log it next to the state dump.
#[derive(Debug)]
pub struct RuntimeError {
    pub message: String,
    pub ip: usize,
}

impl RuntimeError {
    pub fn new(message: impl Into<String>, ip: usize) -> Self {
        RuntimeError {
            message: message.into(),
            ip,
        }
    }

    pub fn from_eval(err: EvalError, ip: usize) -> Self {
        RuntimeError {
            message: err.to_string(),
            ip,
        }
    }
}

impl std::fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (at IP={})", self.message, self.ip)
    }
}

impl std::error::Error for RuntimeError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_ip() {
        let err = RuntimeError::new("Division by zero", 7);
        assert_eq!(err.to_string(), "Division by zero (at IP=7)");
    }

    #[test]
    fn test_from_eval_keeps_message() {
        let err = RuntimeError::from_eval(EvalError::DivisionByZero, 3);
        assert!(err.to_string().contains("Division by zero"));
    }
}
