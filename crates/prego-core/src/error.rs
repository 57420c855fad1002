//! Unified Error Model
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PregoError {
    #[error("CONFIG/{0}")]
    Config(String),

    #[error("COMPILE/{0}")]
    Compile(String),

    #[error("EVAL/{0}")]
    Evaluation(String),

    #[error("DECODE/line {line}: {message}")]
    Decode { line: u64, message: String },

    #[error("STATE/can't find {binding} in bindings: {bindings}")]
    MissingBinding { binding: String, bindings: String },

    #[error("OUTPUT/{0}")]
    Output(String),

    #[error("IO/{0}")]
    Io(#[from] std::io::Error),

    #[error("PIPELINE/{0}")]
    Pipeline(String),
}

impl PregoError {
    /// Errors raised before the first event is read.
    pub fn is_startup(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Compile(_))
    }
}

pub type Result<T, E = PregoError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_prefixes() {
        assert_eq!(
            PregoError::Config("policy file not found: a.rego".into()).to_string(),
            "CONFIG/policy file not found: a.rego"
        );
        let decode = PregoError::Decode {
            line: 3,
            message: "expected value".into(),
        };
        assert_eq!(decode.to_string(), "DECODE/line 3: expected value");
    }

    #[test]
    fn test_startup_classification() {
        assert!(PregoError::Compile("x".into()).is_startup());
        assert!(!PregoError::Evaluation("x".into()).is_startup());
    }
}
