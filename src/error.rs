//! Failure taxonomy for a single sample render.
//!
//! None of these escape [`Sandbox::render`](crate::Sandbox::render): they are
//! written into the mount surface, or logged when there is no surface.

use thiserror::Error;

/// Why a sample could not be mounted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SandboxError {
    /// The transpiler reported at least one diagnostic. Holds the first one.
    #[error("{0}")]
    Compile(String),

    /// The sample asked for a module outside the allow-list.
    #[error("Cannot import '{specifier}' here: only @stylix/core and @stylix/tinyprops are available")]
    ImportViolation { specifier: String },

    /// The sample threw (or was terminated) while building its UI.
    #[error("{0}")]
    Evaluation(String),

    /// There is no surface to mount into or to report on.
    #[error("Mount target is missing")]
    TargetMissing,
}

impl SandboxError {
    /// Short stable name, used in logs and the server protocol.
    pub fn kind(&self) -> &'static str {
        match self {
            SandboxError::Compile(_) => "compile",
            SandboxError::ImportViolation { .. } => "import",
            SandboxError::Evaluation(_) => "evaluation",
            SandboxError::TargetMissing => "target-missing",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_violation_names_specifier() {
        let err = SandboxError::ImportViolation {
            specifier: "fs".to_string(),
        };
        assert!(err.to_string().contains("'fs'"));
        assert_eq!(err.kind(), "import");
    }

    #[test]
    fn test_compile_message_is_verbatim() {
        let err = SandboxError::Compile("Expression expected".to_string());
        assert_eq!(err.to_string(), "Expression expected");
    }
}
