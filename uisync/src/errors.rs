use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AutomationError {
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Platform-specific error: {0}")]
    PlatformError(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Element position is not stable: {0}")]
    ElementNotStable(String),

    #[error("Scrollbar tracking failed: {0}")]
    ScrollFailed(String),

    /// A blocking dialog could not be cleared and the workflow could not be
    /// returned to its resumption stage.
    #[error("Workflow interrupted: {0}")]
    InterruptedWorkflow(String),

    #[error("Navigation could not be verified: {0}")]
    VerificationTimeout(String),

    #[error("Clipboard error: {0}")]
    Clipboard(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl AutomationError {
    /// Cancellation is a clean early exit, not a failure of the document.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, AutomationError::Cancelled)
    }
}
