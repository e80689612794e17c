//! Error types for the render service

use thiserror::Error;

/// Result type alias for render operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while validating or rendering a diagram
#[derive(Error, Debug)]
pub enum Error {
    /// The incoming request was rejected before any browser work started
    #[error("{0}")]
    Validation(String),

    /// The browser binary could not be located or launched
    #[error("Browser launch failed: {0}")]
    Launch(String),

    /// Failed to load the scaffold document or the charting library
    #[error("Failed to load page: {0}")]
    LoadError(String),

    /// The charting library rejected the diagram text; carries its message as-is
    #[error("{0}")]
    Diagram(String),

    /// Failed to evaluate the in-page render function or read its reply
    #[error("Script execution failed: {0}")]
    ScriptError(String),

    /// The container element was not present when capturing
    #[error("Failed to render SVG container")]
    MissingContainer,

    /// Failed to resize the page or capture the screenshot
    #[error("Rendering failed: {0}")]
    RenderError(String),

    /// Operation timed out
    #[error("Operation timed out after {0}ms")]
    Timeout(u64),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// CDP-specific error
    #[error("CDP error: {0}")]
    CdpError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// HTTP status code this error is reported with.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Validation(_) => 400,
            _ => 500,
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::CdpError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_maps_to_client_error() {
        let err = Error::Validation("Missing \"code\"".into());
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.to_string(), "Missing \"code\"");
    }

    #[test]
    fn runtime_errors_map_to_server_error() {
        for err in [
            Error::Launch("no chrome".into()),
            Error::Diagram("Parse error on line 1".into()),
            Error::MissingContainer,
            Error::Timeout(60000),
        ] {
            assert_eq!(err.status_code(), 500);
        }
    }

    #[test]
    fn diagram_error_is_verbatim() {
        let err = Error::Diagram("Parse error on line 1:\ngraph TD; A-->".into());
        assert_eq!(err.to_string(), "Parse error on line 1:\ngraph TD; A-->");
    }

    #[test]
    fn anyhow_errors_become_cdp_errors() {
        let err: Error = anyhow::anyhow!("websocket closed").into();
        assert!(matches!(err, Error::CdpError(ref m) if m == "websocket closed"));
    }
}
