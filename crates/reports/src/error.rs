use thiserror::Error;

/// Error type for report resolution and rendering.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("unknown report: {0}")]
    UnknownReport(String),

    #[error("variant '{variant}' is not supported for report '{title}'")]
    UnsupportedVariant { title: String, variant: String },

    #[error("render failed: {0}")]
    Failed(String),
}

impl RenderError {
    pub fn failed(message: impl Into<String>) -> Self {
        RenderError::Failed(message.into())
    }
}
