use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Ops! There is no DOM element matching \"{selector}\" selector.")]
    NoSuchElement { selector: String },
    #[error("Invalid selector \"{selector}\": {reason}")]
    InvalidSelector { selector: String, reason: String },
    #[error("Expected HTML with a single parent element, found {found}")]
    SingleRootViolation { found: usize },
    #[error("Rendered markup has no export named \"{name}\"")]
    MissingExport { name: String },
    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
    #[error("Browser error: {0}")]
    Browser(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
