use thiserror::Error;

/// All errors that can occur in canonscope-core.
#[derive(Debug, Error)]
pub enum CanonError {
    #[error("Unknown language code: {0} (set catalog.catalog_lang and catalog.hit_label to use it)")]
    UnknownLanguage(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Invalid year window {first}-{last}: {reason}")]
    InvalidWindow { first: i32, last: i32, reason: String },

    #[error("Malformed table {path}: {message}")]
    MalformedTable { path: String, message: String },

    #[error("TEI document {path} has no {field}")]
    MissingTeiField { path: String, field: &'static str },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// Exit codes used by the CLI.
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    NotFound = 2,
    InvalidArgs = 3,
    FileSystemError = 4,
    NetworkError = 6,
}

pub type Result<T> = std::result::Result<T, CanonError>;
