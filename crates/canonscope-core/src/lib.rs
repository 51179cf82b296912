//! canonscope core: config, metadata table, reprint matrix and canonicity classification.

pub mod aggregate;
pub mod classify;
pub mod config;
pub mod error;
pub mod matrix;
pub mod metadata;
pub mod models;
pub mod years;

pub use aggregate::{PublicationYears, excluded_ordinals, fold_pages};
pub use classify::{CanonStatus, CanonSummary, Classifier, write_summary};
pub use config::{AppConfig, Locale};
pub use error::{CanonError, ExitCode, Result};
pub use matrix::YearMatrix;
pub use models::*;
pub use years::{UNKNOWN_YEAR, YearWindow, normalize_year};
