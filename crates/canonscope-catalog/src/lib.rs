//! canonscope catalog: harvesting catalog result pages and reading them back.

pub mod error;
pub mod harvest;
pub mod http;
pub mod parser;
pub mod query;
pub mod store;
pub mod tabulate;

pub use error::{CatalogError, Result};
pub use harvest::{HarvestOptions, HarvestReport, Harvester};
pub use http::{PageFetcher, RateLimitedClient};
pub use parser::{NoResults, ParsedPage, parse_page, parse_total_hits};
pub use query::{CatalogQuery, continuation_offsets};
pub use store::{PageRef, PageStore, WorkPages};
pub use tabulate::{TabulateReport, tabulate};
