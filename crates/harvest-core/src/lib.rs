pub mod classifier;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod frontier;
pub mod orchestrator;
pub mod run_log;
pub mod store;
pub mod throttle;
pub mod traits;

#[cfg(test)]
pub mod testutil;

pub use error::AppError;
pub use frontier::{
    FrontierEntry, FrontierStats, NewFrontierEntry, RetryConfig, UrlStatus, UrlType,
};
pub use store::{BatchInsertReport, FrontierStore, InsertOutcome};
pub use traits::{Fetcher, LabeledLink, LinkExtractor, LinkLabel, SemanticExtractor};
