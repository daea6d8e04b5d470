pub mod alerted_set;
pub mod analyzer;
pub mod config;
pub mod dashboard;
pub mod decision;
pub mod engagement_store;
pub mod html;
pub mod logging;
pub mod metrics;
pub mod notify;
pub mod run_lock;
pub mod runner;
pub mod scanner;
pub mod sources;
pub mod state;

pub use decision::{AlertEngine, AlertThresholds};
pub use runner::{run_monitor, RunOptions, RunReport};
pub use scanner::TrendScanner;
