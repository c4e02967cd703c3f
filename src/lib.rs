pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use config::{cli::LocalStorage, PipelineConfig};

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use core::{
    augmenter::SearchAugmenter,
    engine::VendorAnalysisEngine,
    opportunities::OpportunityAnalyzer,
    runner::StageRunner,
    stages::RetryPolicy,
};
pub use utils::error::{Result, VendorAiError};
