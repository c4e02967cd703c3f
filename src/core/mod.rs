pub mod augmenter;
pub mod engine;
pub mod loader;
pub mod opportunities;
pub mod prompts;
pub mod report;
pub mod runner;
pub mod stages;

pub use crate::domain::model::{RunReport, VendorAnalysis, VendorOutcome, VendorRecord};
pub use crate::domain::ports::{LanguageModel, SearchProvider, Storage};
pub use crate::utils::error::Result;
