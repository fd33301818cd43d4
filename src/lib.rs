pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::{build_selector, toml_config::AlignConfig, SelectorStrategy};

pub use adapters::{ChatCompletionModel, ChatModelConfig, HttpFlowSearch, LocalStorage};
pub use core::alignment::{align_exchanges, AlignmentSettings, FlowAlignmentService};
pub use core::selector::{CandidateSelector, LlmCandidateSelector, SimilarityCandidateSelector};
pub use core::{engine::AlignmentEngine, pipeline::AlignmentPipeline};
pub use utils::error::{AlignError, Result};
