pub mod alignment;
pub mod dataset;
pub mod engine;
pub mod pipeline;
pub mod report;
pub mod selector;

pub use crate::domain::model::{
    AlignmentResult, FlowCandidate, FlowQuery, SearchOutcome, SelectorDecision, UnmatchedFlow,
};
pub use crate::domain::ports::{ConfigProvider, FlowSearch, LanguageModel, Pipeline, Storage};
pub use crate::utils::error::Result;
