// Adapters layer: concrete implementations of the domain ports (http, storage).

pub mod http_search;
pub mod llm;
pub mod storage;

pub use http_search::HttpFlowSearch;
pub use llm::{ChatCompletionModel, ChatModelConfig};
pub use storage::LocalStorage;
