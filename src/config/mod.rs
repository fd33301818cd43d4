pub mod toml_config;

use crate::adapters::{ChatCompletionModel, ChatModelConfig};
use crate::core::selector::CandidateSelector;
use crate::utils::error::{AlignError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[cfg(feature = "cli")]
use crate::core::alignment::{DEFAULT_CONCURRENCY_PROFILE, DEFAULT_MAX_PARALLEL_SEARCH};
#[cfg(feature = "cli")]
use crate::domain::ports::ConfigProvider;
#[cfg(feature = "cli")]
use crate::utils::validation::{self, Validate};
#[cfg(feature = "cli")]
use clap::Parser;
#[cfg(feature = "cli")]
use std::time::Duration;

/// 候選挑選策略；`none` 代表保留搜尋回傳的所有候選
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum SelectorStrategy {
    #[serde(rename = "none")]
    #[cfg_attr(feature = "cli", value(name = "none"))]
    Disabled,
    #[default]
    Similarity,
    Llm,
}

pub fn build_selector(
    strategy: SelectorStrategy,
    chat_model: Option<ChatModelConfig>,
) -> Result<Option<CandidateSelector>> {
    match strategy {
        SelectorStrategy::Disabled => Ok(None),
        SelectorStrategy::Similarity => Ok(Some(CandidateSelector::similarity())),
        SelectorStrategy::Llm => {
            let config = chat_model.ok_or_else(|| AlignError::MissingConfigError {
                field: "llm".to_string(),
            })?;
            let model = ChatCompletionModel::new(config)?;
            Ok(Some(CandidateSelector::llm(Arc::new(model))))
        }
    }
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "lca-align")]
#[command(about = "Align LCA process exchanges against a flow catalogue")]
pub struct CliConfig {
    /// TOML configuration file; flags below are ignored when given
    #[arg(short, long)]
    pub config: Option<String>,

    #[arg(long, value_delimiter = ',')]
    pub dataset: Vec<String>,

    /// Paper markdown passed along with every query
    #[arg(long)]
    pub paper: Option<String>,

    #[arg(long, default_value = "http://localhost:8080/flows/search")]
    pub search_endpoint: String,

    #[arg(long, default_value = "./output")]
    pub output_path: String,

    #[arg(long, default_value_t = DEFAULT_CONCURRENCY_PROFILE)]
    pub concurrency_profile: usize,

    #[arg(long, default_value_t = DEFAULT_MAX_PARALLEL_SEARCH)]
    pub max_parallel_search: usize,

    /// Per-search timeout in seconds
    #[arg(long)]
    pub search_timeout: Option<u64>,

    #[arg(long, value_enum, default_value = "similarity")]
    pub selector: SelectorStrategy,

    #[arg(long, default_value = "https://api.openai.com/v1")]
    pub llm_endpoint: String,

    #[arg(long, default_value = "gpt-4o-mini")]
    pub llm_model: String,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub json_logs: bool,
}

#[cfg(feature = "cli")]
impl CliConfig {
    /// API key 只從環境變數讀取，避免出現在指令列歷史中
    pub fn chat_model(&self) -> ChatModelConfig {
        ChatModelConfig {
            endpoint: self.llm_endpoint.clone(),
            api_key: std::env::var("LCA_ALIGN_LLM_API_KEY").ok(),
            model: self.llm_model.clone(),
            temperature: 0.0,
            timeout: Duration::from_secs(60),
        }
    }
}

#[cfg(feature = "cli")]
impl ConfigProvider for CliConfig {
    fn search_endpoint(&self) -> &str {
        &self.search_endpoint
    }

    fn output_path(&self) -> &str {
        &self.output_path
    }

    fn dataset_files(&self) -> &[String] {
        &self.dataset
    }

    fn paper_file(&self) -> Option<&str> {
        self.paper.as_deref()
    }

    fn concurrency_profile(&self) -> usize {
        self.concurrency_profile
    }

    fn max_parallel_search(&self) -> usize {
        self.max_parallel_search
    }

    fn search_timeout(&self) -> Option<Duration> {
        self.search_timeout.map(Duration::from_secs)
    }
}

#[cfg(feature = "cli")]
impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        if self.dataset.is_empty() {
            return Err(AlignError::MissingConfigError {
                field: "dataset".to_string(),
            });
        }
        validation::validate_file_extensions("dataset", &self.dataset, &["json"])?;
        validation::validate_url("search_endpoint", &self.search_endpoint)?;
        validation::validate_path("output_path", &self.output_path)?;
        validation::validate_range("concurrency_profile", self.concurrency_profile, 1, 64)?;
        validation::validate_range("max_parallel_search", self.max_parallel_search, 1, 64)?;
        if let Some(seconds) = self.search_timeout {
            validation::validate_positive_number("search_timeout", seconds, 1)?;
        }
        if self.selector == SelectorStrategy::Llm {
            validation::validate_url("llm_endpoint", &self.llm_endpoint)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_selector_variants() {
        assert!(build_selector(SelectorStrategy::Disabled, None).unwrap().is_none());
        assert!(matches!(
            build_selector(SelectorStrategy::Similarity, None).unwrap(),
            Some(CandidateSelector::Similarity(_))
        ));
        assert!(matches!(
            build_selector(SelectorStrategy::Llm, None),
            Err(AlignError::MissingConfigError { .. })
        ));
    }

    #[test]
    fn test_strategy_names() {
        let parsed: SelectorStrategy = serde_json::from_str("\"llm\"").unwrap();
        assert_eq!(parsed, SelectorStrategy::Llm);
        assert_eq!(SelectorStrategy::default(), SelectorStrategy::Similarity);
    }

    #[cfg(feature = "cli")]
    #[test]
    fn test_cli_parsing_and_validation() {
        let config = CliConfig::parse_from([
            "lca-align",
            "--dataset",
            "a.json,b.json",
            "--max-parallel-search",
            "2",
            "--selector",
            "none",
        ]);

        assert_eq!(config.dataset_files().len(), 2);
        assert_eq!(config.max_parallel_search(), 2);
        assert_eq!(config.selector, SelectorStrategy::Disabled);
        assert!(config.validate().is_ok());

        let no_dataset = CliConfig::parse_from(["lca-align"]);
        assert!(no_dataset.validate().is_err());

        let zero_timeout =
            CliConfig::parse_from(["lca-align", "--dataset", "a.json", "--search-timeout", "0"]);
        assert!(zero_timeout.validate().is_err());
    }
}
