use crate::adapters::ChatModelConfig;
use crate::config::SelectorStrategy;
use crate::core::alignment::{DEFAULT_CONCURRENCY_PROFILE, DEFAULT_MAX_PARALLEL_SEARCH};
use crate::domain::ports::ConfigProvider;
use crate::utils::error::{AlignError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignConfig {
    pub project: ProjectConfig,
    pub search: SearchConfig,
    #[serde(default)]
    pub alignment: AlignmentConfig,
    #[serde(default)]
    pub selector: SelectorConfig,
    pub llm: Option<LlmConfig>,
    #[serde(default)]
    pub input: InputConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
    pub description: Option<String>,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub endpoint: String,
    pub timeout_seconds: Option<u64>,
    pub headers: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlignmentConfig {
    pub concurrency_profile: Option<usize>,
    pub max_parallel_search: Option<usize>,
    pub search_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectorConfig {
    #[serde(default)]
    pub strategy: SelectorStrategy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: Option<f32>,
    pub timeout_seconds: Option<u64>,
}

impl LlmConfig {
    pub fn to_model_config(&self) -> ChatModelConfig {
        ChatModelConfig {
            endpoint: self.endpoint.clone(),
            api_key: self.api_key.clone().filter(|key| !key.trim().is_empty()),
            model: self.model.clone(),
            temperature: self.temperature.unwrap_or(0.0),
            timeout: Duration::from_secs(self.timeout_seconds.unwrap_or(60)),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputConfig {
    #[serde(default)]
    pub datasets: Vec<String>,
    pub paper: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub output_path: String,
    pub report_filename: Option<String>,
}

impl AlignConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置，先替換 `${VAR}` 環境變數
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = Self::substitute_env_vars(content)?;

        toml::from_str(&processed).map_err(|e| AlignError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| AlignError::ConfigError {
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.into_owned())
    }

    pub fn selector_strategy(&self) -> SelectorStrategy {
        self.selector.strategy
    }

    pub fn search_headers(&self) -> HashMap<String, String> {
        self.search.headers.clone().unwrap_or_default()
    }

    pub fn search_request_timeout(&self) -> Option<Duration> {
        self.search.timeout_seconds.map(Duration::from_secs)
    }

    pub fn chat_model(&self) -> Option<ChatModelConfig> {
        self.llm.as_ref().map(LlmConfig::to_model_config)
    }
}

impl ConfigProvider for AlignConfig {
    fn search_endpoint(&self) -> &str {
        &self.search.endpoint
    }

    fn output_path(&self) -> &str {
        &self.output.output_path
    }

    fn dataset_files(&self) -> &[String] {
        &self.input.datasets
    }

    fn paper_file(&self) -> Option<&str> {
        self.input.paper.as_deref()
    }

    fn concurrency_profile(&self) -> usize {
        self.alignment
            .concurrency_profile
            .unwrap_or(DEFAULT_CONCURRENCY_PROFILE)
    }

    fn max_parallel_search(&self) -> usize {
        self.alignment
            .max_parallel_search
            .unwrap_or(DEFAULT_MAX_PARALLEL_SEARCH)
    }

    fn search_timeout(&self) -> Option<Duration> {
        self.alignment.search_timeout_seconds.map(Duration::from_secs)
    }

    fn report_filename(&self) -> &str {
        self.output
            .report_filename
            .as_deref()
            .unwrap_or("alignment_report.zip")
    }
}

impl Validate for AlignConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_non_empty_string("project.name", &self.project.name)?;
        validation::validate_url("search.endpoint", &self.search.endpoint)?;
        validation::validate_path("output.output_path", &self.output.output_path)?;
        validation::validate_file_extensions("input.datasets", &self.input.datasets, &["json"])?;

        if let Some(profile) = self.alignment.concurrency_profile {
            validation::validate_range("alignment.concurrency_profile", profile, 1, 64)?;
        }
        if let Some(max_parallel) = self.alignment.max_parallel_search {
            validation::validate_range("alignment.max_parallel_search", max_parallel, 1, 64)?;
        }
        if let Some(seconds) = self.search.timeout_seconds {
            validation::validate_positive_number("search.timeout_seconds", seconds, 1)?;
        }
        if let Some(seconds) = self.alignment.search_timeout_seconds {
            validation::validate_positive_number("alignment.search_timeout_seconds", seconds, 1)?;
        }

        if self.selector.strategy == SelectorStrategy::Llm {
            let llm = validation::validate_required_field("llm", &self.llm)?;
            validation::validate_url("llm.endpoint", &llm.endpoint)?;
            validation::validate_non_empty_string("llm.model", &llm.model)?;
            if let Some(seconds) = llm.timeout_seconds {
                validation::validate_positive_number("llm.timeout_seconds", seconds, 1)?;
            }
            if let Some(temperature) = llm.temperature {
                validation::validate_range("llm.temperature", temperature, 0.0, 2.0)?;
            }
        }

        tracing::debug!("Configuration '{}' validated", self.project.name);
        Ok(())
    }
}
