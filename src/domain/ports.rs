use crate::domain::model::{AlignmentResult, FlowQuery, SearchOutcome};
use crate::utils::error::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn search_endpoint(&self) -> &str;
    fn output_path(&self) -> &str;
    fn dataset_files(&self) -> &[String];
    fn paper_file(&self) -> Option<&str>;
    fn concurrency_profile(&self) -> usize;
    fn max_parallel_search(&self) -> usize;
    fn search_timeout(&self) -> Option<Duration>;
    fn report_filename(&self) -> &str {
        "alignment_report.zip"
    }
}

/// 遠端流目錄搜尋。
///
/// 只有 `AlignError::Search` 與 `AlignError::SearchTimeout` 會被視為可重試。
#[async_trait]
pub trait FlowSearch: Send + Sync {
    async fn search(&self, query: &FlowQuery) -> Result<SearchOutcome>;
}

#[derive(Debug, Clone, Serialize)]
pub struct OracleRequest {
    pub prompt: String,
    pub context: String,
}

/// 語言模型。回傳字串時由呼叫端解析為 JSON。
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn invoke(&self, request: &OracleRequest) -> Result<Value>;
}

#[derive(Debug, Clone)]
pub struct ProcessDataset {
    pub source: String,
    pub data: Value,
}

#[derive(Debug, Clone)]
pub struct ExtractedInput {
    pub datasets: Vec<ProcessDataset>,
    pub paper_md: Option<String>,
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<ExtractedInput>;
    async fn transform(&self, input: ExtractedInput) -> Result<Vec<AlignmentResult>>;
    async fn load(&self, results: Vec<AlignmentResult>) -> Result<String>;
}
