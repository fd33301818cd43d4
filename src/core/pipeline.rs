use crate::core::alignment::{AlignmentSettings, FlowAlignmentService};
use crate::core::report;
use crate::core::selector::CandidateSelector;
use crate::domain::model::AlignmentResult;
use crate::domain::ports::{
    ConfigProvider, ExtractedInput, FlowSearch, Pipeline, ProcessDataset, Storage,
};
use crate::utils::error::{AlignError, Result};
use serde_json::Value;
use std::sync::Arc;

/// 讀取 dataset 檔案、逐一對齊、輸出報告
pub struct AlignmentPipeline<S: Storage, C: ConfigProvider> {
    storage: S,
    config: C,
    search: Arc<dyn FlowSearch>,
    selector: Option<Arc<CandidateSelector>>,
}

impl<S: Storage, C: ConfigProvider> AlignmentPipeline<S, C> {
    pub fn new(storage: S, config: C, search: Arc<dyn FlowSearch>) -> Self {
        Self {
            storage,
            config,
            search,
            selector: None,
        }
    }

    pub fn with_selector(mut self, selector: Option<CandidateSelector>) -> Self {
        self.selector = selector.map(Arc::new);
        self
    }

    async fn read_datasets(&self, path: &str) -> Result<Vec<ProcessDataset>> {
        let bytes = self.storage.read_file(path).await?;
        let data: Value = serde_json::from_slice(&bytes)?;

        // 一個檔案可以是單一 dataset，也可以是 dataset 陣列
        let datasets = match data {
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(index, data)| ProcessDataset {
                    source: format!("{}#{}", path, index),
                    data,
                })
                .collect(),
            data => vec![ProcessDataset {
                source: path.to_string(),
                data,
            }],
        };

        Ok(datasets)
    }

    async fn align_all(
        service: &FlowAlignmentService,
        input: &ExtractedInput,
    ) -> Result<Vec<AlignmentResult>> {
        let mut results = Vec::with_capacity(input.datasets.len());
        for dataset in &input.datasets {
            tracing::info!("🧪 Aligning dataset {}", dataset.source);
            let result = service
                .align_exchanges(&dataset.data, input.paper_md.as_deref())
                .await
                .map_err(|e| {
                    tracing::error!("❌ {}: {}", dataset.source, e);
                    e
                })?;
            results.push(result);
        }
        Ok(results)
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for AlignmentPipeline<S, C> {
    async fn extract(&self) -> Result<ExtractedInput> {
        let files = self.config.dataset_files();
        if files.is_empty() {
            return Err(AlignError::MissingConfigError {
                field: "datasets".to_string(),
            });
        }

        let mut datasets = Vec::new();
        for path in files {
            datasets.extend(self.read_datasets(path).await?);
        }

        let paper_md = match self.config.paper_file() {
            Some(path) => {
                let bytes = self.storage.read_file(path).await?;
                let text = String::from_utf8(bytes).map_err(|e| AlignError::ProcessingError {
                    message: format!("Paper {} is not valid UTF-8: {}", path, e),
                })?;
                Some(text)
            }
            None => None,
        };

        tracing::debug!(
            "Loaded {} datasets (paper attached: {})",
            datasets.len(),
            paper_md.is_some()
        );
        Ok(ExtractedInput { datasets, paper_md })
    }

    async fn transform(&self, input: ExtractedInput) -> Result<Vec<AlignmentResult>> {
        let settings = AlignmentSettings::from_config(&self.config);
        let mut service = FlowAlignmentService::new(Arc::clone(&self.search), settings);
        if let Some(selector) = &self.selector {
            service = service.with_selector(Arc::clone(selector));
        }

        let results = Self::align_all(&service, &input).await;
        service.close();
        results
    }

    async fn load(&self, results: Vec<AlignmentResult>) -> Result<String> {
        let bytes = report::build_report(&results)?;
        let output_path = format!(
            "{}/{}",
            self.config.output_path().trim_end_matches('/'),
            self.config.report_filename()
        );

        tracing::debug!("Writing report ({} bytes) to {}", bytes.len(), output_path);
        self.storage.write_file(&output_path, &bytes).await?;
        Ok(output_path)
    }
}
