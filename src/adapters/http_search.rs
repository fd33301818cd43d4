use crate::domain::model::{FlowQuery, SearchOutcome};
use crate::domain::ports::FlowSearch;
use crate::utils::error::{AlignError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: String,
    exchange_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    process_name: Option<&'a str>,
}

/// 以 HTTP POST 呼叫遠端流目錄搜尋服務
pub struct HttpFlowSearch {
    client: Client,
    endpoint: String,
    headers: HashMap<String, String>,
}

impl HttpFlowSearch {
    pub fn new(endpoint: impl Into<String>, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            endpoint: endpoint.into(),
            headers: HashMap::new(),
        })
    }

    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = headers;
        self
    }
}

#[async_trait]
impl FlowSearch for HttpFlowSearch {
    async fn search(&self, query: &FlowQuery) -> Result<SearchOutcome> {
        let body = SearchRequest {
            query: query.search_text(),
            exchange_name: &query.exchange_name,
            description: query.description.as_deref(),
            process_name: query.process_name.as_deref(),
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        for (key, value) in &self.headers {
            request = request.header(key, value);
        }

        tracing::debug!("📡 Searching flows for '{}'", query.exchange_name);
        let response = request.send().await.map_err(|e| AlignError::Search {
            message: format!("request to {} failed: {}", self.endpoint, e),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AlignError::Search {
                message: format!("search service returned {}", status),
            });
        }

        let bytes = response.bytes().await.map_err(|e| AlignError::Search {
            message: format!("failed to read search response: {}", e),
        })?;
        let outcome: SearchOutcome = serde_json::from_slice(&bytes)?;

        tracing::debug!(
            "📡 '{}': {} candidates from catalogue",
            query.exchange_name,
            outcome.candidates.len()
        );
        Ok(outcome)
    }
}
