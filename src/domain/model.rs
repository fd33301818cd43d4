use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// 單一 exchange 的搜尋鍵，建立後不再變動
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowQuery {
    pub exchange_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_name: Option<String>,
    /// 同一份論文在所有 query 之間共用
    #[serde(default, skip_serializing)]
    pub paper_md: Option<Arc<str>>,
}

impl FlowQuery {
    pub fn new(exchange_name: impl Into<String>) -> Self {
        Self {
            exchange_name: exchange_name.into(),
            description: None,
            process_name: None,
            paper_md: None,
        }
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    pub fn with_process_name(mut self, process_name: Option<String>) -> Self {
        self.process_name = process_name;
        self
    }

    pub fn with_paper(mut self, paper_md: Option<Arc<str>>) -> Self {
        self.paper_md = paper_md;
        self
    }

    /// 送往遠端目錄的查詢文字
    pub fn search_text(&self) -> String {
        match self.description.as_deref().map(str::trim) {
            Some(desc) if !desc.is_empty() => format!("{}; {}", self.exchange_name, desc),
            _ => self.exchange_name.clone(),
        }
    }
}

/// 流目錄中的一筆候選
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowCandidate {
    #[serde(default, alias = "id", alias = "@uuid")]
    pub uuid: String,
    #[serde(alias = "baseName")]
    pub base_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geography: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<Value>,
    #[serde(default, alias = "generalComment", skip_serializing_if = "Option::is_none")]
    pub general_comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default, alias = "casNumber", skip_serializing_if = "Option::is_none")]
    pub cas: Option<String>,
    #[serde(default, alias = "flowType", skip_serializing_if = "Option::is_none")]
    pub flow_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FlowCandidate {
    pub fn new(uuid: impl Into<String>, base_name: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            base_name: base_name.into(),
            geography: None,
            classification: None,
            general_comment: None,
            reasoning: None,
            cas: None,
            flow_type: None,
            version: None,
            extra: Map::new(),
        }
    }
}

/// 找不到可接受候選的 exchange，僅供下游報告使用
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnmatchedFlow {
    #[serde(alias = "baseName")]
    pub base_name: String,
    #[serde(default, alias = "generalComment", skip_serializing_if = "Option::is_none")]
    pub general_comment: Option<String>,
    #[serde(default, alias = "processName", skip_serializing_if = "Option::is_none")]
    pub process_name: Option<String>,
}

/// 搜尋協作者回傳的 (candidates, unmatched)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchOutcome {
    #[serde(default)]
    pub candidates: Vec<FlowCandidate>,
    #[serde(default)]
    pub unmatched: Vec<UnmatchedFlow>,
}

impl SearchOutcome {
    pub fn new(candidates: Vec<FlowCandidate>, unmatched: Vec<UnmatchedFlow>) -> Self {
        Self {
            candidates,
            unmatched,
        }
    }
}

/// 一次候選挑選的結果。`candidate == None` 代表全部被拒絕。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectorDecision {
    pub candidate: Option<FlowCandidate>,
    pub score: Option<f64>,
    pub reasoning: Option<String>,
    pub strategy: &'static str,
}

impl SelectorDecision {
    pub fn rejected(strategy: &'static str) -> Self {
        Self {
            candidate: None,
            score: None,
            reasoning: None,
            strategy,
        }
    }
}

/// 單一 process dataset 的對齊結果。
///
/// `matched_flows` 與 `unmatched_flows` 依搜尋完成順序排列，不保證與輸入順序一致。
#[derive(Debug, Clone, Default, Serialize)]
pub struct AlignmentResult {
    pub process_name: String,
    pub matched_flows: Vec<FlowCandidate>,
    pub unmatched_flows: Vec<UnmatchedFlow>,
    pub origin_exchanges: HashMap<String, Vec<Value>>,
}

impl AlignmentResult {
    pub fn new(process_name: impl Into<String>) -> Self {
        Self {
            process_name: process_name.into(),
            ..Default::default()
        }
    }

    pub fn matched_count(&self) -> usize {
        self.matched_flows.len()
    }

    pub fn unmatched_count(&self) -> usize {
        self.unmatched_flows.len()
    }

    /// exchange 是否出現在任一結果桶
    pub fn covers(&self, exchange_name: &str) -> bool {
        self.origin_exchanges.contains_key(exchange_name)
            || self
                .unmatched_flows
                .iter()
                .any(|flow| flow.base_name == exchange_name)
    }
}
