use crate::core::dataset;
use crate::domain::model::{FlowCandidate, FlowQuery, SelectorDecision};
use crate::domain::ports::{LanguageModel, OracleRequest};
use crate::utils::error::{AlignError, Result};
use crate::utils::json::parse_json_response;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

/// 每次挑選最多考慮的候選數
pub const MAX_CANDIDATES: usize = 10;

const SELECTION_PROMPT: &str = "You match an exchange extracted from an LCA paper to a flow \
from a reference catalogue. Read the exchange and the numbered candidates in the context. \
Answer with strict JSON only: {\"best_index\": <candidate index or null>, \
\"confidence\": <number between 0 and 1>, \"reason\": \"<short explanation>\"}. \
Use null for best_index when no candidate describes the same flow.";

/// 候選挑選策略的共同介面。實作不可回傳錯誤，也不可修改輸入。
#[async_trait]
pub trait SelectCandidate: Send + Sync {
    fn name(&self) -> &'static str;

    async fn select(
        &self,
        query: &FlowQuery,
        exchange: &Value,
        candidates: &[FlowCandidate],
    ) -> SelectorDecision;
}

/// 以名稱的字串相似度排序，不呼叫外部服務
#[derive(Debug, Clone, Copy, Default)]
pub struct SimilarityCandidateSelector;

impl SimilarityCandidateSelector {
    pub const NAME: &'static str = "similarity";

    pub fn new() -> Self {
        Self
    }

    /// 正規化後的 Levenshtein 相似度；任一邊為空時為 0
    pub fn score(left: &str, right: &str) -> f64 {
        let left = left.trim().to_lowercase();
        let right = right.trim().to_lowercase();
        if left.is_empty() || right.is_empty() {
            return 0.0;
        }
        strsim::normalized_levenshtein(&left, &right)
    }

    pub fn rank(&self, query: &FlowQuery, candidates: &[FlowCandidate]) -> SelectorDecision {
        let mut best: Option<(&FlowCandidate, f64)> = None;

        for candidate in candidates.iter().take(MAX_CANDIDATES) {
            let score = Self::score(&query.exchange_name, &candidate.base_name);
            // 同分時保留先出現者
            if best.map_or(true, |(_, best_score)| score > best_score) {
                best = Some((candidate, score));
            }
        }

        match best {
            Some((candidate, score)) if score > 0.0 => SelectorDecision {
                candidate: Some(candidate.clone()),
                score: Some(score),
                reasoning: Some(format!(
                    "name similarity {:.3} between '{}' and '{}'",
                    score, query.exchange_name, candidate.base_name
                )),
                strategy: Self::NAME,
            },
            _ => SelectorDecision::rejected(Self::NAME),
        }
    }
}

#[async_trait]
impl SelectCandidate for SimilarityCandidateSelector {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn select(
        &self,
        query: &FlowQuery,
        _exchange: &Value,
        candidates: &[FlowCandidate],
    ) -> SelectorDecision {
        self.rank(query, candidates)
    }
}

/// 交給語言模型排序；任何失敗都改用 fallback 選擇器
pub struct LlmCandidateSelector {
    model: Arc<dyn LanguageModel>,
    fallback: Box<CandidateSelector>,
}

impl LlmCandidateSelector {
    pub const NAME: &'static str = "llm";

    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self::with_fallback(model, CandidateSelector::Similarity(SimilarityCandidateSelector))
    }

    pub fn with_fallback(model: Arc<dyn LanguageModel>, fallback: CandidateSelector) -> Self {
        Self {
            model,
            fallback: Box::new(fallback),
        }
    }

    pub fn fallback(&self) -> &CandidateSelector {
        &self.fallback
    }

    fn build_request(
        query: &FlowQuery,
        exchange: &Value,
        candidates: &[FlowCandidate],
    ) -> OracleRequest {
        let listed: Vec<Value> = candidates
            .iter()
            .enumerate()
            .map(|(index, candidate)| {
                json!({
                    "index": index,
                    "name": candidate.base_name,
                    "uuid": candidate.uuid,
                    "geography": candidate.geography,
                    "classification": candidate.classification,
                    "comment": candidate.general_comment,
                    "reasoning": candidate.reasoning,
                })
            })
            .collect();

        let context = json!({
            "exchange": {
                "name": query.exchange_name,
                "process": query.process_name,
                "description": query.description,
                "direction": dataset::exchange_direction(exchange),
                "unit": dataset::exchange_unit(exchange),
                "amount": dataset::exchange_amount(exchange),
                "comment": dataset::exchange_comment(exchange),
            },
            "candidates": listed,
        });

        OracleRequest {
            prompt: SELECTION_PROMPT.to_string(),
            context: format!("{:#}", context),
        }
    }

    async fn ask_oracle(
        &self,
        query: &FlowQuery,
        exchange: &Value,
        candidates: &[FlowCandidate],
    ) -> Result<SelectorDecision> {
        let request = Self::build_request(query, exchange, candidates);
        let output = self.model.invoke(&request).await?;

        let payload = match output {
            Value::String(text) => parse_json_response(&text)?,
            other => other,
        };
        let reply = payload.as_object().ok_or_else(|| AlignError::ResponseFormat {
            message: format!("Expected a JSON object, got: {}", payload),
        })?;

        let score = reply
            .get("confidence")
            .and_then(Value::as_f64)
            .map(|c| c.clamp(0.0, 1.0));
        let reasoning = reply.get("reason").and_then(dataset::text_value);

        let candidate = match reply.get("best_index") {
            None | Some(Value::Null) => None,
            Some(index) => {
                let position = index
                    .as_u64()
                    .map(|i| i as usize)
                    .filter(|i| *i < candidates.len())
                    .ok_or_else(|| AlignError::ResponseFormat {
                        message: format!(
                            "best_index {} is not a valid index for {} candidates",
                            index,
                            candidates.len()
                        ),
                    })?;
                Some(candidates[position].clone())
            }
        };

        Ok(SelectorDecision {
            candidate,
            score,
            reasoning,
            strategy: Self::NAME,
        })
    }
}

#[async_trait]
impl SelectCandidate for LlmCandidateSelector {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn select(
        &self,
        query: &FlowQuery,
        exchange: &Value,
        candidates: &[FlowCandidate],
    ) -> SelectorDecision {
        if candidates.is_empty() {
            return SelectorDecision::rejected(Self::NAME);
        }

        let limited = &candidates[..candidates.len().min(MAX_CANDIDATES)];
        match self.ask_oracle(query, exchange, limited).await {
            Ok(decision) => decision,
            Err(e) => {
                tracing::warn!(
                    "⚠️ LLM selection failed for '{}', falling back to {}: {}",
                    query.exchange_name,
                    self.fallback.name(),
                    e
                );
                self.fallback.select(query, exchange, candidates).await
            }
        }
    }
}

/// 可用的挑選策略
pub enum CandidateSelector {
    Similarity(SimilarityCandidateSelector),
    Llm(LlmCandidateSelector),
}

impl CandidateSelector {
    pub fn similarity() -> Self {
        Self::Similarity(SimilarityCandidateSelector)
    }

    pub fn llm(model: Arc<dyn LanguageModel>) -> Self {
        Self::Llm(LlmCandidateSelector::new(model))
    }
}

#[async_trait]
impl SelectCandidate for CandidateSelector {
    fn name(&self) -> &'static str {
        match self {
            Self::Similarity(inner) => inner.name(),
            Self::Llm(inner) => inner.name(),
        }
    }

    async fn select(
        &self,
        query: &FlowQuery,
        exchange: &Value,
        candidates: &[FlowCandidate],
    ) -> SelectorDecision {
        match self {
            Self::Similarity(inner) => inner.select(query, exchange, candidates).await,
            Self::Llm(inner) => inner.select(query, exchange, candidates).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct ScriptedModel {
        reply: Mutex<Option<Result<Value>>>,
        calls: AtomicUsize,
        last_context: Mutex<Option<String>>,
    }

    impl ScriptedModel {
        fn replying(reply: Result<Value>) -> Arc<Self> {
            Arc::new(Self {
                reply: Mutex::new(Some(reply)),
                calls: AtomicUsize::new(0),
                last_context: Mutex::new(None),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn invoke(&self, request: &OracleRequest) -> Result<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_context.lock().unwrap() = Some(request.context.clone());
            self.reply
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Err(AlignError::Oracle {
                    message: "no scripted reply".to_string(),
                }))
        }
    }

    fn candidates(names: &[&str]) -> Vec<FlowCandidate> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| FlowCandidate::new(format!("uuid-{}", i), *name))
            .collect()
    }

    fn exchange() -> Value {
        json!({"exchangeName": "Methane, to air", "exchangeDirection": "Output", "meanAmount": 0.3, "unit": "kg"})
    }

    #[test]
    fn test_similarity_prefers_closest_name() {
        let query = FlowQuery::new("Methane, to air");
        let pool = candidates(&["Unrelated flow", "Methane, biogenic"]);

        let decision = tokio_test::block_on(SimilarityCandidateSelector.select(&query, &exchange(), &pool));

        let chosen = decision.candidate.expect("a candidate should be chosen");
        assert_eq!(chosen.base_name, "Methane, biogenic");
        assert!(decision.score.unwrap() > 0.0);
        assert_eq!(decision.strategy, "similarity");
    }

    #[test]
    fn test_similarity_is_case_and_whitespace_insensitive() {
        let query = FlowQuery::new("  CARBON DIOXIDE ");
        let pool = candidates(&["carbon dioxide"]);
        let decision = SimilarityCandidateSelector.rank(&query, &pool);
        assert_eq!(decision.score, Some(1.0));
    }

    #[test]
    fn test_similarity_ties_keep_input_order() {
        let query = FlowQuery::new("Water");
        let pool = candidates(&["Water", "water"]);
        let decision = SimilarityCandidateSelector.rank(&query, &pool);
        assert_eq!(decision.candidate.unwrap().uuid, "uuid-0");
    }

    #[test]
    fn test_similarity_only_looks_at_first_ten() {
        let query = FlowQuery::new("Nitrogen oxides");
        let mut names = vec!["zzzz"; MAX_CANDIDATES];
        names.push("Nitrogen oxides");
        let pool = candidates(&names);

        let decision = SimilarityCandidateSelector.rank(&query, &pool);
        assert!(decision
            .candidate
            .map_or(true, |c| c.base_name != "Nitrogen oxides"));
    }

    #[test]
    fn test_similarity_zero_score_is_rejection() {
        let query = FlowQuery::new("");
        let pool = candidates(&["Electricity"]);
        let decision = SimilarityCandidateSelector.rank(&query, &pool);
        assert!(decision.candidate.is_none());
        assert_eq!(decision.strategy, "similarity");
    }

    #[tokio::test]
    async fn test_empty_candidates_never_call_oracle() {
        let model = ScriptedModel::replying(Ok(json!({"best_index": 0})));
        let selector = CandidateSelector::llm(model.clone());
        let query = FlowQuery::new("Methane");

        let llm = selector.select(&query, &exchange(), &[]).await;
        let similarity = SimilarityCandidateSelector.select(&query, &exchange(), &[]).await;

        assert!(llm.candidate.is_none());
        assert_eq!(llm.strategy, "llm");
        assert!(similarity.candidate.is_none());
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_llm_structured_reply_picks_index() {
        let model = ScriptedModel::replying(Ok(json!({"best_index": 1, "confidence": 0.9, "reason": "same substance"})));
        let selector = LlmCandidateSelector::new(model.clone());
        let pool = candidates(&["Methane, fossil", "Methane, biogenic"]);

        let decision = selector
            .select(&FlowQuery::new("Methane, to air"), &exchange(), &pool)
            .await;

        assert_eq!(decision.candidate.unwrap().uuid, "uuid-1");
        assert_eq!(decision.score, Some(0.9));
        assert_eq!(decision.reasoning.as_deref(), Some("same substance"));
        assert_eq!(decision.strategy, "llm");

        let context = model.last_context.lock().unwrap().clone().unwrap();
        assert!(context.contains("Methane, biogenic"));
        assert!(context.contains("Output"));
    }

    #[tokio::test]
    async fn test_llm_text_reply_is_parsed() {
        let model = ScriptedModel::replying(Ok(Value::String(
            "```json\n{\"best_index\": 0, \"confidence\": 1.7}\n```".to_string(),
        )));
        let selector = LlmCandidateSelector::new(model);
        let pool = candidates(&["Methane, fossil"]);

        let decision = selector.select(&FlowQuery::new("Methane"), &exchange(), &pool).await;
        assert_eq!(decision.candidate.unwrap().uuid, "uuid-0");
        assert_eq!(decision.score, Some(1.0));
    }

    #[tokio::test]
    async fn test_llm_null_index_is_explicit_rejection() {
        let model = ScriptedModel::replying(Ok(json!({"best_index": null, "confidence": 0.2, "reason": "no fit"})));
        let selector = LlmCandidateSelector::new(model);
        let pool = candidates(&["Methane, fossil"]);

        let decision = selector.select(&FlowQuery::new("Steel"), &exchange(), &pool).await;
        assert!(decision.candidate.is_none());
        assert_eq!(decision.score, Some(0.2));
        assert_eq!(decision.reasoning.as_deref(), Some("no fit"));
        assert_eq!(decision.strategy, "llm");
    }

    #[tokio::test]
    async fn test_llm_invoke_error_matches_fallback() {
        let model = ScriptedModel::replying(Err(AlignError::Oracle {
            message: "connection reset".to_string(),
        }));
        let selector = LlmCandidateSelector::new(model);
        let query = FlowQuery::new("Methane, to air");
        let pool = candidates(&["Unrelated flow", "Methane, biogenic"]);

        let via_llm = selector.select(&query, &exchange(), &pool).await;
        let direct = selector.fallback().select(&query, &exchange(), &pool).await;

        assert_eq!(via_llm, direct);
    }

    #[tokio::test]
    async fn test_llm_out_of_range_index_falls_back() {
        let model = ScriptedModel::replying(Ok(json!({"best_index": 99})));
        let selector = LlmCandidateSelector::new(model);
        let query = FlowQuery::new("Methane, to air");
        let pool = candidates(&["Methane, biogenic", "Water", "Unrelated flow"]);

        let decision = selector.select(&query, &exchange(), &pool).await;
        assert_eq!(decision.strategy, "similarity");
        assert_eq!(decision.candidate.unwrap().base_name, "Methane, biogenic");
    }

    #[tokio::test]
    async fn test_llm_non_integer_index_falls_back() {
        for reply in [json!({"best_index": "1"}), json!({"best_index": 0.5}), json!({"best_index": -1})] {
            let model = ScriptedModel::replying(Ok(reply));
            let selector = LlmCandidateSelector::new(model);
            let pool = candidates(&["Methane, biogenic"]);
            let decision = selector.select(&FlowQuery::new("Methane"), &exchange(), &pool).await;
            assert_eq!(decision.strategy, "similarity");
        }
    }

    #[tokio::test]
    async fn test_llm_unparseable_text_falls_back() {
        let model = ScriptedModel::replying(Ok(Value::String("the first one".to_string())));
        let selector = LlmCandidateSelector::new(model);
        let pool = candidates(&["Methane"]);
        let decision = selector.select(&FlowQuery::new("Methane"), &exchange(), &pool).await;
        assert_eq!(decision.strategy, "similarity");
        assert!(decision.candidate.is_some());
    }

    #[tokio::test]
    async fn test_llm_non_object_reply_falls_back() {
        let model = ScriptedModel::replying(Ok(json!([1, 2])));
        let selector = LlmCandidateSelector::new(model);
        let pool = candidates(&["Methane"]);
        let decision = selector.select(&FlowQuery::new("Methane"), &exchange(), &pool).await;
        assert_eq!(decision.strategy, "similarity");
    }
}
