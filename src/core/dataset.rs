//! Process dataset 欄位讀取。
//!
//! ILCD/TIDAS 的文字欄位可能是字串、`{"#text": ...}` 或多語系陣列，這裡統一轉成 `Option<String>`。

use crate::utils::error::{AlignError, Result};
use serde_json::Value;

pub const UNKNOWN_PROCESS: &str = "unknown_process";
pub const UNKNOWN_EXCHANGE: &str = "unknown_exchange";

const EXCHANGE_NAME_KEYS: &[&str] = &["exchangeName", "name", "flowName"];
const EXCHANGE_COMMENT_KEYS: &[&str] = &["generalComment1", "generalComment", "comment"];
const EXCHANGE_UNIT_KEYS: &[&str] = &["unit", "referenceUnit"];
const EXCHANGE_AMOUNT_KEYS: &[&str] = &["meanAmount", "resultingAmount", "amount"];

fn dataset_root(dataset: &Value) -> &Value {
    dataset.get("processDataSet").unwrap_or(dataset)
}

/// 取出 `exchanges.exchange`；單一物件視為只有一筆。
///
/// 缺少 `exchanges` 鍵屬於結構錯誤，空的 `exchanges` 則回傳空列表。
/// 非物件的項目仍保留，名稱會解析為 `unknown_exchange`。
pub fn extract_exchanges(dataset: &Value) -> Result<Vec<Value>> {
    let exchanges = dataset_root(dataset)
        .get("exchanges")
        .ok_or_else(|| AlignError::MissingField {
            field: "exchanges".to_string(),
        })?;

    let exchanges = match exchanges.get("exchange") {
        Some(Value::Array(items)) => {
            for (index, item) in items.iter().enumerate() {
                if !item.is_object() {
                    tracing::warn!("⚠️ Exchange #{} is not an object: {}", index, item);
                }
            }
            items.clone()
        }
        Some(Value::Null) | None => Vec::new(),
        Some(item) => {
            if !item.is_object() {
                tracing::warn!("⚠️ Exchange entry is not an object: {}", item);
            }
            vec![item.clone()]
        }
    };

    Ok(exchanges)
}

/// `processInformation.dataSetInformation.name.baseName`，找不到時為 `unknown_process`
pub fn process_name(dataset: &Value) -> String {
    let name = dataset_root(dataset)
        .get("processInformation")
        .and_then(|v| v.get("dataSetInformation"))
        .and_then(|v| v.get("name"));

    name.and_then(|n| n.get("baseName").or(Some(n)))
        .and_then(text_value)
        .unwrap_or_else(|| UNKNOWN_PROCESS.to_string())
}

pub fn exchange_name(exchange: &Value) -> String {
    first_text(exchange, EXCHANGE_NAME_KEYS)
        .or_else(|| {
            exchange
                .get("referenceToFlowDataSet")
                .and_then(|r| r.get("common:shortDescription"))
                .and_then(text_value)
        })
        .unwrap_or_else(|| UNKNOWN_EXCHANGE.to_string())
}

pub fn exchange_comment(exchange: &Value) -> Option<String> {
    first_text(exchange, EXCHANGE_COMMENT_KEYS)
}

pub fn exchange_direction(exchange: &Value) -> Option<String> {
    first_text(exchange, &["exchangeDirection", "direction"])
}

pub fn exchange_unit(exchange: &Value) -> Option<String> {
    first_text(exchange, EXCHANGE_UNIT_KEYS)
}

pub fn exchange_amount(exchange: &Value) -> Option<String> {
    first_text(exchange, EXCHANGE_AMOUNT_KEYS)
}

fn first_text(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| value.get(*key))
        .find_map(text_value)
}

/// 將字串、數字、`#text` 物件或多語系陣列轉為文字；多語系優先取英文。
pub fn text_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => map.get("#text").and_then(text_value),
        Value::Array(items) => items
            .iter()
            .find(|item| item.get("@xml:lang").and_then(Value::as_str) == Some("en"))
            .and_then(text_value)
            .or_else(|| items.iter().find_map(text_value)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_exchanges_list_and_single_object() {
        let list = json!({"exchanges": {"exchange": [{"exchangeName": "A"}, {"exchangeName": "B"}]}});
        assert_eq!(extract_exchanges(&list).unwrap().len(), 2);

        let single = json!({"exchanges": {"exchange": {"exchangeName": "A"}}});
        assert_eq!(extract_exchanges(&single).unwrap().len(), 1);

        let empty = json!({"exchanges": {}});
        assert!(extract_exchanges(&empty).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_entries_are_kept() {
        let mixed = json!({"exchanges": {"exchange": [{"exchangeName": "Water"}, "Steel", null]}});
        let exchanges = extract_exchanges(&mixed).unwrap();

        assert_eq!(exchanges.len(), 3);
        assert_eq!(exchange_name(&exchanges[0]), "Water");
        assert_eq!(exchange_name(&exchanges[1]), UNKNOWN_EXCHANGE);
        assert_eq!(exchange_name(&exchanges[2]), UNKNOWN_EXCHANGE);
    }

    #[test]
    fn test_missing_exchanges_is_structural_error() {
        let err = extract_exchanges(&json!({"processInformation": {}})).unwrap_err();
        assert!(matches!(err, AlignError::MissingField { ref field } if field == "exchanges"));
    }

    #[test]
    fn test_wrapped_process_dataset() {
        let dataset = json!({
            "processDataSet": {
                "processInformation": {"dataSetInformation": {"name": {"baseName": "Cement"}}},
                "exchanges": {"exchange": [{"name": "Clinker"}]}
            }
        });
        assert_eq!(process_name(&dataset), "Cement");
        assert_eq!(extract_exchanges(&dataset).unwrap().len(), 1);
    }

    #[test]
    fn test_process_name_shapes() {
        let scalar = json!({"processInformation": {"dataSetInformation": {"name": {"baseName": "Steel"}}}});
        assert_eq!(process_name(&scalar), "Steel");

        let text = json!({"processInformation": {"dataSetInformation": {"name": {"baseName": {"#text": "Steel"}}}}});
        assert_eq!(process_name(&text), "Steel");

        let multilang = json!({"processInformation": {"dataSetInformation": {"name": {"baseName": [
            {"@xml:lang": "zh", "#text": "钢"},
            {"@xml:lang": "en", "#text": "Steel"}
        ]}}}});
        assert_eq!(process_name(&multilang), "Steel");

        assert_eq!(process_name(&json!({})), UNKNOWN_PROCESS);
    }

    #[test]
    fn test_exchange_name_resolution_order() {
        assert_eq!(exchange_name(&json!({"exchangeName": "A", "name": "B"})), "A");
        assert_eq!(exchange_name(&json!({"name": "B", "flowName": "C"})), "B");
        assert_eq!(exchange_name(&json!({"flowName": "C"})), "C");
        assert_eq!(
            exchange_name(&json!({"referenceToFlowDataSet": {"common:shortDescription": {"#text": "D"}}})),
            "D"
        );
        assert_eq!(exchange_name(&json!({"meanAmount": 1})), UNKNOWN_EXCHANGE);
    }

    #[test]
    fn test_exchange_comment_and_amount() {
        let exchange = json!({"generalComment": [{"@xml:lang": "en", "#text": "Grid mix"}], "meanAmount": 2.5});
        assert_eq!(exchange_comment(&exchange).as_deref(), Some("Grid mix"));
        assert_eq!(exchange_amount(&exchange).as_deref(), Some("2.5"));
        assert!(exchange_unit(&exchange).is_none());
    }
}
