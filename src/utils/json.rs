use crate::utils::error::{AlignError, Result};
use serde_json::Value;

/// 解析語言模型回傳的 JSON 文字。
///
/// 依序嘗試：整段解析、```json 區塊、第一個 `{` 到最後一個 `}` 的片段。
pub fn parse_json_response(response: &str) -> Result<Value> {
    let trimmed = response.trim();
    if trimmed.is_empty() {
        return Err(AlignError::ResponseFormat {
            message: "Empty response".to_string(),
        });
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Ok(value);
    }

    if let Some(block) = fenced_block(trimmed) {
        return serde_json::from_str(block).map_err(|e| AlignError::ResponseFormat {
            message: format!("Invalid JSON in fenced block: {}", e),
        });
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            return serde_json::from_str(&trimmed[start..=end]).map_err(|e| {
                AlignError::ResponseFormat {
                    message: format!("Invalid JSON object: {}", e),
                }
            });
        }
    }

    Err(AlignError::ResponseFormat {
        message: format!("No JSON found in response: {}", preview(trimmed)),
    })
}

fn fenced_block(response: &str) -> Option<&str> {
    let start = response.find("```")?;
    let after_fence = &response[start + 3..];
    // 略過語言標記，例如 ```json
    let content_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
    let content = &after_fence[content_start..];
    let end = content.find("```")?;
    Some(content[..end].trim())
}

fn preview(text: &str) -> String {
    text.chars().take(80).collect()
}
