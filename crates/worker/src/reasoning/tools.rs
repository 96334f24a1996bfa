//! 声明给推理服务的工具集

use serde_json::{json, Value};
use silvermoon_domain::reasoning::ToolDefinition;

pub const SET_RESPONSE: &str = "set_response";
pub const SET_TITLE: &str = "set_title";
pub const DISCARD_RESULT: &str = "discard_result";
pub const SET_IMPORTANCE: &str = "set_importance";
pub const DEBUG_REASONING: &str = "debug_reasoning";

pub const TOOL_NAMES: [&str; 5] = [
    SET_RESPONSE,
    SET_TITLE,
    DISCARD_RESULT,
    SET_IMPORTANCE,
    DEBUG_REASONING,
];

fn string_object(field: &str, description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            field: {
                "type": "string",
                "description": description
            }
        },
        "required": [field],
        "additionalProperties": false
    })
}

/// 工具参数的严格 JSON Schema
pub fn schema_for(name: &str) -> Option<Value> {
    let schema = match name {
        SET_RESPONSE => string_object(
            "response",
            "The full response to the user's request, formatted as markdown.",
        ),
        SET_TITLE => string_object("title", "The title of the result."),
        DISCARD_RESULT => string_object(
            "reason",
            "Why the request's criteria for not saving the result are met.",
        ),
        SET_IMPORTANCE => json!({
            "type": "object",
            "properties": {
                "importance": {
                    "type": "string",
                    "enum": ["normal", "high"],
                    "description": "Only set if the prompt's importance criteria are met."
                }
            },
            "required": ["importance"],
            "additionalProperties": false
        }),
        DEBUG_REASONING => string_object(
            "reasoning",
            "A short explanation of which functions you called and why.",
        ),
        _ => return None,
    };
    Some(schema)
}

fn describe(name: &str) -> &'static str {
    match name {
        SET_RESPONSE => "Set the response delivered to the user. You MUST always call this function exactly once with your complete answer.",
        SET_TITLE => "Set the title of the deliverable provided to the user. Optional.",
        DISCARD_RESULT => "Mark the result so that it is NOT saved. Invoke this function ONLY if the prompt specifies criteria under which the result should not be saved AND those criteria are met. A justification is mandatory.",
        SET_IMPORTANCE => "Set the importance of the result. Invoke this function ONLY if the prompt specifies criteria under which the importance should be set.",
        DEBUG_REASONING => "Explain your reasoning for the function calls you made. You MUST always call this function.",
        _ => "",
    }
}

/// 完整的工具声明列表，顺序固定
pub fn tool_definitions() -> Vec<ToolDefinition> {
    TOOL_NAMES
        .iter()
        .filter_map(|name| {
            schema_for(name).map(|parameters| ToolDefinition {
                name: name.to_string(),
                description: describe(name).to_string(),
                parameters,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_tool_has_strict_schema() {
        let tools = tool_definitions();
        assert_eq!(tools.len(), TOOL_NAMES.len());
        for tool in tools {
            assert!(!tool.description.is_empty());
            assert_eq!(tool.parameters["additionalProperties"], json!(false));
            assert_eq!(tool.parameters["type"], json!("object"));
        }
        assert!(schema_for("save_result").is_none());
    }
}
