use super::*;
use crate::config::Config;

fn test_config(base: &str) -> Config {
    Config {
        api_key: Some("sk-test-key".to_string()),
        api_base: base.to_string(),
        ..Config::default()
    }
}

#[test]
fn client_requires_an_api_key() {
    let config = Config::default();
    assert!(matches!(
        OpenAiClient::new(&config),
        Err(LibrarianError::Config(_))
    ));
}

#[test]
fn client_strips_trailing_slashes_from_base_url() {
    let client =
        OpenAiClient::new(&test_config("https://api.example.com/v1/")).expect("should build");
    assert_eq!(client.base_url, "https://api.example.com/v1");
}

#[test]
fn chat_request_omits_tools_when_none_offered() {
    let messages = [ChatMessage::user("salut")];
    let request = ChatRequest {
        model: "gpt-4o-mini",
        messages: &messages,
        tools: None,
        tool_choice: None,
        temperature: 0.2,
    };
    let json = serde_json::to_string(&request).expect("should serialize");
    assert!(!json.contains("tools"));
    assert!(!json.contains("tool_choice"));
}

#[test]
fn chat_request_declares_tools_with_auto_choice() {
    let messages = [ChatMessage::user("salut")];
    let tools = [Tool {
        kind: "function".to_string(),
        function: ToolFunction {
            name: "get_summary_by_title".to_string(),
            description: "lookup".to_string(),
            parameters: serde_json::json!({"type": "object"}),
        },
    }];
    let request = ChatRequest {
        model: "gpt-4o-mini",
        messages: &messages,
        tools: Some(&tools),
        tool_choice: Some("auto"),
        temperature: 0.2,
    };
    let json = serde_json::to_string(&request).expect("should serialize");
    assert!(json.contains(r#""tool_choice":"auto""#));
    assert!(json.contains(r#""name":"get_summary_by_title""#));
}

#[test]
fn assistant_message_with_tool_calls_deserializes() {
    let json = r#"{
        "role": "assistant",
        "content": null,
        "tool_calls": [{
            "id": "call_1",
            "type": "function",
            "function": {"name": "get_summary_by_title", "arguments": "{\"title\": \"1984\"}"}
        }]
    }"#;
    let message: ChatMessage = serde_json::from_str(json).expect("should deserialize");
    assert_eq!(message.role, "assistant");
    assert_eq!(message.content, None);
    let calls = message.tool_calls.expect("should have tool calls");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].function.name, "get_summary_by_title");
}

#[test]
fn tool_result_message_carries_the_call_id() {
    let message = ChatMessage::tool_result("call_1", "Rezumat complet...");
    let json = serde_json::to_string(&message).expect("should serialize");
    assert!(json.contains(r#""role":"tool""#));
    assert!(json.contains(r#""tool_call_id":"call_1""#));
}
