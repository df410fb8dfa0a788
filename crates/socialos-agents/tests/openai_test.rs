use serde_json::json;
use socialos_agents::{LlmProvider, LlmRequest, OpenAiProvider, ToolDefinition};
use socialos_common::{Error, Message, ToolCallRequest};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn request(messages: Vec<Message>) -> LlmRequest {
    LlmRequest {
        model: String::new(),
        messages,
        system: Some("You are a personalized AI agent for Ada.".to_string()),
        max_tokens: None,
        temperature: Some(0.7),
        tools: vec![],
    }
}

#[tokio::test]
async fn test_openai_completion() {
    let mock_server = MockServer::start().await;

    let response_body = json!({
        "id": "chatcmpl-123",
        "object": "chat.completion",
        "created": 1677652288,
        "model": "gpt-4o-2024-08-06",
        "choices": [{
            "index": 0,
            "message": {
                "role": "assistant",
                "content": "Hello there!",
            },
            "finish_reason": "stop"
        }],
        "usage": {
            "prompt_tokens": 9,
            "completion_tokens": 12,
            "total_tokens": 21
        }
    });

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({ "model": "gpt-4o", "temperature": 0.7 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(response_body))
        .mount(&mock_server)
        .await;

    let provider = OpenAiProvider::new("test-key".to_string(), Some(mock_server.uri()));
    let response = provider
        .complete(&request(vec![Message::user("Hello")]))
        .await
        .unwrap();

    assert_eq!(response.content, "Hello there!");
    assert!(response.tool_calls.is_empty());
    assert_eq!(response.stop_reason.as_deref(), Some("stop"));
    assert_eq!(response.usage.map(|u| u.output_tokens), Some(12));
}

#[tokio::test]
async fn test_openai_tool_call() {
    let mock_server = MockServer::start().await;

    let response_body = json!({
        "id": "chatcmpl-456",
        "model": "gpt-4o",
        "choices": [{
            "index": 0,
            "message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_abc123",
                    "type": "function",
                    "function": {
                        "name": "suggestPostIdeas",
                        "arguments": "{\"interests\": [\"Rust\"], \"count\": 2}"
                    }
                }]
            },
            "finish_reason": "tool_calls"
        }]
    });

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({
            "tools": [{ "type": "function", "function": { "name": "suggestPostIdeas" } }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(response_body))
        .mount(&mock_server)
        .await;

    let provider = OpenAiProvider::new("test-key".to_string(), Some(mock_server.uri()));
    let mut req = request(vec![Message::user("Give me ideas")]);
    req.tools = vec![ToolDefinition {
        name: "suggestPostIdeas".to_string(),
        description: "Suggest post ideas based on user interests".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": { "interests": { "type": "array", "items": { "type": "string" } } }
        }),
    }];

    let response = provider.complete(&req).await.unwrap();

    assert_eq!(response.content, "");
    assert_eq!(response.tool_calls.len(), 1);
    let call = &response.tool_calls[0];
    assert_eq!(call.call_id, "call_abc123");
    assert_eq!(call.name, "suggestPostIdeas");
    assert_eq!(call.arguments["interests"][0], "Rust");
}

#[tokio::test]
async fn test_openai_sends_tool_results() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({
            "messages": [
                { "role": "system" },
                { "role": "user", "content": "Post this" },
                {
                    "role": "assistant",
                    "tool_calls": [{ "id": "call_1", "type": "function" }]
                },
                { "role": "tool", "tool_call_id": "call_1", "content": "published" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "gpt-4o",
            "choices": [{
                "message": { "role": "assistant", "content": "Done!" },
                "finish_reason": "stop"
            }]
        })))
        .mount(&mock_server)
        .await;

    let provider = OpenAiProvider::new("test-key".to_string(), Some(mock_server.uri()));
    let history = vec![
        Message::user("Post this"),
        Message::assistant_with_calls(
            "",
            vec![ToolCallRequest {
                call_id: "call_1".to_string(),
                name: "publishPost".to_string(),
                arguments: json!({ "content": "hi" }),
            }],
        ),
        Message::tool_result("call_1", "publishPost", "published"),
    ];

    let response = provider.complete(&request(history)).await.unwrap();
    assert_eq!(response.content, "Done!");
}

#[tokio::test]
async fn test_openai_error_status_is_model_unavailable() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .mount(&mock_server)
        .await;

    let provider = OpenAiProvider::new("test-key".to_string(), Some(mock_server.uri()));
    let err = provider
        .complete(&request(vec![Message::user("Hello")]))
        .await
        .unwrap_err();

    match err {
        Error::ModelUnavailable(message) => {
            assert!(message.contains("status=429"), "{message}");
            assert!(message.contains("rate limited"), "{message}");
        }
        other => panic!("expected ModelUnavailable, got {other:?}"),
    }
}

#[tokio::test]
async fn test_openai_health_check() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/models"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let provider = OpenAiProvider::new("test-key".to_string(), Some(mock_server.uri()));
    assert!(provider.health_check().await.unwrap());
}
