//! HTTP wire-format contract tests for [`radio_agent::llm::client::HttpLlmClient`]
//! against both server flavors from §6: a llama.cpp-style `/completion`
//! endpoint and an Ollama-style `/api/chat` endpoint.
//!
//! Grounded on `saorsa-labs-fae/tests/openai_contract.rs`'s use of
//! `wiremock` to assert exact request shape and exercise response parsing
//! without a live model server. `HttpLlmClient::generate` is a blocking
//! call, so the mock server runs on a background multi-threaded `tokio`
//! runtime while the client itself is driven from a plain test thread.

use radio_agent::llm::client::{HttpLlmClient, LlmClient};
use radio_agent::llm::types::GenerationRequest;
use radio_agent::memory::ConversationMessage;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("build test runtime")
}

#[test]
fn completion_endpoint_round_trips_content() {
    let rt = runtime();
    let server = rt.block_on(MockServer::start());
    rt.block_on(
        Mock::given(method("POST"))
            .and(path("/completion"))
            .and(body_partial_json(json!({"stream": false})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": "roger, over.",
                "stopped_limit": false
            })))
            .expect(1)
            .mount(&server),
    );

    let endpoint = format!("{}/completion", server.uri());
    let client = HttpLlmClient::new(endpoint, 5_000);
    let messages = vec![ConversationMessage::user("status check", 0)];
    let request = GenerationRequest {
        system_prompt: "You are a radio operator.",
        messages: &messages,
        tools: &[],
        max_tokens: 32,
        temperature: 0.4,
        stop_sequences: &[],
        model_name: "",
    };

    let response = client.generate(&request).expect("completion call succeeds");
    assert_eq!(response.text, "roger, over.");
    assert!(response.tool_calls.is_empty());
    assert!(!response.stop_reason.is_truncated());
}

#[test]
fn completion_endpoint_marks_length_truncation() {
    let rt = runtime();
    let server = rt.block_on(MockServer::start());
    rt.block_on(
        Mock::given(method("POST"))
            .and(path("/completion"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": "partial thought that never f",
                "stopped_limit": true
            })))
            .expect(1)
            .mount(&server),
    );

    let endpoint = format!("{}/completion", server.uri());
    let client = HttpLlmClient::new(endpoint, 5_000);
    let messages = vec![ConversationMessage::user("tell me a long story", 0)];
    let request = GenerationRequest {
        system_prompt: "You are a radio operator.",
        messages: &messages,
        tools: &[],
        max_tokens: 4,
        temperature: 0.4,
        stop_sequences: &[],
        model_name: "",
    };

    let response = client.generate(&request).expect("completion call succeeds");
    assert!(response.stop_reason.is_truncated());
}

#[test]
fn chat_endpoint_round_trips_tool_calls() {
    let rt = runtime();
    let server = rt.block_on(MockServer::start());
    rt.block_on(
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(json!({"model": "radio-op", "stream": false})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": {
                    "content": "",
                    "tool_calls": [{
                        "id": "call_1",
                        "function": {"name": "log_memo", "arguments": {"text": "buy milk"}}
                    }]
                },
                "done": true,
                "done_reason": "tool_calls"
            })))
            .expect(1)
            .mount(&server),
    );

    let endpoint = format!("{}/api/chat", server.uri());
    let client = HttpLlmClient::new(endpoint, 5_000);
    let messages = vec![ConversationMessage::user("log this: buy milk", 0)];
    let request = GenerationRequest {
        system_prompt: "You are a radio operator.",
        messages: &messages,
        tools: &[],
        max_tokens: 64,
        temperature: 0.2,
        stop_sequences: &[],
        model_name: "radio-op",
    };

    let response = client.generate(&request).expect("chat call succeeds");
    assert_eq!(response.tool_calls.len(), 1);
    assert_eq!(response.tool_calls[0].name, "log_memo");
    assert_eq!(response.tool_calls[0].id, "call_1");
}

#[test]
fn chat_endpoint_http_error_maps_to_network_error() {
    let rt = runtime();
    let server = rt.block_on(MockServer::start());
    rt.block_on(
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
            .expect(1)
            .mount(&server),
    );

    let endpoint = format!("{}/api/chat", server.uri());
    let client = HttpLlmClient::new(endpoint, 5_000);
    let messages = vec![ConversationMessage::user("status check", 0)];
    let request = GenerationRequest {
        system_prompt: "You are a radio operator.",
        messages: &messages,
        tools: &[],
        max_tokens: 32,
        temperature: 0.4,
        stop_sequences: &[],
        model_name: "radio-op",
    };

    let err = client.generate(&request).expect_err("server error surfaces");
    assert!(matches!(err, radio_agent::error::AgentError::Network(_)));
}
