//! Integration tests for doc-translator-core
//!
//! These tests verify the end-to-end workflow:
//! - Upload and extraction for text, Markdown and PDF
//! - Summarize / translate with a recording mock gateway
//! - Re-encoding in the uploaded format
//! - The OpenAI-compatible gateway against a local fake server

#![allow(clippy::unwrap_used)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use doc_translator_core::{
    AppConfig, Error, GatewayConfig, GatewayInfo, Instruction, Language, OpenAiGateway, PdfDocument,
    PdfLayout, Result, SourceFormat, Stage, TextTransform, Workflow, pdf::markup,
};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, Stream};
use serde_json::{Value, json};

// =============================================================================
// Mock Gateway for Testing
// =============================================================================

/// A mock gateway that records every call and answers predictably without
/// network access.
#[derive(Default)]
struct RecordingGateway {
    /// (system prompt, user text) per call
    calls: Mutex<Vec<(String, String)>>,
    /// Simulate failure if true
    should_fail: bool,
}

impl RecordingGateway {
    fn failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextTransform for RecordingGateway {
    fn info(&self) -> GatewayInfo {
        GatewayInfo {
            name: "mock",
            model: "mock".to_string(),
        }
    }

    async fn transform(&self, text: &str, instruction: &Instruction) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((instruction.system_prompt(), text.to_string()));
        if self.should_fail {
            return Err(Error::GatewayRequest("Mock gateway failure".to_string()));
        }
        Ok(match instruction {
            Instruction::Translate { target } | Instruction::TranslateSummary { target } => {
                format!("[{target}] {text}")
            }
            Instruction::Summarize => "[SUMMARY]".to_string(),
        })
    }
}

// =============================================================================
// Test Fixtures
// =============================================================================

fn workflow_with(gateway: Arc<RecordingGateway>) -> Workflow {
    Workflow::new(gateway, PdfLayout::default())
}

/// Single-page PDF showing `spans` as (text, rgb) pairs on separate lines
fn pdf_with_spans(spans: &[(&str, (f32, f32, f32))]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(Dictionary::from_iter([
        ("Type", Object::Name(b"Font".to_vec())),
        ("Subtype", Object::Name(b"Type1".to_vec())),
        ("BaseFont", Object::Name(b"Helvetica".to_vec())),
    ]));
    let resources_id = doc.add_object(Dictionary::from_iter([(
        "Font",
        Object::Dictionary(Dictionary::from_iter([("F1", Object::Reference(font_id))])),
    )]));

    let mut operations = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec![Object::Name(b"F1".to_vec()), 12.into()]),
        Operation::new("TL", vec![14.into()]),
        Operation::new("Td", vec![72.into(), 720.into()]),
    ];
    for (i, (text, (r, g, b))) in spans.iter().enumerate() {
        if i > 0 {
            operations.push(Operation::new("T*", vec![]));
        }
        operations.push(Operation::new(
            "rg",
            vec![Object::Real(*r), Object::Real(*g), Object::Real(*b)],
        ));
        operations.push(Operation::new("Tj", vec![Object::string_literal(*text)]));
    }
    operations.push(Operation::new("ET", vec![]));

    let content_id = doc.add_object(Stream::new(
        Dictionary::new(),
        Content { operations }.encode().unwrap(),
    ));
    let page_id = doc.add_object(Dictionary::from_iter([
        ("Type", Object::Name(b"Page".to_vec())),
        ("Parent", Object::Reference(pages_id)),
        ("Contents", Object::Reference(content_id)),
        ("Resources", Object::Reference(resources_id)),
        (
            "MediaBox",
            Object::Array(vec![0.into(), 0.into(), 595.into(), 842.into()]),
        ),
    ]));
    doc.objects.insert(
        pages_id,
        Object::Dictionary(Dictionary::from_iter([
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Kids", Object::Array(vec![Object::Reference(page_id)])),
            ("Count", Object::Integer(1)),
        ])),
    );
    let catalog_id = doc.add_object(Dictionary::from_iter([
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut output = Vec::new();
    doc.save_to(&mut output).unwrap();
    output
}

// =============================================================================
// Workflow Tests
// =============================================================================

#[tokio::test]
async fn test_plain_text_full_translation() {
    let gateway = Arc::new(RecordingGateway::default());
    let mut workflow = workflow_with(Arc::clone(&gateway));

    workflow.upload(b"Hello world".to_vec(), "text/plain").await.unwrap();
    let translated = workflow.translate_full(&Language::new("French")).await.unwrap();

    assert_eq!(translated.filename, "translated_content.txt");
    assert_eq!(translated.mime(), "text/plain");
    assert_eq!(translated.bytes().as_ref(), b"[French] Hello world");
    assert_eq!(
        gateway.calls(),
        vec![(
            "Translate the following text to French.".to_string(),
            "Hello world".to_string()
        )]
    );
}

#[tokio::test]
async fn test_pdf_upload_extracts_markup() {
    let gateway = Arc::new(RecordingGateway::default());
    let mut workflow = workflow_with(gateway);

    let pdf = pdf_with_spans(&[("Test", (0.0, 0.0, 0.0))]);
    let loaded = workflow.upload(pdf, "application/pdf").await.unwrap();

    assert_eq!(loaded.format, SourceFormat::Pdf);
    assert_eq!(loaded.content, "<span style=\"color:#000000;\">Test</span><br>");
}

#[test]
fn test_pdf_colors_in_reading_order() {
    let pdf = pdf_with_spans(&[("Title", (1.0, 0.0, 0.0)), ("Body", (0.0, 0.0, 0.0))]);
    let markup = doc_translator_core::extract_markup(&pdf).unwrap();
    assert_eq!(
        markup,
        "<span style=\"color:#ff0000;\">Title</span><br>\
         <span style=\"color:#000000;\">Body</span><br>"
    );
}

#[tokio::test]
async fn test_pdf_full_translation_round_trip() {
    let gateway = Arc::new(RecordingGateway::default());
    let mut workflow = workflow_with(Arc::clone(&gateway));

    let pdf = pdf_with_spans(&[("Test", (0.0, 0.0, 0.0))]);
    workflow.upload(pdf, "application/pdf").await.unwrap();
    let translated = workflow.translate_full(&Language::new("German")).await.unwrap();

    assert_eq!(translated.filename, "translated_content.pdf");
    assert_eq!(translated.mime(), "application/pdf");
    // The gateway saw the markup, tags included
    assert_eq!(gateway.calls()[0].1, "<span style=\"color:#000000;\">Test</span><br>");

    let output = PdfDocument::from_bytes(translated.bytes()).unwrap().extract();
    assert_eq!(markup::to_plain_text(&output.markup), "[German] Test");
}

#[tokio::test]
async fn test_summary_then_translate_summary() {
    let gateway = Arc::new(RecordingGateway::default());
    let mut workflow = workflow_with(Arc::clone(&gateway));

    workflow
        .upload(b"# Report\n\nLong text".to_vec(), "text/markdown")
        .await
        .unwrap();
    assert_eq!(workflow.summarize().await.unwrap(), "[SUMMARY]");

    let translated = workflow
        .translate_summary(&Language::new("Spanish"))
        .await
        .unwrap();
    assert_eq!(translated.filename, "translated_summarized_content.md");
    assert_eq!(translated.bytes().as_ref(), b"[Spanish] [SUMMARY]");

    let calls = gateway.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].0, "Summarize the following text.");
    assert_eq!(
        calls[1],
        (
            "Translate the following summarized text to Spanish.".to_string(),
            "[SUMMARY]".to_string()
        )
    );
}

#[tokio::test]
async fn test_translate_summary_requires_summary() {
    let gateway = Arc::new(RecordingGateway::default());
    let mut workflow = workflow_with(Arc::clone(&gateway));

    workflow.upload(b"text".to_vec(), "text/plain").await.unwrap();
    let err = workflow
        .translate_summary(&Language::new("French"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InvalidState { .. }));
    assert!(gateway.calls().is_empty());
    assert_eq!(workflow.stage(), Stage::Extracted);
}

#[tokio::test]
async fn test_new_upload_clears_summary() {
    let gateway = Arc::new(RecordingGateway::default());
    let mut workflow = workflow_with(gateway);

    workflow.upload(b"first".to_vec(), "text/plain").await.unwrap();
    workflow.summarize().await.unwrap();
    workflow.translate_summary(&Language::new("French")).await.unwrap();
    assert_eq!(workflow.stage(), Stage::TranslatedSummary);

    workflow.upload(b"second".to_vec(), "text/plain").await.unwrap();
    assert_eq!(workflow.stage(), Stage::Extracted);
    assert!(workflow.summary().is_none());
    assert!(workflow.last_translation().is_none());

    let result = workflow.translate_summary(&Language::new("French")).await;
    assert!(matches!(result, Err(Error::InvalidState { .. })));
}

#[tokio::test]
async fn test_gateway_failure_leaves_state_untouched() {
    let gateway = Arc::new(RecordingGateway::failing());
    let mut workflow = workflow_with(Arc::clone(&gateway));

    workflow.upload(b"Hello".to_vec(), "text/plain").await.unwrap();
    let err = workflow.summarize().await.unwrap_err();
    assert!(err.is_gateway());
    assert_eq!(workflow.stage(), Stage::Extracted);
    assert!(workflow.summary().is_none());

    let err = workflow.translate_full(&Language::new("French")).await.unwrap_err();
    assert!(err.is_gateway());
    assert!(workflow.last_translation().is_none());
    assert_eq!(gateway.calls().len(), 2);
}

#[tokio::test]
async fn test_unsupported_upload() {
    let mut workflow = workflow_with(Arc::new(RecordingGateway::default()));
    let result = workflow.upload(b"PK\x03\x04".to_vec(), "application/zip").await;
    assert!(matches!(result, Err(Error::UnsupportedFormat(_))));
    assert_eq!(workflow.stage(), Stage::Empty);
}

#[tokio::test]
async fn test_broken_pdf_upload() {
    let mut workflow = workflow_with(Arc::new(RecordingGateway::default()));
    let result = workflow.upload(b"%PDF-1.5 garbage".to_vec(), "application/pdf").await;
    assert!(matches!(result, Err(Error::DocumentParse(_))));
}

// =============================================================================
// Configuration
// =============================================================================

#[test]
fn test_config_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        "default_target_language = \"German\"\n[pdf]\nfont_size = 10.0\n",
    )
    .unwrap();

    let config = AppConfig::from_file(&path).unwrap();
    assert_eq!(config.default_target_language.as_str(), "German");
    assert!((config.pdf.font_size - 10.0).abs() < f32::EPSILON);
}

#[test]
fn test_config_missing_file() {
    let err = AppConfig::from_file("/nonexistent/doc-translator.toml").unwrap_err();
    assert!(matches!(err, Error::ConfigLoad(_)));
}

// =============================================================================
// OpenAI-compatible Gateway (local fake server)
// =============================================================================

/// Serve `router` on an ephemeral port and return a gateway pointed at it.
async fn gateway_for(router: Router) -> OpenAiGateway {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let mut config = GatewayConfig::new(format!("http://{addr}/v1"), Some("sk-test".into()), "test-model");
    config.timeout_secs = 5;
    OpenAiGateway::new(&config).unwrap()
}

fn completion(content: &str) -> Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [
            {"index": 0, "message": {"role": "assistant", "content": content}, "finish_reason": "stop"}
        ]
    })
}

fn status_router(status: StatusCode) -> Router {
    Router::new().route(
        "/v1/chat/completions",
        post(move || async move { (status, "nope").into_response() }),
    )
}

#[tokio::test]
async fn test_gateway_sends_chat_request() {
    let seen: Arc<Mutex<Option<(Value, Option<String>)>>> = Arc::default();
    let recorder = Arc::clone(&seen);
    let router = Router::new().route(
        "/v1/chat/completions",
        post(move |headers: axum::http::HeaderMap, Json(body): Json<Value>| async move {
            let auth = headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            *recorder.lock().unwrap() = Some((body, auth));
            Json(completion("  Bonjour le monde \n"))
        }),
    );
    let gateway = gateway_for(router).await;

    let result = gateway
        .transform(
            "Hello world",
            &Instruction::Translate {
                target: Language::new("French"),
            },
        )
        .await
        .unwrap();
    assert_eq!(result, "Bonjour le monde");

    let (body, auth) = seen.lock().unwrap().clone().unwrap();
    assert_eq!(auth.as_deref(), Some("Bearer sk-test"));
    assert_eq!(body["model"], "test-model");
    assert_eq!(body["max_tokens"], 2048);
    assert_eq!(
        body["messages"],
        json!([
            {"role": "system", "content": "Translate the following text to French."},
            {"role": "user", "content": "Hello world"}
        ])
    );
}

#[tokio::test]
async fn test_gateway_auth_failure() {
    let gateway = gateway_for(status_router(StatusCode::UNAUTHORIZED)).await;
    let err = gateway.transform("x", &Instruction::Summarize).await.unwrap_err();
    assert!(matches!(err, Error::GatewayAuth(_)));
}

#[tokio::test]
async fn test_gateway_rate_limited() {
    let router = Router::new().route(
        "/v1/chat/completions",
        post(|| async { (StatusCode::TOO_MANY_REQUESTS, [("retry-after", "7")], "slow down") }),
    );
    let gateway = gateway_for(router).await;
    let err = gateway.transform("x", &Instruction::Summarize).await.unwrap_err();
    assert!(matches!(err, Error::GatewayRateLimited { retry_after: Some(7) }));
}

#[tokio::test]
async fn test_gateway_server_error() {
    let gateway = gateway_for(status_router(StatusCode::INTERNAL_SERVER_ERROR)).await;
    let err = gateway.transform("x", &Instruction::Summarize).await.unwrap_err();
    assert!(matches!(err, Error::GatewayRequest(ref msg) if msg.contains("500")));
}

#[tokio::test]
async fn test_gateway_no_choices() {
    let router = Router::new().route(
        "/v1/chat/completions",
        post(|| async { Json(json!({"choices": []})) }),
    );
    let gateway = gateway_for(router).await;
    let err = gateway.transform("x", &Instruction::Summarize).await.unwrap_err();
    assert!(matches!(err, Error::GatewayInvalidResponse(_)));
}

#[tokio::test]
async fn test_gateway_empty_content() {
    let router = Router::new().route(
        "/v1/chat/completions",
        post(|| async { Json(completion("   ")) }),
    );
    let gateway = gateway_for(router).await;
    let err = gateway.transform("x", &Instruction::Summarize).await.unwrap_err();
    assert!(matches!(err, Error::GatewayInvalidResponse(_)));
}

#[tokio::test]
async fn test_gateway_unreachable() {
    // Bind then drop to get a port with nothing listening
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = GatewayConfig::new(format!("http://{addr}/v1"), None, "test-model");
    let gateway = OpenAiGateway::new(&config).unwrap();
    let err = gateway.transform("x", &Instruction::Summarize).await.unwrap_err();
    assert!(matches!(err, Error::GatewayRequest(_)));
}
