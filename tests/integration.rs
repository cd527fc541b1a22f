//! End-to-end tests: the real server on a free port, driven over HTTP.
//!
//! Generation and translation use scripted providers from `common`, so the
//! tests can see exactly which prompt and which translation calls a request
//! produced. Embeddings use the built-in hash embedder.

mod common;

use common::{pdf_with_pages, EchoGenerator, TestServer, ENGLISH_QUESTION, NEPALI_QUESTION};
use doc_qa::models::Language;
use reqwest::multipart::{Form, Part};
use serde_json::{json, Value};

const PAGE_ONE: &str = "Kathmandu is the capital city of Nepal and sits in a wide valley.";
const PAGE_TWO: &str = "Mount Everest rises on the northern border with Tibet.";

fn pdf_form(files: Vec<(&str, Vec<u8>)>) -> Form {
    files.into_iter().fold(Form::new(), |form, (name, bytes)| {
        form.part(
            "files",
            Part::bytes(bytes)
                .file_name(name.to_string())
                .mime_str("application/pdf")
                .unwrap(),
        )
    })
}

async fn upload(server: &TestServer, files: Vec<(&str, Vec<u8>)>) -> reqwest::Response {
    reqwest::Client::new()
        .post(server.url("/upload/"))
        .multipart(pdf_form(files))
        .send()
        .await
        .unwrap()
}

async fn ask(server: &TestServer, query: &str, language: &str) -> reqwest::Response {
    reqwest::Client::new()
        .post(server.url("/query/"))
        .json(&json!({ "query": query, "language": language }))
        .send()
        .await
        .unwrap()
}

async fn index_loaded(server: &TestServer) -> bool {
    let body: Value = reqwest::get(server.url("/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    body["index_loaded"].as_bool().unwrap()
}

#[tokio::test]
async fn test_health_reports_version_and_no_index() {
    let server = TestServer::start().await;
    let body: Value = reqwest::get(server.url("/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["index_loaded"], false);
}

#[tokio::test]
async fn test_non_pdf_upload_rejected() {
    let server = TestServer::start().await;

    let resp = upload(&server, vec![("notes.txt", b"plain text".to_vec())]).await;
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("notes.txt"));

    assert!(!index_loaded(&server).await);
    assert!(server.upload_dir_is_empty());
}

#[tokio::test]
async fn test_mixed_batch_with_non_pdf_rejected_whole() {
    let server = TestServer::start().await;

    let resp = upload(
        &server,
        vec![
            ("good.pdf", pdf_with_pages(&[PAGE_ONE])),
            ("bad.docx", b"not a pdf".to_vec()),
        ],
    )
    .await;
    assert_eq!(resp.status(), 400);
    assert!(!index_loaded(&server).await);
    assert!(server.upload_dir_is_empty());
}

#[tokio::test]
async fn test_upload_then_document_query() {
    let server = TestServer::start().await;

    let resp = upload(&server, vec![("nepal.pdf", pdf_with_pages(&[PAGE_ONE, PAGE_TWO]))]).await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Successfully processed 1 files");
    assert!(index_loaded(&server).await);

    let resp = ask(&server, "What is the capital of Nepal?", "en").await;
    assert_eq!(resp.status(), 200);
    let answer: Value = resp.json().await.unwrap();
    assert_eq!(answer["mode"], "document");
    assert_eq!(answer["complete"], true);
    assert_eq!(answer["truncated"], false);

    let prompts = server.generator.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].starts_with("Based on the following content from the documents"));
    assert!(prompts[0].contains("Kathmandu is the capital city of Nepal"));
    assert!(prompts[0].contains("Question: What is the capital of Nepal?"));
    // English queries never touch the translator.
    assert!(server.translator.calls().is_empty());
}

#[tokio::test]
async fn test_query_without_upload_is_general() {
    let server = TestServer::start().await;

    let resp = ask(&server, "hello", "en").await;
    assert_eq!(resp.status(), 200);
    let answer: Value = resp.json().await.unwrap();
    assert_eq!(answer["mode"], "general");
    assert_eq!(
        answer["response"],
        "Please respond to the following question or statement in a helpful and informative way:\n\nQuestion: hello"
    );
}

#[tokio::test]
async fn test_blank_query_is_answered_in_general_mode() {
    let server = TestServer::start().await;

    for text in ["", "   "] {
        let resp = ask(&server, text, "en").await;
        assert_eq!(resp.status(), 200);
        let answer: Value = resp.json().await.unwrap();
        assert_eq!(answer["mode"], "general");
    }
    assert_eq!(server.generator.prompts().len(), 2);
}

#[tokio::test]
async fn test_nepali_query_round_trip() {
    let server = TestServer::start().await;
    upload(&server, vec![("nepal.pdf", pdf_with_pages(&[PAGE_ONE, PAGE_TWO]))]).await;

    let resp = ask(&server, NEPALI_QUESTION, "ne").await;
    assert_eq!(resp.status(), 200);
    let answer: Value = resp.json().await.unwrap();
    assert_eq!(answer["mode"], "document");

    let prompts = server.generator.prompts();
    assert!(prompts[0].contains(&format!("Question: {}", ENGLISH_QUESTION)));
    assert!(!prompts[0].contains(NEPALI_QUESTION));

    let calls = server.translator.calls();
    assert_eq!(calls[0], (NEPALI_QUESTION.to_string(), Language::Ne, Language::En));
    assert!(calls[1..]
        .iter()
        .all(|(_, from, to)| *from == Language::En && *to == Language::Ne));
    assert!(answer["response"].as_str().unwrap().starts_with("[ne] "));
}

#[tokio::test]
async fn test_clear_returns_to_general_mode() {
    let server = TestServer::start().await;
    let resp = upload(&server, vec![("nepal.pdf", pdf_with_pages(&[PAGE_ONE]))]).await;
    assert_eq!(resp.status(), 200);
    assert!(!server.upload_dir_is_empty());

    let resp = reqwest::Client::new()
        .post(server.url("/clear/"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "All data cleared successfully");

    let answer: Value = ask(&server, "What is the capital?", "en")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(answer["mode"], "general");
    assert!(server.upload_dir_is_empty());
}

#[tokio::test]
async fn test_new_upload_replaces_previous_corpus() {
    let server = TestServer::start().await;
    upload(&server, vec![("first.pdf", pdf_with_pages(&[PAGE_ONE]))]).await;
    upload(&server, vec![("second.pdf", pdf_with_pages(&[PAGE_TWO]))]).await;

    ask(&server, "Tell me about mountains", "en").await;
    let prompt = server.generator.prompts().pop().unwrap();
    assert!(prompt.contains("Mount Everest"));
    assert!(!prompt.contains("Kathmandu"));

    let names: Vec<String> = std::fs::read_dir(&server.config.storage.upload_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["second.pdf"]);
}

#[tokio::test]
async fn test_corrupt_pdf_is_server_error_and_resets() {
    let server = TestServer::start().await;
    upload(&server, vec![("good.pdf", pdf_with_pages(&[PAGE_ONE]))]).await;
    assert!(index_loaded(&server).await);

    let resp = upload(&server, vec![("broken.pdf", b"%PDF-1.4 garbage".to_vec())]).await;
    assert_eq!(resp.status(), 500);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "internal");

    assert!(!index_loaded(&server).await);
    assert!(server.upload_dir_is_empty());
}

#[tokio::test]
async fn test_incomplete_marker_clears_complete_flag() {
    let server =
        TestServer::start_with(EchoGenerator::with_suffix("Note: The response may be incomplete."))
            .await;
    let answer: Value = ask(&server, "hello", "en").await.json().await.unwrap();
    assert_eq!(answer["complete"], false);
}

#[tokio::test]
async fn test_bad_query_payloads_are_400() {
    let server = TestServer::start().await;
    let client = reqwest::Client::new();

    let resp = ask(&server, "hello", "fr").await;
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");

    let resp = client
        .post(server.url("/query/"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    assert!(server.generator.prompts().is_empty());
}

#[tokio::test]
async fn test_routes_answer_without_trailing_slash() {
    let server = TestServer::start().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(server.url("/query"))
        .json(&json!({ "query": "hello", "language": "en" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client.post(server.url("/clear")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_empty_multipart_is_400() {
    let server = TestServer::start().await;
    let form = Form::new().text("note", "no files here");
    let resp = reqwest::Client::new()
        .post(server.url("/upload/"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_upload_over_body_limit_is_413() {
    let server = TestServer::start_configured(EchoGenerator::default(), |cfg| {
        cfg.server.max_upload_bytes = 1024;
    })
    .await;

    let big_page = "Kathmandu valley. ".repeat(400);
    let resp = upload(&server, vec![("big.pdf", pdf_with_pages(&[&big_page]))]).await;
    assert_eq!(resp.status(), 413);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "payload_too_large");
    assert!(body["error"]["message"].as_str().unwrap().contains("1024 bytes"));

    assert!(!index_loaded(&server).await);
    assert!(server.upload_dir_is_empty());
}
