/// Integration tests with a mocked Gemini endpoint
/// Exercises the text-generation client and the daily advice cache without network access
use agro_finance_api::advice::{AdviceService, MemoryAdviceStore, TextGenerator, ADVICE_PROMPT};
use agro_finance_api::errors::AppError;
use agro_finance_api::gemini_client::GeminiClient;
use chrono::NaiveDate;
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MODEL_PATH: &str = "/v1beta/models/gemini-1.5-flash:generateContent";

fn client_for(server: &MockServer) -> GeminiClient {
    GeminiClient::new(
        server.uri(),
        "gemini-1.5-flash".to_string(),
        "test_key".to_string(),
    )
    .expect("client builds")
}

fn candidate_body(parts: &[&str]) -> serde_json::Value {
    let parts: Vec<_> = parts.iter().map(|t| serde_json::json!({ "text": t })).collect();
    serde_json::json!({
        "candidates": [
            { "content": { "role": "model", "parts": parts } }
        ]
    })
}

#[tokio::test]
async fn test_gemini_successful_response() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .and(query_param("key", "test_key"))
        .and(body_partial_json(serde_json::json!({
            "contents": [{ "parts": [{ "text": ADVICE_PROMPT }] }]
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(candidate_body(&["Ahorre una parte ", "de cada cosecha."])),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let text = client.generate(ADVICE_PROMPT).await.expect("generation succeeds");

    assert_eq!(text, "Ahorre una parte de cada cosecha.");
}

#[tokio::test]
async fn test_gemini_error_status_is_external_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let err = client.generate(ADVICE_PROMPT).await.unwrap_err();

    match err {
        AppError::ExternalApiError(msg) => assert!(msg.contains("429")),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_gemini_empty_candidates_is_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "candidates": [] })))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let result = client.generate(ADVICE_PROMPT).await;

    assert!(matches!(result, Err(AppError::ExternalApiError(_))));
}

#[tokio::test]
async fn test_gemini_unparseable_body_is_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    assert!(client.generate(ADVICE_PROMPT).await.is_err());
}

#[tokio::test]
async fn test_advice_service_calls_gemini_once_per_day() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(candidate_body(&["  Diversifique sus cultivos.\n"])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = Arc::new(MemoryAdviceStore::new());
    let service = AdviceService::new(store.clone(), Arc::new(client_for(&mock_server)));
    let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();

    let first = service.get_advice(today).await.unwrap();
    let second = service.get_advice(today).await.unwrap();

    assert_eq!(first, "Diversifique sus cultivos.");
    assert_eq!(first, second);

    let slot = store.snapshot().await.expect("slot written");
    assert_eq!(slot.date, today);
    assert_eq!(slot.text, first);
    // MockServer verifies `expect(1)` on drop
}
