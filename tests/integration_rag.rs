// End-to-end pipeline tests against a mocked provider: real HTTP client,
// real LanceDB store in a temp directory, scripted model behavior.

use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use smart_librarian::catalog::{Book, Catalog};
use smart_librarian::config::Config;
use smart_librarian::index::BookIndex;
use smart_librarian::openai::OpenAiClient;
use smart_librarian::rag::Librarian;

const KEYWORDS: [&str; 5] = ["libertate", "control", "magie", "prietenie", "aventură"];

fn keyword_vector(text: &str) -> Vec<f32> {
    let lower = text.to_lowercase();
    let mut vector: Vec<f32> = KEYWORDS
        .iter()
        .map(|keyword| lower.matches(keyword).count() as f32)
        .collect();
    // Bias dimension so no document embeds to the zero vector.
    vector.push(0.1);
    vector
}

/// Embeddings endpoint that derives a deterministic vector from keyword
/// counts in each input, one vector per input in request order.
struct KeywordEmbeddings;

impl Respond for KeywordEmbeddings {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).expect("should parse body");
        let inputs = body["input"].as_array().cloned().unwrap_or_default();
        let data: Vec<Value> = inputs
            .iter()
            .enumerate()
            .map(|(index, input)| {
                json!({
                    "index": index,
                    "embedding": keyword_vector(input.as_str().unwrap_or_default()),
                })
            })
            .collect();
        ResponseTemplate::new(200).set_body_json(json!({ "data": data }))
    }
}

fn test_catalog() -> Catalog {
    let books = vec![
        Book {
            title: "1984".to_string(),
            short_summary: "O distopie despre supraveghere și adevăr rescris.".to_string(),
            themes: vec!["libertate".to_string(), "control social".to_string()],
            full_summary: "Rezumat complet despre 1984: Winston Smith împotriva Partidului."
                .to_string(),
        },
        Book {
            title: "Hobbitul".to_string(),
            short_summary: "Bilbo pleacă fără voie într-o aventură cu pitici.".to_string(),
            themes: vec!["aventură".to_string(), "curaj".to_string()],
            full_summary: "Rezumat complet despre Hobbitul: drumul lui Bilbo spre Muntele Singuratic."
                .to_string(),
        },
        Book {
            title: "Harry Potter și Piatra Filozofală".to_string(),
            short_summary: "Un băiat descoperă o lume a magiei și a prieteniei.".to_string(),
            themes: vec!["magie".to_string(), "prietenie".to_string()],
            full_summary: "Rezumat complet despre Harry Potter: primul an la Hogwarts.".to_string(),
        },
    ];
    Catalog::from_books(books).expect("should build catalog")
}

fn test_config(server_uri: &str, store: &TempDir) -> Config {
    Config {
        api_key: Some("sk-test-key".to_string()),
        api_base: server_uri.to_string(),
        store_path: store.path().to_path_buf(),
        ..Config::default()
    }
}

async fn mount_embeddings(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(KeywordEmbeddings)
        .mount(server)
        .await;
}

fn tool_call_reply(title: &str) -> Value {
    json!({
        "choices": [{
            "message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call-1",
                    "type": "function",
                    "function": {
                        "name": "get_summary_by_title",
                        "arguments": format!("{{\"title\": \"{}\"}}", title),
                    },
                }],
            },
        }],
    })
}

fn plain_reply(content: &str) -> Value {
    json!({
        "choices": [{
            "message": { "role": "assistant", "content": content },
        }],
    })
}

async fn chat_requests(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .expect("request recording should be enabled")
        .iter()
        .filter(|r| r.url.path() == "/chat/completions")
        .map(|r| serde_json::from_slice(&r.body).expect("should parse chat body"))
        .collect()
}

#[tokio::test(flavor = "multi_thread")]
async fn recommends_1984_end_to_end_via_tool_call() {
    let server = MockServer::start().await;
    mount_embeddings(&server).await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tool_call_reply("1984")))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(plain_reply(
            "Îți recomand 1984.\n\n„Rezumat complet”\nRezumat complet despre 1984: Winston Smith împotriva Partidului.",
        )))
        .mount(&server)
        .await;

    let store = TempDir::new().expect("should create temp dir");
    let config = test_config(&server.uri(), &store);
    let catalog = test_catalog();
    let client = OpenAiClient::new(&config).expect("should build client");

    let index = BookIndex::open(&config).await.expect("should open store");
    index
        .build_or_load(&client, &catalog, false)
        .await
        .expect("should build index");

    let question = "Vreau o carte despre libertate și control social.";
    let retrieved = index
        .search(&client, question, 3)
        .await
        .expect("should search");
    assert_eq!(retrieved.len(), 3);
    assert_eq!(retrieved[0].title, "1984");

    let librarian = Librarian::new(&client, &catalog);
    let answer = librarian
        .answer(question, &retrieved)
        .expect("should answer");
    assert!(answer.contains("Îți recomand 1984"));

    let requests = chat_requests(&server).await;
    assert_eq!(requests.len(), 2);

    // First turn declares the tool; the finalizing turn must not.
    let first = &requests[0];
    assert_eq!(first["tool_choice"], "auto");
    assert_eq!(
        first["tools"][0]["function"]["name"],
        "get_summary_by_title"
    );
    let user_content = first["messages"][1]["content"]
        .as_str()
        .expect("user message should have content");
    assert!(user_content.contains("BOOK_CONTEXT"));
    assert!(user_content.contains("[1] Titlu: 1984"));

    let second = &requests[1];
    assert!(second.get("tools").is_none());
    let messages = second["messages"].as_array().expect("should have messages");
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[3]["role"], "tool");
    assert_eq!(messages[3]["tool_call_id"], "call-1");
    let tool_content = messages[3]["content"]
        .as_str()
        .expect("tool message should have content");
    assert!(tool_content.contains("Rezumat complet despre 1984"));
}

#[tokio::test(flavor = "multi_thread")]
async fn build_is_idempotent_and_rebuild_reembeds() {
    let server = MockServer::start().await;
    mount_embeddings(&server).await;

    let store = TempDir::new().expect("should create temp dir");
    let config = test_config(&server.uri(), &store);
    let catalog = test_catalog();
    let client = OpenAiClient::new(&config).expect("should build client");

    let index = BookIndex::open(&config).await.expect("should open store");
    index
        .build_or_load(&client, &catalog, false)
        .await
        .expect("should build index");
    assert_eq!(index.count().await.expect("should count"), 3);

    // A populated table is left untouched, so no second embedding call.
    index
        .build_or_load(&client, &catalog, false)
        .await
        .expect("should skip rebuild");
    assert_eq!(index.count().await.expect("should count"), 3);

    let embed_calls = |requests: &[Request]| {
        requests
            .iter()
            .filter(|r| r.url.path() == "/embeddings")
            .count()
    };
    let requests = server
        .received_requests()
        .await
        .expect("request recording should be enabled");
    assert_eq!(embed_calls(&requests), 1);

    index
        .build_or_load(&client, &catalog, true)
        .await
        .expect("should rebuild index");
    assert_eq!(index.count().await.expect("should count"), 3);

    let requests = server
        .received_requests()
        .await
        .expect("request recording should be enabled");
    assert_eq!(embed_calls(&requests), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn fallback_appends_top_summary_when_model_skips_the_tool() {
    let server = MockServer::start().await;
    mount_embeddings(&server).await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(plain_reply(
            "Îți recomand 1984 pentru temele de libertate.",
        )))
        .mount(&server)
        .await;

    let store = TempDir::new().expect("should create temp dir");
    let config = test_config(&server.uri(), &store);
    let catalog = test_catalog();
    let client = OpenAiClient::new(&config).expect("should build client");

    let index = BookIndex::open(&config).await.expect("should open store");
    index
        .build_or_load(&client, &catalog, false)
        .await
        .expect("should build index");

    let question = "Vreau o carte despre libertate și control social.";
    let retrieved = index
        .search(&client, question, 3)
        .await
        .expect("should search");

    let librarian = Librarian::new(&client, &catalog);
    let answer = librarian
        .answer(question, &retrieved)
        .expect("should answer");

    assert!(answer.starts_with("Îți recomand 1984 pentru temele de libertate."));
    assert!(answer.contains("**Rezumat complet**"));
    assert!(answer.contains("Rezumat complet despre 1984"));

    // Only the one chat turn happened.
    assert_eq!(chat_requests(&server).await.len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn provider_errors_propagate_unwrapped() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let store = TempDir::new().expect("should create temp dir");
    let config = test_config(&server.uri(), &store);
    let catalog = test_catalog();
    let client = OpenAiClient::new(&config).expect("should build client");

    let index = BookIndex::open(&config).await.expect("should open store");
    let err = index
        .build_or_load(&client, &catalog, false)
        .await
        .expect_err("rate limit should fail the build");
    assert!(err.to_string().contains("429"));

    // The single failed attempt is the only one; no retries.
    let requests = server
        .received_requests()
        .await
        .expect("request recording should be enabled");
    assert_eq!(requests.len(), 1);
}
