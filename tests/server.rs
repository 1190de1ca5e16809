//! HTTP API tests: the router is served on an ephemeral port and called
//! with `reqwest`.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tempfile::TempDir;

use code_lens::config::Config;
use code_lens::db;
use code_lens::generate::DisabledGenerator;
use code_lens::migrate;
use code_lens::server::router;
use code_lens::service::Lens;
use code_lens::sqlite_store::SqliteStore;
use code_lens_core::embedding::Embedder;
use code_lens_core::error::RagError;

/// Two axes: `auth` count and a constant.
struct AuthEmbedder;

#[async_trait]
impl Embedder for AuthEmbedder {
    fn model_name(&self) -> &str {
        "auth-axis"
    }
    fn dims(&self) -> usize {
        2
    }
    async fn embed(&self, text: &str) -> code_lens_core::Result<Vec<f32>> {
        if text.contains("EMBED_FAIL") {
            return Err(RagError::embedding("provider unavailable"));
        }
        Ok(vec![text.matches("auth").count() as f32, 0.2])
    }
}

async fn spawn_server(tmp: &TempDir) -> String {
    let config = Config::with_db(tmp.path().join("lens.sqlite"));
    let pool = db::connect(&config).await.unwrap();
    migrate::apply(&pool).await.unwrap();
    let store = Arc::new(SqliteStore::new(pool));
    let lens = Lens::from_parts(
        config,
        store.clone(),
        store,
        Arc::new(AuthEmbedder),
        Arc::new(DisabledGenerator),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(lens)).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn call(client: &reqwest::Client, base: &str, tool: &str, body: Value) -> (u16, Value) {
    let resp = client
        .post(format!("{}/tools/{}", base, tool))
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

#[tokio::test]
async fn test_health() {
    let tmp = TempDir::new().unwrap();
    let base = spawn_server(&tmp).await;
    let body: Value = reqwest::get(format!("{}/health", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_index_then_search_and_build_context() {
    let tmp = TempDir::new().unwrap();
    let base = spawn_server(&tmp).await;
    let client = reqwest::Client::new();

    let (status, body) = call(
        &client,
        &base,
        "index_chunk",
        json!({"content": "auth.check(user)", "file_path": "src/auth.py", "line_start": 1, "line_end": 2}),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["result"]["id"], "src/auth.py:1-2");

    let (status, body) = call(
        &client,
        &base,
        "similarity_search",
        json!({"query": "auth.login()", "top_k": 3}),
    )
    .await;
    assert_eq!(status, 200);
    let results = body["result"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["source_id"], "src/auth.py:1-2");
    assert_eq!(results[0]["payload"]["kind"], "code");

    let (status, body) = call(
        &client,
        &base,
        "build_rag_context",
        json!({"target_code": "auth.login()", "file_path": "src/auth.py"}),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["result"]["file_path"], "src/auth.py");
    assert_eq!(body["result"]["similar_code"].as_array().unwrap().len(), 1);
    assert_eq!(body["result"]["documentation"], json!([]));

    let (status, body) = call(
        &client,
        &base,
        "format_prompt",
        json!({"target_code": "auth.login()", "file_path": "src/auth.py"}),
    )
    .await;
    assert_eq!(status, 200);
    let prompt = body["result"]["prompt"].as_str().unwrap();
    assert!(prompt.contains("### src/auth.py (lines 1-2):"));
}

#[tokio::test]
async fn test_commit_context_empty_for_unknown_file() {
    let tmp = TempDir::new().unwrap();
    let base = spawn_server(&tmp).await;
    let client = reqwest::Client::new();

    let (status, body) = call(
        &client,
        &base,
        "get_commit_context",
        json!({"file_path": "nowhere.py"}),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["result"], json!([]));
}

#[tokio::test]
async fn test_error_contract() {
    let tmp = TempDir::new().unwrap();
    let base = spawn_server(&tmp).await;
    let client = reqwest::Client::new();

    let (status, body) = call(&client, &base, "no_such_tool", json!({})).await;
    assert_eq!(status, 404);
    assert_eq!(body["error"]["code"], "not_found");

    let (status, body) = call(&client, &base, "similarity_search", json!({"top_k": 2})).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "bad_request");

    let (status, body) = call(
        &client,
        &base,
        "build_rag_context",
        json!({"target_code": "  ", "file_path": "a.py"}),
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "bad_request");

    let (status, body) = call(
        &client,
        &base,
        "similarity_search",
        json!({"query": "EMBED_FAIL"}),
    )
    .await;
    assert_eq!(status, 502);
    assert_eq!(body["error"]["code"], "embedding_error");

    let (status, body) = call(
        &client,
        &base,
        "explain",
        json!({"target_code": "auth()", "file_path": "a.py"}),
    )
    .await;
    assert_eq!(status, 502);
    assert_eq!(body["error"]["code"], "generation_error");

    let resp = client
        .post(format!("{}/tools/build_rag_context", base))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .starts_with("build_rag_context: invalid request body"));

    let resp = client
        .post(format!("{}/tools/similarity_search", base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");
}
