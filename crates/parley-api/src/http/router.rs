//! Axum router configuration with middleware.
//!
//! All routes are under `/api/v1/`. Middleware: CORS, tracing.

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Sessions
        .route(
            "/sessions",
            post(handlers::session::create_session).get(handlers::session::list_sessions),
        )
        .route(
            "/sessions/{id}",
            get(handlers::session::get_session)
                .patch(handlers::session::rename_session)
                .delete(handlers::session::delete_session),
        )
        .route("/sessions/{id}/cancel", post(handlers::session::cancel_turn))
        // Chat streaming
        .route("/sessions/{id}/messages", post(handlers::chat::send_message))
        // Models
        .route("/models", get(handlers::chat::list_models));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health - Simple health check endpoint.
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use futures_util::StreamExt;

    use parley_core::chat::context::ChatContext;
    use parley_core::llm::box_client::BoxChatClient;
    use parley_core::llm::client::ChatClient;
    use parley_core::llm::stream::FragmentStream;
    use parley_types::config::ParleyConfig;
    use parley_types::llm::{CompletionRequest, LlmError, StreamItem};

    use super::*;

    /// Replies with the fixed fragments, or fails with 401 when there are none.
    struct CannedClient {
        fragments: Vec<&'static str>,
    }

    impl ChatClient for CannedClient {
        fn name(&self) -> &str {
            "canned"
        }

        fn stream(&self, _request: CompletionRequest) -> Result<FragmentStream, LlmError> {
            if self.fragments.is_empty() {
                return Ok(FragmentStream::failed(LlmError::Request {
                    status: 401,
                    message: Some("invalid api key".to_string()),
                }));
            }
            let mut items: Vec<StreamItem> = self
                .fragments
                .iter()
                .map(|t| StreamItem::Fragment(t.to_string()))
                .collect();
            items.push(StreamItem::Complete);
            Ok(FragmentStream::from_items(items))
        }

        async fn chat(&self, _request: &CompletionRequest) -> Result<String, LlmError> {
            Ok(self.fragments.concat())
        }

        async fn list_models(&self) -> Result<Vec<String>, LlmError> {
            Ok(vec!["canned-1".to_string()])
        }
    }

    /// Start the router on an ephemeral port and return its base URL.
    async fn serve(fragments: Vec<&'static str>) -> String {
        let config = ParleyConfig::default();
        let context = ChatContext::new(
            BoxChatClient::new(CannedClient { fragments }),
            None,
            &config,
            None,
        );
        let state = AppState::from_context(context, config, PathBuf::from("/tmp/parley-test"));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, build_router(state)).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn create_session(http: &reqwest::Client, base: &str) -> String {
        let resp = http
            .post(format!("{base}/api/v1/sessions"))
            .json(&serde_json::json!({ "title": "Router test" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);
        let body: serde_json::Value = resp.json().await.unwrap();
        body["data"]["id"].as_str().unwrap().to_string()
    }

    /// Read an SSE body to the end and return `(event, data)` pairs.
    async fn read_events(resp: reqwest::Response) -> Vec<(String, serde_json::Value)> {
        let mut body = resp.bytes_stream();
        let mut raw = Vec::new();
        while let Some(chunk) = body.next().await {
            raw.extend_from_slice(&chunk.unwrap());
        }
        let text = String::from_utf8(raw).unwrap();

        let mut events = Vec::new();
        for block in text.split("\n\n") {
            let mut name = None;
            let mut data = None;
            for line in block.lines() {
                if let Some(value) = line.strip_prefix("event:") {
                    name = Some(value.trim().to_string());
                } else if let Some(value) = line.strip_prefix("data:") {
                    data = Some(serde_json::from_str(value.trim()).unwrap());
                }
            }
            if let (Some(name), Some(data)) = (name, data) {
                events.push((name, data));
            }
        }
        events
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let base = serve(vec!["x"]).await;
        let body: serde_json::Value = reqwest::get(format!("{base}/health")).await.unwrap().json().await.unwrap();
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn session_lifecycle() {
        let base = serve(vec!["x"]).await;
        let http = reqwest::Client::new();

        let empty = http.post(format!("{base}/api/v1/sessions")).send().await.unwrap();
        assert_eq!(empty.status(), 201);
        let empty: serde_json::Value = empty.json().await.unwrap();
        assert_eq!(empty["data"]["title"], "New conversation");

        let id = create_session(&http, &base).await;

        let list: serde_json::Value = http
            .get(format!("{base}/api/v1/sessions"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(list["data"].as_array().unwrap().len(), 2);
        assert_eq!(list["data"][0]["id"], id.as_str());
        assert_eq!(list["data"][0]["busy"], false);

        let renamed = http
            .patch(format!("{base}/api/v1/sessions/{id}"))
            .json(&serde_json::json!({ "title": "Renamed" }))
            .send()
            .await
            .unwrap();
        assert_eq!(renamed.status(), 200);

        let fetched: serde_json::Value = http
            .get(format!("{base}/api/v1/sessions/{id}"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(fetched["data"]["title"], "Renamed");

        let deleted = http.delete(format!("{base}/api/v1/sessions/{id}")).send().await.unwrap();
        assert_eq!(deleted.status(), 200);

        let gone = http.get(format!("{base}/api/v1/sessions/{id}")).send().await.unwrap();
        assert_eq!(gone.status(), 404);
        let gone: serde_json::Value = gone.json().await.unwrap();
        assert_eq!(gone["errors"][0]["code"], "SESSION_NOT_FOUND");
    }

    #[tokio::test]
    async fn invalid_ids_and_bodies_are_rejected() {
        let base = serve(vec!["x"]).await;
        let http = reqwest::Client::new();

        let bad_id = http.get(format!("{base}/api/v1/sessions/not-a-uuid")).send().await.unwrap();
        assert_eq!(bad_id.status(), 400);

        let id = create_session(&http, &base).await;
        let blank = http
            .post(format!("{base}/api/v1/sessions/{id}/messages"))
            .json(&serde_json::json!({ "content": "   " }))
            .send()
            .await
            .unwrap();
        assert_eq!(blank.status(), 400);

        let unknown = uuid::Uuid::now_v7();
        let missing = http
            .post(format!("{base}/api/v1/sessions/{unknown}/messages"))
            .json(&serde_json::json!({ "content": "hi" }))
            .send()
            .await
            .unwrap();
        assert_eq!(missing.status(), 404);
    }

    #[tokio::test]
    async fn send_message_streams_turn_events() {
        let base = serve(vec!["Hi", " there"]).await;
        let http = reqwest::Client::new();
        let id = create_session(&http, &base).await;

        let resp = http
            .post(format!("{base}/api/v1/sessions/{id}/messages"))
            .json(&serde_json::json!({ "content": "Hello" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let events = read_events(resp).await;
        let names: Vec<&str> = events.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, ["turn_started", "fragment", "fragment", "turn_finished"]);
        assert_eq!(events[1].1["text"], "Hi");
        assert_eq!(events[2].1["text"], " there");
        assert_eq!(events[3].1["status"], "final");

        let session: serde_json::Value = http
            .get(format!("{base}/api/v1/sessions/{id}"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let messages = session["data"]["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1]["content"], "Hi there");
        assert_eq!(messages[1]["status"], "final");
    }

    #[tokio::test]
    async fn failed_turn_is_reported_in_stream_and_session() {
        let base = serve(Vec::new()).await;
        let http = reqwest::Client::new();
        let id = create_session(&http, &base).await;

        let resp = http
            .post(format!("{base}/api/v1/sessions/{id}/messages"))
            .json(&serde_json::json!({ "content": "Hello" }))
            .send()
            .await
            .unwrap();
        let events = read_events(resp).await;
        let (name, finished) = events.last().unwrap();
        assert_eq!(name, "turn_finished");
        assert_eq!(finished["status"], "failed");
        assert!(finished["error"].as_str().unwrap().contains("401"));

        let session: serde_json::Value = http
            .get(format!("{base}/api/v1/sessions/{id}"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(session["data"]["error"].as_str().unwrap().contains("401"));
        assert_eq!(session["data"]["messages"][1]["status"], "failed");
        assert_eq!(session["data"]["messages"][1]["content"], "");
    }

    #[tokio::test]
    async fn cancel_without_turn_reports_false() {
        let base = serve(vec!["x"]).await;
        let http = reqwest::Client::new();
        let id = create_session(&http, &base).await;

        let body: serde_json::Value = http
            .post(format!("{base}/api/v1/sessions/{id}/cancel"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["data"]["cancelled"], false);
    }

    #[tokio::test]
    async fn models_are_listed() {
        let base = serve(vec!["x"]).await;
        let body: serde_json::Value = reqwest::get(format!("{base}/api/v1/models"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["data"]["models"][0], "canned-1");
        assert_eq!(body["data"]["default"], "deepseek-chat");
    }
}
