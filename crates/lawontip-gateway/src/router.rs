use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::handler::Handler;
use axum::http::{Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use tokio::sync::Mutex;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    api_chat_handler, api_chat_stream_handler, api_clear_handler, chat_back_handler,
    chat_clear_handler, chat_page_handler, chat_submit_handler, health_handler, landing_handler,
};
use crate::server::AppState;

const MAX_RATE_LIMIT_ENTRIES: usize = 10_000;
const RATE_WINDOW: Duration = Duration::from_secs(60);

#[derive(Clone)]
struct RateLimitState {
    limit: u32,
    counters: Arc<Mutex<HashMap<IpAddr, (u32, Instant)>>>,
}

/// Routes of the web interface. Every route that reaches the model is rate
/// limited per client IP; a `rate_limit` of 0 disables the limit.
pub fn build_router(state: AppState, rate_limit: u32, max_body_size: usize) -> Router {
    let rate_state = RateLimitState {
        limit: rate_limit,
        counters: Arc::new(Mutex::new(HashMap::new())),
    };

    let limited = middleware::from_fn_with_state(rate_state, rate_limit_middleware);

    Router::new()
        .route("/", get(landing_handler))
        .route(
            "/chat",
            get(chat_page_handler).post(chat_submit_handler.layer(limited.clone())),
        )
        .route("/chat/clear", post(chat_clear_handler))
        .route("/chat/back", post(chat_back_handler))
        .route(
            "/api/chat",
            post(api_chat_handler.layer(limited.clone())).delete(api_clear_handler),
        )
        .route("/api/chat/stream", post(api_chat_stream_handler.layer(limited)))
        .route("/health", get(health_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestBodyLimitLayer::new(max_body_size)),
        )
        .with_state(state)
}

async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if state.limit == 0 {
        return next.run(req).await;
    }

    let ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED), |ci| ci.0.ip());

    let now = Instant::now();
    let mut counters = state.counters.lock().await;

    if counters.len() >= MAX_RATE_LIMIT_ENTRIES && !counters.contains_key(&ip) {
        counters.retain(|_, (_, ts)| now.duration_since(*ts) < RATE_WINDOW);
    }

    let entry = counters.entry(ip).or_insert((0, now));
    if now.duration_since(entry.1) >= RATE_WINDOW {
        *entry = (1, now);
    } else {
        entry.0 += 1;
        if entry.0 > state.limit {
            tracing::warn!(%ip, limit = state.limit, "rate limit exceeded");
            return StatusCode::TOO_MANY_REQUESTS.into_response();
        }
    }
    drop(counters);

    next.run(req).await
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE};
    use http_body_util::BodyExt;
    use lawontip_core::{Assistant, AssistantSettings};
    use lawontip_llm::any::{AnyCompleter, AnyEmbedder};
    use lawontip_llm::mock::{MockCompleter, MockEmbedder, MockFailure};
    use lawontip_memory::{ChunkPayload, FlatIndex, Metric, VectorPoint, VectorStore};
    use tower::ServiceExt;

    use super::*;
    use crate::session::SESSION_COOKIE;

    async fn test_state(completer: MockCompleter) -> AppState {
        let embedder = MockEmbedder::default();
        let index = Arc::new(FlatIndex::new(Metric::Cosine, "mock-embedding"));
        let text = "Section 420. Cheating and dishonestly inducing delivery of property.";
        index
            .upsert(vec![VectorPoint::new(
                embedder.vector_for(text),
                ChunkPayload {
                    text: text.into(),
                    source: "ipc.pdf".into(),
                    page: 2,
                    chunk_index: 0,
                },
            )])
            .await
            .unwrap();
        let assistant = Assistant::new(
            AnyEmbedder::Mock(embedder),
            AnyCompleter::Mock(completer),
            index,
            AssistantSettings::default(),
        );
        AppState::new(Arc::new(assistant), Duration::from_secs(60))
    }

    async fn make_router(completer: MockCompleter, rate_limit: u32) -> Router {
        build_router(test_state(completer).await, rate_limit, 65_536)
    }

    fn cookie_of(resp: &Response) -> String {
        let value = resp.headers().get(SET_COOKIE).unwrap().to_str().unwrap();
        assert!(value.contains("HttpOnly"));
        assert!(value.contains("SameSite=Lax"));
        value.split(';').next().unwrap().to_owned()
    }

    async fn body_text(resp: Response) -> String {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn json_post(uri: &str, cookie: Option<&str>, body: &serde_json::Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, "application/json");
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        builder
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .unwrap()
    }

    fn form_post(uri: &str, cookie: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(COOKIE, cookie)
            .body(Body::from(body.to_owned()))
            .unwrap()
    }

    fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn health_reports_index_size() {
        let app = make_router(MockCompleter::default(), 0).await;
        let resp = app.oneshot(get("/health", None)).await.unwrap();
        assert_eq!(resp.status(), 200);
        let json: serde_json::Value = serde_json::from_str(&body_text(resp).await).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["index_chunks"], 1);
    }

    #[tokio::test]
    async fn first_visit_sets_session_cookie() {
        let app = make_router(MockCompleter::default(), 0).await;
        let resp = app.clone().oneshot(get("/", None)).await.unwrap();
        assert_eq!(resp.status(), 200);
        let cookie = cookie_of(&resp);
        assert!(cookie.starts_with(SESSION_COOKIE));
        assert!(body_text(resp).await.contains("Start Chatting"));

        let again = app.oneshot(get("/", Some(&cookie))).await.unwrap();
        assert!(again.headers().get(SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn navigation_state_follows_session() {
        let app = make_router(MockCompleter::default(), 0).await;
        let resp = app.clone().oneshot(get("/chat", None)).await.unwrap();
        let cookie = cookie_of(&resp);
        assert!(body_text(resp).await.contains("LAWONTIP Chat"));

        let resp = app.clone().oneshot(get("/", Some(&cookie))).await.unwrap();
        assert_eq!(resp.status(), 303);
        assert_eq!(resp.headers()[LOCATION], "/chat");

        let resp = app
            .clone()
            .oneshot(form_post("/chat/back", &cookie, ""))
            .await
            .unwrap();
        assert_eq!(resp.headers()[LOCATION], "/");
        let resp = app.oneshot(get("/", Some(&cookie))).await.unwrap();
        assert_eq!(resp.status(), 200);
    }

    #[tokio::test]
    async fn form_submit_redirects_and_shows_answer() {
        let completer = MockCompleter::with_responses(vec!["**Section 420** covers cheating.".into()]);
        let app = make_router(completer, 0).await;
        let cookie = cookie_of(&app.clone().oneshot(get("/chat", None)).await.unwrap());

        let resp = app
            .clone()
            .oneshot(form_post(
                "/chat",
                &cookie,
                "mode=question&message=What+is+Section+420+of+the+IPC%3F",
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), 303);
        assert_eq!(resp.headers()[LOCATION], "/chat");

        let page = body_text(app.oneshot(get("/chat", Some(&cookie))).await.unwrap()).await;
        assert!(page.contains("What is Section 420 of the IPC?"));
        assert!(page.contains("<strong>Section 420</strong> covers cheating."));
        assert!(page.contains("ipc.pdf, page 2"));
    }

    #[tokio::test]
    async fn injected_script_link_is_not_rendered_live() {
        let completer = MockCompleter::with_responses(vec![
            "Read [Section 420](javascript:alert(document.cookie)) first.".into(),
        ]);
        let app = make_router(completer, 0).await;
        let cookie = cookie_of(&app.clone().oneshot(get("/chat", None)).await.unwrap());
        app.clone()
            .oneshot(form_post("/chat", &cookie, "message=Section+420"))
            .await
            .unwrap();

        let page = body_text(app.oneshot(get("/chat", Some(&cookie))).await.unwrap()).await;
        assert!(page.contains(r##"<a href="#">Section 420</a>"##));
        assert!(!page.contains("javascript:"));
    }

    #[tokio::test]
    async fn clear_empties_transcript() {
        let app = make_router(MockCompleter::default(), 0).await;
        let cookie = cookie_of(&app.clone().oneshot(get("/chat", None)).await.unwrap());
        app.clone()
            .oneshot(form_post("/chat", &cookie, "message=first+question"))
            .await
            .unwrap();
        let resp = app
            .clone()
            .oneshot(form_post("/chat/clear", &cookie, ""))
            .await
            .unwrap();
        assert_eq!(resp.status(), 303);

        let page = body_text(app.oneshot(get("/chat", Some(&cookie))).await.unwrap()).await;
        assert!(!page.contains("first question"));
        assert!(page.contains("No messages yet."));
    }

    #[tokio::test]
    async fn api_chat_returns_answer_and_sources() {
        let app = make_router(MockCompleter::default(), 0).await;
        let body = serde_json::json!({"message": "Section 420 cheating", "mode": "question"});
        let resp = app.oneshot(json_post("/api/chat", None, &body)).await.unwrap();
        assert_eq!(resp.status(), 200);
        assert!(resp.headers().get(SET_COOKIE).is_some());
        let json: serde_json::Value = serde_json::from_str(&body_text(resp).await).unwrap();
        assert_eq!(json["answer"], "mock response");
        assert_eq!(json["sources"][0]["page"], 2);
        assert!(json["error"].is_null());
    }

    #[tokio::test]
    async fn api_chat_reports_provider_failure() {
        let app = make_router(MockCompleter::failing(MockFailure::Unauthorized), 0).await;
        let body = serde_json::json!({"message": "hi"});
        let resp = app.oneshot(json_post("/api/chat", None, &body)).await.unwrap();
        assert_eq!(resp.status(), 200);
        let json: serde_json::Value = serde_json::from_str(&body_text(resp).await).unwrap();
        assert!(json["error"].as_str().unwrap().contains("Authentication"));
        assert_eq!(json["answer"], "");
    }

    #[tokio::test]
    async fn api_chat_rejects_empty_message() {
        let app = make_router(MockCompleter::default(), 0).await;
        let body = serde_json::json!({"message": "   "});
        let resp = app.oneshot(json_post("/api/chat", None, &body)).await.unwrap();
        assert_eq!(resp.status(), 400);
    }

    #[tokio::test]
    async fn api_stream_emits_tokens_then_sources_and_records_turn() {
        let completer = MockCompleter::with_responses(vec!["Section 420 applies".into()]);
        let app = make_router(completer.clone(), 0).await;
        let body = serde_json::json!({"message": "Section 420 cheating"});
        let resp = app
            .clone()
            .oneshot(json_post("/api/chat/stream", None, &body))
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.headers()[CONTENT_TYPE], "text/event-stream");
        let cookie = cookie_of(&resp);

        let text = body_text(resp).await;
        let token_at = text.find("event: token").unwrap();
        let sources_at = text.find("event: sources").unwrap();
        assert!(token_at < sources_at);
        assert!(text.contains("data: Section "));
        assert!(text.contains("\"page\":2"));

        let next = serde_json::json!({"message": "and the punishment?"});
        app.oneshot(json_post("/api/chat", Some(&cookie), &next))
            .await
            .unwrap();
        let prompt = &completer.requests()[1][1].content;
        assert!(prompt.contains("Human: Section 420 cheating\nAssistant: Section 420 applies"));
    }

    #[tokio::test]
    async fn api_stream_failure_emits_error_event() {
        let app = make_router(MockCompleter::failing(MockFailure::Transient), 0).await;
        let body = serde_json::json!({"message": "hi"});
        let resp = app.oneshot(json_post("/api/chat/stream", None, &body)).await.unwrap();
        let text = body_text(resp).await;
        assert!(text.contains("event: error"));
        assert!(text.contains("temporarily unavailable"));
        assert!(!text.contains("event: sources"));
    }

    #[tokio::test]
    async fn api_delete_clears_history() {
        let completer = MockCompleter::default();
        let app = make_router(completer.clone(), 0).await;
        let resp = app
            .clone()
            .oneshot(json_post("/api/chat", None, &serde_json::json!({"message": "first"})))
            .await
            .unwrap();
        let cookie = cookie_of(&resp);

        let delete = Request::builder()
            .method("DELETE")
            .uri("/api/chat")
            .header(COOKIE, &cookie)
            .body(Body::empty())
            .unwrap();
        let resp = app.clone().oneshot(delete).await.unwrap();
        assert_eq!(resp.status(), 204);

        app.oneshot(json_post("/api/chat", Some(&cookie), &serde_json::json!({"message": "second"})))
            .await
            .unwrap();
        let prompt = &completer.requests()[1][1].content;
        assert!(!prompt.contains("Human: first"));
        assert!(prompt.contains("CHAT HISTORY:\n(none)"));
    }

    #[tokio::test]
    async fn rate_limit_enforced() {
        use tower::Service;

        let mut app = make_router(MockCompleter::default(), 2).await;
        let body = serde_json::json!({"message": "hi"});

        let resp = app.call(json_post("/api/chat", None, &body)).await.unwrap();
        assert_eq!(resp.status(), 200);
        let resp = app.call(json_post("/api/chat", None, &body)).await.unwrap();
        assert_eq!(resp.status(), 200);
        let resp = app.call(json_post("/api/chat", None, &body)).await.unwrap();
        assert_eq!(resp.status(), 429);

        let resp = app.call(get("/health", None)).await.unwrap();
        assert_eq!(resp.status(), 200);
    }

    #[tokio::test]
    async fn body_size_limit() {
        let app = build_router(test_state(MockCompleter::default()).await, 0, 64);
        let oversized = serde_json::json!({"message": "a".repeat(128)});
        let resp = app.oneshot(json_post("/api/chat", None, &oversized)).await.unwrap();
        assert_eq!(resp.status(), 413);
    }
}
