use std::convert::Infallible;

use axum::Json;
use axum::extract::{Form, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{Html, IntoResponse, Redirect, Response};
use lawontip_core::assistant::{answered_turn, failed_turn};
use lawontip_core::{AssistantError, Mode, Page, Source};
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;

use crate::render;
use crate::server::AppState;
use crate::session::SessionHandle;

#[derive(serde::Deserialize)]
pub(crate) struct ChatForm {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub mode: Option<Mode>,
}

#[derive(serde::Deserialize)]
pub(crate) struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub mode: Option<Mode>,
}

#[derive(serde::Serialize)]
struct ChatResponse {
    answer: String,
    sources: Vec<Source>,
    error: Option<String>,
}

#[derive(serde::Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    index_chunks: usize,
    active_sessions: usize,
}

pub(crate) async fn landing_handler(handle: SessionHandle) -> Response {
    let mut session = handle.session.lock().await;
    session.touch();
    let response = if session.page == Page::Chat {
        Redirect::to("/chat").into_response()
    } else {
        Html(render::landing_page()).into_response()
    };
    drop(session);
    handle.attach(response)
}

pub(crate) async fn chat_page_handler(handle: SessionHandle) -> Response {
    let mut session = handle.session.lock().await;
    session.touch();
    session.page = Page::Chat;
    let page = render::chat_page(&session);
    drop(session);
    handle.attach(Html(page).into_response())
}

pub(crate) async fn chat_submit_handler(
    State(state): State<AppState>,
    handle: SessionHandle,
    Form(form): Form<ChatForm>,
) -> Response {
    let mut session = handle.session.lock().await;
    session.touch();
    session.page = Page::Chat;
    if let Some(mode) = form.mode {
        session.mode = mode;
    }
    let message = form.message.trim();
    if !message.is_empty() {
        let mode = session.mode;
        state
            .assistant
            .respond(&mut session.conversation, mode, message)
            .await;
        session.touch();
    }
    drop(session);
    handle.attach(Redirect::to("/chat").into_response())
}

pub(crate) async fn chat_clear_handler(handle: SessionHandle) -> Response {
    let mut session = handle.session.lock().await;
    session.touch();
    session.clear_history();
    drop(session);
    tracing::debug!(session = %handle.id, "history cleared");
    handle.attach(Redirect::to("/chat").into_response())
}

pub(crate) async fn chat_back_handler(handle: SessionHandle) -> Response {
    let mut session = handle.session.lock().await;
    session.touch();
    session.page = Page::Landing;
    drop(session);
    handle.attach(Redirect::to("/").into_response())
}

pub(crate) async fn api_chat_handler(
    State(state): State<AppState>,
    handle: SessionHandle,
    Json(req): Json<ChatRequest>,
) -> Response {
    let message = req.message.trim();
    if message.is_empty() {
        let body = ChatResponse {
            answer: String::new(),
            sources: Vec::new(),
            error: Some("message must not be empty".into()),
        };
        return handle.attach((StatusCode::BAD_REQUEST, Json(body)).into_response());
    }

    let mut session = handle.session.lock().await;
    session.touch();
    let mode = req.mode.unwrap_or(session.mode);
    let turn = state
        .assistant
        .respond(&mut session.conversation, mode, message)
        .await;
    session.touch();
    drop(session);

    let body = if turn.is_error {
        ChatResponse {
            answer: String::new(),
            sources: Vec::new(),
            error: Some(turn.assistant),
        }
    } else {
        ChatResponse {
            answer: turn.assistant,
            sources: turn.sources,
            error: None,
        }
    };
    handle.attach(Json(body).into_response())
}

/// Stream the answer as `token` events followed by one `sources` event, or a
/// single `error` event. The turn is added to the history once the stream ends.
pub(crate) async fn api_chat_stream_handler(
    State(state): State<AppState>,
    handle: SessionHandle,
    Json(req): Json<ChatRequest>,
) -> Response {
    let message = req.message.trim().to_owned();
    if message.is_empty() {
        return handle.attach((StatusCode::BAD_REQUEST, "message must not be empty").into_response());
    }

    let mut session = handle.session.clone().lock_owned().await;
    session.touch();
    let mode = req.mode.unwrap_or(session.mode);
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(32);

    let started = state
        .assistant
        .answer_stream(mode, &message, &session.conversation)
        .await;
    match started {
        Ok((mut deltas, sources)) => {
            tokio::spawn(async move {
                let mut text = String::new();
                while let Some(delta) = deltas.next().await {
                    match delta {
                        Ok(delta) => {
                            text.push_str(&delta);
                            let event = Event::default().event("token").data(delta.replace('\r', ""));
                            if tx.send(Ok(event)).await.is_err() {
                                tracing::debug!("client disconnected, answer discarded");
                                return;
                            }
                        }
                        Err(e) => {
                            let err = AssistantError::Completion(e);
                            tracing::error!(mode = %mode, "stream failed: {err:#}");
                            let event = Event::default().event("error").data(err.user_message());
                            session.conversation.push(failed_turn(mode, &message, &err));
                            let _ = tx.send(Ok(event)).await;
                            return;
                        }
                    }
                }
                let event = sources_event(&sources);
                session
                    .conversation
                    .push(answered_turn(mode, &message, text, sources));
                session.touch();
                let _ = tx.send(Ok(event)).await;
            });
        }
        Err(err) => {
            tracing::error!(mode = %mode, "query failed: {err:#}");
            session.conversation.push(failed_turn(mode, &message, &err));
            let _ = tx
                .send(Ok(Event::default().event("error").data(err.user_message())))
                .await;
        }
    }

    let sse = Sse::new(ReceiverStream::new(rx)).keep_alive(KeepAlive::default());
    handle.attach(sse.into_response())
}

fn sources_event(sources: &[Source]) -> Event {
    Event::default()
        .event("sources")
        .json_data(sources)
        .unwrap_or_else(|e| {
            tracing::warn!("failed to encode sources: {e}");
            Event::default().event("sources").data("[]")
        })
}

pub(crate) async fn api_clear_handler(handle: SessionHandle) -> Response {
    let mut session = handle.session.lock().await;
    session.touch();
    session.clear_history();
    drop(session);
    handle.attach(StatusCode::NO_CONTENT.into_response())
}

pub(crate) async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: state.started_at.elapsed().as_secs(),
        index_chunks: state.assistant.index_len(),
        active_sessions: state.sessions.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_response_serializes() {
        let resp = HealthResponse {
            status: "ok",
            uptime_secs: 42,
            index_chunks: 7,
            active_sessions: 1,
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"status\":\"ok\""));
        assert!(json.contains("\"index_chunks\":7"));
    }

    #[test]
    fn chat_request_mode_is_optional() {
        let req: ChatRequest = serde_json::from_str(r#"{"message":"What is Section 420?"}"#).unwrap();
        assert!(req.mode.is_none());
        let req: ChatRequest =
            serde_json::from_str(r#"{"message":"I was attacked","mode":"scenario"}"#).unwrap();
        assert_eq!(req.mode, Some(Mode::Scenario));
    }

    #[test]
    fn error_response_shape() {
        let body = ChatResponse {
            answer: String::new(),
            sources: Vec::new(),
            error: Some("boom".into()),
        };
        let json: serde_json::Value = serde_json::to_value(&body).unwrap();
        assert_eq!(json["error"], "boom");
        assert_eq!(json["sources"].as_array().unwrap().len(), 0);
    }
}
