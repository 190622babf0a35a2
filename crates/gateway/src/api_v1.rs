//! The `/v1` API: chat completions and model listing.

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use eliza_core::{ChatMessage, SessionId, last_user_message};
use eliza_engine::{Conversation, EngineError};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{MODEL_NAME, SharedState};

// ── Router ────────────────────────────────────────────────────────────────

/// Build the v1 API router. Nest this under "/v1" in the main router.
pub fn v1_router(state: SharedState) -> Router {
    Router::new()
        .route("/chat/completions", post(chat_completions_handler))
        .route("/models", get(list_models_handler))
        .with_state(state)
}

// ── Request / Response types ──────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ChatCompletionRequest {
    /// Accepted for client compatibility; there is only one model.
    #[serde(default)]
    pub model: Option<String>,

    #[serde(default)]
    pub messages: Vec<ChatMessage>,

    /// Accepted for client compatibility; replies are deterministic.
    #[serde(default)]
    pub temperature: Option<f32>,

    /// Continue an existing conversation (omit to start a new one).
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<Choice>,
    pub usage: Usage,
    pub session_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Choice {
    pub index: u32,
    pub message: ChatMessage,
    pub finish_reason: String,
}

/// Sizes are counted in characters.
#[derive(Debug, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ModelList {
    pub object: String,
    pub data: Vec<ModelInfo>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub owned_by: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn chat_completions_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ChatCompletionRequest>,
) -> Result<Json<ChatCompletionResponse>, ApiError> {
    debug!(
        model = ?payload.model,
        temperature = ?payload.temperature,
        messages = payload.messages.len(),
        "v1/chat/completions request"
    );

    let session_id = match &payload.session_id {
        Some(raw) => SessionId::parse(raw)
            .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?,
        None => SessionId::new(),
    };

    let utterance = match last_user_message(&payload.messages) {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => return Err(api_error(StatusCode::BAD_REQUEST, "No user message found")),
    };

    // Serialize turns of the same session.
    let lock = state.session_lock(&session_id);
    let _guard = lock.lock().await;

    let mut conversation = load_conversation(&state, &session_id).await?;

    let turn = conversation.turn(&utterance).map_err(|e| match e {
        EngineError::EmptyUtterance | EngineError::UtteranceTooLong { .. } => {
            api_error(StatusCode::BAD_REQUEST, e.to_string())
        }
        other => {
            error!(session = %session_id, error = %other, "Turn failed");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
        }
    })?;

    let blob = conversation.to_bytes().map_err(|e| {
        error!(session = %session_id, error = %e, "Snapshot failed");
        api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;
    state.store().save(&session_id, blob).await.map_err(|e| {
        error!(session = %session_id, error = %e, "Session save failed");
        api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;

    info!(
        session = %session_id,
        source = ?turn.source,
        "Chat completion answered"
    );

    let prompt_tokens = utterance.chars().count();
    let completion_tokens = turn.reply.chars().count();
    Ok(Json(ChatCompletionResponse {
        id: completion_id(),
        object: "chat.completion".into(),
        created: chrono::Utc::now().timestamp(),
        model: MODEL_NAME.into(),
        choices: vec![Choice {
            index: 0,
            message: ChatMessage::assistant(turn.reply),
            finish_reason: "stop".into(),
        }],
        usage: Usage {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        },
        session_id: session_id.to_string(),
    }))
}

/// Load the stored conversation, or start a new one.
///
/// A snapshot that no longer fits the running rule set (corrupt, or taken
/// before the rules changed) is discarded with a warning.
async fn load_conversation(
    state: &SharedState,
    session_id: &SessionId,
) -> Result<Conversation, ApiError> {
    let record = state.store().load(session_id).await.map_err(|e| {
        error!(session = %session_id, error = %e, "Session load failed");
        api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;

    let Some(record) = record else {
        debug!(session = %session_id, "New session");
        return Ok(state.new_conversation());
    };

    match Conversation::from_bytes(&record.blob, state.rules().clone()) {
        Ok(conversation) => Ok(conversation.with_max_words(state.max_utterance_words())),
        Err(e) => {
            warn!(session = %session_id, error = %e, "Discarding stale session snapshot");
            Ok(state.new_conversation())
        }
    }
}

async fn list_models_handler(State(state): State<SharedState>) -> Json<ModelList> {
    Json(ModelList {
        object: "list".into(),
        data: vec![ModelInfo {
            id: MODEL_NAME.into(),
            object: "model".into(),
            created: state.started_at.timestamp(),
            owned_by: "eliza".into(),
        }],
    })
}

/// `chatcmpl-` followed by the first ten characters of a fresh UUID.
fn completion_id() -> String {
    let uuid = Uuid::new_v4().to_string();
    format!("chatcmpl-{}", uuid.chars().take(10).collect::<String>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AppState;
    use crate::tests::test_state;
    use std::sync::Arc;
    use axum::body::Body;
    use axum::http::Request;
    use eliza_core::Role;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn post_json(
        state: SharedState,
        body: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        let app = v1_router(state);
        let req = Request::builder()
            .method("POST")
            .uri("/chat/completions")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn user(content: &str) -> serde_json::Value {
        serde_json::json!({
            "model": "eliza-simulator",
            "messages": [{"role": "user", "content": content}],
            "temperature": 0.7
        })
    }

    #[tokio::test]
    async fn completion_envelope() {
        let (status, json) = post_json(test_state(), user("我感觉难过")).await;
        assert_eq!(status, StatusCode::OK);

        let response: ChatCompletionResponse = serde_json::from_value(json).unwrap();
        assert!(response.id.starts_with("chatcmpl-"));
        assert_eq!(response.id.len(), "chatcmpl-".len() + 10);
        assert_eq!(response.object, "chat.completion");
        assert_eq!(response.model, MODEL_NAME);
        assert_eq!(response.choices.len(), 1);
        assert_eq!(response.choices[0].index, 0);
        assert_eq!(response.choices[0].finish_reason, "stop");
        assert_eq!(response.choices[0].message.role, Role::Assistant);
        assert_eq!(response.choices[0].message.content, "为什么你会难过？");
        assert_eq!(response.usage.prompt_tokens, 5);
        assert_eq!(response.usage.completion_tokens, 8);
        assert_eq!(response.usage.total_tokens, 13);
        assert!(SessionId::parse(&response.session_id).is_ok());
    }

    #[tokio::test]
    async fn english_turn_is_reflected() {
        let (status, json) = post_json(test_state(), user("I am very depressed")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            json["choices"][0]["message"]["content"],
            "I am sorry to hear that you are depressed."
        );
    }

    #[tokio::test]
    async fn session_continues_across_requests() {
        let state = test_state();

        let mut first = user("my dog is sick");
        first["session_id"] = "walk-1".into();
        let (status, json) = post_json(state.clone(), first).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["session_id"], "walk-1");
        assert_eq!(json["choices"][0]["message"]["content"], "Your dog is sick?");

        // No keyword: the deferred reply from the first turn comes back
        let mut second = user("hmm");
        second["session_id"] = "walk-1".into();
        let (_, json) = post_json(state.clone(), second).await;
        assert_eq!(
            json["choices"][0]["message"]["content"],
            "Lets discuss further why your dog is sick."
        );

        let stored = state
            .store()
            .load(&SessionId::parse("walk-1").unwrap())
            .await
            .unwrap();
        assert!(stored.is_some());
    }

    #[tokio::test]
    async fn separate_sessions_do_not_share_state() {
        let state = test_state();

        let mut a = user("my dog is sick");
        a["session_id"] = "a".into();
        post_json(state.clone(), a).await;

        let mut b = user("hmm");
        b["session_id"] = "b".into();
        let (_, json) = post_json(state.clone(), b).await;
        let reply = json["choices"][0]["message"]["content"].as_str().unwrap();
        assert!(!reply.contains("dog"));
    }

    #[tokio::test]
    async fn last_user_message_is_answered() {
        let body = serde_json::json!({
            "messages": [
                {"role": "system", "content": "You are ELIZA."},
                {"role": "user", "content": "hello there"},
                {"role": "assistant", "content": "How do you do."},
                {"role": "user", "content": "Goodbye!"}
            ]
        });
        let (status, json) = post_json(test_state(), body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            json["choices"][0]["message"]["content"],
            "Goodbye. Thank you for talking to me."
        );
    }

    #[tokio::test]
    async fn missing_user_message_is_400() {
        let body = serde_json::json!({
            "messages": [{"role": "system", "content": "be nice"}]
        });
        let (status, json) = post_json(test_state(), body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json, serde_json::json!({"error": "No user message found"}));
    }

    #[tokio::test]
    async fn empty_user_message_is_400() {
        let (status, json) = post_json(test_state(), user("")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "No user message found");
    }

    #[tokio::test]
    async fn blank_utterance_is_400() {
        let (status, json) = post_json(test_state(), user("   ")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "utterance is empty");
    }

    #[tokio::test]
    async fn overlong_utterance_is_400() {
        let state = test_state();
        let rules = state.rules().clone();
        let store = state.store().clone();
        let state = Arc::new(AppState::new(rules, store).with_max_utterance_words(4));
        let (status, json) = post_json(state, user("one two three four five")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("limit is 4"));
    }

    #[tokio::test]
    async fn long_repetitive_message_answers_quickly() {
        let text = vec!["i"; 1_000].join(" ");
        let started = std::time::Instant::now();
        let (status, json) = post_json(test_state(), user(&text)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(json["choices"][0]["message"]["content"].is_string());
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
    }

    #[tokio::test]
    async fn invalid_session_id_is_400() {
        let mut body = user("hello");
        body["session_id"] = "../../etc/passwd".into();
        let (status, json) = post_json(test_state(), body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("Invalid session id"));
    }

    #[tokio::test]
    async fn corrupt_snapshot_starts_over() {
        let state = test_state();
        let id = SessionId::parse("broken").unwrap();
        state.store().save(&id, b"not json".to_vec()).await.unwrap();

        let mut body = user("我感觉难过");
        body["session_id"] = "broken".into();
        let (status, json) = post_json(state.clone(), body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["choices"][0]["message"]["content"], "为什么你会难过？");

        // The snapshot was replaced with a valid one
        let record = state.store().load(&id).await.unwrap().unwrap();
        assert!(Conversation::from_bytes(&record.blob, state.rules().clone()).is_ok());
    }

    #[tokio::test]
    async fn list_models() {
        let app = v1_router(test_state());
        let req = Request::builder()
            .uri("/models")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let models: ModelList = serde_json::from_slice(&body).unwrap();
        assert_eq!(models.object, "list");
        assert_eq!(models.data.len(), 1);
        assert_eq!(models.data[0].id, MODEL_NAME);
    }

    #[test]
    fn completion_ids_are_unique() {
        assert_ne!(completion_id(), completion_id());
    }
}
