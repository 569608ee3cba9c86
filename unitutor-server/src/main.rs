mod prompt;

use anyhow::bail;
use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tracing::{error, info};
use unitutor_shared::{ApiError, ChatMessage, MessageRole, TutorChatRequest};

const DEFAULT_UPSTREAM_URL: &str = "https://api.mistral.ai/v1/chat/completions";
const DEFAULT_MODEL: &str = "mistral-small-latest";

#[derive(Clone)]
struct AppState {
    http: reqwest::Client,
    upstream_url: String,
    api_key: String,
    model: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    dotenv::dotenv().ok();

    let api_key = match std::env::var("UPSTREAM_API_KEY") {
        Ok(key) if !key.trim().is_empty() => key,
        _ => {
            error!("UPSTREAM_API_KEY not found. Please set it in your .env file");
            bail!("UPSTREAM_API_KEY must be set");
        }
    };
    let upstream_url =
        std::env::var("UPSTREAM_API_URL").unwrap_or_else(|_| DEFAULT_UPSTREAM_URL.to_string());
    let model = std::env::var("UPSTREAM_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);

    info!("forwarding chat turns to {} (model {})", upstream_url, model);

    let state = AppState {
        http: reqwest::Client::new(),
        upstream_url,
        api_key,
        model,
    };

    let app = Router::new()
        .route("/health", get(health))
        .route("/course-chat", post(course_chat))
        .with_state(state)
        .layer(CorsLayer::permissive());

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health() -> &'static str {
    "OK"
}

/// One chat turn: inject the course-specialized system prompt, forward to
/// the upstream chat-completions API, and relay the SSE body untouched.
async fn course_chat(
    State(state): State<AppState>,
    Json(request): Json<TutorChatRequest>,
) -> Response {
    let system_prompt = prompt::build_system_prompt(&request);

    let mut messages = Vec::with_capacity(1 + request.messages.len());
    messages.push(ChatMessage {
        role: MessageRole::System,
        content: system_prompt,
    });
    messages.extend(request.messages.iter().cloned());

    let body = serde_json::json!({
        "model": state.model,
        "messages": messages,
        "stream": true,
    });

    let upstream = state
        .http
        .post(&state.upstream_url)
        .bearer_auth(&state.api_key)
        .json(&body)
        .send()
        .await;

    let response = match upstream {
        Ok(response) => response,
        Err(err) => {
            error!("upstream request failed: {}", err);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to reach the AI service",
            );
        }
    };

    let status = response.status();
    if status.is_success() {
        return (
            [(header::CONTENT_TYPE, "text/event-stream")],
            Body::from_stream(response.bytes_stream()),
        )
            .into_response();
    }

    let detail = response.text().await.unwrap_or_default();
    error!("upstream error {}: {}", status, detail);
    match status.as_u16() {
        429 => error_response(
            StatusCode::TOO_MANY_REQUESTS,
            "Rate limit exceeded. Please try again in a moment.",
        ),
        402 => error_response(StatusCode::PAYMENT_REQUIRED, "Usage quota exceeded."),
        _ => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to get AI response from upstream",
        ),
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ApiError {
            error: message.to_string(),
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_responses_carry_the_status() {
        let response = error_response(StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
