use reqwest::StatusCode;
use tokio::sync::mpsc;
use tracing::{debug, error};
use unitutor_shared::{ApiError, TutorChatRequest};

use crate::stream;

/// Outcome of opening one chat turn, classified before any streaming starts.
pub enum TurnOutcome {
    Stream(reqwest::Response),
    RateLimited,
    QuotaExceeded,
    Failed(String),
}

/// Events forwarded to the UI while a turn is in flight.
///
/// `Delta` always carries the full accumulated content so far; the UI
/// replaces its displayed text rather than appending.
#[derive(Debug, Clone)]
pub enum TurnEvent {
    Delta(String),
    Completed(String),
    RateLimited,
    QuotaExceeded,
    Failed(String),
}

#[derive(Clone)]
pub struct GatewayClient {
    http: reqwest::Client,
    chat_url: String,
    token: Option<String>,
}

impl GatewayClient {
    pub fn new(chat_url: String, token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            chat_url,
            token,
        }
    }

    /// True when a bearer token is configured. Chat turns are refused
    /// without one; persisting a conversation requires a signed-in identity.
    pub fn is_authenticated(&self) -> bool {
        self.token.as_deref().is_some_and(|t| !t.trim().is_empty())
    }

    /// Issue one chat turn and stream events back over a channel.
    ///
    /// Exactly one terminal event (`Completed`, `RateLimited`,
    /// `QuotaExceeded`, or `Failed`) is sent per turn, after zero or more
    /// `Delta` events.
    pub fn send_turn(&self, request: TutorChatRequest) -> mpsc::UnboundedReceiver<TurnEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let client = self.clone();

        tokio::spawn(async move {
            if !client.is_authenticated() {
                let _ = tx.send(TurnEvent::Failed(
                    "not signed in: set UNITUTOR_TOKEN to chat".to_string(),
                ));
                return;
            }

            match client.open_stream(&request).await {
                TurnOutcome::Stream(response) => {
                    let updates = tx.clone();
                    let result = stream::assemble(response.bytes_stream(), |content| {
                        let _ = updates.send(TurnEvent::Delta(content.to_string()));
                    })
                    .await;

                    match result {
                        Ok(content) => {
                            let _ = tx.send(TurnEvent::Completed(content));
                        }
                        Err(err) => {
                            error!("stream assembly failed: {}", err);
                            let _ = tx.send(TurnEvent::Failed(err.to_string()));
                        }
                    }
                }
                TurnOutcome::RateLimited => {
                    let _ = tx.send(TurnEvent::RateLimited);
                }
                TurnOutcome::QuotaExceeded => {
                    let _ = tx.send(TurnEvent::QuotaExceeded);
                }
                TurnOutcome::Failed(reason) => {
                    let _ = tx.send(TurnEvent::Failed(reason));
                }
            }
        });

        rx
    }

    async fn open_stream(&self, request: &TutorChatRequest) -> TurnOutcome {
        debug!(
            "sending chat turn for course {} with {} messages",
            request.course_id,
            request.messages.len()
        );

        let mut builder = self.http.post(&self.chat_url).json(request);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(err) => {
                error!("chat request failed before streaming: {}", err);
                return TurnOutcome::Failed(err.to_string());
            }
        };

        let status = response.status();
        if status.is_success() {
            return TurnOutcome::Stream(response);
        }

        let body = response.text().await.unwrap_or_default();
        classify_failure(status, &body)
    }
}

/// Map a non-2xx response to a typed outcome, pulling the reason from the
/// structured `{error}` body when one is present.
pub fn classify_failure(status: StatusCode, body: &str) -> TurnOutcome {
    match status.as_u16() {
        429 => TurnOutcome::RateLimited,
        402 => TurnOutcome::QuotaExceeded,
        _ => {
            let reason = serde_json::from_str::<ApiError>(body)
                .map(|e| e.error)
                .unwrap_or_else(|_| format!("request failed with status {}", status));
            TurnOutcome::Failed(reason)
        }
    }
}
