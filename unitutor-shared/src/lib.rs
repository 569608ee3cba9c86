use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

/// One chat turn sent from the client to the course-chat gateway.
/// Carries the full message history plus the course context the gateway
/// needs to build its specialized system prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TutorChatRequest {
    pub messages: Vec<ChatMessage>,
    pub course_id: String,
    pub course_name: String,
    pub course_level: String,
    pub faculty_name: String,
    pub course_description: String,
}

/// Structured error body returned by the gateway on non-2xx responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
}

/// One `data:` payload of the SSE stream.
///
/// A structurally valid payload with no choices or no delta content is
/// treated as "no content", not as an error.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamPayload {
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamChoice {
    #[serde(default)]
    pub delta: StreamDelta,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamDelta {
    #[serde(default)]
    pub content: Option<String>,
}

impl StreamPayload {
    /// The text contributed by this payload, if any.
    pub fn delta_content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.delta.content.as_deref())
            .filter(|s| !s.is_empty())
    }
}

/// A persisted conversation, scoped to one course.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub course_id: String,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A persisted chat message row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: String,
    pub conversation_id: String,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_request_uses_camel_case_on_the_wire() {
        let request = TutorChatRequest {
            messages: vec![ChatMessage {
                role: MessageRole::User,
                content: "hi".to_string(),
            }],
            course_id: "eng-elec-deg".to_string(),
            course_name: "Electrical Engineering".to_string(),
            course_level: "degree".to_string(),
            faculty_name: "Engineering".to_string(),
            course_description: "Power and control systems".to_string(),
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["courseId"], "eng-elec-deg");
        assert_eq!(json["courseLevel"], "degree");
        assert_eq!(json["facultyName"], "Engineering");
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn delta_content_extracts_first_choice() {
        let payload: StreamPayload =
            serde_json::from_str(r#"{"choices":[{"delta":{"content":"Hello"}}]}"#).unwrap();
        assert_eq!(payload.delta_content(), Some("Hello"));
    }

    #[test]
    fn empty_or_missing_delta_is_no_content() {
        let payload: StreamPayload =
            serde_json::from_str(r#"{"choices":[{"delta":{}}]}"#).unwrap();
        assert_eq!(payload.delta_content(), None);

        let payload: StreamPayload =
            serde_json::from_str(r#"{"choices":[{"delta":{"content":""}}]}"#).unwrap();
        assert_eq!(payload.delta_content(), None);

        let payload: StreamPayload = serde_json::from_str("{}").unwrap();
        assert_eq!(payload.delta_content(), None);
    }
}
