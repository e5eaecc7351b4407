use serde::{Deserialize, Serialize};

use crate::core::message::{Content, ContentPart, Turn};

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: ChatContent,
}

/// Wire shape of a message body: a bare string, or an array of typed parts.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum ChatContent {
    Text(String),
    Parts(Vec<ChatContentPart>),
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatContentPart {
    Text { text: String },
    ImageUrl { image_url: ChatImageUrl },
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ChatImageUrl {
    pub url: String,
}

#[derive(Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
}

#[derive(Deserialize)]
pub struct ChatCompletionMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Deserialize)]
pub struct ChatCompletionChoice {
    pub message: ChatCompletionMessage,
}

#[derive(Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<ChatCompletionChoice>,
}

impl ChatCompletionResponse {
    /// Content of the first choice, which is the only one the client reads.
    pub fn first_content(&self) -> Option<&str> {
        self.choices
            .first()
            .map(|choice| choice.message.content.as_deref().unwrap_or_default())
    }
}

impl From<&Turn> for ChatMessage {
    fn from(turn: &Turn) -> Self {
        let content = match &turn.content {
            Content::Text(text) => ChatContent::Text(text.clone()),
            Content::Multimodal { parts } => ChatContent::Parts(
                parts
                    .iter()
                    .map(|part| match part {
                        ContentPart::Text { text } => ChatContentPart::Text { text: text.clone() },
                        ContentPart::ImageUrl { url } => ChatContentPart::ImageUrl {
                            image_url: ChatImageUrl { url: url.clone() },
                        },
                    })
                    .collect(),
            ),
        };

        ChatMessage {
            role: turn.role.as_str().to_string(),
            content,
        }
    }
}

pub fn to_api_messages(turns: &[Turn]) -> Vec<ChatMessage> {
    turns.iter().map(ChatMessage::from).collect()
}
