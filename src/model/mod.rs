use anyhow::Result;
use serde::{Deserialize, Serialize};


#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}


#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}


#[derive(Clone, Debug)]
pub struct GenerateParams {
    pub max_tokens: i32,
    pub temp: f32,
    pub top_p: f32,
    pub repeat_penalty: f32,
}

impl Default for GenerateParams {
    fn default() -> Self {
        Self { max_tokens: 1024, temp: 0.4, top_p: 0.9, repeat_penalty: 1.1 }
    }
}


/// Fixed conversation sent by `POST /basic-chat/`.
pub fn basic_chat_messages() -> Vec<ChatMessage> {
    vec![
        ChatMessage::system("You are a helpful assistant."),
        ChatMessage::user("Please explain about langchain."),
        ChatMessage::assistant("LangChain is a library for building language model applications."),
        ChatMessage::user("Please answer the 3 main function."),
    ]
}


#[async_trait::async_trait]
pub trait LlmBackend: Send + Sync + 'static {
    /// Run one chat completion and return the assistant's raw text.
    async fn generate(&self, messages: &[ChatMessage], params: &GenerateParams) -> Result<String>;
}


pub mod ollama;
