use async_trait::async_trait;
use tracing::info;

use crate::api::{ChatTurn, GeminiClient, Role};
use crate::error::Result;
use crate::scene::Script;

pub const GREETING: &str =
    "Hello! Ask me to \"make a video\" about a topic to see an animated explanation.";

const SCRIPT_ACK: &str =
    "I've prepared an animated explanation for you. Generating the video now.";

/// Chat/completion collaborator boundary.
#[async_trait]
pub trait ChatService: Send + Sync {
    async fn chat(&self, history: &[ChatTurn], message: &str) -> Result<String>;
}

#[async_trait]
impl ChatService for GeminiClient {
    async fn chat(&self, history: &[ChatTurn], message: &str) -> Result<String> {
        GeminiClient::chat(self, history, message).await
    }
}

/// One classified reply from the assistant: display text, plus the parsed
/// video script when the response was one.
#[derive(Debug)]
pub struct BotReply {
    pub text: String,
    pub script: Option<Script>,
}

/// A single chat session: the transcript so far and the collaborator that
/// answers. State is ephemeral and dies with the process.
pub struct Session<'a> {
    service: &'a dyn ChatService,
    history: Vec<ChatTurn>,
}

impl<'a> Session<'a> {
    pub fn new(service: &'a dyn ChatService) -> Self {
        Self {
            service,
            history: Vec::new(),
        }
    }

    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }

    /// Send one user message. The raw reply is classified: a valid video
    /// script yields an acknowledgement plus the script, anything else is
    /// shown as plain text. On a transport failure nothing is recorded,
    /// so the transcript never holds a half-completed turn.
    pub async fn send(&mut self, message: &str) -> Result<BotReply> {
        let reply = self.service.chat(&self.history, message).await?;

        let script = Script::from_response(&reply);
        if let Some(script) = &script {
            info!("Reply classified as a video script with {} scenes", script.len());
        }

        let text = if script.is_some() {
            SCRIPT_ACK.to_string()
        } else {
            reply.clone()
        };

        // Turns carry text only; script payloads are never replayed into
        // the model's context.
        self.history.push(ChatTurn {
            role: Role::User,
            text: message.to_string(),
        });
        self.history.push(ChatTurn {
            role: Role::Model,
            text: reply,
        });

        Ok(BotReply { text, script })
    }
}
