//! Completion client interface. The relay only ever talks to a
//! `CompletionClient`, so the session can be driven by the HTTP client in
//! production and by scripted clients in tests.

mod openai;

use crate::relay::CancelToken;
use anyhow::Result;
use serde::Serialize;
use std::ops::ControlFlow;

pub use openai::{OpenAiClient, DEFAULT_BASE_URL};

/// Speaker attached to each message sent to the completion endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Produces answer fragments for an ordered list of messages.
///
/// Implementations call `on_chunk` once per fragment, in arrival order, and
/// stop as soon as it returns `ControlFlow::Break` or `cancel` trips. `Ok(())`
/// means the upstream signalled a clean end of stream (or the caller stopped
/// it); any transport or protocol failure is returned as an error.
pub trait CompletionClient: Send + Sync {
    fn stream_chat(
        &self,
        messages: &[ChatMessage],
        cancel: &CancelToken,
        on_chunk: &mut dyn FnMut(String) -> ControlFlow<()>,
    ) -> Result<()>;

    fn model(&self) -> &str;
}

#[cfg(test)]
pub(crate) use scripted::{ScriptStep, ScriptedClient};

#[cfg(test)]
mod scripted {
    use super::{ChatMessage, CompletionClient};
    use crate::relay::CancelToken;
    use anyhow::{anyhow, Result};
    use std::ops::ControlFlow;
    use std::sync::Mutex;
    use std::thread;
    use std::time::Duration;

    #[derive(Debug, Clone)]
    pub(crate) enum ScriptStep {
        Chunk(String),
        Fail(String),
        /// Block until the cancel token trips, then return cleanly.
        WaitForCancel,
    }

    /// In-memory client that replays a fixed script and records what it was asked.
    pub(crate) struct ScriptedClient {
        steps: Vec<ScriptStep>,
        pub(crate) seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedClient {
        pub(crate) fn new(steps: Vec<ScriptStep>) -> Self {
            Self {
                steps,
                seen: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn chunks<I, S>(chunks: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            Self::new(
                chunks
                    .into_iter()
                    .map(|chunk| ScriptStep::Chunk(chunk.into()))
                    .collect(),
            )
        }
    }

    impl CompletionClient for ScriptedClient {
        fn stream_chat(
            &self,
            messages: &[ChatMessage],
            cancel: &CancelToken,
            on_chunk: &mut dyn FnMut(String) -> ControlFlow<()>,
        ) -> Result<()> {
            self.seen.lock().unwrap().push(messages.to_vec());
            for step in &self.steps {
                if cancel.is_cancelled() {
                    return Ok(());
                }
                match step {
                    ScriptStep::Chunk(text) => {
                        if on_chunk(text.clone()).is_break() {
                            return Ok(());
                        }
                    }
                    ScriptStep::Fail(message) => return Err(anyhow!(message.clone())),
                    ScriptStep::WaitForCancel => {
                        while !cancel.is_cancelled() {
                            thread::sleep(Duration::from_millis(5));
                        }
                        return Ok(());
                    }
                }
            }
            Ok(())
        }

        fn model(&self) -> &str {
            "scripted"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_serialize_lowercase() {
        let json = serde_json::to_string(&ChatMessage::system("be brief")).unwrap();
        assert_eq!(json, r#"{"role":"system","content":"be brief"}"#);
        let json = serde_json::to_string(&Role::Assistant).unwrap();
        assert_eq!(json, r#""assistant""#);
    }
}
