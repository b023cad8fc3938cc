//! Streaming chat transport and session history.
//!
//! A [`ChatSession`] owns the canonical turn history for one ongoing
//! conversation and talks to the gateway through [`ChatTransport`]. The
//! transport forwards chunks into the caller's event sink as they arrive and
//! returns the accumulated reply; the session decides what enters history.
//! When a fallback transport is configured, a failed primary attempt is
//! replayed against the fallback with the same request.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use serde::Serialize;
use tracing::warn;

use markwise_core::{ChatRole, ChatTurn, OrchestratorEvent};

use crate::error::{EngineError, EngineResult};

/// Channel end the orchestrator and transports push events into.
pub type EventSink = tokio::sync::mpsc::UnboundedSender<OrchestratorEvent>;

/// One chat exchange as handed to a transport. `history` never includes the
/// message being sent.
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub instruction: &'a str,
    pub history: &'a [ChatTurn],
    pub message: &'a str,
}

/// Streaming chat backend.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Label used in failover logs.
    fn name(&self) -> &str;

    /// Send one message, forwarding each chunk into `events` as a
    /// stream-chunk event, and return the accumulated reply text.
    async fn stream_chat(&self, request: ChatRequest<'_>, events: &EventSink)
        -> EngineResult<String>;
}

#[derive(Serialize)]
struct WirePart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct WireTurn<'a> {
    role: &'a str,
    parts: Vec<WirePart<'a>>,
}

#[derive(Serialize)]
struct ChatPayload<'a> {
    model: &'a str,
    #[serde(rename = "systemInstruction")]
    system_instruction: &'a str,
    history: Vec<WireTurn<'a>>,
    message: &'a str,
}

fn wire_history(history: &[ChatTurn]) -> Vec<WireTurn<'_>> {
    history
        .iter()
        .map(|turn| WireTurn {
            role: match turn.role {
                ChatRole::User => "user",
                ChatRole::Model => "model",
            },
            parts: vec![WirePart { text: &turn.text }],
        })
        .collect()
}

/// Gateway-backed transport posting to `{base}/api/chat` and consuming the
/// chunked plain-text response body.
pub struct HttpChatTransport {
    client: reqwest::Client,
    base: String,
    api_key: Option<String>,
}

impl HttpChatTransport {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base: base.into(),
            api_key: None,
        }
    }

    /// Attach a bearer key for the gateway itself.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

#[async_trait]
impl ChatTransport for HttpChatTransport {
    fn name(&self) -> &str {
        &self.base
    }

    async fn stream_chat(
        &self,
        request: ChatRequest<'_>,
        events: &EventSink,
    ) -> EngineResult<String> {
        let payload = ChatPayload {
            model: request.model,
            system_instruction: request.instruction,
            history: wire_history(request.history),
            message: request.message,
        };

        let mut builder = self
            .client
            .post(format!("{}/api/chat", self.base))
            .json(&payload);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::GatewayStatus {
                status: status.as_u16(),
                message: body,
            });
        }

        let mut stream = response.bytes_stream();
        let mut accumulated = String::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            let text = String::from_utf8_lossy(&chunk).into_owned();
            if text.is_empty() {
                continue;
            }
            accumulated.push_str(&text);
            let _ = events.send(OrchestratorEvent::chunk(text));
        }

        if accumulated.is_empty() {
            return Err(EngineError::Transport(
                "chat stream returned no content".to_string(),
            ));
        }
        Ok(accumulated)
    }
}

/// One ongoing conversation: canonical history plus the transports that
/// carry it.
pub struct ChatSession {
    primary: Arc<dyn ChatTransport>,
    fallback: Option<Arc<dyn ChatTransport>>,
    model: String,
    instruction: String,
    history: Vec<ChatTurn>,
}

impl ChatSession {
    pub fn new(
        primary: Arc<dyn ChatTransport>,
        fallback: Option<Arc<dyn ChatTransport>>,
        model: impl Into<String>,
        instruction: impl Into<String>,
    ) -> Self {
        Self {
            primary,
            fallback,
            model: model.into(),
            instruction: instruction.into(),
            history: Vec::new(),
        }
    }

    /// Canonical history, oldest first.
    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }

    /// Send one message, streaming chunks into `events`.
    ///
    /// The user turn is recorded before the attempt; the model turn is
    /// recorded only on success, so a failed send leaves a dangling user
    /// turn that the next send implicitly retries with. On a fallback
    /// retry the caller may observe the opening chunks twice; accumulation
    /// restarts cleanly on the fallback.
    pub async fn send_streaming(
        &mut self,
        message: &str,
        events: &EventSink,
    ) -> EngineResult<String> {
        self.history.push(ChatTurn::user(message));
        let prior = self.history.len() - 1;

        let outcome = {
            let request = ChatRequest {
                model: &self.model,
                instruction: &self.instruction,
                history: &self.history[..prior],
                message,
            };
            match self.primary.stream_chat(request, events).await {
                Ok(text) => Ok(text),
                Err(primary_err) => match &self.fallback {
                    Some(fallback) => {
                        warn!(
                            transport = self.primary.name(),
                            error = %primary_err,
                            "primary chat transport failed, retrying on fallback"
                        );
                        let retry = ChatRequest {
                            model: &self.model,
                            instruction: &self.instruction,
                            history: &self.history[..prior],
                            message,
                        };
                        fallback.stream_chat(retry, events).await
                    }
                    None => Err(primary_err),
                },
            }
        };

        let reply = outcome?;
        self.history.push(ChatTurn::model(&reply));
        Ok(reply)
    }

    /// Send one message without exposing the chunk stream.
    pub async fn send(&mut self, message: &str) -> EngineResult<String> {
        let (sink, _drain) = tokio::sync::mpsc::unbounded_channel();
        self.send_streaming(message, &sink).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::FakeTransport;
    use markwise_core::OrchestratorEvent;

    fn collect(
        mut drain: tokio::sync::mpsc::UnboundedReceiver<OrchestratorEvent>,
    ) -> Vec<OrchestratorEvent> {
        let mut out = Vec::new();
        while let Ok(event) = drain.try_recv() {
            out.push(event);
        }
        out
    }

    #[tokio::test]
    async fn test_send_streaming_records_one_turn_pair() {
        let transport = FakeTransport::new("primary").with_reply(["Hel", "lo."]);
        let mut session =
            ChatSession::new(Arc::new(transport.clone()), None, "chat-standard-1", "inst");
        let (sink, drain) = tokio::sync::mpsc::unbounded_channel();

        let reply = session.send_streaming("hi there", &sink).await.unwrap();
        assert_eq!(reply, "Hello.");
        assert_eq!(session.history().len(), 2);
        assert_eq!(session.history()[0].text, "hi there");
        assert_eq!(session.history()[1].text, "Hello.");

        let chunks: Vec<String> = collect(drain)
            .into_iter()
            .filter_map(|e| e.as_chunk().map(str::to_string))
            .collect();
        assert_eq!(chunks, vec!["Hel", "lo."]);

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].history.is_empty());
    }

    #[tokio::test]
    async fn test_history_sent_excludes_current_message() {
        let transport = FakeTransport::new("primary")
            .with_reply(["first"])
            .with_reply(["second"]);
        let mut session =
            ChatSession::new(Arc::new(transport.clone()), None, "chat-standard-1", "inst");

        session.send("one").await.unwrap();
        session.send("two").await.unwrap();

        let requests = transport.requests();
        assert_eq!(requests[1].history.len(), 2);
        assert_eq!(requests[1].history[0].text, "one");
        assert_eq!(requests[1].history[1].text, "first");
        assert_eq!(requests[1].message, "two");
    }

    #[tokio::test]
    async fn test_fallback_receives_same_request() {
        let primary = FakeTransport::new("primary").failing();
        let fallback = FakeTransport::new("fallback").with_reply(["recovered"]);
        let mut session = ChatSession::new(
            Arc::new(primary.clone()),
            Some(Arc::new(fallback.clone())),
            "chat-standard-1",
            "inst",
        );

        let reply = session.send("hello").await.unwrap();
        assert_eq!(reply, "recovered");
        assert_eq!(primary.requests().len(), 1);
        assert_eq!(fallback.requests().len(), 1);
        assert_eq!(fallback.requests()[0].message, "hello");
        assert_eq!(session.history().len(), 2);
    }

    #[tokio::test]
    async fn test_both_transports_failing_errors_and_keeps_user_turn() {
        let primary = FakeTransport::new("primary").failing();
        let fallback = FakeTransport::new("fallback").failing();
        let mut session = ChatSession::new(
            Arc::new(primary.clone()),
            Some(Arc::new(fallback.clone())),
            "chat-standard-1",
            "inst",
        );

        assert!(session.send("hello").await.is_err());
        assert_eq!(primary.requests().len(), 1);
        assert_eq!(fallback.requests().len(), 1);
        assert_eq!(session.history().len(), 1);
        assert_eq!(session.history()[0].role, ChatRole::User);

        // The dangling user turn rides as prior history on the next send,
        // on both attempts.
        let _ = session.send("again").await;
        assert_eq!(primary.requests()[1].history.len(), 1);
        assert_eq!(primary.requests()[1].history[0].text, "hello");
        assert_eq!(fallback.requests()[1].history.len(), 1);
    }

    #[tokio::test]
    async fn test_http_transport_treats_empty_body_as_failure() {
        let addr =
            crate::mock::serve_http_once(b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\n\r\n").await;
        let transport = HttpChatTransport::new(format!("http://{addr}"));
        let (sink, _drain) = tokio::sync::mpsc::unbounded_channel();

        let request = ChatRequest {
            model: "chat-standard-1",
            instruction: "inst",
            history: &[],
            message: "hi",
        };
        let err = transport.stream_chat(request, &sink).await.unwrap_err();
        assert!(matches!(err, EngineError::Transport(_)), "got {err}");
    }

    #[tokio::test]
    async fn test_failed_send_leaves_dangling_user_turn() {
        let primary = FakeTransport::new("primary").failing();
        let mut session = ChatSession::new(Arc::new(primary), None, "chat-standard-1", "inst");

        assert!(session.send("hello").await.is_err());
        assert_eq!(session.history().len(), 1);
        assert_eq!(session.history()[0].role, ChatRole::User);

        // The next send carries the dangling turn as prior history.
        let recovered = FakeTransport::new("retry").with_reply(["back"]);
        let mut session2 = ChatSession::new(
            Arc::new(recovered.clone()),
            None,
            "chat-standard-1",
            "inst",
        );
        session2.history = session.history.clone();
        session2.send("again").await.unwrap();
        assert_eq!(recovered.requests()[0].history.len(), 1);
    }

    #[test]
    fn test_wire_history_shape() {
        let history = vec![ChatTurn::user("question"), ChatTurn::model("answer")];
        let payload = ChatPayload {
            model: "chat-standard-1",
            system_instruction: "inst",
            history: wire_history(&history),
            message: "next",
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["systemInstruction"], "inst");
        assert_eq!(json["history"][0]["role"], "user");
        assert_eq!(json["history"][0]["parts"][0]["text"], "question");
        assert_eq!(json["history"][1]["role"], "model");
        assert_eq!(json["message"], "next");
    }
}
