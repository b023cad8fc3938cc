//! Scripted doubles for the gateway-facing seams.
//!
//! [`FakeTransport`] and [`FakeBackend`] record every call and replay
//! scripted outcomes, so orchestration tests can run without a gateway.
//! Builders consume and return `self`; clones share state, which lets a test
//! keep a handle for assertions after handing the double to the engine.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use markwise_core::{AnalysisMode, ChatTurn, FilePayload, InterpretationContext, OrchestratorEvent};

use crate::error::{EngineError, EngineResult};
use crate::pipeline::AnalysisBackend;
use crate::transport::{ChatRequest, ChatTransport, EventSink};

/// Reply used when a [`FakeTransport`] has no scripted reply queued.
const DEFAULT_REPLY: &str = "OK.";

/// Owned snapshot of one request a [`FakeTransport`] received.
#[derive(Debug, Clone)]
pub struct RecordedChatRequest {
    pub model: String,
    pub instruction: String,
    pub history: Vec<ChatTurn>,
    pub message: String,
}

/// Scripted [`ChatTransport`].
#[derive(Clone)]
pub struct FakeTransport {
    name: String,
    replies: Arc<RwLock<VecDeque<Vec<String>>>>,
    fail: Arc<RwLock<bool>>,
    requests: Arc<RwLock<Vec<RecordedChatRequest>>>,
}

impl FakeTransport {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            replies: Arc::new(RwLock::new(VecDeque::new())),
            fail: Arc::new(RwLock::new(false)),
            requests: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Queue one reply, delivered as the given chunks.
    pub fn with_reply<I, S>(self, chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.replies
            .write()
            .push_back(chunks.into_iter().map(Into::into).collect());
        self
    }

    /// Fail every call with a transport error.
    pub fn failing(self) -> Self {
        *self.fail.write() = true;
        self
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<RecordedChatRequest> {
        self.requests.read().clone()
    }
}

#[async_trait]
impl ChatTransport for FakeTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn stream_chat(
        &self,
        request: ChatRequest<'_>,
        events: &EventSink,
    ) -> EngineResult<String> {
        self.requests.write().push(RecordedChatRequest {
            model: request.model.to_string(),
            instruction: request.instruction.to_string(),
            history: request.history.to_vec(),
            message: request.message.to_string(),
        });

        if *self.fail.read() {
            return Err(EngineError::Transport("scripted transport failure".to_string()));
        }

        let chunks = self
            .replies
            .write()
            .pop_front()
            .unwrap_or_else(|| vec![DEFAULT_REPLY.to_string()]);

        let mut accumulated = String::new();
        for chunk in chunks {
            accumulated.push_str(&chunk);
            let _ = events.send(OrchestratorEvent::chunk(chunk));
        }
        Ok(accumulated)
    }
}

/// Owned snapshot of one reasoning call a [`FakeBackend`] received.
#[derive(Debug, Clone)]
pub struct RecordedReasonCall {
    pub prompt: String,
    pub mode: AnalysisMode,
    pub has_image: bool,
}

/// Scripted [`AnalysisBackend`].
#[derive(Clone)]
pub struct FakeBackend {
    perceived_text: Arc<RwLock<String>>,
    perceive_fails: Arc<RwLock<bool>>,
    interpretation: Arc<RwLock<Option<InterpretationContext>>>,
    interpret_fails: Arc<RwLock<bool>>,
    reason_value: Arc<RwLock<Value>>,
    reason_fails: Arc<RwLock<bool>>,
    perceived_files: Arc<RwLock<Vec<String>>>,
    reason_calls: Arc<RwLock<Vec<RecordedReasonCall>>>,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self {
            perceived_text: Arc::new(RwLock::new("extracted text".to_string())),
            perceive_fails: Arc::new(RwLock::new(false)),
            interpretation: Arc::new(RwLock::new(None)),
            interpret_fails: Arc::new(RwLock::new(false)),
            reason_value: Arc::new(RwLock::new(Value::Object(serde_json::Map::new()))),
            reason_fails: Arc::new(RwLock::new(false)),
            perceived_files: Arc::new(RwLock::new(Vec::new())),
            reason_calls: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text the perception stage returns.
    pub fn with_perceived_text(self, text: impl Into<String>) -> Self {
        *self.perceived_text.write() = text.into();
        self
    }

    /// Fail every perception call.
    pub fn with_perceive_failure(self) -> Self {
        *self.perceive_fails.write() = true;
        self
    }

    /// Context the interpretation stage returns.
    pub fn with_interpretation(self, context: InterpretationContext) -> Self {
        *self.interpretation.write() = Some(context);
        self
    }

    /// Fail every interpretation call.
    pub fn with_interpret_failure(self) -> Self {
        *self.interpret_fails.write() = true;
        self
    }

    /// Raw JSON the reasoning stage returns.
    pub fn with_reason_value(self, value: Value) -> Self {
        *self.reason_value.write() = value;
        self
    }

    /// Fail every reasoning call.
    pub fn with_reason_failure(self) -> Self {
        *self.reason_fails.write() = true;
        self
    }

    /// File names handed to perception, oldest first.
    pub fn perceived_files(&self) -> Vec<String> {
        self.perceived_files.read().clone()
    }

    /// Reasoning calls received so far, oldest first.
    pub fn reason_calls(&self) -> Vec<RecordedReasonCall> {
        self.reason_calls.read().clone()
    }
}

/// Bind a local listener, serve exactly one HTTP exchange with the given
/// canned response, and return the bound address. Lets transport tests hit
/// the real HTTP path without a gateway.
pub async fn serve_http_once(response: &'static [u8]) -> std::net::SocketAddr {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind local listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let Ok((mut socket, _)) = listener.accept().await else {
            return;
        };
        let mut raw = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            let n = socket.read(&mut buf).await.unwrap_or(0);
            if n == 0 {
                break;
            }
            raw.extend_from_slice(&buf[..n]);
            if request_complete(&raw) {
                break;
            }
        }
        let _ = socket.write_all(response).await;
    });
    addr
}

/// Headers plus a content-length body have fully arrived.
fn request_complete(raw: &[u8]) -> bool {
    let Some(split) = raw.windows(4).position(|w| w == b"\r\n\r\n") else {
        return false;
    };
    let headers = String::from_utf8_lossy(&raw[..split]).to_lowercase();
    let body_len = headers
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);
    raw.len() >= split + 4 + body_len
}

#[async_trait]
impl AnalysisBackend for FakeBackend {
    async fn perceive(&self, file: &FilePayload, _instruction: &str) -> EngineResult<String> {
        self.perceived_files.write().push(file.name.clone());
        if *self.perceive_fails.read() {
            return Err(EngineError::Transport("scripted perception failure".to_string()));
        }
        Ok(self.perceived_text.read().clone())
    }

    async fn interpret(
        &self,
        _text: &str,
        _instruction: &str,
    ) -> EngineResult<InterpretationContext> {
        if *self.interpret_fails.read() {
            return Err(EngineError::Transport(
                "scripted interpretation failure".to_string(),
            ));
        }
        Ok(self.interpretation.read().clone().unwrap_or_default())
    }

    async fn reason(
        &self,
        prompt: &str,
        file: Option<&FilePayload>,
        _instruction: &str,
        mode: AnalysisMode,
    ) -> EngineResult<Value> {
        self.reason_calls.write().push(RecordedReasonCall {
            prompt: prompt.to_string(),
            mode,
            has_image: file.is_some(),
        });
        if *self.reason_fails.read() {
            return Err(EngineError::Transport("scripted reasoning failure".to_string()));
        }
        Ok(self.reason_value.read().clone())
    }
}
