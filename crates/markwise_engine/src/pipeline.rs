//! Staged analysis of an uploaded submission.
//!
//! [`AnalysisPipeline`] runs perception, routing, interpretation, a
//! longitudinal history lookup and reasoning in a fixed order. Stages have
//! distinct failure semantics: perception and reasoning failures abort the
//! run with a user-facing message, interpretation degrades to a safe default
//! context, and the history lookup is best-effort. The gateway endpoints are
//! reached through [`AnalysisBackend`] so tests can script stage outcomes.

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use markwise_core::{
    AnalysisMode, AnalysisResult, FilePayload, InterpretationContext, ReasoningContext, Score,
    UserRole,
};

use crate::error::{EngineError, EngineResult};
use crate::persistence::SessionStore;
use crate::prompts;

/// Extracted text shorter than this routes reasoning to the fast model.
pub const FAST_PATH_MAX_CHARS: usize = 800;

/// Surfaced when perception cannot recover any text from the upload.
pub const PERCEIVE_FAILURE_MESSAGE: &str = "Unable to read the document.";

/// Surfaced when the reasoning stage fails for any reason.
pub const REASON_FAILURE_MESSAGE: &str = "Markwise could not complete the diagnosis.";

/// Gateway access for the three analysis stages.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    /// Extract raw text (plus structure notes) from an uploaded file.
    async fn perceive(&self, file: &FilePayload, instruction: &str) -> EngineResult<String>;

    /// Classify extracted text into subject, topic, intent and ownership.
    async fn interpret(&self, text: &str, instruction: &str)
        -> EngineResult<InterpretationContext>;

    /// Run the diagnostic prompt and return the gateway's raw JSON object.
    async fn reason(
        &self,
        prompt: &str,
        file: Option<&FilePayload>,
        instruction: &str,
        mode: AnalysisMode,
    ) -> EngineResult<Value>;
}

#[derive(Serialize)]
struct PerceivePayload<'a> {
    image: &'a str,
    #[serde(rename = "mimeType")]
    mime_type: &'a str,
    #[serde(rename = "systemInstruction")]
    system_instruction: &'a str,
}

#[derive(Serialize)]
struct InterpretPayload<'a> {
    text: &'a str,
    #[serde(rename = "systemInstruction")]
    system_instruction: &'a str,
}

#[derive(Serialize)]
struct ReasonPayload<'a> {
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<String>,
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    mime_type: Option<&'a str>,
    #[serde(rename = "systemInstruction")]
    system_instruction: &'a str,
    mode: AnalysisMode,
}

/// Strip a markdown code fence the gateway sometimes wraps JSON in.
fn strip_code_fences(body: &str) -> &str {
    let trimmed = body.trim();
    let opened = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    opened.strip_suffix("```").unwrap_or(opened).trim()
}

/// Gateway-backed analysis stages under `{base}/api/`.
pub struct HttpAnalysisBackend {
    client: reqwest::Client,
    base: String,
    api_key: Option<String>,
}

impl HttpAnalysisBackend {
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

    async fn post_json<T: Serialize>(&self, endpoint: &str, payload: &T) -> EngineResult<String> {
        let mut builder = self
            .client
            .post(format!("{}/api/{}", self.base, endpoint))
            .json(payload);
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
        Ok(response.text().await?)
    }
}

#[async_trait]
impl AnalysisBackend for HttpAnalysisBackend {
    async fn perceive(&self, file: &FilePayload, instruction: &str) -> EngineResult<String> {
        let image = BASE64_STANDARD.encode(&file.bytes);
        let payload = PerceivePayload {
            image: &image,
            mime_type: &file.mime_type,
            system_instruction: instruction,
        };
        let body = self.post_json("perceive", &payload).await?;
        let value: Value =
            serde_json::from_str(&body).map_err(|err| EngineError::Schema(err.to_string()))?;
        Ok(value
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    async fn interpret(
        &self,
        text: &str,
        instruction: &str,
    ) -> EngineResult<InterpretationContext> {
        let payload = InterpretPayload {
            text,
            system_instruction: instruction,
        };
        let body = self.post_json("interpret", &payload).await?;
        serde_json::from_str(strip_code_fences(&body))
            .map_err(|err| EngineError::Schema(err.to_string()))
    }

    async fn reason(
        &self,
        prompt: &str,
        file: Option<&FilePayload>,
        instruction: &str,
        mode: AnalysisMode,
    ) -> EngineResult<Value> {
        let payload = ReasonPayload {
            prompt,
            image: file.map(|f| BASE64_STANDARD.encode(&f.bytes)),
            mime_type: file.map(|f| f.mime_type.as_str()),
            system_instruction: instruction,
            mode,
        };
        let body = self.post_json("reason", &payload).await?;
        serde_json::from_str(strip_code_fences(&body))
            .map_err(|err| EngineError::Schema(err.to_string()))
    }
}

/// Ordered stage runner producing one [`AnalysisResult`] per upload.
pub struct AnalysisPipeline {
    backend: Arc<dyn AnalysisBackend>,
    store: Arc<dyn SessionStore>,
    guest: bool,
}

impl AnalysisPipeline {
    pub fn new(backend: Arc<dyn AnalysisBackend>, store: Arc<dyn SessionStore>, guest: bool) -> Self {
        Self {
            backend,
            store,
            guest,
        }
    }

    /// Run all stages against one upload.
    ///
    /// `user_instruction` is the text that accompanied the file, if any;
    /// `role` shapes the reasoning prompt's instruction hierarchy. The
    /// returned result carries a fresh id that the caller rebinds to its
    /// submission.
    pub async fn run(
        &self,
        file: &FilePayload,
        user_instruction: Option<&str>,
        role: Option<UserRole>,
    ) -> EngineResult<AnalysisResult> {
        let extracted = match self
            .backend
            .perceive(file, prompts::PERCEPTION_INSTRUCTION)
            .await
        {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                warn!(file = %file.name, "perception returned no text");
                return Err(EngineError::stage("perceive", PERCEIVE_FAILURE_MESSAGE));
            }
            Err(err) => {
                warn!(file = %file.name, error = %err, "perception stage failed");
                return Err(EngineError::stage("perceive", PERCEIVE_FAILURE_MESSAGE));
            }
        };

        let mode = if extracted.chars().count() < FAST_PATH_MAX_CHARS {
            AnalysisMode::Fast
        } else {
            AnalysisMode::Deep
        };
        debug!(mode = mode.as_str(), chars = extracted.chars().count(), "routed reasoning");

        let interpretation = match self
            .backend
            .interpret(&extracted, prompts::INTERPRETATION_INSTRUCTION)
            .await
        {
            Ok(context) => context,
            Err(err) => {
                warn!(error = %err, "interpretation failed, continuing with degraded context");
                InterpretationContext::default()
            }
        };

        let history = self.lookup_history(&interpretation.subject);

        let context = ReasoningContext {
            interpretation,
            history,
            user_instruction: user_instruction.map(str::to_string),
            role,
            mode,
        };
        let prompt = prompts::build_reasoning_prompt(
            &extracted,
            &context.interpretation,
            context.user_instruction.as_deref(),
            &context.history,
            context.role,
        );

        let value = match self
            .backend
            .reason(&prompt, Some(file), prompts::REASONING_INSTRUCTION, mode)
            .await
        {
            Ok(value) => value,
            Err(err) => {
                warn!(error = %err, "reasoning stage failed");
                return Err(EngineError::stage("reason", REASON_FAILURE_MESSAGE));
            }
        };

        Ok(assemble_result(&value, &context, extracted))
    }

    /// Recent-insight lines for the subject; empty for guests, unresolved
    /// subjects and lookup failures.
    fn lookup_history(&self, subject: &str) -> String {
        if self.guest || subject.trim().is_empty() {
            return String::new();
        }
        match self.store.recent_insights(subject) {
            Ok(lines) => lines,
            Err(err) => {
                warn!(subject, error = %err, "insight lookup failed, continuing without history");
                String::new()
            }
        }
    }
}

/// Per-field coercion of the gateway's reasoning JSON into a typed result.
fn assemble_result(value: &Value, context: &ReasoningContext, raw_text: String) -> AnalysisResult {
    AnalysisResult {
        id: uuid::Uuid::new_v4().to_string(),
        timestamp: chrono::Utc::now(),
        subject: context.interpretation.subject.clone(),
        topic: context.interpretation.topic.clone(),
        score: field(value, "score").unwrap_or_else(Score::pending),
        feedback: array_field(value, "feedback"),
        insights: array_field(value, "insights"),
        guidance: array_field(value, "guidance"),
        handwriting: field(value, "handwriting"),
        concept_stability: field(value, "concept_stability"),
        teacher_insight: field(value, "teacher_insight"),
        ownership: context.interpretation.ownership.clone(),
        raw_text,
    }
}

/// A typed field, or `None` when missing or malformed.
fn field<T: serde::de::DeserializeOwned>(value: &Value, key: &str) -> Option<T> {
    value
        .get(key)
        .and_then(|v| serde_json::from_value(v.clone()).ok())
}

/// A typed array; anything that is not an array yields empty, and malformed
/// items are dropped individually.
fn array_field<T: serde::de::DeserializeOwned>(value: &Value, key: &str) -> Vec<T> {
    match value.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| serde_json::from_value(item.clone()).ok())
            .collect(),
        _ => Vec::new(),
    }
}
