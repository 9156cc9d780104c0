//! Default inference backend over `genai`, with retry and model fallback.

use async_trait::async_trait;
use forge_contract::{
    is_retryable_inference_error, DeltaSender, InferenceClient, InferenceError, InferenceMessage,
    InferenceRequest, InferenceResponse, InferenceRole, ToolCallRequest, ToolDescriptor,
};
use futures::StreamExt;
use genai::chat::{
    ChatMessage, ChatOptions, ChatRequest, ChatStreamEvent, ContentPart, MessageContent,
    ToolResponse,
};
use genai::Client;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

/// Retry strategy for inference calls.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts_per_model: usize,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts_per_model: 2,
            initial_backoff_ms: 250,
            max_backoff_ms: 2_000,
        }
    }
}

impl RetryPolicy {
    fn backoff_ms(&self, retry_index: usize) -> u64 {
        let cap = self.max_backoff_ms.max(self.initial_backoff_ms);
        if retry_index == 0 {
            return self.initial_backoff_ms.min(cap);
        }
        let shift = (retry_index - 1).min(20) as u32;
        let factor = 1u64.checked_shl(shift).unwrap_or(u64::MAX);
        self.initial_backoff_ms.saturating_mul(factor).min(cap)
    }
}

/// Available model behaviors, surfaced through `get_model_configs`.
pub fn model_configs() -> Value {
    serde_json::json!({
        "modes": {
            "deterministic": {
                "description": "Templated single-shot prompts",
                "model": "gpt-4o-mini"
            },
            "smart": {
                "description": "Multi-turn prompting with conversation context",
                "model": "gpt-4o"
            }
        }
    })
}

/// `genai`-backed [`InferenceClient`].
pub struct GenaiInference {
    client: Client,
    model: String,
    fallback_models: Vec<String>,
    retry: RetryPolicy,
}

impl GenaiInference {
    pub fn new(client: Client, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            fallback_models: Vec::new(),
            retry: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_fallback_models(mut self, models: Vec<String>) -> Self {
        self.fallback_models = models;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn model_candidates(&self) -> Vec<String> {
        let mut models = Vec::with_capacity(1 + self.fallback_models.len());
        models.push(self.model.clone());
        for model in &self.fallback_models {
            if !model.trim().is_empty() && !models.iter().any(|m| m == model) {
                models.push(model.clone());
            }
        }
        models
    }

    fn chat_options() -> ChatOptions {
        ChatOptions::default()
            .with_capture_usage(true)
            .with_capture_tool_calls(true)
    }
}

/// Convert one inference message to a genai chat message.
fn to_chat_message(msg: &InferenceMessage) -> ChatMessage {
    match msg.role {
        InferenceRole::System => ChatMessage::system(&msg.content),
        InferenceRole::User => ChatMessage::user(&msg.content),
        InferenceRole::Assistant => {
            if let Some(calls) = &msg.tool_calls {
                let mut content = MessageContent::from(msg.content.as_str());
                for call in calls {
                    content.push(ContentPart::ToolCall(genai::chat::ToolCall {
                        call_id: call.id.clone(),
                        fn_name: call.name.clone(),
                        fn_arguments: call.arguments.clone(),
                    }));
                }
                ChatMessage::assistant(content)
            } else {
                ChatMessage::assistant(&msg.content)
            }
        }
        InferenceRole::Tool => ChatMessage::from(ToolResponse {
            call_id: msg.tool_call_id.clone().unwrap_or_default(),
            content: msg.content.clone(),
        }),
    }
}

fn to_genai_tool(desc: &ToolDescriptor) -> genai::chat::Tool {
    genai::chat::Tool::new(&desc.name)
        .with_description(&desc.description)
        .with_schema(desc.parameters.clone())
}

fn build_request(request: &InferenceRequest) -> ChatRequest {
    let messages: Vec<ChatMessage> = request.messages.iter().map(to_chat_message).collect();
    let mut chat_req = ChatRequest::new(messages);
    if !request.tools.is_empty() {
        chat_req = chat_req.with_tools(request.tools.iter().map(to_genai_tool).collect::<Vec<_>>());
    }
    chat_req
}

#[derive(Default)]
struct PartialToolCall {
    name: String,
    arguments: String,
}

#[async_trait]
impl InferenceClient for GenaiInference {
    async fn execute(
        &self,
        request: InferenceRequest,
    ) -> Result<InferenceResponse, InferenceError> {
        let chat_req = build_request(&request);
        let options = Self::chat_options();

        let mut last_error = String::from("no model candidates");
        let mut attempts = 0usize;
        for model in self.model_candidates() {
            for attempt in 1..=self.retry.max_attempts_per_model.max(1) {
                attempts += 1;
                match self
                    .client
                    .exec_chat(&model, chat_req.clone(), Some(&options))
                    .await
                {
                    Ok(response) => {
                        let text = response.first_text().map(str::to_string);
                        let tool_calls = response
                            .tool_calls()
                            .into_iter()
                            .map(|tc| {
                                ToolCallRequest::new(
                                    &tc.call_id,
                                    &tc.fn_name,
                                    tc.fn_arguments.clone(),
                                )
                            })
                            .collect();
                        return Ok(InferenceResponse { text, tool_calls });
                    }
                    Err(e) => {
                        let message = e.to_string();
                        debug!(model, attempt, error = %message, "inference attempt failed");
                        last_error = format!("model='{model}' attempt={attempt}: {message}");
                        if attempt < self.retry.max_attempts_per_model
                            && is_retryable_inference_error(&message)
                        {
                            tokio::time::sleep(std::time::Duration::from_millis(
                                self.retry.backoff_ms(attempt),
                            ))
                            .await;
                            continue;
                        }
                        break;
                    }
                }
            }
        }
        Err(InferenceError::Exhausted {
            attempts,
            last_error,
        })
    }

    async fn execute_stream(
        &self,
        request: InferenceRequest,
        deltas: DeltaSender,
    ) -> Result<InferenceResponse, InferenceError> {
        let chat_req = build_request(&request);
        let options = Self::chat_options();

        let mut last_error = String::from("no model candidates");
        for model in self.model_candidates() {
            let stream = match self
                .client
                .exec_chat_stream(&model, chat_req.clone(), Some(&options))
                .await
            {
                Ok(response) => response.stream,
                Err(e) => {
                    last_error = format!("model='{model}': {e}");
                    continue;
                }
            };
            futures::pin_mut!(stream);

            let mut text = String::new();
            let mut partials: HashMap<String, PartialToolCall> = HashMap::new();
            let mut order: Vec<String> = Vec::new();
            let mut emitted = false;
            let mut stream_error: Option<String> = None;

            while let Some(event) = stream.next().await {
                match event {
                    Ok(ChatStreamEvent::Chunk(chunk)) => {
                        if !chunk.content.is_empty() {
                            text.push_str(&chunk.content);
                            emitted = true;
                            let _ = deltas.send(chunk.content);
                        }
                    }
                    Ok(ChatStreamEvent::ToolCallChunk(tool_chunk)) => {
                        let call = tool_chunk.tool_call;
                        let partial = partials.entry(call.call_id.clone()).or_insert_with(|| {
                            order.push(call.call_id.clone());
                            PartialToolCall::default()
                        });
                        if partial.name.is_empty() && !call.fn_name.is_empty() {
                            partial.name = call.fn_name;
                        }
                        // Providers stream argument text as string fragments.
                        match call.fn_arguments {
                            Value::String(fragment) => partial.arguments.push_str(&fragment),
                            Value::Null => {}
                            other => partial.arguments = other.to_string(),
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        stream_error = Some(e.to_string());
                        break;
                    }
                }
            }

            match stream_error {
                None => {
                    let tool_calls = order
                        .into_iter()
                        .filter_map(|id| {
                            let partial = partials.remove(&id)?;
                            let arguments = if partial.arguments.trim().is_empty() {
                                serde_json::json!({})
                            } else {
                                serde_json::from_str(&partial.arguments)
                                    .unwrap_or(Value::String(partial.arguments))
                            };
                            Some(ToolCallRequest::new(id, partial.name, arguments))
                        })
                        .collect();
                    return Ok(InferenceResponse {
                        text: (!text.is_empty()).then_some(text),
                        tool_calls,
                    });
                }
                Some(message) if !emitted && is_retryable_inference_error(&message) => {
                    last_error = format!("model='{model}': {message}");
                    continue;
                }
                Some(message) => {
                    // Partial stream already surfaced; hand back what arrived.
                    if emitted {
                        return Ok(InferenceResponse {
                            text: (!text.is_empty()).then_some(text),
                            tool_calls: Vec::new(),
                        });
                    }
                    return Err(InferenceError::Provider(message));
                }
            }
        }
        Err(InferenceError::Provider(last_error))
    }
}
