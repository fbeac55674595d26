use async_trait::async_trait;
use serde_json::Value;

use super::cache::EmbeddingVector;

/// Payload sent to an embedding backend.
#[derive(Debug, Clone, Copy)]
pub enum EmbeddingInput<'a> {
    Image(&'a [u8]),
    Text(&'a str),
}

impl EmbeddingInput<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            EmbeddingInput::Image(_) => "image",
            EmbeddingInput::Text(_) => "text",
        }
    }
}

/// Result of an embedding request.
///
/// Only `Vector` carries semantic signal; the other variants say why there is
/// none so callers can degrade and tests can tell the causes apart.
#[derive(Debug, Clone, PartialEq)]
pub enum EmbeddingOutcome {
    Vector(EmbeddingVector),
    /// Service unreachable, timed out, or reported a failure.
    ProviderError(String),
    /// The service answered with something that is not a usable vector.
    MalformedResponse,
}

#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    async fn embed(&self, input: EmbeddingInput<'_>) -> EmbeddingOutcome;
}

/// Interpret a model output as an embedding.
///
/// Accepts a bare numeric array or an object with an `embedding` numeric
/// array. Empty arrays and anything else are malformed.
pub fn interpret_output(output: &Value) -> EmbeddingOutcome {
    let values = match output {
        Value::Array(values) => values,
        Value::Object(map) => match map.get("embedding") {
            Some(Value::Array(values)) => values,
            _ => return EmbeddingOutcome::MalformedResponse,
        },
        _ => return EmbeddingOutcome::MalformedResponse,
    };

    if values.is_empty() {
        return EmbeddingOutcome::MalformedResponse;
    }

    values
        .iter()
        .map(|v| v.as_f64().map(|f| f as f32))
        .collect::<Option<EmbeddingVector>>()
        .map(EmbeddingOutcome::Vector)
        .unwrap_or(EmbeddingOutcome::MalformedResponse)
}
