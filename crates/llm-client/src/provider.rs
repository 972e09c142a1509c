use async_trait::async_trait;
use serde_json::Value;

use crate::error::LlmResult;

/// Backend-agnostic chat interface that answers with a parsed JSON object.
///
/// Implementations must fail (rather than return partial data) on non-2xx
/// responses, timeouts, and content that is not a JSON object.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn chat_json(&self, system: &str, user: &str, schema_hint: &Value) -> LlmResult<Value>;

    /// Identifier recorded on runs whose report came from this provider.
    fn model_name(&self) -> &str;
}
