//! Model capability and pricing lookup for models served through the Codex CLI.
//!
//! The bridge only reads this data. Callers that keep their own model catalog
//! implement [`ModelRegistry`] and hand it to the session instead of the
//! built-in [`StaticModelRegistry`].

use serde::Deserialize;
use serde::Serialize;

/// Model id used when the configured id is missing or blank.
pub const DEFAULT_MODEL_ID: &str = "gpt-5.1-codex";

/// Prices in USD per million tokens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    pub input_price: f64,
    pub output_price: f64,
    pub cache_writes_price: f64,
    pub cache_reads_price: f64,
}

impl ModelPricing {
    const fn new(input_price: f64, output_price: f64, cache_reads_price: f64) -> Self {
        Self {
            input_price,
            output_price,
            cache_writes_price: 0.0,
            cache_reads_price,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub id: String,
    /// Size of the context window in tokens.
    pub context_window: u64,
    /// Maximum number of output tokens that can be generated for the model.
    pub max_output_tokens: u64,
    pub supports_images: bool,
    pub supports_prompt_cache: bool,
    pub pricing: ModelPricing,
}

/// A model id paired with the descriptor it resolved to.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedModel {
    pub id: String,
    pub descriptor: ModelDescriptor,
}

/// Read-only lookup of model capabilities keyed by id.
pub trait ModelRegistry: Send + Sync {
    fn default_model_id(&self) -> &str;

    fn get(&self, id: &str) -> Option<ModelDescriptor>;

    /// Resolve the id to send to the CLI together with its descriptor.
    ///
    /// A missing or blank id falls back to the default model. An id the
    /// registry does not know is passed through unchanged but priced with
    /// the default model's descriptor.
    fn resolve(&self, requested: Option<&str>) -> ResolvedModel {
        let default_id = self.default_model_id();
        let id = requested
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or(default_id)
            .to_string();

        let descriptor = match self.get(&id) {
            Some(descriptor) => descriptor,
            None => {
                tracing::debug!("Unknown model {id}, using {default_id} capabilities");
                let mut fallback = self.get(default_id).unwrap_or_else(|| fallback_descriptor(default_id));
                fallback.id = id.clone();
                fallback
            }
        };

        ResolvedModel { id, descriptor }
    }
}

/// Built-in catalog of the models the Codex CLI accepts.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticModelRegistry;

impl ModelRegistry for StaticModelRegistry {
    fn default_model_id(&self) -> &str {
        DEFAULT_MODEL_ID
    }

    fn get(&self, id: &str) -> Option<ModelDescriptor> {
        let (context_window, max_output_tokens, pricing) = match id {
            // https://platform.openai.com/docs/models/gpt-5-codex
            "gpt-5.1-codex" | "gpt-5.1-codex-max" | "gpt-5-codex" => {
                (272_000, 128_000, ModelPricing::new(1.25, 10.0, 0.125))
            }
            "gpt-5.1-codex-mini" | "gpt-5-codex-mini" => {
                (272_000, 128_000, ModelPricing::new(0.25, 2.0, 0.025))
            }
            // GPT-5 base and adaptive reasoning models
            "gpt-5.1" | "gpt-5" => (272_000, 128_000, ModelPricing::new(1.25, 10.0, 0.125)),
            // https://platform.openai.com/docs/models/codex-mini-latest
            "codex-mini-latest" => (200_000, 100_000, ModelPricing::new(1.5, 6.0, 0.375)),
            _ => return None,
        };

        Some(ModelDescriptor {
            id: id.to_string(),
            context_window,
            max_output_tokens,
            supports_images: false,
            supports_prompt_cache: true,
            pricing,
        })
    }
}

fn fallback_descriptor(id: &str) -> ModelDescriptor {
    ModelDescriptor {
        id: id.to_string(),
        context_window: 272_000,
        max_output_tokens: 128_000,
        supports_images: false,
        supports_prompt_cache: false,
        pricing: ModelPricing::default(),
    }
}

/// Cost of one response in USD.
///
/// Input tokens are reported inclusive of cached tokens, so cache reads and
/// writes are subtracted before the base input price applies.
pub fn calculate_cost(
    pricing: &ModelPricing,
    input_tokens: u64,
    output_tokens: u64,
    cache_write_tokens: u64,
    cache_read_tokens: u64,
) -> f64 {
    let uncached_input = input_tokens.saturating_sub(cache_write_tokens + cache_read_tokens);

    let input_cost = pricing.input_price * uncached_input as f64;
    let cache_write_cost = pricing.cache_writes_price * cache_write_tokens as f64;
    let cache_read_cost = pricing.cache_reads_price * cache_read_tokens as f64;
    let output_cost = pricing.output_price * output_tokens as f64;

    (input_cost + cache_write_cost + cache_read_cost + output_cost) / 1_000_000.0
}
