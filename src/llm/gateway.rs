use async_trait::async_trait;
use image::RgbImage;
use thiserror::Error;

use crate::config::{
    MAX_TOKENS_MAX, MAX_TOKENS_MIN, TEMPERATURE_MAX, TEMPERATURE_MIN, TOP_P_MAX, TOP_P_MIN,
};
use crate::prompt::ChatMessage;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct GenerationError(pub String);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingParams {
    pub max_new_tokens: u32,
    pub top_p: f32,
    pub temperature: f32,
}

impl SamplingParams {
    /// Clamps every value into its supported range.
    pub fn new(max_new_tokens: u32, top_p: f32, temperature: f32) -> Self {
        SamplingParams {
            max_new_tokens: max_new_tokens.clamp(MAX_TOKENS_MIN, MAX_TOKENS_MAX),
            top_p: clamp_finite(top_p, TOP_P_MIN, TOP_P_MAX),
            temperature: clamp_finite(temperature, TEMPERATURE_MIN, TEMPERATURE_MAX),
        }
    }
}

impl Default for SamplingParams {
    fn default() -> Self {
        SamplingParams::new(512, 0.8, 0.7)
    }
}

fn clamp_finite(value: f32, min: f32, max: f32) -> f32 {
    if value.is_nan() {
        return min;
    }
    value.clamp(min, max)
}

/// Opaque text generator: messages plus image plus sampling parameters in, text out.
#[async_trait]
pub trait GenerationGateway: Send + Sync {
    fn provider(&self) -> &str;

    fn model(&self) -> &str;

    async fn generate(
        &self,
        messages: &[ChatMessage],
        image: &RgbImage,
        params: &SamplingParams,
    ) -> Result<String, GenerationError>;
}
