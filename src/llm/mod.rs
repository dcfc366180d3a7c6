pub mod gateway;
pub mod openrouter;

pub use gateway::{GenerationError, GenerationGateway, SamplingParams};
pub use openrouter::OpenRouterGateway;
