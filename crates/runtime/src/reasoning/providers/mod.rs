//! Inference provider implementations
//!
//! Wraps the existing `LlmClient` with the unified `InferenceProvider` trait.

#[cfg(feature = "cloud-llm")]
pub mod cloud;
