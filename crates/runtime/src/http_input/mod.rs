//! LLM client used by the compliance query engine's cloud inference provider.
//! Conditionally compiled behind the `http-input` feature flag, matching its
//! original gating in the full runtime.

#[cfg(feature = "http-input")]
pub mod llm_client;
