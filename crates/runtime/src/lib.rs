//! Symbiont compliance runtime
//!
//! Houses the regulatory-compliance research agent (`compliance`) and the
//! minimal LLM-inference plumbing (`reasoning`, `http_input::llm_client`)
//! it runs on.

pub mod compliance;
pub mod reasoning;

#[cfg(feature = "http-input")]
pub mod http_input;
