//! Text-LLM client and tolerant output parsing.
//!
//! The pipeline treats model replies as untyped text: [`client`] gets
//! the text, [`extract`] digs the JSON out of it. Neither ever panics
//! on bad model output.

pub mod client;
pub mod extract;

pub use client::{ChatClient, LlmError};
