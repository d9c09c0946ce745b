//! Core domain types and pure logic for the comic generation pipeline.
//!
//! Everything in this crate is synchronous and side-effect free: the
//! project document model, the static page layout tables, the prompt
//! builder, and the shared error type. The async stages (`kapow-llm`,
//! `kapow-imagegen`, `kapow-pipeline`) build on top of these.

pub mod layout;
pub mod project;
pub mod prompts;
pub mod types;
