//! Request handlers, split by surface area.

pub mod comic;
pub mod project;
