//! Core library for the guided SEO article workflow.
//!
//! The workflow walks one [`session::Session`] through six steps (keyword
//! intake, LSI research, content brief, article draft, refinement, export).
//! Each generation step builds a prompt with [`prompt`], streams text from a
//! [`generation::Generator`], parses the result with [`parse`] and commits it
//! to the session. [`export::ExportWriter`] persists the finished article.

pub mod export;
pub mod generation;
pub mod parse;
pub mod presets;
pub mod prompt;
pub mod session;
pub mod workflow;
