//! SceneForge - LLM-orchestrated Manim animation pipeline
//!
//! SceneForge turns a natural-language animation request into a rendered video. It
//! chains completion calls to a local Ollama instance with the Manim renderer and
//! repairs its own output when generated code fails review or rendering.
//!
//! # Architecture
//!
//! - **commands**: CLI command implementations (init, render, status, validate, cleanup)
//! - **core**: The engine (pipeline, description and generation loops, renderer, LLM client)
//! - **models**: Data structures (config, request, state, outcome, progress, run status)
//! - **templates**: Default config and per-category rule files
//! - **error**: Error types

pub mod commands;
pub mod core;
pub mod error;
pub mod models;
pub mod templates;

pub use error::{Result, SceneForgeError};
