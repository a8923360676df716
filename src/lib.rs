//! A mathematics tutor on top of the Gemini `generateContent` API.
//!
//! The crate keeps an append-only [`Session`] of turns and resolves each
//! question with exactly one call to a [`Generator`].  [`Gemini`] is the
//! HTTP implementation; tests substitute their own.

// Public modules
pub mod chat;
pub mod client;
pub mod config;
pub mod error;
pub mod generator;
pub mod observability;
pub mod session;
pub mod tutor;
pub mod types;

// Re-exports
pub use client::{Gemini, InstructionMode};
pub use config::{ConfigFile, DEFAULT_INSTRUCTION, TutorArgs, TutorConfig};
pub use error::{Error, GenerationError, GenerationErrorKind, InputKind, Result};
pub use generator::Generator;
pub use observability::register_biometrics;
pub use session::Session;
pub use tutor::{DispatchState, Tutor, TutorStats};
pub use types::*;
