//! The seam between a tutoring session and a remote model provider.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::GenerationError;
use crate::types::GenerateRequest;

/// Something that turns a [`GenerateRequest`] into generated text.
///
/// Implementations make exactly one attempt per call.  They never retry,
/// and they return the provider's text verbatim.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Issue one generation call.
    async fn generate(&self, request: &GenerateRequest) -> Result<String, GenerationError>;
}

#[async_trait]
impl<G: Generator + ?Sized> Generator for Arc<G> {
    async fn generate(&self, request: &GenerateRequest) -> Result<String, GenerationError> {
        self.as_ref().generate(request).await
    }
}

#[async_trait]
impl<G: Generator + ?Sized> Generator for Box<G> {
    async fn generate(&self, request: &GenerateRequest) -> Result<String, GenerationError> {
        self.as_ref().generate(request).await
    }
}
