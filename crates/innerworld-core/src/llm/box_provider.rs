//! BoxGenerationService -- object-safe dynamic dispatch wrapper for GenerationService.
//!
//! 1. Define an object-safe `GenerationServiceDyn` trait with boxed futures
//! 2. Blanket-impl `GenerationServiceDyn` for all `T: GenerationService`
//! 3. `BoxGenerationService` wraps `Box<dyn GenerationServiceDyn>` and delegates

use std::future::Future;
use std::pin::Pin;

use innerworld_types::llm::{CompletionRequest, CompletionResponse, LlmError};

use super::provider::GenerationService;

/// Object-safe version of [`GenerationService`] with boxed futures.
pub trait GenerationServiceDyn: Send + Sync {
    fn name(&self) -> &str;

    fn complete_boxed<'a>(
        &'a self,
        request: &'a CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CompletionResponse, LlmError>> + Send + 'a>>;
}

impl<T: GenerationService> GenerationServiceDyn for T {
    fn name(&self) -> &str {
        GenerationService::name(self)
    }

    fn complete_boxed<'a>(
        &'a self,
        request: &'a CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CompletionResponse, LlmError>> + Send + 'a>> {
        Box::pin(self.complete(request))
    }
}

/// Type-erased generation backend, selected at startup (remote vs offline).
pub struct BoxGenerationService {
    inner: Box<dyn GenerationServiceDyn + Send + Sync>,
}

impl BoxGenerationService {
    pub fn new<T: GenerationService + 'static>(service: T) -> Self {
        Self {
            inner: Box::new(service),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, LlmError> {
        self.inner.complete_boxed(request).await
    }
}

impl std::fmt::Debug for BoxGenerationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxGenerationService")
            .field("name", &self.name())
            .finish()
    }
}
