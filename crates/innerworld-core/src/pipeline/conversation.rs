//! Conversation pipeline orchestrating one user turn.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use innerworld_types::config::{GenerationConfig, LifecycleConfig, MessageConfig};
use innerworld_types::context::UserContext;
use innerworld_types::conversation::{
    ConversationInput, ConversationMessage, ConversationReply, MessageType, conversation_id,
};
use innerworld_types::error::{RepositoryError, ResilienceError};
use innerworld_types::llm::{CompletionRequest, Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{
    EMPTY_RESPONSE_FALLBACK, GENERATION_FALLBACK, INPUT_SAFETY_FALLBACK, OUTPUT_SAFETY_FALLBACK,
    PipelineError,
};
use crate::cache::ContextCacheManager;
use crate::llm::BoxGenerationService;
use crate::persona::PersonaCatalog;
use crate::repository::{ContextCacheStore, GraphStore, MessageStore};
use crate::resilience::{Collaborator, Resilience, classify};
use crate::safety::{SafetyClassifier, SafetyVerdict};

/// Runs the five-stage pipeline for each inbound user message.
///
/// Generic over the store traits so the core crate never depends on
/// innerworld-infra.
pub struct ConversationPipeline<M: MessageStore, C: ContextCacheStore, G: GraphStore> {
    messages: Arc<M>,
    context: Arc<ContextCacheManager<C, G>>,
    generator: Arc<BoxGenerationService>,
    safety: Arc<dyn SafetyClassifier>,
    personas: Arc<PersonaCatalog>,
    resilience: Arc<Resilience>,
    generation: GenerationConfig,
    message_policy: MessageConfig,
}

impl<M: MessageStore, C: ContextCacheStore, G: GraphStore> ConversationPipeline<M, C, G> {
    pub fn new(
        messages: Arc<M>,
        context: Arc<ContextCacheManager<C, G>>,
        generator: Arc<BoxGenerationService>,
        safety: Arc<dyn SafetyClassifier>,
        personas: Arc<PersonaCatalog>,
        resilience: Arc<Resilience>,
        config: &LifecycleConfig,
    ) -> Self {
        Self {
            messages,
            context,
            generator,
            safety,
            personas,
            resilience,
            generation: config.generation.clone(),
            message_policy: config.messages.clone(),
        }
    }

    /// Process one user message and return the assistant-visible reply.
    ///
    /// Fallback substitutions still produce `Ok`. Errors are limited to
    /// malformed input and cancellation.
    #[tracing::instrument(
        name = "conversation_turn",
        skip_all,
        fields(
            session_id = %input.session_id,
            user_id = %input.user_id,
            persona = %input.persona,
        )
    )]
    pub async fn process(
        &self,
        input: &ConversationInput,
        cancel: &CancellationToken,
    ) -> Result<ConversationReply, PipelineError> {
        self.validate(input)?;
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        let reply_id = new_message_id();

        // 1. Input safety
        if let SafetyVerdict::Unsafe { reason } = self.safety.classify(&input.message) {
            warn!(%reason, "user message failed safety check, short-circuiting");
            return Ok(ConversationReply {
                message_id: reply_id,
                content: INPUT_SAFETY_FALLBACK.to_string(),
                timestamp: Utc::now(),
            });
        }

        // 2. Persona and context injection
        let context = self.context.get(&input.user_id, cancel).await;
        let request = self.build_request(input, context.as_ref());

        // 3. Generation
        let generated = self.generate(&request, cancel).await?;

        // 4. Output safety
        let content = match self.safety.classify(&generated) {
            SafetyVerdict::Safe => generated,
            SafetyVerdict::Unsafe { reason } => {
                warn!(%reason, "generated reply failed safety check, substituting fallback");
                OUTPUT_SAFETY_FALLBACK.to_string()
            }
        };

        // 5. Durable append
        let timestamp = Utc::now();
        self.persist_exchange(input, &reply_id, &content, timestamp, cancel)
            .await?;

        Ok(ConversationReply {
            message_id: reply_id,
            content,
            timestamp,
        })
    }

    fn validate(&self, input: &ConversationInput) -> Result<(), PipelineError> {
        if input.session_id.trim().is_empty() {
            return Err(PipelineError::InvalidInput("session id is empty".into()));
        }
        if input.user_id.trim().is_empty() {
            return Err(PipelineError::InvalidInput("user id is empty".into()));
        }
        if input.message.trim().is_empty() {
            return Err(PipelineError::InvalidInput("message is empty".into()));
        }
        let length = input.message.chars().count();
        let max = self.message_policy.max_message_chars;
        if length > max {
            return Err(PipelineError::InvalidInput(format!(
                "message is {length} characters, maximum is {max}"
            )));
        }
        Ok(())
    }

    fn build_request(
        &self,
        input: &ConversationInput,
        context: Option<&UserContext>,
    ) -> CompletionRequest {
        CompletionRequest {
            model: self.generation.model.clone(),
            messages: vec![Message::user(input.message.clone())],
            system: Some(self.personas.system_prompt(&input.persona, context)),
            max_tokens: self.generation.max_tokens,
            temperature: Some(self.generation.temperature),
        }
    }

    async fn generate(
        &self,
        request: &CompletionRequest,
        cancel: &CancellationToken,
    ) -> Result<String, PipelineError> {
        let generator = &*self.generator;
        let result = self
            .resilience
            .call(
                Collaborator::Generation,
                cancel,
                classify::generation,
                move |_| generator.complete(request),
            )
            .await;

        match result {
            Ok(response) if response.content.trim().is_empty() => {
                warn!(model = %response.model, "generation returned an empty reply");
                Ok(EMPTY_RESPONSE_FALLBACK.to_string())
            }
            Ok(response) => {
                debug!(
                    model = %response.model,
                    input_tokens = response.usage.input_tokens,
                    output_tokens = response.usage.output_tokens,
                    "reply generated"
                );
                Ok(response.content)
            }
            Err(ResilienceError::Cancelled) => Err(PipelineError::Cancelled),
            Err(e @ ResilienceError::NonRetryable(_)) => {
                error!(error = %e, "generation failed permanently, using fallback reply");
                Ok(GENERATION_FALLBACK.to_string())
            }
            Err(e) => {
                warn!(error = %e, "generation unavailable, using fallback reply");
                Ok(GENERATION_FALLBACK.to_string())
            }
        }
    }

    /// Append the user message and the reply as two consecutive records.
    ///
    /// Store failures are logged and swallowed; the user still gets a reply.
    async fn persist_exchange(
        &self,
        input: &ConversationInput,
        reply_id: &str,
        reply: &str,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<(), PipelineError> {
        let user_record = ConversationMessage {
            conversation_id: conversation_id(&input.session_id, input.session_start),
            message_id: new_message_id(),
            session_id: input.session_id.clone(),
            user_id: input.user_id.clone(),
            persona: input.persona.clone(),
            sequence: 0,
            message_type: MessageType::User,
            content: input.message.clone(),
            session_start: input.session_start,
            created_at: now,
            expires_at: now
                .checked_add_signed(self.message_policy.ttl())
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        };
        let assistant_record = ConversationMessage {
            message_id: reply_id.to_string(),
            message_type: MessageType::Assistant,
            content: reply.to_string(),
            ..user_record.clone()
        };

        for record in [&user_record, &assistant_record] {
            match self.append(record, cancel).await {
                Ok(sequence) => {
                    debug!(sequence, message_type = %record.message_type, "message stored");
                }
                Err(ResilienceError::Cancelled) => return Err(PipelineError::Cancelled),
                Err(e) => {
                    error!(
                        error = %e,
                        message_type = %record.message_type,
                        "failed to store message, transcript will be incomplete"
                    );
                    return Ok(());
                }
            }
        }
        info!("conversation turn stored");
        Ok(())
    }

    /// Append `template` at the session's next free sequence.
    ///
    /// The sequence is recomputed on every attempt, so a conflict with a
    /// concurrent writer is safe to retry.
    async fn append(
        &self,
        template: &ConversationMessage,
        cancel: &CancellationToken,
    ) -> Result<u64, ResilienceError<RepositoryError>> {
        let store = &*self.messages;
        self.resilience
            .call(
                Collaborator::DurableStore,
                cancel,
                classify::durable_store,
                move |_| append_at_next_sequence(store, template),
            )
            .await
    }
}

async fn append_at_next_sequence<M: MessageStore>(
    store: &M,
    template: &ConversationMessage,
) -> Result<u64, RepositoryError> {
    let existing = store.get_by_session(&template.session_id).await?;
    let sequence = next_sequence(&existing);
    let mut record = template.clone();
    record.sequence = sequence;
    store.append(&record).await?;
    Ok(sequence)
}

/// Sequences start at 0 and grow by one per record.
pub fn next_sequence(records: &[ConversationMessage]) -> u64 {
    records
        .iter()
        .map(|r| r.sequence)
        .max()
        .map_or(0, |last| last + 1)
}

fn new_message_id() -> String {
    format!("msg_{}", Uuid::now_v7().simple())
}
