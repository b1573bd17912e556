//! Session end processor.
//!
//! Reads a finished session's transcript, extracts conversation elements,
//! writes them to the graph, refreshes the user's cached context and deletes
//! the transcript. Only the transcript read and cancellation are hard
//! failures; later steps are best-effort and report through `warnings`.

use std::sync::Arc;

use chrono::Utc;
use innerworld_types::config::{ExtractionConfig, LifecycleConfig};
use innerworld_types::context::ContextData;
use innerworld_types::conversation::ConversationMessage;
use innerworld_types::element::ConversationElement;
use innerworld_types::error::ResilienceError;
use innerworld_types::session::{SessionEndRequest, SessionProcessingResult};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::SessionError;
use super::extractor::ElementExtractor;
use super::ledger::{GraphWriteLedger, WriteOutcome};
use crate::cache::ContextCacheManager;
use crate::llm::BoxGenerationService;
use crate::repository::graph::TEMPORAL_EDGE;
use crate::repository::{ContextCacheStore, GraphStore, MessageStore};
use crate::resilience::{Collaborator, Resilience, classify};

pub struct SessionEndProcessor<M: MessageStore, C: ContextCacheStore, G: GraphStore> {
    messages: Arc<M>,
    graph: Arc<G>,
    context: Arc<ContextCacheManager<C, G>>,
    generator: Arc<BoxGenerationService>,
    resilience: Arc<Resilience>,
    extraction: ExtractionConfig,
    model: String,
}

impl<M: MessageStore, C: ContextCacheStore, G: GraphStore> SessionEndProcessor<M, C, G> {
    pub fn new(
        messages: Arc<M>,
        graph: Arc<G>,
        context: Arc<ContextCacheManager<C, G>>,
        generator: Arc<BoxGenerationService>,
        resilience: Arc<Resilience>,
        config: &LifecycleConfig,
    ) -> Self {
        Self {
            messages,
            graph,
            context,
            generator,
            resilience,
            extraction: config.extraction.clone(),
            model: config.generation.model.clone(),
        }
    }

    /// Process a finished session. Always returns a result; failures are
    /// reported through `success`, `error` and `warnings`.
    #[tracing::instrument(
        name = "session_end",
        skip_all,
        fields(
            session_id = %request.session_id,
            user_id = %request.user_id,
            reason = %request.reason,
        )
    )]
    pub async fn process(
        &self,
        request: &SessionEndRequest,
        cancel: &CancellationToken,
    ) -> SessionProcessingResult {
        let mut result = SessionProcessingResult::pending(&request.session_id, Utc::now());

        // 1. Transcript
        let messages = match self.read_transcript(&request.session_id, cancel).await {
            Ok(messages) => messages,
            Err(e) => {
                error!(error = %e, "session processing failed");
                result.error = Some(e.to_string());
                return result;
            }
        };
        if messages.is_empty() {
            info!("session has no messages, nothing to process");
            result.success = true;
            return result;
        }

        // 2. Extraction
        let extraction = match ElementExtractor::extract(
            &self.generator,
            &self.resilience,
            &messages,
            &self.extraction,
            &self.model,
            cancel,
        )
        .await
        {
            Ok(extraction) => extraction,
            Err(e) => {
                warn!(error = %e, "session processing interrupted during extraction");
                result.error = Some(e.to_string());
                return result;
            }
        };
        result.extraction_source = Some(extraction.source);
        result.elements_extracted = extraction.elements;
        result.success = true;

        // 3. Graph writes
        let ledger = self
            .write_elements(&request.user_id, &result.elements_extracted, cancel)
            .await;
        result.graph_nodes_created = ledger.nodes_created();
        result.graph_edges_created = ledger.edges_created();
        result.warnings.extend(ledger.warnings());

        // 4. Context refresh
        let extra = session_fields(request, messages.len(), &result.elements_extracted);
        if let Err(e) = self
            .context
            .refresh_from_graph(&request.user_id, extra, cancel)
            .await
        {
            warn!(error = %e, "context refresh failed");
            result.warnings.push(format!("context refresh failed: {e}"));
        }

        // 5. Cleanup
        let store = &*self.messages;
        let session_id = request.session_id.as_str();
        match self
            .resilience
            .call(
                Collaborator::DurableStore,
                cancel,
                classify::durable_store,
                move |_| store.delete_by_session(session_id),
            )
            .await
        {
            Ok(deleted) => info!(deleted, "session transcript deleted"),
            Err(e) => {
                warn!(error = %e, "failed to delete session transcript");
                result
                    .warnings
                    .push(format!("transcript cleanup failed: {e}"));
            }
        }

        info!(
            elements = result.elements_extracted.len(),
            nodes = result.graph_nodes_created,
            edges = result.graph_edges_created,
            warnings = result.warnings.len(),
            "session processed"
        );
        result
    }

    async fn read_transcript(
        &self,
        session_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<ConversationMessage>, SessionError> {
        let store = &*self.messages;
        self.resilience
            .call(
                Collaborator::DurableStore,
                cancel,
                classify::durable_store,
                move |_| store.get_by_session(session_id),
            )
            .await
            .map_err(|e| match e {
                ResilienceError::Cancelled => SessionError::Cancelled,
                other => SessionError::Transcript(other),
            })
    }

    /// Create a node and a temporal edge per element; each element stands alone.
    async fn write_elements(
        &self,
        user_id: &str,
        elements: &[ConversationElement],
        cancel: &CancellationToken,
    ) -> GraphWriteLedger {
        let graph = &*self.graph;
        let mut ledger = GraphWriteLedger::new();

        for (index, element) in elements.iter().enumerate() {
            let node = self
                .resilience
                .call(
                    Collaborator::GraphStore,
                    cancel,
                    classify::graph_store,
                    move |_| graph.create_node(user_id, element.element_type, &element.content),
                )
                .await;
            let node_id = match node {
                Ok(node_id) => node_id,
                Err(e) => {
                    warn!(index, element_type = %element.element_type, error = %e, "graph node creation failed");
                    ledger.record(
                        index,
                        element.element_type,
                        WriteOutcome::NodeFailed {
                            error: e.to_string(),
                        },
                    );
                    continue;
                }
            };

            let from = node_id.as_str();
            let edge = self
                .resilience
                .call(
                    Collaborator::GraphStore,
                    cancel,
                    classify::graph_store,
                    move |_| graph.create_edge(user_id, from, TEMPORAL_EDGE, element.timestamp),
                )
                .await;
            let outcome = match edge {
                Ok(()) => WriteOutcome::Written { node_id },
                Err(e) => {
                    warn!(index, node_id = %node_id, error = %e, "graph edge creation failed");
                    WriteOutcome::EdgeFailed {
                        node_id,
                        error: e.to_string(),
                    }
                }
            };
            ledger.record(index, element.element_type, outcome);
        }
        ledger
    }
}

/// Session facts merged into the refreshed context.
fn session_fields(
    request: &SessionEndRequest,
    message_count: usize,
    elements: &[ConversationElement],
) -> ContextData {
    let mut data = ContextData::new();
    data.insert(
        "last_session_id".into(),
        Value::String(request.session_id.clone()),
    );
    data.insert(
        "last_session_end_reason".into(),
        Value::String(request.reason.to_string()),
    );
    data.insert("last_session_message_count".into(), Value::from(message_count));
    data.insert(
        "last_session_elements".into(),
        Value::Array(
            elements
                .iter()
                .map(|e| {
                    serde_json::json!({
                        "type": e.element_type.as_str(),
                        "content": e.content,
                    })
                })
                .collect(),
        ),
    );
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use innerworld_types::conversation::MessageType;
    use innerworld_types::element::{ElementType, ExtractionSource};
    use innerworld_types::error::RepositoryError;
    use innerworld_types::llm::LlmError;
    use innerworld_types::session::EndReason;

    use crate::testing::{MemoryCache, MemoryGraph, MemoryMessages, ScriptedGenerator, fast_resilience};

    struct Harness {
        processor: SessionEndProcessor<MemoryMessages, MemoryCache, MemoryGraph>,
        messages: Arc<MemoryMessages>,
        cache: Arc<MemoryCache>,
        graph: Arc<MemoryGraph>,
    }

    fn transcript(count: u64, persona: &str) -> Vec<ConversationMessage> {
        let now = Utc::now();
        (0..count)
            .map(|seq| ConversationMessage {
                conversation_id: "s-1_2026-01-01".into(),
                message_id: format!("msg_{seq}"),
                session_id: "s-1".into(),
                user_id: "u-1".into(),
                persona: persona.into(),
                sequence: seq,
                message_type: if seq % 2 == 0 {
                    MessageType::User
                } else {
                    MessageType::Assistant
                },
                content: format!("line {seq}"),
                session_start: now,
                created_at: now,
                expires_at: now + chrono::Duration::hours(24),
            })
            .collect()
    }

    fn harness(records: Vec<ConversationMessage>, generator: ScriptedGenerator) -> Harness {
        let messages = Arc::new(MemoryMessages::with_records(records));
        let cache = Arc::new(MemoryCache::default());
        let graph = Arc::new(MemoryGraph::default());
        let resilience = Arc::new(fast_resilience());
        let context = Arc::new(ContextCacheManager::new(
            cache.clone(),
            graph.clone(),
            resilience.clone(),
            chrono::Duration::hours(1),
        ));
        let processor = SessionEndProcessor::new(
            messages.clone(),
            graph.clone(),
            context,
            Arc::new(BoxGenerationService::new(generator)),
            resilience,
            &LifecycleConfig::default(),
        );
        Harness {
            processor,
            messages,
            cache,
            graph,
        }
    }

    fn request() -> SessionEndRequest {
        SessionEndRequest {
            session_id: "s-1".into(),
            user_id: "u-1".into(),
            reason: EndReason::Manual,
        }
    }

    fn eight_elements() -> String {
        let items: Vec<String> = (1..=8)
            .map(|i| format!(r#"{{"type": "Event", "content": "event {i}", "confidence": 0.8}}"#))
            .collect();
        format!("[{}]", items.join(","))
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_session_is_successful_no_op() {
        let h = harness(Vec::new(), ScriptedGenerator::replying(["[]"]));
        let result = h.processor.process(&request(), &CancellationToken::new()).await;
        assert!(result.success);
        assert!(result.error.is_none());
        assert!(result.elements_extracted.is_empty());
        assert_eq!(result.graph_nodes_created, 0);
        assert_eq!(result.graph_edges_created, 0);
        assert!(h.cache.raw("u-1").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_node_failure_is_skipped() {
        let h = harness(transcript(4, "default"), ScriptedGenerator::replying([eight_elements().as_str()]));
        h.graph.reject_content("event 5");

        let result = h.processor.process(&request(), &CancellationToken::new()).await;
        assert!(result.success);
        assert_eq!(result.extraction_source, Some(ExtractionSource::Model));
        assert_eq!(result.elements_extracted.len(), 8);
        assert_eq!(result.graph_nodes_created, 7);
        assert_eq!(result.graph_edges_created, 7);
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].starts_with("element 4 (Event)"));
        assert!(h.graph.edge_types().iter().all(|t| t == TEMPORAL_EDGE));
    }

    #[tokio::test(start_paused = true)]
    async fn test_generation_failure_uses_synthetic_elements() {
        let h = harness(
            transcript(6, "courage"),
            ScriptedGenerator::failing(LlmError::Provider {
                message: "502".into(),
            }),
        );
        let result = h.processor.process(&request(), &CancellationToken::new()).await;
        assert!(result.success);
        assert_eq!(result.extraction_source, Some(ExtractionSource::Synthetic));
        assert_eq!(result.elements_extracted.len(), 3);
        assert_eq!(result.elements_extracted[0].metadata["message_count"], 6);
        assert_eq!(result.graph_nodes_created, 3);
        let types: Vec<ElementType> = h.graph.nodes().iter().map(|n| n.element_type).collect();
        assert_eq!(types, vec![ElementType::Event, ElementType::Feeling, ElementType::Goal]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreadable_transcript_fails() {
        let h = harness(transcript(2, "default"), ScriptedGenerator::replying(["[]"]));
        h.messages.fail_reads(RepositoryError::Unauthorized);

        let result = h.processor.process(&request(), &CancellationToken::new()).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("failed to read session transcript"));
        assert!(h.graph.nodes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_edge_failures_do_not_fail_the_session() {
        let h = harness(transcript(2, "default"), ScriptedGenerator::replying(["[]"]));
        h.graph.fail_edges(RepositoryError::InvalidInput("bad edge".into()));

        let result = h.processor.process(&request(), &CancellationToken::new()).await;
        assert!(result.success);
        assert_eq!(result.graph_nodes_created, 2);
        assert_eq!(result.graph_edges_created, 0);
        assert_eq!(result.warnings.len(), 2);
        assert_eq!(h.graph.edge_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refreshes_context_and_deletes_transcript() {
        let h = harness(transcript(4, "default"), ScriptedGenerator::replying([eight_elements().as_str()]));
        let result = h.processor.process(&request(), &CancellationToken::new()).await;
        assert!(result.success);
        assert!(result.warnings.is_empty());

        let cached = h.cache.raw("u-1").unwrap();
        assert_eq!(cached.context_data["refresh_source"], "session_processing");
        assert_eq!(cached.context_data["last_session_id"], "s-1");
        assert_eq!(cached.context_data["last_session_message_count"], 4);
        assert_eq!(cached.context_data["recent_themes"][0], "event 8");

        assert!(h.messages.snapshot().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_and_refresh_failures_are_warnings() {
        let h = harness(transcript(2, "default"), ScriptedGenerator::replying(["[]"]));
        h.messages.fail_deletes(RepositoryError::Unauthorized);
        h.cache.fail_puts(RepositoryError::Unauthorized);

        let result = h.processor.process(&request(), &CancellationToken::new()).await;
        assert!(result.success);
        assert_eq!(result.warnings.len(), 2);
        assert!(result.warnings[0].starts_with("context refresh failed"));
        assert!(result.warnings[1].starts_with("transcript cleanup failed"));
        assert_eq!(h.messages.snapshot().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreadable_cache_is_a_refresh_warning() {
        let h = harness(transcript(2, "default"), ScriptedGenerator::replying(["[]"]));
        h.cache.fail_gets(RepositoryError::Unauthorized);

        let result = h.processor.process(&request(), &CancellationToken::new()).await;
        assert!(result.success);
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].starts_with("context refresh failed: context cache read failed"));
        assert!(h.cache.raw("u-1").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_during_extraction() {
        let h = harness(transcript(2, "default"), ScriptedGenerator::hanging());
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            trigger.cancel();
        });

        let result = h.processor.process(&request(), &cancel).await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("session processing cancelled"));
        assert_eq!(h.messages.snapshot().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_processing_twice_is_tolerated() {
        let h = harness(transcript(2, "default"), ScriptedGenerator::replying(["[]"]));
        let cancel = CancellationToken::new();
        let first = h.processor.process(&request(), &cancel).await;
        let second = h.processor.process(&request(), &cancel).await;
        assert!(first.success);
        assert!(second.success);
        assert!(second.elements_extracted.is_empty());
    }
}
