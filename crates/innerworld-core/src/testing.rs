//! Test doubles shared by the core unit tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicU32, Ordering};

use chrono::{DateTime, Utc};
use innerworld_types::config::{BreakerConfig, RetryConfig, RetryPolicies};
use innerworld_types::context::{GraphSummary, UserContext};
use innerworld_types::conversation::ConversationMessage;
use innerworld_types::element::ElementType;
use innerworld_types::error::RepositoryError;
use innerworld_types::llm::{
    CompletionRequest, CompletionResponse, LlmError, StopReason, Usage,
};

use crate::llm::GenerationService;
use crate::repository::{ContextCacheStore, GraphStore, MessageStore};
use crate::resilience::Resilience;

/// Resilience with tiny delays so paused-time tests stay readable.
pub fn fast_resilience() -> Resilience {
    let fast = RetryConfig {
        max_attempts: 3,
        initial_delay_ms: 10,
        max_delay_ms: 100,
        backoff_multiplier: 2.0,
    };
    Resilience::new(
        RetryPolicies {
            cache_store: fast.clone(),
            durable_store: fast.clone(),
            graph_store: fast.clone(),
            generation: fast,
        },
        BreakerConfig {
            max_failures: 50,
            reset_timeout_secs: 30,
        },
    )
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// Replays a script of outcomes; the last one repeats forever.
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<Result<String, LlmError>>>,
    hang: bool,
    calls: AtomicU32,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedGenerator {
    pub fn new(script: Vec<Result<String, LlmError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            hang: false,
            calls: AtomicU32::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn replying<'a>(replies: impl IntoIterator<Item = &'a str>) -> Self {
        Self::new(replies.into_iter().map(|r| Ok(r.to_string())).collect())
    }

    pub fn failing(error: LlmError) -> Self {
        Self::new(vec![Err(error)])
    }

    /// Never completes; only cancellation ends the call.
    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::new(Vec::new())
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next(&self) -> Result<String, LlmError> {
        let mut script = self.script.lock().unwrap();
        if script.len() > 1 {
            script.pop_front().unwrap()
        } else {
            script.front().cloned().unwrap_or_else(|| Ok(String::new()))
        }
    }
}

impl GenerationService for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        if self.hang {
            std::future::pending::<()>().await;
        }
        let content = self.next()?;
        Ok(CompletionResponse {
            id: format!("resp-{}", self.calls()),
            content,
            model: request.model.clone(),
            stop_reason: StopReason::EndTurn,
            usage: Usage {
                input_tokens: 10,
                output_tokens: 5,
            },
        })
    }
}

/// Shared handle so tests can box the generator and still inspect it.
impl GenerationService for Arc<ScriptedGenerator> {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.as_ref().complete(request).await
    }
}

// ---------------------------------------------------------------------------
// Message store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryMessages {
    records: Mutex<Vec<ConversationMessage>>,
    append_failures: Mutex<VecDeque<RepositoryError>>,
    read_failure: Mutex<Option<RepositoryError>>,
    delete_failure: Mutex<Option<RepositoryError>>,
    pub appends: AtomicU32,
}

impl MemoryMessages {
    pub fn with_records(records: Vec<ConversationMessage>) -> Self {
        Self {
            records: Mutex::new(records),
            ..Default::default()
        }
    }

    /// Queue errors returned by the next appends, in order.
    pub fn fail_next_appends(&self, errors: impl IntoIterator<Item = RepositoryError>) {
        self.append_failures.lock().unwrap().extend(errors);
    }

    pub fn fail_reads(&self, error: RepositoryError) {
        *self.read_failure.lock().unwrap() = Some(error);
    }

    pub fn fail_deletes(&self, error: RepositoryError) {
        *self.delete_failure.lock().unwrap() = Some(error);
    }

    pub fn snapshot(&self) -> Vec<ConversationMessage> {
        self.records.lock().unwrap().clone()
    }

    /// Append bypassing failure injection, e.g. to simulate a concurrent writer.
    pub fn insert_raw(&self, record: ConversationMessage) {
        self.records.lock().unwrap().push(record);
    }
}

impl MessageStore for MemoryMessages {
    async fn append(&self, record: &ConversationMessage) -> Result<(), RepositoryError> {
        self.appends.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.append_failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        let mut records = self.records.lock().unwrap();
        if records
            .iter()
            .any(|r| r.conversation_id == record.conversation_id && r.sequence == record.sequence)
        {
            return Err(RepositoryError::Conflict(format!(
                "sequence {} already exists",
                record.sequence
            )));
        }
        records.push(record.clone());
        Ok(())
    }

    async fn get_by_session(
        &self,
        session_id: &str,
    ) -> Result<Vec<ConversationMessage>, RepositoryError> {
        if let Some(error) = self.read_failure.lock().unwrap().clone() {
            return Err(error);
        }
        let mut found: Vec<ConversationMessage> = self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.session_id == session_id)
            .cloned()
            .collect();
        found.sort_by_key(|r| r.sequence);
        Ok(found)
    }

    async fn delete_by_session(&self, session_id: &str) -> Result<u64, RepositoryError> {
        if let Some(error) = self.delete_failure.lock().unwrap().clone() {
            return Err(error);
        }
        let mut records = self.records.lock().unwrap();
        let before = records.len();
        records.retain(|r| r.session_id != session_id);
        Ok((before - records.len()) as u64)
    }
}

// ---------------------------------------------------------------------------
// Context cache
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, UserContext>>,
    get_failure: Mutex<Option<RepositoryError>>,
    put_failure: Mutex<Option<RepositoryError>>,
}

impl MemoryCache {
    pub fn fail_gets(&self, error: RepositoryError) {
        *self.get_failure.lock().unwrap() = Some(error);
    }

    pub fn fail_puts(&self, error: RepositoryError) {
        *self.put_failure.lock().unwrap() = Some(error);
    }

    pub fn raw(&self, user_id: &str) -> Option<UserContext> {
        self.entries.lock().unwrap().get(user_id).cloned()
    }

    pub fn insert_raw(&self, entry: UserContext) {
        self.entries
            .lock()
            .unwrap()
            .insert(entry.user_id.clone(), entry);
    }
}

impl ContextCacheStore for MemoryCache {
    async fn get(&self, user_id: &str) -> Result<Option<UserContext>, RepositoryError> {
        if let Some(error) = self.get_failure.lock().unwrap().clone() {
            return Err(error);
        }
        Ok(self
            .entries
            .lock()
            .unwrap()
            .get(user_id)
            .filter(|e| e.is_valid_at(Utc::now()))
            .cloned())
    }

    async fn put(&self, entry: &UserContext) -> Result<(), RepositoryError> {
        if let Some(error) = self.put_failure.lock().unwrap().clone() {
            return Err(error);
        }
        self.insert_raw(entry.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Graph store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct StoredNode {
    pub id: String,
    pub user_id: String,
    pub element_type: ElementType,
    pub content: String,
}

#[derive(Default)]
pub struct MemoryGraph {
    nodes: Mutex<Vec<StoredNode>>,
    edges: Mutex<Vec<(String, String, String, DateTime<Utc>)>>,
    rejected_contents: Mutex<HashSet<String>>,
    edge_failure: Mutex<Option<RepositoryError>>,
    summary_failure: Mutex<Option<RepositoryError>>,
    summary_delay: Mutex<Option<std::time::Duration>>,
}

impl MemoryGraph {
    /// Node creation for this content fails with `InvalidInput`.
    pub fn reject_content(&self, content: &str) {
        self.rejected_contents
            .lock()
            .unwrap()
            .insert(content.to_string());
    }

    pub fn fail_edges(&self, error: RepositoryError) {
        *self.edge_failure.lock().unwrap() = Some(error);
    }

    pub fn fail_summaries(&self, error: RepositoryError) {
        *self.summary_failure.lock().unwrap() = Some(error);
    }

    /// Summaries succeed only after `delay`.
    pub fn delay_summaries(&self, delay: std::time::Duration) {
        *self.summary_delay.lock().unwrap() = Some(delay);
    }

    pub fn nodes(&self) -> Vec<StoredNode> {
        self.nodes.lock().unwrap().clone()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.lock().unwrap().len()
    }

    pub fn edge_types(&self) -> Vec<String> {
        self.edges
            .lock()
            .unwrap()
            .iter()
            .map(|(_, _, t, _)| t.clone())
            .collect()
    }
}

impl GraphStore for MemoryGraph {
    async fn create_node(
        &self,
        user_id: &str,
        element_type: ElementType,
        content: &str,
    ) -> Result<String, RepositoryError> {
        if self.rejected_contents.lock().unwrap().contains(content) {
            return Err(RepositoryError::InvalidInput(format!(
                "rejected content: {content}"
            )));
        }
        let mut nodes = self.nodes.lock().unwrap();
        let id = format!("node-{}", nodes.len() + 1);
        nodes.push(StoredNode {
            id: id.clone(),
            user_id: user_id.to_string(),
            element_type,
            content: content.to_string(),
        });
        Ok(id)
    }

    async fn create_edge(
        &self,
        user_id: &str,
        from_node: &str,
        edge_type: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        if let Some(error) = self.edge_failure.lock().unwrap().clone() {
            return Err(error);
        }
        self.edges.lock().unwrap().push((
            user_id.to_string(),
            from_node.to_string(),
            edge_type.to_string(),
            timestamp,
        ));
        Ok(())
    }

    async fn get_summary(&self, user_id: &str) -> Result<GraphSummary, RepositoryError> {
        let delay = *self.summary_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = self.summary_failure.lock().unwrap().clone() {
            return Err(error);
        }
        let nodes: Vec<StoredNode> = self
            .nodes
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();

        let mut fields = serde_json::Map::new();
        let themes: Vec<serde_json::Value> = nodes
            .iter()
            .rev()
            .take(3)
            .map(|n| serde_json::Value::String(n.content.clone()))
            .collect();
        fields.insert("recent_themes".into(), serde_json::Value::Array(themes));

        Ok(GraphSummary {
            user_id: user_id.to_string(),
            summary: format!("{} elements recorded", nodes.len()),
            last_updated: Utc::now(),
            fields,
        })
    }
}
