//! Conversation element extraction via the generation service.
//!
//! `ElementExtractor` asks the model for a JSON array of typed elements
//! (Event, Feeling, Value, Goal, Habit). When generation fails or nothing
//! usable comes back, a deterministic synthetic set derived from message count
//! and persona is used instead, so a session always yields elements.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use innerworld_types::config::ExtractionConfig;
use innerworld_types::context::ContextData;
use innerworld_types::conversation::ConversationMessage;
use innerworld_types::element::{ConversationElement, ElementType, ExtractionSource};
use innerworld_types::error::ResilienceError;
use innerworld_types::llm::{CompletionRequest, Message};

use super::SessionError;
use crate::llm::BoxGenerationService;
use crate::resilience::{Collaborator, Resilience, classify};

pub const EXTRACTION_SYSTEM_PROMPT: &str = r#"You analyse a conversation between a teenager and an AI companion and extract the elements worth remembering about the teenager.

Element types:
- Event: something that happened to the user
- Feeling: an emotion the user expressed
- Value: something the user cares about
- Goal: something the user wants to achieve
- Habit: a recurring behaviour of the user

Extract the 3-8 most meaningful elements. Return ONLY a JSON array. Each element must have exactly these fields:
- "type": one of "Event", "Feeling", "Value", "Goal", "Habit"
- "content": string (one short sentence)
- "confidence": number between 0.0 and 1.0

Example output:
[
  {"type": "Event", "content": "Had a math exam this morning", "confidence": 0.9},
  {"type": "Feeling", "content": "Anxious about exam results", "confidence": 0.8}
]"#;

const DEFAULT_CONFIDENCE: f64 = 0.5;

/// Elements produced for one session, and where they came from.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub elements: Vec<ConversationElement>,
    pub source: ExtractionSource,
}

/// Raw element as returned by the model, before validation.
#[derive(Debug, Deserialize)]
struct RawElement {
    #[serde(rename = "type", default)]
    element_type: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
}

/// Stateless element extraction helpers.
pub struct ElementExtractor;

impl ElementExtractor {
    /// Extract elements, falling back to the synthetic set.
    ///
    /// The only error is cancellation.
    #[tracing::instrument(
        name = "extract_elements",
        skip_all,
        fields(message_count = messages.len())
    )]
    pub async fn extract(
        generator: &BoxGenerationService,
        resilience: &Resilience,
        messages: &[ConversationMessage],
        config: &ExtractionConfig,
        model: &str,
        cancel: &CancellationToken,
    ) -> Result<Extraction, SessionError> {
        let now = Utc::now();
        let transcript = Self::build_transcript(messages, config.transcript_char_budget);
        let request = Self::build_request(&transcript, config, model);
        let request = &request;

        let result = resilience
            .call(
                Collaborator::Generation,
                cancel,
                classify::generation,
                move |_| generator.complete(request),
            )
            .await;

        let elements = match result {
            Ok(response) => Self::parse_elements(&response.content, now),
            Err(ResilienceError::Cancelled) => return Err(SessionError::Cancelled),
            Err(e) => {
                tracing::warn!(error = %e, "element extraction failed, using synthetic elements");
                Vec::new()
            }
        };

        if elements.is_empty() {
            tracing::info!("no elements parsed from model output, using synthetic elements");
            return Ok(Extraction {
                elements: Self::synthetic_elements(messages, now),
                source: ExtractionSource::Synthetic,
            });
        }

        Ok(Extraction {
            elements,
            source: ExtractionSource::Model,
        })
    }

    /// Render messages as `"{type}: {content}"` lines, cut to `budget` characters.
    ///
    /// The earliest content is kept; a cut transcript ends in `...`.
    pub fn build_transcript(messages: &[ConversationMessage], budget: usize) -> String {
        let mut transcript = String::new();
        for message in messages {
            transcript.push_str(&format!("{}: {}\n", message.message_type, message.content));
        }

        if transcript.chars().count() > budget {
            let mut cut: String = transcript.chars().take(budget).collect();
            cut.push_str("...");
            return cut;
        }
        transcript
    }

    pub fn build_request(
        transcript: &str,
        config: &ExtractionConfig,
        model: &str,
    ) -> CompletionRequest {
        CompletionRequest {
            model: model.to_string(),
            messages: vec![Message::user(format!("Conversation:\n{transcript}"))],
            system: Some(EXTRACTION_SYSTEM_PROMPT.to_string()),
            max_tokens: config.max_tokens,
            temperature: Some(0.0),
        }
    }

    /// Parse the first `[` .. last `]` span of `raw` as an element array.
    ///
    /// Entries with an unknown type or empty content are skipped; confidence is
    /// clamped to 0.0..=1.0.
    pub fn parse_elements(raw: &str, now: DateTime<Utc>) -> Vec<ConversationElement> {
        let (Some(start), Some(end)) = (raw.find('['), raw.rfind(']')) else {
            tracing::warn!(
                content_preview = %preview(raw),
                "no JSON array in extraction output"
            );
            return Vec::new();
        };
        if end < start {
            return Vec::new();
        }

        let values: Vec<Value> = match serde_json::from_str(&raw[start..=end]) {
            Ok(values) => values,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    content_preview = %preview(raw),
                    "failed to parse extraction JSON"
                );
                return Vec::new();
            }
        };

        values
            .into_iter()
            .filter_map(|value| {
                let raw: RawElement = serde_json::from_value(value).ok()?;
                let type_name = raw.element_type?;
                let element_type = match type_name.parse::<ElementType>() {
                    Ok(t) => t,
                    Err(_) => {
                        tracing::warn!(element_type = %type_name, "unknown element type; skipping");
                        return None;
                    }
                };
                let content = raw.content?.trim().to_string();
                if content.is_empty() {
                    return None;
                }
                let confidence = raw
                    .confidence
                    .filter(|c| c.is_finite())
                    .unwrap_or(DEFAULT_CONFIDENCE)
                    .clamp(0.0, 1.0);

                Some(ConversationElement {
                    element_type,
                    content,
                    confidence,
                    timestamp: now,
                    metadata: ContextData::new(),
                })
            })
            .collect()
    }

    /// Deterministic elements derived from message count and persona.
    pub fn synthetic_elements(
        messages: &[ConversationMessage],
        now: DateTime<Utc>,
    ) -> Vec<ConversationElement> {
        let mut elements = vec![
            element(
                ElementType::Event,
                "user engaged in conversation",
                0.9,
                now,
                json!({ "message_count": messages.len() }),
            ),
            element(
                ElementType::Feeling,
                "seeking connection and support",
                0.7,
                now,
                json!({ "session_type": "conversational" }),
            ),
        ];

        let persona = messages
            .first()
            .map(|m| m.persona.trim().to_lowercase())
            .unwrap_or_default();
        match persona.as_str() {
            "courage" => elements.push(element(
                ElementType::Goal,
                "building confidence and courage",
                0.8,
                now,
                json!({ "persona": persona }),
            )),
            "comfort" => elements.push(element(
                ElementType::Feeling,
                "needing emotional support",
                0.8,
                now,
                json!({ "persona": persona }),
            )),
            _ => {}
        }
        elements
    }
}

fn element(
    element_type: ElementType,
    content: &str,
    confidence: f64,
    timestamp: DateTime<Utc>,
    metadata: Value,
) -> ConversationElement {
    ConversationElement {
        element_type,
        content: content.to_string(),
        confidence,
        timestamp,
        metadata: match metadata {
            Value::Object(map) => map,
            _ => ContextData::new(),
        },
    }
}

fn preview(raw: &str) -> String {
    raw.chars().take(200).collect()
}
