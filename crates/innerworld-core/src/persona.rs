//! Persona catalog and system-prompt assembly.

use std::collections::{BTreeMap, HashMap};

use innerworld_types::context::{ContextData, UserContext};
use innerworld_types::persona::PersonaTemplate;

/// Key of the persona used when a requested one is unknown.
pub const DEFAULT_PERSONA: &str = "default";

const DEFAULT_SYSTEM_PROMPT: &str = "You are a supportive AI companion for teenagers. \
You listen carefully, respond with warmth and empathy, and help the user reflect on \
their experiences. Keep responses short, conversational, and age-appropriate.";

/// Named persona templates with a guaranteed default entry.
#[derive(Debug, Clone)]
pub struct PersonaCatalog {
    personas: HashMap<String, PersonaTemplate>,
}

impl PersonaCatalog {
    /// Built-in templates only.
    pub fn builtin() -> Self {
        let mut personas = HashMap::new();
        personas.insert(DEFAULT_PERSONA.to_string(), default_template());
        Self { personas }
    }

    /// Built-in templates overridden (or extended) by configured ones.
    pub fn with_overrides(overrides: &BTreeMap<String, PersonaTemplate>) -> Self {
        let mut catalog = Self::builtin();
        for (key, template) in overrides {
            catalog
                .personas
                .insert(key.trim().to_lowercase(), template.clone());
        }
        catalog
    }

    /// Look up a persona by key, falling back to the default.
    pub fn resolve(&self, persona: &str) -> &PersonaTemplate {
        self.personas
            .get(&persona.trim().to_lowercase())
            .or_else(|| self.personas.get(DEFAULT_PERSONA))
            .unwrap_or_else(|| &*FALLBACK)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.personas.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Full system prompt: persona prompt, optional user context, then boundaries.
    pub fn system_prompt(&self, persona: &str, context: Option<&UserContext>) -> String {
        let template = self.resolve(persona);
        let mut prompt = template.system_prompt.clone();

        if !template.tone.is_empty() {
            prompt.push_str(&format!("\n\nTone: {}.", template.tone));
        }

        if let Some(ctx) = context {
            prompt.push_str("\n\n");
            prompt.push_str(&context_section(&ctx.context_data));
        }

        if !template.boundaries.is_empty() {
            prompt.push_str("\n\nBoundaries:");
            for boundary in &template.boundaries {
                prompt.push_str("\n- ");
                prompt.push_str(boundary);
            }
        }
        prompt
    }
}

static FALLBACK: std::sync::LazyLock<PersonaTemplate> = std::sync::LazyLock::new(default_template);

fn default_template() -> PersonaTemplate {
    PersonaTemplate {
        name: "Supportive Companion".to_string(),
        system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        boundaries: vec![
            "Never give medical, legal, or diagnostic advice".to_string(),
            "Encourage talking to a trusted adult about serious problems".to_string(),
            "Never ask for personal identifying information".to_string(),
        ],
        tone: "warm and encouraging".to_string(),
    }
}

/// Render cached context as a prompt section.
fn context_section(data: &ContextData) -> String {
    let themes: Vec<&str> = data
        .get("recent_themes")
        .and_then(|v| v.as_array())
        .map(|items| items.iter().filter_map(|t| t.as_str()).take(3).collect())
        .unwrap_or_default();

    let themes = if themes.is_empty() {
        "various personal topics".to_string()
    } else {
        themes.join(", ")
    };

    let mut section = format!(
        "User Context: The user has previously talked about themes around {themes}. \
Use this to make the conversation feel continuous, without reciting it back."
    );
    if let Some(summary) = data.get("summary").and_then(|v| v.as_str())
        && !summary.is_empty()
    {
        section.push_str(&format!("\nBackground: {summary}"));
    }
    section
}
