//! Graph summary derivation shared by the bundled graph stores.
//!
//! The summary is computed from the stored nodes alone: a count per element
//! type, the three most recent node contents as `recent_themes`, and the
//! timestamp of the newest node.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use innerworld_types::context::{ContextData, GraphSummary};
use innerworld_types::element::ElementType;

/// Number of node contents surfaced as recent themes.
pub const RECENT_THEME_COUNT: usize = 3;

/// The parts of a stored node the summary needs.
#[derive(Debug, Clone)]
pub struct NodeDigest {
    pub element_type: ElementType,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Derive a user's summary from their nodes, in any order.
///
/// Users with no nodes get an empty summary stamped `now`.
pub fn derive_summary(user_id: &str, mut nodes: Vec<NodeDigest>, now: DateTime<Utc>) -> GraphSummary {
    // Newest first; ties keep insertion order reversed.
    nodes.reverse();
    nodes.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let mut counts = Map::new();
    for ty in ElementType::ALL {
        let n = nodes.iter().filter(|n| n.element_type == ty).count();
        counts.insert(ty.as_str().to_string(), Value::from(n as u64));
    }

    let themes: Vec<Value> = nodes
        .iter()
        .take(RECENT_THEME_COUNT)
        .map(|n| Value::String(n.content.clone()))
        .collect();

    let mut fields = ContextData::new();
    fields.insert("recent_themes".into(), Value::Array(themes));
    fields.insert("element_counts".into(), Value::Object(counts));
    fields.insert("total_elements".into(), Value::from(nodes.len() as u64));

    let summary = match nodes.first() {
        None => "No elements recorded yet.".to_string(),
        Some(latest) => format!(
            "{} elements recorded; most recently: {}",
            nodes.len(),
            latest.content
        ),
    };

    GraphSummary {
        user_id: user_id.to_string(),
        summary,
        last_updated: nodes.first().map(|n| n.created_at).unwrap_or(now),
        fields,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn node(ty: ElementType, content: &str, at: DateTime<Utc>) -> NodeDigest {
        NodeDigest {
            element_type: ty,
            content: content.to_string(),
            created_at: at,
        }
    }

    #[test]
    fn test_empty_summary() {
        let now = Utc::now();
        let summary = derive_summary("u1", Vec::new(), now);
        assert_eq!(summary.user_id, "u1");
        assert_eq!(summary.last_updated, now);
        assert_eq!(summary.fields["total_elements"], 0);
        assert_eq!(summary.fields["recent_themes"], Value::Array(Vec::new()));
        assert_eq!(summary.fields["element_counts"]["Goal"], 0);
    }

    #[test]
    fn test_counts_and_recent_themes_newest_first() {
        let t0 = Utc::now();
        let nodes = vec![
            node(ElementType::Event, "exam", t0),
            node(ElementType::Feeling, "anxious", t0 + Duration::seconds(1)),
            node(ElementType::Goal, "study more", t0 + Duration::seconds(2)),
            node(ElementType::Feeling, "relieved", t0 + Duration::seconds(3)),
        ];

        let summary = derive_summary("u1", nodes, Utc::now());
        assert_eq!(summary.fields["total_elements"], 4);
        assert_eq!(summary.fields["element_counts"]["Feeling"], 2);
        assert_eq!(summary.fields["element_counts"]["Habit"], 0);
        assert_eq!(
            summary.fields["recent_themes"],
            serde_json::json!(["relieved", "study more", "anxious"])
        );
        assert_eq!(summary.last_updated, t0 + Duration::seconds(3));
        assert!(summary.summary.contains("relieved"));
    }

    #[test]
    fn test_same_timestamp_prefers_later_insert() {
        let t0 = Utc::now();
        let nodes = vec![
            node(ElementType::Event, "first", t0),
            node(ElementType::Event, "second", t0),
        ];
        let summary = derive_summary("u1", nodes, t0);
        assert_eq!(summary.fields["recent_themes"][0], "second");
    }
}
