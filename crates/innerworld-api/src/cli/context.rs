//! Context cache commands: login-time population, inspection, personas.

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use innerworld_core::repository::{ContextCacheStore, GraphStore, MessageStore};
use innerworld_types::context::UserContext;

use crate::state::Services;

/// Populate the cache for `user` and print what was stored.
pub async fn login<M, C, G>(
    services: &Services<M, C, G>,
    user: &str,
    json: bool,
    cancel: &CancellationToken,
) -> Result<()>
where
    M: MessageStore,
    C: ContextCacheStore,
    G: GraphStore,
{
    let context = services.context.populate(user, cancel).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&context)?);
        return Ok(());
    }

    let source = context
        .context_data
        .get("context_source")
        .and_then(Value::as_str)
        .unwrap_or("unknown");

    println!();
    println!(
        "  {} Context ready for '{}' ({})",
        style("✓").green().bold(),
        style(user).cyan(),
        style(source).dim()
    );
    println!(
        "  Expires: {}",
        style(context.expires_at.format("%Y-%m-%d %H:%M:%S UTC")).dim()
    );
    println!();
    Ok(())
}

/// Print the cached context for `user`, or a hint when there is none.
pub async fn show_context<M, C, G>(
    services: &Services<M, C, G>,
    user: &str,
    json: bool,
    cancel: &CancellationToken,
) -> Result<()>
where
    M: MessageStore,
    C: ContextCacheStore,
    G: GraphStore,
{
    let context = services.context.get(user, cancel).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&context)?);
        return Ok(());
    }

    let Some(context) = context else {
        println!();
        println!(
            "  {} No cached context for '{}'. Populate it with: {}",
            style("i").blue().bold(),
            style(user).cyan(),
            style(format!("innerworld login {user}")).yellow()
        );
        println!();
        return Ok(());
    };

    println!();
    println!("{}", context_table(&context));
    println!(
        "  Updated {} · expires {}",
        context.last_updated.format("%Y-%m-%d %H:%M"),
        context.expires_at.format("%Y-%m-%d %H:%M")
    );
    println!();
    Ok(())
}

fn context_table(context: &UserContext) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Field").fg(Color::White),
        Cell::new("Value").fg(Color::White),
    ]);

    for (key, value) in &context.context_data {
        table.add_row(vec![Cell::new(key).fg(Color::Cyan), Cell::new(render_value(value))]);
    }
    table
}

/// Strings unquoted, arrays of strings comma-joined, everything else as JSON.
fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) if items.iter().all(Value::is_string) => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

/// List personas known to the catalog (built-in plus configured).
pub fn list_personas<M, C, G>(services: &Services<M, C, G>, json: bool) -> Result<()>
where
    M: MessageStore,
    C: ContextCacheStore,
    G: GraphStore,
{
    let personas = &services.personas;

    if json {
        let list: Vec<Value> = personas
            .names()
            .into_iter()
            .map(|key| {
                let template = personas.resolve(key);
                serde_json::json!({
                    "key": key,
                    "name": template.name,
                    "tone": template.tone,
                    "boundaries": template.boundaries,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&list)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Key").fg(Color::White),
        Cell::new("Name").fg(Color::White),
        Cell::new("Tone").fg(Color::White),
        Cell::new("Boundaries").fg(Color::White),
    ]);
    for key in personas.names() {
        let template = personas.resolve(key);
        table.add_row(vec![
            Cell::new(key).fg(Color::Cyan),
            Cell::new(&template.name),
            Cell::new(&template.tone),
            Cell::new(template.boundaries.len()),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    Ok(())
}
