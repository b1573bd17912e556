//! Session-end command and result rendering.

use anyhow::{Result, bail};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use tokio_util::sync::CancellationToken;

use innerworld_core::repository::{ContextCacheStore, GraphStore, MessageStore};
use innerworld_core::resilience::{BreakerSnapshot, CircuitState};
use innerworld_types::element::ExtractionSource;
use innerworld_types::session::{EndReason, SessionEndRequest, SessionProcessingResult};

use crate::state::Services;

/// Process a finished session and print the outcome.
///
/// A hard failure (unreadable transcript, cancellation) makes the command
/// fail after the result is printed.
pub async fn end_session<M, C, G>(
    services: &Services<M, C, G>,
    session: &str,
    user: &str,
    reason: EndReason,
    json: bool,
    cancel: &CancellationToken,
) -> Result<()>
where
    M: MessageStore,
    C: ContextCacheStore,
    G: GraphStore,
{
    let request = SessionEndRequest {
        session_id: session.to_string(),
        user_id: user.to_string(),
        reason,
    };
    let result = services.processor.process(&request, cancel).await;
    render_result(&result, json)?;

    if !result.success {
        bail!(
            "session '{session}' was not processed: {}",
            result.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

pub fn render_result(result: &SessionProcessingResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }

    println!();
    if result.success {
        println!(
            "  {} Session {} processed",
            style("✓").green().bold(),
            style(&result.session_id).cyan()
        );
    } else {
        println!(
            "  {} Session {} failed: {}",
            style("✗").red().bold(),
            style(&result.session_id).cyan(),
            result.error.as_deref().unwrap_or("unknown error")
        );
        println!();
        return Ok(());
    }

    let source = match result.extraction_source {
        Some(ExtractionSource::Model) => "model",
        Some(ExtractionSource::Synthetic) => "synthetic",
        None => "none",
    };
    println!(
        "  Elements: {} ({})   Nodes: {}   Edges: {}",
        style(result.elements_extracted.len()).bold(),
        style(source).dim(),
        result.graph_nodes_created,
        result.graph_edges_created
    );

    if !result.elements_extracted.is_empty() {
        let mut table = Table::new();
        table.load_preset(presets::UTF8_FULL_CONDENSED);
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec![
            Cell::new("Type").fg(Color::White),
            Cell::new("Content").fg(Color::White),
            Cell::new("Confidence").fg(Color::White),
        ]);
        for element in &result.elements_extracted {
            table.add_row(vec![
                Cell::new(element.element_type).fg(Color::Cyan),
                Cell::new(&element.content),
                Cell::new(format!("{:.2}", element.confidence)),
            ]);
        }
        println!("{table}");
    }

    for warning in &result.warnings {
        println!("  {} {warning}", style("!").yellow().bold());
    }
    println!();
    Ok(())
}

/// Table of this process's circuit breakers.
pub fn print_breakers(snapshots: &[BreakerSnapshot]) {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Endpoint").fg(Color::White),
        Cell::new("State").fg(Color::White),
        Cell::new("Calls").fg(Color::White),
        Cell::new("Failures").fg(Color::White),
        Cell::new("Last error").fg(Color::White),
    ]);

    for snapshot in snapshots {
        let state_color = match snapshot.state {
            CircuitState::Closed => Color::Green,
            CircuitState::HalfOpen => Color::Yellow,
            CircuitState::Open => Color::Red,
        };
        table.add_row(vec![
            Cell::new(&snapshot.endpoint),
            Cell::new(snapshot.state).fg(state_color),
            Cell::new(snapshot.total_calls),
            Cell::new(snapshot.total_failures),
            Cell::new(snapshot.last_error.as_deref().unwrap_or("-")),
        ]);
    }

    println!("  {}", style("── Circuit breakers ──").dim());
    println!("{table}");
    println!();
}
