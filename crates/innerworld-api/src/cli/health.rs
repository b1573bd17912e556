//! Collaborator health check.

use anyhow::{Result, bail};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use tokio_util::sync::CancellationToken;

use innerworld_core::repository::{ContextCacheStore, GraphStore, MessageStore};
use innerworld_types::health::{HealthReport, HealthStatus};

use super::session::print_breakers;
use crate::state::Services;

/// Probe every store and print the report with the breaker states.
///
/// Degraded still exits zero; unhealthy fails the command.
pub async fn health<M, C, G>(
    services: &Services<M, C, G>,
    json: bool,
    cancel: &CancellationToken,
) -> Result<()>
where
    M: MessageStore,
    C: ContextCacheStore,
    G: GraphStore,
{
    let report = services.health.check(cancel).await;
    let breakers = services.resilience.snapshots();

    if json {
        let body = serde_json::json!({
            "report": report,
            "breakers": breakers,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        print_report(&report);
        print_breakers(&breakers);
    }

    if report.is_unhealthy() {
        bail!("system is unhealthy");
    }
    Ok(())
}

fn status_color(status: HealthStatus) -> Color {
    match status {
        HealthStatus::Healthy => Color::Green,
        HealthStatus::Degraded => Color::Yellow,
        HealthStatus::Unhealthy => Color::Red,
        HealthStatus::Skipped => Color::DarkGrey,
    }
}

fn print_report(report: &HealthReport) {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Service").fg(Color::White),
        Cell::new("Status").fg(Color::White),
        Cell::new("Response").fg(Color::White),
        Cell::new("Error").fg(Color::White),
    ]);

    for (name, service) in &report.services {
        let response = service
            .response_time_ms
            .map(|ms| format!("{ms}ms"))
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            Cell::new(name),
            Cell::new(service.status).fg(status_color(service.status)),
            Cell::new(response),
            Cell::new(service.error.as_deref().unwrap_or("-")),
        ]);
    }

    let marker = match report.status {
        HealthStatus::Healthy => style("●").green(),
        HealthStatus::Degraded => style("●").yellow(),
        _ => style("●").red(),
    };
    println!();
    println!("  {marker} {}", style(report.status).bold());
    println!();
    println!("{table}");
    println!();
}
