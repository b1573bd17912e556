//! Configuration and backend overview.

use anyhow::Result;
use console::style;

use crate::state::{AppState, Backend};

/// Show where state lives and the effective lifecycle policies.
pub fn status(state: &AppState, json: bool) -> Result<()> {
    let backend = match state.backend {
        Backend::Sqlite(_) => "sqlite",
        Backend::Memory(_) => "memory",
    };
    let config = &state.config;

    if json {
        let status = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "data_dir": state.data_dir.display().to_string(),
            "backend": backend,
            "generator": state.generator_name,
            "config": config,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!();
    println!("  {} InnerWorld v{}", style("●").green(), env!("CARGO_PKG_VERSION"));
    println!();

    println!("  {}", style("── Storage ──").dim());
    println!("  Data dir:  {}", style(state.data_dir.display()).dim());
    println!("  Backend:   {}", style(backend).bold());
    println!("  Context TTL:    {}s", config.cache.ttl_secs);
    println!("  Transcript TTL: {}s", config.messages.ttl_secs);
    println!();

    println!("  {}", style("── Generation ──").dim());
    println!("  Service:   {}", style(&state.generator_name).cyan());
    println!("  Base URL:  {}", config.provider.base_url);
    println!("  Model:     {}", config.provider.model);
    println!();

    println!("  {}", style("── Resilience ──").dim());
    for (name, policy) in [
        ("cache_store", &config.retry.cache_store),
        ("durable_store", &config.retry.durable_store),
        ("graph_store", &config.retry.graph_store),
        ("generation", &config.retry.generation),
    ] {
        println!(
            "  {:<14} {} attempts, {}ms → {}ms (×{})",
            name,
            policy.max_attempts,
            policy.initial_delay_ms,
            policy.max_delay_ms,
            policy.backoff_multiplier
        );
    }
    println!(
        "  Breaker:       opens after {} failures, half-opens after {}s",
        config.breaker.max_failures, config.breaker.reset_timeout_secs
    );
    println!();
    Ok(())
}
