//! Conversation commands: a single `send`, and the interactive `chat` loop.

use std::io::Write;

use anyhow::Result;
use chrono::Utc;
use console::style;
use tokio_util::sync::CancellationToken;

use innerworld_core::pipeline::PipelineError;
use innerworld_core::repository::{ContextCacheStore, GraphStore, MessageStore};
use innerworld_types::conversation::{ConversationInput, ConversationReply};
use innerworld_types::session::{EndReason, SessionEndRequest};

use super::input::{ChatInput, InputEvent};
use super::session::{print_breakers, render_result};
use crate::state::{AppState, Services};

/// Run one message through the pipeline and print the reply.
pub async fn send<M, C, G>(
    services: &Services<M, C, G>,
    input: &ConversationInput,
    json: bool,
    cancel: &CancellationToken,
) -> Result<()>
where
    M: MessageStore,
    C: ContextCacheStore,
    G: GraphStore,
{
    let reply = services.pipeline.process(input, cancel).await?;
    print_reply(&reply, json)?;
    Ok(())
}

fn print_reply(reply: &ConversationReply, json: bool) -> Result<()> {
    write_reply(&mut std::io::stdout(), reply, json)
}

fn write_reply(out: &mut dyn Write, reply: &ConversationReply, json: bool) -> Result<()> {
    if json {
        writeln!(out, "{}", serde_json::to_string(reply)?)?;
    } else {
        writeln!(out, "  {} {}", style("›").magenta().bold(), reply.content)?;
    }
    Ok(())
}

/// Interactive session over stdin.
///
/// Reads one message per line, with line editing when stdin is a terminal. EOF ends the session and runs session-end
/// processing; an interrupt leaves the transcript for a later `end-session`.
pub async fn chat<M, C, G>(
    state: &AppState,
    services: &Services<M, C, G>,
    user: &str,
    persona: &str,
    session: Option<String>,
    json: bool,
    cancel: &CancellationToken,
) -> Result<()>
where
    M: MessageStore,
    C: ContextCacheStore,
    G: GraphStore,
{
    let session_id = session.unwrap_or_else(|| format!("sess_{}", uuid::Uuid::now_v7().simple()));
    let session_start = Utc::now();

    if let Err(e) = services.context.populate(user, cancel).await {
        if e.is_cancelled() {
            return Ok(());
        }
        tracing::warn!(user_id = user, error = %e, "could not populate context, continuing without it");
    }

    if !json {
        let template = services.personas.resolve(persona);
        println!();
        println!(
            "  {} {} · session {} · {}",
            style("●").green(),
            style(&template.name).cyan().bold(),
            style(&session_id).dim(),
            style(&state.generator_name).dim()
        );
        println!(
            "  {}",
            style("One message per line. Ctrl-D ends the session.").dim()
        );
        println!();
    }

    let prompt = format!("  {} ", style("you ›").bold());
    let mut input = ChatInput::stdin(&prompt)
        .map_err(|e| anyhow::anyhow!("failed to initialize input: {e}"))?;
    let mut out = input.writer();
    let mut turns = 0usize;

    loop {
        if !json && !input.has_own_prompt() {
            print!("{prompt}");
            std::io::stdout().flush()?;
        }

        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => InputEvent::Interrupted,
            event = input.read_line() => event?,
        };

        let message = match event {
            InputEvent::Message(message) => message,
            InputEvent::Eof => break,
            InputEvent::Interrupted => {
                input.finish();
                interrupted(&session_id, user, json);
                return Ok(());
            }
        };
        if message.is_empty() {
            continue;
        }

        let turn = ConversationInput {
            session_id: session_id.clone(),
            user_id: user.to_string(),
            persona: persona.to_string(),
            message,
            session_start,
        };

        match services.pipeline.process(&turn, cancel).await {
            Ok(reply) => {
                turns += 1;
                write_reply(&mut out, &reply, json)?;
            }
            Err(PipelineError::InvalidInput(reason)) => {
                writeln!(out, "  {} {reason}", style("!").yellow().bold())?;
            }
            Err(PipelineError::Cancelled) => {
                input.finish();
                interrupted(&session_id, user, json);
                return Ok(());
            }
        }
    }
    drop(out);
    input.finish();

    if !json {
        println!();
        println!(
            "  {} Ending session after {} turn{}...",
            style("◼").dim(),
            turns,
            if turns == 1 { "" } else { "s" }
        );
    }

    let request = SessionEndRequest {
        session_id,
        user_id: user.to_string(),
        reason: EndReason::Manual,
    };
    let result = services.processor.process(&request, cancel).await;
    render_result(&result, json)?;

    let snapshots = services.resilience.snapshots();
    if !json && snapshots.iter().any(|s| s.total_failures > 0) {
        print_breakers(&snapshots);
    }
    Ok(())
}

fn interrupted(session_id: &str, user: &str, json: bool) {
    if json {
        return;
    }
    println!();
    println!(
        "  {} Interrupted. Process the session later with: {}",
        style("i").blue().bold(),
        style(format!(
            "innerworld end-session --session {session_id} --user {user} --reason disconnect"
        ))
        .yellow()
    );
}
