//! CLI command definitions and dispatch for the `innerworld` binary.
//!
//! Uses clap derive macros for argument parsing. Every command except
//! `completions` runs against the lifecycle services in [`AppState`].

pub mod context;
pub mod conversation;
pub mod health;
pub mod input;
pub mod session;
pub mod status;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use tokio_util::sync::CancellationToken;

use innerworld_core::persona::DEFAULT_PERSONA;
use innerworld_core::repository::{ContextCacheStore, GraphStore, MessageStore};
use innerworld_types::conversation::ConversationInput;
use innerworld_types::session::EndReason;

use crate::state::{AppState, Services};

/// Drive the InnerWorld conversation lifecycle from the terminal.
#[derive(Parser)]
#[command(name = "innerworld", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Export spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    /// Keep all state in memory for this process only.
    #[arg(long, global = true)]
    pub ephemeral: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Populate the user's context cache from the graph (run at login).
    Login {
        /// User identifier.
        user: String,
    },

    /// Show the user's cached context.
    Context {
        /// User identifier.
        user: String,
    },

    /// Send one message through the conversation pipeline.
    Send {
        #[arg(long)]
        session: String,

        #[arg(long)]
        user: String,

        #[arg(long, default_value = DEFAULT_PERSONA)]
        persona: String,

        /// Session start time (RFC 3339). Defaults to now.
        #[arg(long)]
        started: Option<DateTime<Utc>>,

        /// The user's message.
        message: String,
    },

    /// Interactive session: one message per line, the session ends on EOF.
    Chat {
        #[arg(long)]
        user: String,

        #[arg(long, default_value = DEFAULT_PERSONA)]
        persona: String,

        /// Reuse a session id instead of generating one.
        #[arg(long)]
        session: Option<String>,
    },

    /// Run session-end processing for a finished session.
    #[command(name = "end-session")]
    EndSession {
        #[arg(long)]
        session: String,

        #[arg(long)]
        user: String,

        /// timeout, manual or disconnect.
        #[arg(long, default_value = "manual")]
        reason: EndReason,
    },

    /// List the available personas.
    Personas,

    /// Show the data directory, backend and effective policies.
    Status,

    /// Probe each store; exits non-zero when the system is unhealthy.
    Health,

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

/// Run one command against a concrete set of services.
pub async fn run<M, C, G>(
    state: &AppState,
    services: &Services<M, C, G>,
    command: Commands,
    json: bool,
    cancel: &CancellationToken,
) -> anyhow::Result<()>
where
    M: MessageStore,
    C: ContextCacheStore,
    G: GraphStore,
{
    match command {
        Commands::Login { user } => context::login(services, &user, json, cancel).await,
        Commands::Context { user } => context::show_context(services, &user, json, cancel).await,
        Commands::Send {
            session,
            user,
            persona,
            started,
            message,
        } => {
            let input = ConversationInput {
                session_id: session,
                user_id: user,
                persona,
                message,
                session_start: started.unwrap_or_else(Utc::now),
            };
            conversation::send(services, &input, json, cancel).await
        }
        Commands::Chat {
            user,
            persona,
            session,
        } => conversation::chat(state, services, &user, &persona, session, json, cancel).await,
        Commands::EndSession {
            session,
            user,
            reason,
        } => session::end_session(services, &session, &user, reason, json, cancel).await,
        Commands::Personas => context::list_personas(services, json),
        Commands::Status => status::status(state, json),
        Commands::Health => health::health(services, json, cancel).await,
        Commands::Completions { .. } => unreachable!("handled before state init"),
    }
}
