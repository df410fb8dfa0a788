use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use socialos_agents::{AgentRuntime, TurnOutcome, TurnRequest};
use socialos_common::{Error, Message, SessionId};
use socialos_config::{AppConfig, ConfigLoader};
use socialos_gateway::GatewayServer;
use socialos_gateway::bootstrap::build_runtime;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "socialos")]
#[command(about = "Social OS - a personalized AI agent for social media")]
#[command(version)]
struct Cli {
    /// Path to config.yml (defaults to ~/.socialos/config.yml)
    #[arg(long, short = 'c', global = true, env = "SOCIALOS_CONFIG")]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP gateway
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long, short = 'p')]
        port: Option<u16>,
    },
    /// Talk to the agent; reads stdin line by line when no message is given
    Chat {
        /// Conversation to continue (a new one is started when omitted)
        #[arg(long, short = 's')]
        session: Option<String>,
        #[arg(long)]
        name: Option<String>,
        /// Writing style the agent should match
        #[arg(long)]
        style: Option<String>,
        message: Option<String>,
    },
    /// Show a session's history, or list sessions when none is given
    History { session: Option<String> },
    /// Print the locally executed tools and their schemas
    Tools,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = match cli.command {
        Commands::Serve { .. } => "info",
        _ => "warn",
    };
    init_tracing(cli.log_json, default_level);

    let mut config = ConfigLoader::load(cli.config.as_deref()).context("failed to load config")?;

    match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.gateway.host = host;
            }
            if let Some(port) = port {
                config.gateway.port = port;
            }
            GatewayServer::new(config).run().await?;
        }
        Commands::Chat {
            session,
            name,
            style,
            message,
        } => {
            let runtime = runtime(&config)?;
            let session_id = session.map(SessionId::from).unwrap_or_default();
            let profile = Profile { name, style };
            match message {
                Some(message) => {
                    let outcome = turn(&runtime, &session_id, &profile, message).await?;
                    print_outcome(&outcome);
                }
                None => repl(&runtime, &session_id, &profile).await?,
            }
        }
        Commands::History { session } => {
            let runtime = runtime(&config)?;
            match session {
                Some(id) => print_history(&runtime, &SessionId::from(id)).await?,
                None => {
                    for summary in runtime.list_sessions().await? {
                        println!(
                            "{}  {:>4} messages  updated {}",
                            summary.session_id,
                            summary.message_count,
                            summary.updated_at.to_rfc3339()
                        );
                    }
                }
            }
        }
        Commands::Tools => {
            let runtime = runtime(&config)?;
            let definitions = runtime.tool_definitions();
            println!("{}", serde_json::to_string_pretty(&definitions)?);
        }
    }

    Ok(())
}

fn init_tracing(json: bool, default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn runtime(config: &AppConfig) -> Result<AgentRuntime> {
    build_runtime(config).context("failed to start agent runtime")
}

struct Profile {
    name: Option<String>,
    style: Option<String>,
}

async fn turn(
    runtime: &AgentRuntime,
    session_id: &SessionId,
    profile: &Profile,
    message: String,
) -> Result<TurnOutcome> {
    let mut request = TurnRequest::new(session_id.clone(), message);
    request.user_name = profile.name.clone();
    request.user_style = profile.style.clone();

    let cancel = CancellationToken::new();
    let watcher = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        }
    });
    let result = runtime.run_turn_cancellable(request, cancel).await;
    watcher.abort();

    Ok(result?)
}

async fn repl(runtime: &AgentRuntime, session_id: &SessionId, profile: &Profile) -> Result<()> {
    info!("chatting in session {session_id}");
    eprintln!("session {session_id} (Ctrl-D to quit)");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match turn(runtime, session_id, profile, line.to_string()).await {
            Ok(outcome) => print_outcome(&outcome),
            Err(err) => match err.downcast_ref::<Error>() {
                Some(Error::Cancelled) => eprintln!("(cancelled; nothing was saved)"),
                _ => {
                    warn!("turn failed: {err:#}");
                    eprintln!("error: {err:#}");
                }
            },
        }
    }
    Ok(())
}

fn print_outcome(outcome: &TurnOutcome) {
    for message in &outcome.new_messages {
        if let Message::ToolResult { name, is_error, .. } = message {
            let status = if *is_error { "failed" } else { "ok" };
            eprintln!("  [{name}: {status}]");
        }
    }
    if !outcome.reply.is_empty() {
        println!("{}", outcome.reply);
    }
}

async fn print_history(runtime: &AgentRuntime, session_id: &SessionId) -> Result<()> {
    let Some(state) = runtime.load_session(session_id).await? else {
        anyhow::bail!("session '{session_id}' not found");
    };

    if let Some(name) = &state.user_name {
        println!("user: {name}");
    }
    for message in &state.messages {
        match message {
            Message::Assistant { content, tool_calls } => {
                if !content.is_empty() {
                    println!("assistant: {content}");
                }
                for call in tool_calls {
                    println!("assistant -> {}({})", call.name, call.arguments);
                }
            }
            Message::ToolResult {
                name,
                content,
                is_error,
                ..
            } => {
                let marker = if *is_error { " (error)" } else { "" };
                println!("{name}{marker}: {content}");
            }
            other => println!("{}: {}", other.role(), other.text()),
        }
    }
    Ok(())
}
