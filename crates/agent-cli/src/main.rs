mod approval;
mod commands;
mod config;
mod display;

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use agent_core::AgentEvent;
use agent_llm::OpenAIProvider;
use agent_loop::{Agent, TurnOutcome};
use agent_mcp::{McpServerConfig, RemoteToolTransport};
use agent_tools::{CurrentTimeTool, EchoTool, ToolRegistry};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tokio::sync::mpsc;

use crate::approval::StdinApprovalGate;
use crate::commands::{parse_slash_command, SlashCommand, HELP};
use crate::config::AppConfig;
use crate::display::{drain_events, print_event};

#[derive(Parser)]
#[command(name = "agent-cli")]
#[command(about = "Chat with an agent that can call local and remote tools")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ~/.config/agent-cli/config.yaml)
    #[arg(long, short, env = "AGENT_CLI_CONFIG")]
    config: Option<PathBuf>,

    /// Model key to start with
    #[arg(long, short, env = "AGENT_CLI_MODEL")]
    model: Option<String>,

    /// Enable debug mode
    #[arg(long, short, env = "AGENT_CLI_DEBUG")]
    debug: bool,

    /// Log level (overrides debug flag)
    #[arg(long, env = "RUST_LOG")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start interactive chat (default)
    Chat,
    /// Send a single message
    Send {
        /// Message content
        message: String,
    },
    /// List available tools
    Tools,
}

/// A ready agent plus what has to be shut down with it.
struct Session {
    agent: Agent,
    events: mpsc::UnboundedReceiver<AgentEvent>,
    remote: Option<RemoteToolTransport>,
}

impl Session {
    async fn close(self) {
        if let Some(remote) = self.remote {
            remote.disconnect().await;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.log_level.is_some() {
        // If RUST_LOG is set, use it
        env_logger::init();
    } else {
        init_logging(cli.debug);
    }

    let config = AppConfig::load(cli.config.as_deref())?;
    let mut session = start_session(config, cli.model.as_deref()).await?;

    let result = match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => run_interactive_chat(&mut session).await,
        Commands::Send { message } => send_message(&mut session, &message).await,
        Commands::Tools => {
            print_tools(&session.agent);
            Ok(())
        }
    };

    session.close().await;
    result
}

fn init_logging(debug: bool) {
    let filter = if debug { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {} [{}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}

async fn start_session(config: AppConfig, model: Option<&str>) -> anyhow::Result<Session> {
    let registry = ToolRegistry::new();
    registry.register_local(CurrentTimeTool::new())?;
    registry.register_local(EchoTool::new())?;

    let remote = match config.remote_server {
        Some(server) => connect_remote(&registry, server).await,
        None => None,
    };

    let (tx, events) = mpsc::unbounded_channel();
    let mut agent = Agent::new(
        Arc::new(OpenAIProvider::new()),
        Arc::new(registry),
        config.models,
        config.agent,
    )
    .with_approval_gate(Arc::new(StdinApprovalGate))
    .with_events(tx);

    if let Some(key) = model.or(config.default_model.as_deref()) {
        agent.set_model(key)?;
    }

    log::info!(
        "[{}] Agent ready with model '{}' and {} tools",
        agent.id(),
        agent.selected_model(),
        agent.registry().len()
    );

    Ok(Session {
        agent,
        events,
        remote,
    })
}

/// Connect and register the remote tools. A server that cannot be reached
/// leaves the shell running with local tools only.
async fn connect_remote(
    registry: &ToolRegistry,
    server: McpServerConfig,
) -> Option<RemoteToolTransport> {
    let url = server.url.clone();
    let transport = RemoteToolTransport::new(server);

    if let Err(e) = transport.connect().await {
        log::warn!(
            "Remote tool server {} unavailable, continuing with local tools: {}",
            url,
            e
        );
        return None;
    }

    match registry.register_remote(transport.cached_tools(), Arc::new(transport.clone())) {
        Ok(count) => {
            log::info!("Registered {} tools from {}", count, url);
            Some(transport)
        }
        Err(e) => {
            log::warn!("Skipping remote tools from {}: {}", url, e);
            transport.disconnect().await;
            None
        }
    }
}

/// Run one turn while printing its events in order.
async fn run_turn(session: &mut Session, text: &str) -> anyhow::Result<TurnOutcome> {
    let Session { agent, events, .. } = session;
    let turn = agent.process_message(text);
    tokio::pin!(turn);

    let outcome = loop {
        tokio::select! {
            biased;
            Some(event) = events.recv() => print_event(&event),
            outcome = &mut turn => break outcome,
        }
    };
    drain_events(events);

    Ok(outcome?)
}

async fn send_message(session: &mut Session, message: &str) -> anyhow::Result<()> {
    let outcome = run_turn(session, message).await?;
    if let Some(response) = outcome.response {
        println!("{}", response);
    }
    Ok(())
}

async fn run_interactive_chat(session: &mut Session) -> anyhow::Result<()> {
    println!("{}", "🤖 Agent Interactive Chat".cyan().bold());
    println!(
        "{}",
        format!("Model: {}", session.agent.selected_model()).dimmed()
    );
    println!("{}", "Type /help for commands, /quit to leave".dimmed());
    println!();

    loop {
        print!("{} ", "You:".cyan().bold());
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();

        if input.is_empty() {
            continue;
        }

        if let Some(command) = parse_slash_command(input) {
            if !handle_command(&mut session.agent, command) {
                break;
            }
            continue;
        }

        match run_turn(session, input).await {
            Ok(outcome) => {
                if let Some(response) = outcome.response {
                    println!("{}", "Assistant:".green().bold());
                    println!("{}", response);
                }
            }
            Err(e) => {
                log::debug!("Turn failed: {:?}", e);
                println!("{}", format!("❌ Error: {}", e).red());
            }
        }

        println!();
    }

    println!("{}", "👋 Goodbye!".cyan());
    Ok(())
}

/// Returns false when the shell should exit.
fn handle_command(agent: &mut Agent, command: SlashCommand) -> bool {
    match command {
        SlashCommand::Model(key) => match agent.set_model(&key) {
            Ok(()) => println!("{}", format!("Model set to {}", key).green()),
            Err(e) => println!("{}", format!("❌ {}", e).red()),
        },
        SlashCommand::Models => {
            for model in agent.models() {
                let marker = if model.key == agent.selected_model() {
                    "*"
                } else {
                    " "
                };
                println!("{} {} ({})", marker, model.key.bold(), model.model.dimmed());
            }
        }
        SlashCommand::System(prompt) => {
            agent.set_system_prompt(prompt);
            println!("{}", "System prompt updated".green());
        }
        SlashCommand::Clear => {
            agent.clear_history();
            println!("{}", "Conversation cleared".green());
        }
        SlashCommand::Tools => print_tools(agent),
        SlashCommand::Help => println!("{}", HELP),
        SlashCommand::Quit => return false,
        SlashCommand::Unknown(name) => {
            println!("{}", format!("Unknown command /{}, try /help", name).yellow());
        }
    }
    true
}

fn print_tools(agent: &Agent) {
    let registry = agent.registry();
    for schema in registry.tools_for_llm() {
        let name = schema.function.name;
        let origin = registry
            .origin(&name)
            .map(|origin| origin.to_string())
            .unwrap_or_default();
        println!(
            "{} [{}] {}",
            name.bold(),
            origin,
            schema.function.description.dimmed()
        );
    }
}
