use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use roundtable::{
    AgentDirectory, MessageKind, RoundtableConfig, SessionUpdate, spawn_session,
};

#[derive(Parser)]
#[command(name = "roundtable", version, about = "Chat with several AI agents at once")]
struct Cli {
    /// Backend base URL (overrides the config file)
    #[arg(long)]
    server: Option<String>,

    /// Bearer token (overrides the config file and ROUNDTABLE_TOKEN)
    #[arg(long)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the agents available for conversation
    Agents,
    /// Start an interactive conversation.
    ///
    /// Agent replies stream in over the session; this line-oriented front
    /// end prints each reply once finalized so concurrent agents never tear
    /// each other's output. Status lines show progress in the meantime.
    Chat {
        /// Comma-separated agent uids. Defaults to every enabled agent.
        #[arg(long, value_delimiter = ',')]
        agents: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = RoundtableConfig::load()?;
    if let Some(server) = cli.server {
        config.server_url = server;
    }
    if let Some(token) = cli.token {
        config.token = token;
    }

    match cli.command {
        Commands::Agents => list_agents(config).await,
        Commands::Chat { agents } => chat(config, agents).await,
    }
}

async fn list_agents(config: RoundtableConfig) -> Result<()> {
    let directory = AgentDirectory::new(&config);
    let agents = directory
        .enabled_agents()
        .await
        .context("Failed to fetch the agent directory")?;
    if agents.is_empty() {
        println!("No agents are enabled.");
        return Ok(());
    }
    for agent in agents {
        let model = agent
            .config
            .as_ref()
            .map(|c| c.model_id.as_str())
            .unwrap_or("-");
        println!("{:<36} {:<20} {}", agent.agent_uid, agent.name, model);
    }
    Ok(())
}

async fn chat(config: RoundtableConfig, selected: Vec<String>) -> Result<()> {
    let directory = AgentDirectory::new(&config);
    let available = directory
        .enabled_agents()
        .await
        .context("Failed to fetch the agent directory")?;

    let roster: Vec<_> = if selected.is_empty() {
        available
    } else {
        let roster: Vec<_> = available
            .into_iter()
            .filter(|agent| selected.iter().any(|uid| uid == &agent.agent_uid))
            .collect();
        if roster.len() != selected.len() {
            bail!("Some requested agents are not enabled on the server");
        }
        roster
    };
    if roster.is_empty() {
        bail!("No agents to talk to");
    }

    let names: Vec<_> = roster.iter().map(|a| a.name.as_str()).collect();
    println!("Conversing with: {}", names.join(", "));
    println!("Type a message and press enter. /clear starts over, /quit exits.");

    let session = spawn_session(config);
    let mut updates = session.subscribe();
    session.connect().await.context("Failed to connect")?;
    session.select_agents(roster).await?;

    // Streaming partials are coalesced and printed once finalized; with
    // several agents interleaving on one stdout there is no line to own
    // until a message is terminal. Status and error entries print as they
    // arrive.
    let renderer = tokio::spawn(async move {
        while let Ok(update) = updates.recv().await {
            match update {
                SessionUpdate::Message(msg) if msg.kind != MessageKind::User => {
                    if msg.kind.is_terminal() {
                        println!("[{}] {}", msg.producer_name, msg.content);
                    }
                }
                SessionUpdate::MessageUpdated(msg) if msg.kind.is_terminal() => {
                    println!("[{}] {}", msg.producer_name, msg.content);
                }
                SessionUpdate::DispatchSettled => {
                    println!("--- all agents have answered ---");
                }
                SessionUpdate::Notice(text) => eprintln!("! {text}"),
                _ => {}
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim().to_string();
        match line.as_str() {
            "" => continue,
            "/quit" => break,
            "/clear" => {
                let conv_id = session.clear().await?;
                println!("Started a fresh conversation ({conv_id}).");
            }
            _ => {
                if let Err(err) = session.send_message(line).await {
                    eprintln!("! {err}");
                }
            }
        }
    }

    session.teardown().await?;
    renderer.abort();
    Ok(())
}
