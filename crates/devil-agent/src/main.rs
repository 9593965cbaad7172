use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use devil_agent::repl::{ReplCommand, BANNER};
use devil_agent::{AgentConfig, DevilAgent, OutputEvent};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::StreamExt;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "devil-agent", about = "Devil's-advocate reviewer with web search")]
struct Cli {
    /// Model name (overrides OPENAI_MODEL).
    #[arg(long)]
    model: Option<String>,

    /// OpenAI-compatible base URL (overrides OPENAI_BASE_URL).
    #[arg(long)]
    base_url: Option<String>,

    /// Skills directory (overrides DEVIL_SKILLS_DIR).
    #[arg(long)]
    skills_dir: Option<PathBuf>,

    /// Start in normal assistant mode instead of devil mode.
    #[arg(long)]
    normal: bool,

    /// Start with web search disabled.
    #[arg(long)]
    offline: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = AgentConfig::from_env().context("Failed to load configuration")?;
    if let Some(model) = cli.model {
        config.model = model;
    }
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url;
    }
    if let Some(dir) = cli.skills_dir {
        config.skills_dir = dir;
    }
    config.devil_mode = !cli.normal;
    config.web_search = !cli.offline;

    info!(
        model = %config.model,
        base_url = %config.base_url,
        skills_dir = %config.skills_dir.display(),
        "Devil agent starting"
    );
    let agent = DevilAgent::from_config(&config)?;

    println!("{BANNER}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("You: ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };

        match ReplCommand::parse(&line) {
            ReplCommand::Empty => continue,
            ReplCommand::Quit => break,
            ReplCommand::ToggleDevil => {
                let devil = !agent.status().await.devil_mode;
                let status = agent.set_mode(devil).await;
                println!("-> {}\n", if status.devil_mode { "Devil" } else { "Normal" });
            }
            ReplCommand::ToggleSearch => {
                let enabled = !agent.status().await.search_enabled;
                let status = agent.set_search(enabled).await;
                println!(
                    "-> Web search: {}\n",
                    if status.search_enabled { "ON" } else { "OFF" }
                );
            }
            ReplCommand::Clear => {
                agent.clear().await;
                println!("-> Cleared\n");
            }
            ReplCommand::Status => {
                let status = agent.status().await;
                println!("{}\n", serde_json::to_string_pretty(&status)?);
            }
            ReplCommand::Chat(text) => {
                print!("AI: ");
                std::io::stdout().flush()?;
                let mut events = agent.chat(text);
                while let Some(event) = events.next().await {
                    match event {
                        OutputEvent::Progress(stage) => eprintln!("\x1b[2m{stage}\x1b[0m"),
                        other => {
                            print!("{}", other.to_wire());
                            std::io::stdout().flush()?;
                        }
                    }
                }
                println!("\n");
            }
        }
    }

    Ok(())
}
