//! typeahead: incremental search dispatcher.
//!
//! Usage:
//!   typeahead search <query> -c courses   # One-shot search
//!   typeahead interactive -c posts        # Each stdin line is the input field
//!   typeahead config                      # Print effective configuration
//!   typeahead --mcp                       # Start MCP server (feature `mcp`)

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, watch};
use tracing_subscriber::EnvFilter;
use typeahead::services::{Debouncer, Dispatcher, HttpBackend};
use typeahead::{fmt, tools, Category, Config, SearchKey};

#[derive(Parser)]
#[command(name = "typeahead")]
#[command(about = "Incremental search over courses, instructors, lessons and posts")]
#[command(version)]
struct Cli {
    /// Run as MCP server (stdin/stdout JSON-RPC)
    #[cfg(feature = "mcp")]
    #[arg(long)]
    mcp: bool,

    /// Config file (default: ~/.config/typeahead/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Backend base URL (overrides config)
    #[arg(long)]
    base_url: Option<String>,

    /// Longest time to wait for a search result
    #[arg(long, default_value = "30")]
    wait_secs: u64,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one search and print the results
    Search {
        /// Search text
        query: String,

        /// Category: courses, instructors, lessons or posts
        #[arg(short, long, default_value = "courses")]
        category: Category,

        /// Maximum results
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Print JSON instead of human-readable output
        #[arg(long)]
        json: bool,
    },

    /// Treat each stdin line as the current contents of the search field
    Interactive {
        /// Starting category
        #[arg(short, long, default_value = "courses")]
        category: Category,
    },

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Log to stderr only (stdout carries results or JSON-RPC)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("typeahead=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let mut config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(base_url) = cli.base_url {
        config.backend.base_url = base_url;
    }
    let wait = Duration::from_secs(cli.wait_secs);

    #[cfg(feature = "mcp")]
    if cli.mcp {
        return run_mcp_server(config, wait).await;
    }

    match cli.command {
        Some(Commands::Config) => {
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
        Some(Commands::Search {
            query,
            category,
            limit,
            json,
        }) => {
            let dispatcher = build_dispatcher(&config)?;
            let input = tools::SearchInput {
                query,
                category,
                limit,
            };
            let result = tools::execute_search(&dispatcher, input, wait).await;
            dispatcher.teardown();
            let output = result.map_err(|e| anyhow::anyhow!(e))?;

            let mut stdout = std::io::stdout().lock();
            if json {
                writeln!(stdout, "{}", serde_json::to_string_pretty(&output)?)?;
            } else {
                fmt::fmt_search(&mut stdout, &output, std::io::stdout().is_terminal())?;
            }
            Ok(())
        }
        Some(Commands::Interactive { category }) => run_interactive(&config, category).await,
        None => {
            eprintln!("Use a subcommand (search, interactive, config) or --mcp.");
            eprintln!("Run with --help for more information.");
            std::process::exit(1);
        }
    }
}

fn build_dispatcher(config: &Config) -> typeahead::Result<Dispatcher<HttpBackend>> {
    Dispatcher::connect(config).inspect_err(|e| {
        tracing::error!(code = e.code(), "failed to start dispatcher: {e}");
    })
}

#[cfg(feature = "mcp")]
async fn run_mcp_server(config: Config, wait: Duration) -> anyhow::Result<()> {
    use rmcp::ServiceExt;
    use typeahead::server::TypeaheadServer;

    tracing::info!("Starting MCP server for {}", config.backend.base_url);

    let dispatcher = build_dispatcher(&config)?;
    let server = TypeaheadServer::new(dispatcher.clone(), wait);

    let service = server.serve(rmcp::transport::io::stdio()).await?;
    service.waiting().await?;

    dispatcher.teardown();
    Ok(())
}

async fn run_interactive(config: &Config, category: Category) -> anyhow::Result<()> {
    let dispatcher = build_dispatcher(config)?;
    let debouncer = Debouncer::new(dispatcher.clone(), category, &config.dispatcher);
    let color = std::io::stdout().is_terminal();

    // Only deliveries answering the field's current contents are printed
    let (current_tx, current_rx) = watch::channel::<Option<SearchKey>>(None);
    let printer = tokio::spawn(print_deliveries(dispatcher.subscribe(), current_rx, color));

    tracing::info!(%category, "interactive mode; type to search, :quit to exit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match line.strip_prefix(':') {
            Some("quit" | "q") => break,
            Some("status") => {
                fmt::fmt_status(&mut std::io::stdout().lock(), &dispatcher.status(), color)?;
            }
            Some(cmd) => match cmd.strip_prefix("cat ").map(|c| c.trim().parse::<Category>()) {
                Some(Ok(next)) => {
                    current_tx.send_modify(|key| {
                        if let Some(key) = key {
                            *key = SearchKey::new(next, &key.query);
                        }
                    });
                    debouncer.set_category(next);
                    tracing::info!(category = %next, "category switched");
                }
                Some(Err(e)) => tracing::warn!("{e}"),
                None => tracing::warn!("unknown command :{cmd}"),
            },
            None => {
                current_tx.send_replace(Some(SearchKey::new(debouncer.category(), &line)));
                debouncer.on_input_change(&line);
            }
        }
    }

    // Let the last keystroke's timer fire and its search settle
    while debouncer.has_pending() {
        tokio::time::sleep(config.dispatcher.debounce()).await;
    }
    dispatcher.wait_idle().await;
    dispatcher.teardown();
    printer.abort();
    Ok(())
}

async fn print_deliveries(
    mut rx: broadcast::Receiver<typeahead::Delivery>,
    current: watch::Receiver<Option<SearchKey>>,
    color: bool,
) {
    loop {
        match rx.recv().await {
            Ok(delivery) => {
                if current.borrow().as_ref() != Some(&delivery.key) {
                    continue;
                }
                let mut stdout = std::io::stdout().lock();
                if let Err(e) = fmt::fmt_delivery(&mut stdout, &delivery, color) {
                    tracing::warn!("failed to print results: {e}");
                    return;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "printer lagged");
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}
