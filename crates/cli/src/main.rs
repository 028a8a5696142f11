mod config;
mod error;

use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::thread;

use clap::{Parser, Subcommand};
use mcp::ServerConfig;
use runtime::tools::catalog;
use runtime::{
    Agent, AgentObserver, AgentOptions, DEFAULT_HOST, McpConnector, OllamaBackend, RouteError,
    SessionRegistry, ToolCall, UserInput,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::McpConfig;
use error::Result;

const DEFAULT_MODEL: &str = "qwen3:1.7b";

#[derive(Parser)]
#[command(name = "deckhand")]
#[command(about = "Chat with a local model that can use MCP tools", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Model to chat with
    #[arg(long, env = "DECKHAND_MODEL", default_value = DEFAULT_MODEL, global = true)]
    model: String,

    /// Ollama server address
    #[arg(long, env = "OLLAMA_HOST", default_value = DEFAULT_HOST, global = true)]
    host: String,

    /// Print replies as they are generated
    #[arg(long, global = true)]
    stream: bool,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// MCP server configuration (default: ./mcp.json, then the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat session (default)
    Chat,
    /// List the tools exposed by the configured servers
    Tools,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let servers = load_servers(cli.config.as_deref())?;

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received");
                cancel.cancel();
            }
        }
    });

    let registry = tokio::select! {
        registry = SessionRegistry::connect(servers, &McpConnector) => registry,
        _ = cancel.cancelled() => return Ok(()),
    };

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => {
            let backend = OllamaBackend::builder(cli.model).host(cli.host).build();
            let options = AgentOptions {
                stream: cli.stream,
                ..AgentOptions::default()
            };
            cmd_chat(backend, registry, options, cancel).await
        }
        Commands::Tools => cmd_tools(registry, cancel).await,
    }
}

fn load_servers(explicit: Option<&Path>) -> Result<Vec<ServerConfig>> {
    match config::resolve_path(explicit) {
        Some(path) => {
            info!(path = %path.display(), "loading server config");
            Ok(McpConfig::load(&path)?.servers()?)
        }
        None => {
            warn!("no {} found, continuing without tools", config::CONFIG_FILE);
            Ok(Vec::new())
        }
    }
}

async fn cmd_chat(
    backend: OllamaBackend,
    registry: SessionRegistry,
    options: AgentOptions,
    cancel: CancellationToken,
) -> Result<()> {
    println!("deckhand v{}", env!("CARGO_PKG_VERSION"));
    println!("Model: {backend}");
    if registry.is_empty() {
        println!("Servers: none");
    } else {
        println!("Servers: {}", registry.names().collect::<Vec<_>>().join(", "));
    }
    println!("Type 'quit' or Ctrl+D to exit.\n");

    let agent = Agent::new(backend, registry)
        .with_options(options)
        .with_observer(Console)
        .with_cancellation(cancel);

    let conversation = agent.run(&mut StdinInput::new()).await?;

    println!(
        "\nSession ended ({} messages, {} tool calls).",
        conversation.len(),
        conversation.tool_call_count()
    );
    Ok(())
}

async fn cmd_tools(registry: SessionRegistry, cancel: CancellationToken) -> Result<()> {
    let listed = tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        tools = catalog::list_tools(&registry) => Some(tools),
    };
    let Some(tools) = listed else {
        registry.close().await?;
        return Ok(());
    };

    if tools.is_empty() {
        println!("No tools available.");
    }
    for tool in &tools {
        println!("{}", tool.qualified_name);
        if !tool.description.is_empty() {
            println!("    {}", tool.description);
        }
    }

    registry.close().await?;
    Ok(())
}

/// Prompted line input from the terminal. `quit` and `exit` end the session.
///
/// Lines are read on a detached thread so a pending read never holds up
/// runtime shutdown after Ctrl-C.
struct StdinInput {
    lines: mpsc::Receiver<io::Result<String>>,
}

impl StdinInput {
    fn new() -> Self {
        Self::from_reader(BufReader::new(io::stdin()))
    }

    fn from_reader(reader: impl BufRead + Send + 'static) -> Self {
        let (tx, rx) = mpsc::channel(1);
        thread::spawn(move || {
            for line in reader.lines() {
                let failed = line.is_err();
                if tx.blocking_send(line).is_err() || failed {
                    break;
                }
            }
        });
        Self { lines: rx }
    }
}

impl UserInput for StdinInput {
    async fn read_line(&mut self) -> io::Result<Option<String>> {
        print!("> ");
        io::stdout().flush()?;

        match self.lines.recv().await {
            Some(line) => Ok(Some(line?).filter(|l| !matches!(l.trim(), "quit" | "exit"))),
            None => Ok(None),
        }
    }
}

/// Prints agent progress to the terminal.
struct Console;

impl AgentObserver for Console {
    fn on_text(&self, fragment: &str) {
        print!("{fragment}");
        let _ = io::stdout().flush();
    }

    fn on_stream_end(&self) {
        println!("\n");
    }

    fn on_assistant(&self, text: &str) {
        println!("\n{text}\n");
    }

    fn on_tool_call(&self, call: &ToolCall) {
        println!("[tool] {} {}", call.name, call.arguments);
    }

    fn on_tool_result(&self, _call: &ToolCall, preview: &str) {
        println!("[result] {preview}");
    }

    fn on_tool_error(&self, call: &ToolCall, error: &RouteError) {
        eprintln!("[tool error] {}: {error}", call.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mcp::{CallToolResult, Tool};
    use runtime::ToolProvider;
    use serde_json::{Map, Value};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc as std_mpsc;
    use std::time::Duration;

    /// Never finishes listing; records whether it was closed.
    struct Hanging(Arc<AtomicBool>);

    #[async_trait]
    impl ToolProvider for Hanging {
        async fn list_tools(&self) -> mcp::Result<Vec<Tool>> {
            futures::future::pending().await
        }

        async fn call_tool(&self, _: &str, _: Map<String, Value>) -> mcp::Result<CallToolResult> {
            futures::future::pending().await
        }

        async fn close(self: Box<Self>) -> mcp::Result<()> {
            self.0.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn tools_listing_stops_on_cancel() {
        let closed = Arc::new(AtomicBool::new(false));
        let registry = SessionRegistry::from_providers([(
            "slow".to_string(),
            Box::new(Hanging(closed.clone())) as Box<dyn ToolProvider>,
        )]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(1), cmd_tools(registry, cancel))
            .await
            .expect("listing ignored cancellation")
            .unwrap();
        assert!(closed.load(Ordering::SeqCst));
    }

    /// A reader whose first read never returns.
    struct Stuck;

    impl io::Read for Stuck {
        fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
            loop {
                thread::park();
            }
        }
    }

    #[tokio::test]
    async fn input_lines_until_quit() {
        let mut input = StdinInput::from_reader(io::Cursor::new("hello\n  \nquit\nafter\n"));
        assert_eq!(input.read_line().await.unwrap().as_deref(), Some("hello"));
        assert_eq!(input.read_line().await.unwrap().as_deref(), Some("  "));
        assert_eq!(input.read_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn input_ends_with_the_reader() {
        let mut input = StdinInput::from_reader(io::Cursor::new("only"));
        assert_eq!(input.read_line().await.unwrap().as_deref(), Some("only"));
        assert_eq!(input.read_line().await.unwrap(), None);
    }

    #[test]
    fn pending_read_does_not_block_runtime_shutdown() {
        let (done_tx, done_rx) = std_mpsc::channel();
        thread::spawn(move || {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let mut input = StdinInput::from_reader(BufReader::new(Stuck));
            let read = rt.block_on(async {
                tokio::time::timeout(Duration::from_millis(50), input.read_line()).await
            });
            assert!(read.is_err());
            drop(rt);
            done_tx.send(()).unwrap();
        });

        done_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("runtime shutdown waited on the pending read");
    }
}
