use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;

use sessionbox_core::config::{
    execution_timeout, load_config, AppConfig, ModelConfig, RunMode, SandboxConfig,
};
use sessionbox_core::driver::{default_prompts, run_interactive, run_scripted, DriverSummary};
use sessionbox_core::llm::{McpServerTool, OpenAIClient, ResponsesClient};
use sessionbox_core::{
    AgentError, AzureCliCredential, ConversationAgent, ConversationOrchestrator,
    CredentialProvider, DynamicSessionsClient, ManagedOrchestrator, SandboxClient,
    SessionContext, SessionId, StaticTokenCredential,
};

mod console;

use console::{truncate_endpoint, ConsoleObserver};

#[derive(Parser, Debug)]
#[clap(
    name = "sessionbox",
    author,
    version,
    about = "Chat with a model that runs Python in remote sandbox sessions"
)]
struct Cli {
    #[clap(subcommand)]
    command: Option<Commands>,

    #[clap(long, short, help = "Optional YAML configuration file")]
    config: Option<PathBuf>,

    #[clap(long, short, default_value = "warn")]
    log_level: String,

    #[clap(long, help = "Write logs to this file instead of stderr")]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a conversation (default command)
    Chat(ChatArgs),
    /// Execute one snippet in a sandbox session
    Exec {
        #[clap(long, help = "Session identifier (a new one is generated if omitted)")]
        session: Option<String>,

        #[clap(long, help = "Execution timeout in seconds")]
        timeout: Option<u64>,

        code: String,
    },
    /// List the sessions currently alive in the pool
    Sessions,
}

#[derive(Args, Debug, Default)]
struct ChatArgs {
    #[clap(long, value_enum, default_value_t = ChatMode::Function)]
    mode: ChatMode,

    #[clap(long, short, help = "Read questions from stdin until 'quit'")]
    interactive: bool,

    #[clap(long, help = "Prompt to run instead of the demo prompts (repeatable)")]
    task: Vec<String>,

    #[clap(long, help = "Maximum model calls per turn")]
    max_rounds: Option<usize>,

    #[clap(long, help = "Prefix for the generated session identifier")]
    session_prefix: Option<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
enum ChatMode {
    /// Function calling against the sandbox pool
    #[default]
    Function,
    /// Managed MCP tools through the Responses API
    Mcp,
}

fn main() -> ExitCode {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Failed to load .env file: {}", e);
        }
    }

    let cli = Cli::parse();
    if let Err(e) = init_logging(&cli) {
        eprintln!("{:#}", e);
        return ExitCode::from(1);
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start the async runtime: {}", e);
            return ExitCode::from(1);
        }
    };

    let code = match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report(&e),
    };

    // An unfinished stdin read holds a blocking thread; do not wait for it.
    runtime.shutdown_timeout(Duration::from_millis(100));
    code
}

fn init_logging(cli: &Cli) -> Result<()> {
    let level: LevelFilter = cli
        .log_level
        .parse()
        .with_context(|| format!("Invalid log level '{}'", cli.log_level))?;

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);
    if let Some(path) = &cli.log_file {
        let log_file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(log_file)));
    }
    builder.init();
    Ok(())
}

fn exit_status(error: &anyhow::Error) -> u8 {
    match error.downcast_ref::<AgentError>() {
        Some(AgentError::ConfigError(_)) => 2,
        _ => 1,
    }
}

fn report(error: &anyhow::Error) -> ExitCode {
    match error.downcast_ref::<AgentError>() {
        Some(AgentError::ConfigError(message)) => eprintln!("{}", message),
        _ => eprintln!("Error: {:#}", error),
    }
    ExitCode::from(exit_status(error))
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Some(Commands::Chat(args)) => run_chat(config_path, args).await,
        Some(Commands::Exec {
            session,
            timeout,
            code,
        }) => run_exec(config_path, session, timeout, &code).await,
        Some(Commands::Sessions) => run_sessions(config_path).await,
        None => run_chat(config_path, ChatArgs::default()).await,
    }
}

async fn run_chat(config_path: Option<&Path>, args: ChatArgs) -> Result<()> {
    let mode = match args.mode {
        ChatMode::Function => RunMode::Function,
        ChatMode::Mcp => RunMode::Mcp,
    };
    let mut config = load_config(mode, config_path).await?;
    if let Some(max_rounds) = args.max_rounds {
        if max_rounds == 0 {
            return Err(AgentError::ConfigError("--max-rounds must be at least 1".to_string()).into());
        }
        config.orchestrator.max_rounds = max_rounds;
    }

    let observer = Arc::new(ConsoleObserver::stdout());
    let prompts = if args.task.is_empty() {
        default_prompts()
    } else {
        args.task.clone()
    };

    let summary = match args.mode {
        ChatMode::Function => {
            let model = config.model()?;
            let sandbox = config.sandbox()?;
            let prefix = args
                .session_prefix
                .clone()
                .unwrap_or_else(|| sandbox.session_prefix.clone());
            let session = SessionContext::generate(&prefix, credential(sandbox));

            observer.banner(&[
                format!("Session ID: {}", session.id()),
                format!("Model deployment: {}", model.deployment),
                format!("Session pool: {}", truncate_endpoint(&sandbox.pool_endpoint)),
            ]);

            let mut agent = ConversationOrchestrator::new(
                Arc::new(chat_client(model)),
                Arc::new(pool_client(sandbox)),
                session,
                config.orchestrator.clone(),
            )?
            .with_observer(observer.clone());
            drive(
                &mut agent,
                &args,
                &prompts,
                &observer,
                "Ask a question; the model runs code when it needs to.",
            )
            .await?
        }
        ChatMode::Mcp => {
            let mut agent = managed_agent(&config)?.with_observer(observer.clone());
            let model = config.model()?;
            let mcp = config.mcp()?;
            observer.banner(&[
                "Responses API + MCP".to_string(),
                format!("Model deployment: {}", model.deployment),
                format!("MCP endpoint: {}", truncate_endpoint(&mcp.endpoint)),
            ]);
            drive(
                &mut agent,
                &args,
                &prompts,
                &observer,
                "Ask a question; the model runs code through the MCP server.",
            )
            .await?
        }
    };

    log::info!(
        "Conversation finished: {} turn(s), {} failed",
        summary.turns,
        summary.failures
    );
    Ok(())
}

async fn drive<A: ConversationAgent + ?Sized>(
    agent: &mut A,
    args: &ChatArgs,
    prompts: &[String],
    observer: &ConsoleObserver<std::io::Stdout>,
    intro: &str,
) -> Result<DriverSummary> {
    let summary = if args.interactive {
        observer.interactive_intro(intro);
        let stdin = BufReader::new(tokio::io::stdin());
        run_interactive(agent, stdin, observer, shutdown_signal()).await?
    } else {
        run_scripted(agent, prompts, observer, shutdown_signal()).await?
    };

    if summary.interrupted {
        observer.interrupted();
    } else {
        observer.closing();
    }
    Ok(summary)
}

fn managed_agent(config: &AppConfig) -> Result<ManagedOrchestrator> {
    let model = config.model()?;
    let mcp = config.mcp()?;

    let mut client = ResponsesClient::new(model.endpoint.as_str(), model.api_key.as_str())
        .with_request_timeout(model.request_timeout);
    if let Some(version) = &model.api_version {
        client = client.with_api_version(version.as_str());
    }
    let server = McpServerTool::new(mcp.endpoint.as_str(), mcp.api_key.as_str())
        .with_server_label(mcp.server_label.as_str());

    Ok(
        ManagedOrchestrator::new(Arc::new(client), model.deployment.as_str(), server)
            .with_instructions(config.mcp_instructions.as_str()),
    )
}

fn chat_client(model: &ModelConfig) -> OpenAIClient {
    let mut client = OpenAIClient::azure(
        model.endpoint.clone(),
        model.api_key.clone(),
        model.deployment.clone(),
    )
    .with_request_timeout(model.request_timeout);
    if let Some(version) = &model.api_version {
        client = client.with_api_version(version.clone());
    }
    if let Some(temperature) = model.temperature {
        client = client.with_temperature(temperature);
    }
    client
}

fn pool_client(sandbox: &SandboxConfig) -> DynamicSessionsClient {
    let client = DynamicSessionsClient::new(sandbox.pool_endpoint.as_str());
    match &sandbox.api_version {
        Some(version) => client.with_api_version(version.as_str()),
        None => client,
    }
}

fn credential(sandbox: &SandboxConfig) -> Arc<dyn CredentialProvider> {
    match &sandbox.access_token {
        Some(token) => Arc::new(StaticTokenCredential::new(token.as_str())),
        None => Arc::new(AzureCliCredential::new()),
    }
}

fn sandbox_session(sandbox: &SandboxConfig, id: Option<String>) -> SessionContext {
    match id {
        Some(id) => SessionContext::new(SessionId::new(id), credential(sandbox)),
        None => SessionContext::generate(&sandbox.session_prefix, credential(sandbox)),
    }
}

fn exec_timeout(timeout: Option<u64>, sandbox: &SandboxConfig) -> Result<Duration, AgentError> {
    match timeout {
        Some(secs) => execution_timeout("--timeout", secs),
        None => Ok(sandbox.execution_timeout),
    }
}

async fn run_exec(
    config_path: Option<&Path>,
    session: Option<String>,
    timeout: Option<u64>,
    code: &str,
) -> Result<()> {
    let config = load_config(RunMode::SandboxOnly, config_path).await?;
    let sandbox = config.sandbox()?;
    let timeout = exec_timeout(timeout, sandbox)?;
    let client = pool_client(sandbox);
    let session = sandbox_session(sandbox, session);

    let outcome = client
        .execute(&session, code, timeout)
        .await
        .map_err(AgentError::from)?;

    println!("Session: {}", session.id());
    println!("Status: {}", outcome.status);
    println!(
        "Execution time: {}",
        outcome
            .execution_time_ms
            .map(|ms| format!("{}ms", ms))
            .unwrap_or_else(|| "N/A".to_string())
    );
    println!("\n{}", outcome.normalized_output());
    Ok(())
}

async fn run_sessions(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(RunMode::SandboxOnly, config_path).await?;
    let sandbox = config.sandbox()?;
    let client = pool_client(sandbox);
    let session = sandbox_session(sandbox, None);

    let list = client
        .list_sessions(&session)
        .await
        .map_err(AgentError::from)?;
    println!("Current sessions (count: {})", list.sessions.len());
    for info in &list.sessions {
        println!(
            "  {}",
            info.identifier.as_deref().unwrap_or("<unnamed session>")
        );
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_is_function_chat() {
        let cli = Cli::parse_from(["sessionbox"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.log_level, "warn");
        let args = ChatArgs::default();
        assert_eq!(args.mode, ChatMode::Function);
        assert!(!args.interactive);
    }

    #[test]
    fn test_chat_arguments() {
        let cli = Cli::parse_from([
            "sessionbox",
            "--log-level",
            "debug",
            "chat",
            "--mode",
            "mcp",
            "-i",
            "--task",
            "first",
            "--task",
            "second",
            "--max-rounds",
            "4",
        ]);
        match cli.command {
            Some(Commands::Chat(args)) => {
                assert_eq!(args.mode, ChatMode::Mcp);
                assert!(args.interactive);
                assert_eq!(args.task, vec!["first", "second"]);
                assert_eq!(args.max_rounds, Some(4));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_exec_arguments() {
        let cli = Cli::parse_from([
            "sessionbox",
            "exec",
            "--session",
            "gpt-demo-12345678",
            "x = 100; print(x)",
        ]);
        match cli.command {
            Some(Commands::Exec {
                session,
                timeout,
                code,
            }) => {
                assert_eq!(session.as_deref(), Some("gpt-demo-12345678"));
                assert_eq!(timeout, None);
                assert_eq!(code, "x = 100; print(x)");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_exec_timeout_is_bounded() {
        let sandbox = SandboxConfig {
            pool_endpoint: "https://pool.example.io".to_string(),
            access_token: None,
            api_version: None,
            execution_timeout: Duration::from_secs(60),
            session_prefix: "gpt-demo".to_string(),
        };
        assert_eq!(exec_timeout(None, &sandbox).unwrap(), Duration::from_secs(60));
        assert_eq!(exec_timeout(Some(30), &sandbox).unwrap(), Duration::from_secs(30));

        match exec_timeout(Some(u64::MAX), &sandbox) {
            Err(AgentError::ConfigError(msg)) => assert!(msg.starts_with("--timeout must be at most")),
            other => panic!("expected a config error, got {:?}", other),
        }
        assert!(matches!(
            exec_timeout(Some(0), &sandbox),
            Err(AgentError::ConfigError(_))
        ));
    }

    #[test]
    fn test_config_errors_exit_with_two() {
        let err: anyhow::Error =
            AgentError::ConfigError("POOL_ENDPOINT is not set. Check your .env file.".to_string())
                .into();
        assert_eq!(exit_status(&err), 2);

        let err: anyhow::Error = AgentError::LLMError("down".to_string()).into();
        assert_eq!(exit_status(&err), 1);

        let err = anyhow::anyhow!("something else");
        assert_eq!(exit_status(&err), 1);
    }
}
