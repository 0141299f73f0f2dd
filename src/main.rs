use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use r3_assistant::knowledge::{load_dataset, load_topics};
use r3_assistant::provider::modelfile::{ModelfileSpec, generate_modelfile};
use r3_assistant::resolver::SpecializedModels;
use r3_assistant::voice::{ConsoleBackend, ConsoleSynthesizer};
use r3_assistant::{
    CompletionProvider, Config, MemoryNameStore, NameStore, OllamaClient, ResponseResolver,
    SessionController, SpeechChannel, SqliteNameStore, db,
};

/// R3 - offline voice assistant
#[derive(Parser)]
#[command(name = "r3", version, about)]
struct Cli {
    /// Model to answer with (overrides config)
    #[arg(short, long, env = "R3_MODEL")]
    model: Option<String>,

    /// Seconds of silence before the conversation ends
    #[arg(long, env = "R3_IDLE_TIMEOUT")]
    idle_timeout: Option<u64>,

    /// Don't remember the user's name between runs
    #[arg(long)]
    no_persist: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Show whether the completion provider is reachable
    Status,
    /// List installed models
    Models,
    /// Print or write a Modelfile for the specialized model
    Modelfile {
        /// Base model to derive from
        #[arg(long, default_value = "llama3")]
        base: String,
        /// Name of the specialized model
        #[arg(long)]
        name: Option<String>,
        /// Write to this path instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Create the specialized model on the provider
    CreateModel {
        /// Base model to derive from
        #[arg(long, default_value = "llama3")]
        base: String,
        /// Name of the specialized model
        #[arg(long)]
        name: Option<String>,
    },
    /// Answer one question and exit
    Ask {
        /// Text to answer
        text: String,
        /// Name to address the answer to
        #[arg(long, default_value = "")]
        user: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,r3_assistant=info",
        1 => "info,r3_assistant=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    if let Some(model) = cli.model {
        config.provider.model = model;
    }
    if let Some(secs) = cli.idle_timeout {
        r3_assistant::config::validate_idle_timeout(secs)?;
        config.session.idle_timeout = Duration::from_secs(secs);
    }
    tracing::debug!(?config, "loaded configuration");

    let client = OllamaClient::new(&config.provider.url, config.provider.timeout)?;

    match cli.command {
        Some(Command::Status) => cmd_status(&client).await,
        Some(Command::Models) => cmd_models(&config, &client).await,
        Some(Command::Modelfile { base, name, output }) => {
            cmd_modelfile(&config, &base, name.as_deref(), output)
        }
        Some(Command::CreateModel { base, name }) => {
            cmd_create_model(&config, &client, &base, name.as_deref()).await
        }
        Some(Command::Ask { text, user }) => cmd_ask(&config, client, &text, &user).await,
        None => run_session(config, client, cli.no_persist).await,
    }
}

fn build_resolver(config: &Config, client: OllamaClient) -> anyhow::Result<ResponseResolver> {
    let dataset = load_dataset(config.dataset_path.as_deref())?;
    let topics = load_topics(config.topics_path.as_deref())?;
    tracing::debug!(entries = dataset.len(), topics = topics.records().len(), "knowledge loaded");

    Ok(ResponseResolver::new(
        Arc::new(client),
        Arc::new(dataset),
        Arc::new(topics),
        config.resolver_config(),
    ))
}

/// Run conversations on the terminal until Ctrl-C or end of input
async fn run_session(config: Config, client: OllamaClient, no_persist: bool) -> anyhow::Result<()> {
    let names: Arc<dyn NameStore> = if no_persist {
        Arc::new(MemoryNameStore::new())
    } else {
        Arc::new(SqliteNameStore::new(db::init(config.db_path())?))
    };

    let status = client.status().await;
    if !status.running {
        tracing::warn!(url = %client.base_url(), "completion provider not reachable, answers will fall back to local knowledge");
    }

    let resolver = Arc::new(build_resolver(&config, client)?);
    let backend = ConsoleBackend::stdin();
    let mut input_closed = backend.input_closed();
    let speech = SpeechChannel::new(
        Arc::new(backend),
        Box::new(ConsoleSynthesizer::new(config.session.assistant_name.clone())),
        config.voice.language.clone(),
        config.voice.preferred_voices.clone(),
    );

    // Each farewell is followed by a fresh greeting
    let mut settings = config.session_settings();
    settings.restart_after_reset = true;

    let (controller, handle) = SessionController::new(speech, resolver, names, settings);
    let task = tokio::spawn(controller.run());

    tracing::info!(model = %config.provider.model, "r3 ready - type to talk, Ctrl-C to quit");
    handle.start();

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            tracing::info!("shutting down");
            handle.shutdown();
        }
        _ = input_closed.wait_for(|closed| *closed) => {
            tracing::info!("end of input, finishing conversation");
            handle.close();
        }
    }
    task.await?;

    Ok(())
}

async fn cmd_status(client: &OllamaClient) -> anyhow::Result<()> {
    let status = client.status().await;
    if status.running {
        println!("Provider at {}: running ({} models)", client.base_url(), status.models.len());
    } else {
        println!("Provider at {}: not reachable", client.base_url());
    }
    Ok(())
}

async fn cmd_models(config: &Config, client: &OllamaClient) -> anyhow::Result<()> {
    let specialized = SpecializedModels {
        canonical: config.provider.specialized_model.clone(),
        marker: config.provider.specialized_marker.clone(),
    };

    let models = client.list_models().await?;
    if models.is_empty() {
        println!("No models installed");
    }
    for model in models {
        let marker = if specialized.is_specialized(&model.name) {
            " (specialized)"
        } else {
            ""
        };
        println!("{}{marker}", model.name);
    }
    Ok(())
}

fn render_modelfile(config: &Config, base: &str, name: &str) -> anyhow::Result<String> {
    let dataset = load_dataset(config.dataset_path.as_deref())?;
    let spec = ModelfileSpec {
        base_model: base,
        model_name: name,
        assistant_name: &config.session.assistant_name,
        sampling: config.provider.sampling,
        created: chrono::Local::now().date_naive(),
    };
    Ok(generate_modelfile(&spec, &dataset))
}

fn cmd_modelfile(
    config: &Config,
    base: &str,
    name: Option<&str>,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let name = name.unwrap_or(config.provider.specialized_model.as_str());
    let modelfile = render_modelfile(config, base, name)?;

    match output {
        Some(path) => {
            std::fs::write(&path, modelfile)?;
            println!("Modelfile written to {}", path.display());
        }
        None => print!("{modelfile}"),
    }
    Ok(())
}

async fn cmd_create_model(
    config: &Config,
    client: &OllamaClient,
    base: &str,
    name: Option<&str>,
) -> anyhow::Result<()> {
    let name = name.unwrap_or(config.provider.specialized_model.as_str());
    let modelfile = render_modelfile(config, base, name)?;

    println!("Creating {name} from {base}...");
    for status in client.create_model(name, &modelfile).await? {
        println!("  {status}");
    }
    println!("Model {name} created");
    Ok(())
}

async fn cmd_ask(config: &Config, client: OllamaClient, text: &str, user: &str) -> anyhow::Result<()> {
    let resolver = build_resolver(config, client)?;
    let model = config.provider.model.clone();
    let resolution = resolver.resolve(text, user, &model).await?;
    println!("[{}] {}", resolution.source, resolution.text);
    Ok(())
}
