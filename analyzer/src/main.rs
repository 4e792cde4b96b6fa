//! Trash Analyzer command-line entry point.

use std::io::{BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use zeroize::Zeroizing;

use trash_analyzer::analyzer::{
    self, AnalysisOutcome, AnalysisParams, DEFAULT_CONCURRENCY, DEFAULT_MAX_TOKENS,
    DEFAULT_PROMPT, DEFAULT_TEMPERATURE,
};
use trash_analyzer::images::{self, DEFAULT_SAMPLE_SIZE};
use trash_analyzer::middleware::credentials::{self, CredentialSources, Credentials};
use trash_analyzer::middleware::keyring::{self, KEYRING_SERVICE};
use trash_analyzer::providers::{ProviderId, RetryConfig, catalog};

#[derive(Parser)]
#[command(name = "trash-analyzer", version, about = "Classify trash images with vision LLMs")]
struct Cli {
    /// Credentials file with GEMINI_API_KEY / OPENAI_API_KEY / GROQ_API_KEY entries
    #[arg(long, global = true, env = "TRASH_ANALYZER_CREDENTIALS")]
    credentials: Option<PathBuf>,

    /// Do not read keys from environment variables
    #[arg(long, global = true)]
    no_env: bool,

    /// Do not read keys from the OS keychain
    #[arg(long, global = true)]
    no_keyring: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze the given image files
    Analyze {
        #[arg(required = true)]
        images: Vec<PathBuf>,
        #[command(flatten)]
        analysis: AnalysisArgs,
    },
    /// Analyze a random sample from the dataset directories
    Random {
        /// Dataset directory to scan (repeatable)
        #[arg(long = "dataset")]
        datasets: Vec<PathBuf>,
        /// Maximum number of images to sample
        #[arg(long, default_value_t = DEFAULT_SAMPLE_SIZE, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
        count: usize,
        #[command(flatten)]
        analysis: AnalysisArgs,
    },
    /// List providers, their key status and models
    Providers,
    /// Manage keys stored in the OS keychain
    Keys {
        #[command(subcommand)]
        action: KeysCommand,
    },
}

#[derive(Subcommand)]
enum KeysCommand {
    /// Store a key read from stdin
    Set { provider: ProviderId },
    /// Remove a stored key
    Delete { provider: ProviderId },
    /// Show which providers have a key and where it came from
    Status,
}

#[derive(Args)]
struct AnalysisArgs {
    /// gemini, openai or groq (defaults to the first configured provider)
    #[arg(long, env = "TRASH_ANALYZER_PROVIDER")]
    provider: Option<ProviderId>,
    /// Model name (defaults to the provider's first model)
    #[arg(long, env = "TRASH_ANALYZER_MODEL")]
    model: Option<String>,
    #[arg(long, default_value = DEFAULT_PROMPT)]
    prompt: String,
    #[arg(long, default_value_t = DEFAULT_TEMPERATURE)]
    temperature: f64,
    #[arg(long, default_value_t = DEFAULT_MAX_TOKENS)]
    max_tokens: u32,
    /// Maximum concurrent requests
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    concurrency: usize,
    /// Override the provider's API base URL
    #[arg(long, env = "TRASH_ANALYZER_BASE_URL")]
    base_url: Option<String>,
    /// Print results as JSON
    #[arg(long)]
    json: bool,
}

/// Initialize structured logging with tracing. Logs go to stderr.
fn init_logging() {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn credential_sources(cli: &Cli) -> CredentialSources {
    let defaults = CredentialSources::default();
    CredentialSources {
        file: cli.credentials.clone().or(defaults.file),
        env: !cli.no_env,
        keyring: !cli.no_keyring,
    }
}

fn load_credentials(cli: &Cli) -> Result<&'static Credentials> {
    let creds = Credentials::load(&credential_sources(cli))?;
    Ok(credentials::install(creds)?)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    init_logging();
    let cli = Cli::parse();

    match &cli.command {
        Command::Keys { action } => run_keys(&cli, action),
        Command::Providers => {
            let creds = load_credentials(&cli)?;
            print_providers(creds);
            Ok(ExitCode::SUCCESS)
        }
        Command::Analyze {
            images: files,
            analysis,
        } => {
            let creds = load_credentials(&cli)?;
            let paths = files.clone();
            let loaded = tokio::task::spawn_blocking(move || images::load_images(&paths)).await?;
            run_analysis(creds, analysis, loaded).await
        }
        Command::Random {
            datasets,
            count,
            analysis,
        } => {
            let creds = load_credentials(&cli)?;
            let roots = if datasets.is_empty() {
                images::default_dataset_roots()
            } else {
                datasets.clone()
            };
            let count = *count;
            let loaded = tokio::task::spawn_blocking(move || {
                let found = images::find_dataset_images(&roots);
                if found.is_empty() {
                    bail!(
                        "No images found in the dataset directories {:?}. Pass image files to `analyze` instead.",
                        roots
                    );
                }
                let picked = images::sample_images(&found, count, &mut rand::thread_rng());
                tracing::info!(available = found.len(), sampled = picked.len(), "Sampled random images");
                Ok(images::load_images(&picked))
            })
            .await??;
            run_analysis(creds, analysis, loaded).await
        }
    }
}

async fn run_analysis(
    creds: &'static Credentials,
    args: &AnalysisArgs,
    loaded: Vec<images::ImageInfo>,
) -> Result<ExitCode> {
    if loaded.is_empty() {
        bail!("no images could be loaded");
    }

    let provider_id = args
        .provider
        .unwrap_or_else(|| catalog::selectable_providers(creds)[0]);
    let model = args
        .model
        .clone()
        .unwrap_or_else(|| catalog::default_model(provider_id).to_string());
    if !catalog::is_known_model(provider_id, &model) {
        tracing::warn!(provider = provider_id.slug(), %model, "Model is not in the known vision model list");
    }

    let provider = catalog::build_provider(
        provider_id,
        credentials::get_api_key(Some(provider_id.slug())),
        args.base_url.as_deref(),
        RetryConfig::default(),
    )?;

    let params = AnalysisParams {
        model,
        prompt: args.prompt.clone(),
        temperature: args.temperature,
        max_tokens: args.max_tokens,
    };

    tracing::info!(
        provider = provider_id.slug(),
        model = %params.model,
        images = loaded.len(),
        "Analyzing images"
    );

    let outcomes = tokio::select! {
        result = analyzer::analyze_batch(provider.as_ref(), &loaded, &params, args.concurrency) => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl+C, cancelling analysis");
            return Ok(ExitCode::from(130));
        }
    };

    print_outcomes(&outcomes, args.json)?;

    if outcomes.iter().all(AnalysisOutcome::is_success) {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

fn print_outcomes(outcomes: &[AnalysisOutcome], json: bool) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    if json {
        serde_json::to_writer_pretty(&mut stdout, outcomes)?;
        writeln!(stdout)?;
    } else {
        for outcome in outcomes {
            writeln!(stdout, "{}", outcome.summary_line())?;
        }
    }
    Ok(())
}

fn print_providers(creds: &Credentials) {
    let selectable = catalog::selectable_providers(creds);
    for id in ProviderId::ALL {
        let status = match creds.source(id) {
            Some(source) => format!("configured ({source})"),
            None => "no key".to_string(),
        };
        let marker = if selectable.first() == Some(&id) { "*" } else { " " };
        println!("{marker} {:<7} {status}", id.display_name());
        for model in catalog::models_for_provider(id) {
            println!("      {model}");
        }
    }
}

fn run_keys(cli: &Cli, action: &KeysCommand) -> Result<ExitCode> {
    match action {
        KeysCommand::Set { provider } => {
            if std::io::stdin().is_terminal() {
                eprint!("{} API key: ", provider.display_name());
                std::io::stderr().flush()?;
            }
            let mut line = Zeroizing::new(String::new());
            std::io::stdin()
                .lock()
                .read_line(&mut line)
                .context("failed to read key from stdin")?;
            let key = line.trim();
            if key.is_empty() {
                bail!("no key given on stdin");
            }
            keyring::set_password(KEYRING_SERVICE, provider.slug(), key)
                .with_context(|| format!("failed to store {} key", provider.display_name()))?;
            tracing::info!(provider = provider.slug(), "Stored API key in keychain");
        }
        KeysCommand::Delete { provider } => {
            keyring::delete_password(KEYRING_SERVICE, provider.slug())
                .with_context(|| format!("failed to delete {} key", provider.display_name()))?;
            tracing::info!(provider = provider.slug(), "Deleted API key from keychain");
        }
        KeysCommand::Status => {
            let creds = load_credentials(cli)?;
            for id in ProviderId::ALL {
                match creds.source(id) {
                    Some(source) => println!("{:<7} {source}", id.slug()),
                    None => println!("{:<7} not configured", id.slug()),
                }
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}
