use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use colored::*;
use rangehash_cli::config::{AppConfig, ConfigManager, get_config};
use rangehash_cli::output::{self, OutputFormat};
use rangehash_cli::{poll, terminal};
use rangehash_core::hashing::AlgorithmRegistry;
use rangehash_core::{
    ArtifactIndex, DEFAULT_ALGORITHM, DirectoryResolver, HashParams, HashVariant, JobRunner,
    Payload, RequestSpec, ResultFormatter, SessionId,
};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "rangehash")]
#[command(author, version, about = "Digest ranges of preserved content", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Hash a unit, or a range of it, under the content root
    Hash(HashArgs),

    /// List supported digest algorithms
    Algorithms,

    /// List hash variants with their legacy codes and names
    Variants,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
struct HashArgs {
    /// Unit id (a directory under the content root)
    #[arg(short, long)]
    unit: String,

    /// Content root; overrides content.root from the config
    #[arg(long)]
    root: Option<PathBuf>,

    /// Restrict the range to this url and its children
    #[arg(long)]
    url: Option<String>,

    /// Inclusive lower bound within the url
    #[arg(long)]
    lower: Option<String>,

    /// Inclusive upper bound within the url
    #[arg(long)]
    upper: Option<String>,

    /// Digest algorithm
    #[arg(short, long)]
    algorithm: Option<String>,

    /// Poller nonce, base64
    #[arg(long)]
    challenge: Option<String>,

    /// Voter nonce, base64
    #[arg(long)]
    verifier: Option<String>,

    /// Hash variant: a name such as V3Tree or a legacy code 1-5
    #[arg(short = 't', long = "type")]
    hash_type: Option<String>,

    /// Result encoding (Hex or Base64)
    #[arg(short, long)]
    encoding: Option<String>,

    /// Result delivery (File or Inline)
    #[arg(long = "result")]
    result_type: Option<String>,

    /// Record the hashed byte stream to a temporary file
    #[arg(long)]
    record: bool,

    /// Run the job on a background worker and poll it
    #[arg(short, long)]
    background: bool,

    /// Output format
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Write the files a result refers to after the result itself
    #[arg(long)]
    fetch: bool,

    /// Disable the progress spinner
    #[arg(long)]
    no_progress: bool,
}

impl HashArgs {
    fn params(&self) -> HashParams {
        HashParams {
            auid: Some(self.unit.clone()),
            url: self.url.clone(),
            lower: self.lower.clone(),
            upper: self.upper.clone(),
            algorithm: self.algorithm.clone(),
            challenge: self.challenge.clone(),
            verifier: self.verifier.clone(),
            hash_type: self.hash_type.clone(),
            encoding: self.encoding.clone(),
            result_type: self.result_type.clone(),
            record: self.record,
            background: self.background,
        }
    }
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Get a configuration value
    Get {
        /// Configuration key (e.g., hasher.step_size)
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., hasher.step_size)
        key: String,

        /// Value to set
        value: String,
    },

    /// List all configuration values
    List,

    /// Print the configuration file path
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.debug {
        env_logger::Builder::from_env(env_logger::Env::default())
            .filter_level(log::LevelFilter::Debug)
            .filter_module("rangehash_core", log::LevelFilter::Debug)
            .filter_module("rangehash_cli", log::LevelFilter::Debug)
            .filter_module("rangehash", log::LevelFilter::Debug)
            .format_timestamp_millis()
            .init();
        eprintln!("Debug logging enabled");
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    match cli.command {
        Commands::Hash(args) => {
            let config = get_config().context("Failed to load configuration")?;
            hash_command(config, args).await?;
        }
        Commands::Algorithms => {
            for name in AlgorithmRegistry::global().list() {
                if name == DEFAULT_ALGORITHM {
                    println!("{name} (default)");
                } else {
                    println!("{name}");
                }
            }
        }
        Commands::Variants => {
            for variant in HashVariant::ALL {
                let marker = if variant == HashVariant::DEFAULT {
                    " (default)"
                } else {
                    ""
                };
                println!(
                    "{}  {:<10} {}{marker}",
                    variant.legacy_code(),
                    variant.legacy_name(),
                    variant.name()
                );
            }
        }
        Commands::Config { command } => {
            config_command(command)?;
        }
        Commands::Completions { shell } => {
            generate_completions(shell);
        }
    }

    Ok(())
}

async fn hash_command(config: AppConfig, args: HashArgs) -> Result<()> {
    let root = args
        .root
        .clone()
        .or_else(|| config.content.root.clone())
        .context("No content root: pass --root or set content.root")?;
    if !root.is_dir() {
        anyhow::bail!("Content root is not a directory: {}", root.display());
    }

    let resolver = DirectoryResolver::new(&root);
    let spec = RequestSpec::validate(&args.params(), &resolver)?;
    log::debug!("Validated request {spec:?}");

    let runner = JobRunner::new(config.hasher.clone());
    let session = SessionId::new(format!("cli-{}", std::process::id()));
    let show_progress =
        terminal::should_show_progress(config.output.progress_enabled && !args.no_progress);

    let job = poll::run_to_completion(&runner, &session, spec, show_progress).await?;

    let artifacts = Arc::new(ArtifactIndex::new(config.hasher.auto_delete_hash_files));
    let formatter = ResultFormatter::new(Arc::clone(&artifacts));
    let rendered = formatter.render(&job)?;

    let format = args
        .format
        .unwrap_or_else(|| OutputFormat::from_config(&config.output.default_format));

    match format {
        OutputFormat::Json => {
            let doc = output::result_json(&job, &rendered, &artifacts);
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }
        OutputFormat::Text => match &rendered.payload {
            Payload::Record(record) => {
                let color = terminal::should_color(config.output.color_enabled);
                print!("{}", output::record_text(record.fields(), color));
                for id in output::artifact_ids(record.fields()) {
                    if args.fetch {
                        stream_to_stdout(Arc::clone(&artifacts), id.to_string()).await?;
                    } else if let Some(path) = artifacts.path(id) {
                        eprintln!("{} {}", format!("{id}:").dimmed(), path.display());
                    }
                }
            }
            Payload::File(path) => {
                let id = artifacts.register(path);
                stream_to_stdout(Arc::clone(&artifacts), id).await?;
            }
        },
    }

    Ok(())
}

/// Copy an artifact to stdout on the blocking pool
async fn stream_to_stdout(artifacts: Arc<ArtifactIndex>, id: String) -> Result<()> {
    tokio::task::spawn_blocking(move || -> Result<()> {
        let mut reader = artifacts.stream_artifact(&id)?;
        let mut stdout = std::io::stdout().lock();
        std::io::copy(&mut reader, &mut stdout)
            .with_context(|| format!("Failed to stream {}", reader.path().display()))?;
        stdout.flush()?;
        Ok(())
    })
    .await
    .context("Streaming task panicked")?
}

fn config_command(command: ConfigCommand) -> Result<()> {
    let manager = ConfigManager::new();

    match command {
        ConfigCommand::Get { key } => match manager.get(&key) {
            Ok(value) => {
                println!("{value}");
            }
            Err(e) => {
                eprintln!("{}", format!("Error: {e}").red());
                std::process::exit(1);
            }
        },
        ConfigCommand::Set { key, value } => match manager.set(&key, &value) {
            Ok(()) => {
                eprintln!("{}", format!("Set {key} = {value}").green());
                eprintln!(
                    "Configuration saved to: {}",
                    manager.config_path().display()
                );
            }
            Err(e) => {
                eprintln!("{}", format!("Error: {e:#}").red());
                std::process::exit(1);
            }
        },
        ConfigCommand::List => match manager.list() {
            Ok(items) => print_config(&manager.config_path(), items),
            Err(e) => {
                eprintln!("{}", format!("Error: {e:#}").red());
                std::process::exit(1);
            }
        },
        ConfigCommand::Path => {
            println!("{}", manager.config_path().display());
        }
    }

    Ok(())
}

fn print_config(path: &Path, items: Vec<(String, String)>) {
    eprintln!("{}", "Configuration:".bold().blue());
    eprintln!("Config file: {}", path.display());
    eprintln!();

    let mut sections: BTreeMap<String, Vec<(String, String)>> = BTreeMap::new();
    for (key, value) in items {
        let (section, rest) = key.split_once('.').unwrap_or(("general", key.as_str()));
        sections
            .entry(section.to_string())
            .or_default()
            .push((rest.to_string(), value));
    }

    for (section, items) in sections {
        println!("[{}]", section.yellow());
        for (key, value) in items {
            println!("  {} = {}", key.cyan(), value);
        }
        println!();
    }
}

fn generate_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();

    generate(shell, &mut cmd, name, &mut std::io::stdout());
}
