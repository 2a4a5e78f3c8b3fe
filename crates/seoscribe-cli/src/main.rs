mod config;
mod run_cmd;
mod serve_cmd;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use seoscribe_core::session::KeywordInputs;

use config::{CliOverrides, ScribeConfig};

#[derive(Parser)]
#[command(name = "seoscribe", about = "Guided six-step SEO article generator")]
struct Cli {
    /// Directory exported articles are written to (overrides SEOSCRIBE_OUTPUT_DIR)
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// Model identifier (overrides SEOSCRIBE_MODEL)
    #[arg(long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a seoscribe config file
    Init {
        /// Anthropic API key to store in the config file
        #[arg(long)]
        api_key: Option<String>,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Serve the step-by-step web UI and JSON/SSE API
    Serve {
        /// Address to bind
        #[arg(long)]
        bind: Option<String>,
        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,
    },
    /// Run every step for one keyword without the web UI
    Run {
        /// Primary keyword the article targets
        #[arg(long)]
        keyword: String,
        /// Brand or website name
        #[arg(long)]
        brand: Option<String>,
        /// Industry or niche
        #[arg(long)]
        industry: Option<String>,
        /// Target audience
        #[arg(long)]
        audience: Option<String>,
        /// Tone of voice
        #[arg(long)]
        tone: Option<String>,
        /// Free-text notes passed to the article prompt
        #[arg(long)]
        notes: Option<String>,
        /// Refinement to apply after drafting: a preset name or an
        /// instruction (repeatable, applied in order)
        #[arg(long = "refine")]
        refinements: Vec<String>,
    },
}

fn cmd_init(api_key: Option<String>, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let mut cfg = config::ConfigFile::default();
    cfg.generation.api_key = api_key;
    cfg.export.output_dir = Some(config::default_output_dir());
    cfg.server.bind = Some(config::DEFAULT_BIND.to_string());
    cfg.server.port = Some(config::DEFAULT_PORT);

    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    match &cfg.generation.api_key {
        Some(key) => {
            let prefix: String = key.chars().take(4).collect();
            println!("  generation.api_key = {prefix}...");
        }
        None => println!(
            "  generation.api_key not set; export {} or edit the file",
            config::API_KEY_ENV
        ),
    }
    if let Some(dir) = &cfg.export.output_dir {
        println!("  export.output_dir = {}", dir.display());
    }
    println!();
    println!(
        "Next: run `seoscribe serve` and open http://{}:{}",
        config::DEFAULT_BIND,
        config::DEFAULT_PORT
    );

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut overrides = CliOverrides {
        output_dir: cli.output_dir,
        model: cli.model,
        ..CliOverrides::default()
    };

    match cli.command {
        Commands::Init { api_key, force } => {
            cmd_init(api_key, force)?;
        }
        Commands::Serve { bind, port } => {
            overrides.bind = bind;
            overrides.port = port;
            let resolved = ScribeConfig::resolve(&overrides)?;
            serve_cmd::run_serve(resolved).await?;
        }
        Commands::Run {
            keyword,
            brand,
            industry,
            audience,
            tone,
            notes,
            refinements,
        } => {
            let resolved = ScribeConfig::resolve(&overrides)?;
            let defaults = KeywordInputs::new(keyword);
            let inputs = KeywordInputs {
                brand,
                industry: industry.unwrap_or(defaults.industry.clone()),
                audience: audience.unwrap_or(defaults.audience.clone()),
                tone: tone.unwrap_or(defaults.tone.clone()),
                notes,
                ..defaults
            };
            run_cmd::run_headless(resolved, inputs, &refinements).await?;
        }
    }

    Ok(())
}
