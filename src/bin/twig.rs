use anyhow::{bail, Context as _};
use clap::Parser;
use std::path::PathBuf;
use twig::prelude::*;

#[derive(Parser)]
#[command(name = "twig")]
#[command(about = "Render a Twig template against JSON data")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Template file to render
    template: PathBuf,

    /// JSON file with the assigns
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// Engine configuration (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Error mode (lax, warn, strict)
    #[arg(long)]
    error_mode: Option<String>,

    /// Taint mode (off, warn, error)
    #[arg(long)]
    taint_mode: Option<String>,

    /// Annotate diagnostics with line numbers
    #[arg(long)]
    line_numbers: bool,

    /// Fail on the first recorded render error
    #[arg(long)]
    strict: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    if let Some(mode) = &cli.error_mode {
        config.error_mode = mode.parse()?;
    }
    if let Some(mode) = &cli.taint_mode {
        config.taint_mode = mode.parse()?;
    }
    config.line_numbers |= cli.line_numbers;

    // Partials resolve next to the template unless configured otherwise
    if config.templates.root.is_none() {
        config.templates.root = cli.template.parent().map(|dir| dir.to_path_buf());
    }
    config.install();

    let source = std::fs::read_to_string(&cli.template)
        .with_context(|| format!("Failed to read template '{}'", cli.template.display()))?;

    let assigns = match &cli.data {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read data file '{}'", path.display()))?;
            let json: serde_json::Value = serde_json::from_str(&content)
                .with_context(|| format!("Invalid JSON in '{}'", path.display()))?;
            Value::from(json)
        }
        None => Value::Nil,
    };

    let template = Template::parse(&source)?;
    for warning in template.warnings() {
        eprintln!("warning: {}", warning);
    }

    let rendered = template.render_with(&assigns, RenderOptions::new())?;
    for warning in &rendered.warnings {
        eprintln!("warning: {}", warning);
    }
    for error in &rendered.errors {
        eprintln!("error: {}", error);
    }

    if cli.strict && !rendered.errors.is_empty() {
        bail!("{} render error(s)", rendered.errors.len());
    }

    print!("{}", rendered.output);
    Ok(())
}
