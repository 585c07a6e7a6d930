//! Template Composer CLI
//!
//! Usage:
//!   template-composer --views <DIR> [OPTIONS] <TEMPLATE>
//!
//! Options:
//!   -v, --views <DIR>     Views directory
//!   -c, --config <FILE>   Configuration file (TOML format)
//!   -l, --layout <NAME>   Layout to render the template through
//!   -a, --args <FILE>     Render arguments (JSON object)
//!   -m, --method <M>      Request method used for layout selection
//!   -h, --help            Print help

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use serde_json::{Map, Value};
use tracing_subscriber::EnvFilter;

use template_composer::{load_views, ComposerConfig, Diagnostic, RenderContext};

#[derive(Parser)]
#[command(name = "template-composer")]
#[command(about = "Render a template through its layout")]
struct Cli {
    /// Template to render, relative to the views directory
    template: String,

    /// Views directory
    #[arg(short, long)]
    views: PathBuf,

    /// Configuration file (TOML format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Layout to render the template through, overriding the configuration
    #[arg(short, long)]
    layout: Option<String>,

    /// Render arguments (JSON object)
    #[arg(short, long)]
    args: Option<PathBuf>,

    /// Request method used for layout selection
    #[arg(short, long, default_value = "GET")]
    method: String,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => match ComposerConfig::from_file(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config '{}': {}", path.display(), e);
                process::exit(1);
            }
        },
        None => ComposerConfig::default(),
    };
    if let Some(layout) = &cli.layout {
        config.layouts.insert(&cli.template, layout);
    }

    let mut ctx = match &cli.args {
        Some(path) => match read_args(path) {
            Ok(args) => RenderContext::from(args),
            Err(e) => {
                eprintln!("Error reading args '{}': {}", path.display(), e);
                process::exit(1);
            }
        },
        None => RenderContext::new(),
    };

    let composer = match load_views(&cli.views, config) {
        Ok(c) => c,
        Err(e) => fail(&Diagnostic::from(&e)),
    };

    match composer.render_for_method(&cli.template, &cli.method, &mut ctx) {
        Ok(html) => {
            if let Err(e) = io::stdout().write_all(&html) {
                eprintln!("Error writing output: {}", e);
                process::exit(1);
            }
        }
        Err(diagnostic) => fail(&diagnostic),
    }
}

fn read_args(path: &Path) -> Result<Map<String, Value>, Box<dyn std::error::Error>> {
    let text = fs::read_to_string(path)?;
    match serde_json::from_str(&text)? {
        Value::Object(args) => Ok(args),
        _ => Err("expected a JSON object".into()),
    }
}

fn fail(diagnostic: &Diagnostic) -> ! {
    eprintln!("{}", diagnostic.report());
    process::exit(1);
}
