use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use stage_power::config::{Config, DEFAULT_CONFIG_PATH};
use stage_power::crest::parse_curve;
use stage_power::domain::RigDocument;
use stage_power::telemetry::init_tracing;
use stage_power::RigWorkspace;

#[derive(Parser)]
#[command(name = "stage-power")]
#[command(about = "Power distribution calculator for live-audio rigs", long_about = None)]
struct Cli {
    /// Config file (TOML)
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH, global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recalculate a rig file and print it with a fresh report
    Recalc {
        /// Rig document (JSON)
        rig: PathBuf,

        /// Print the derate breakdown of every generator instead of JSON
        #[arg(short, long)]
        breakdown: bool,
    },

    /// Build a crest curve from a formula in `f`
    Formula {
        /// Expression, e.g. "6 + 2*log10(f/20)"
        expr: String,
    },

    /// Validate a rig file and list topology violations
    Check {
        /// Rig document (JSON)
        rig: PathBuf,
    },

    /// Print the effective configuration as TOML
    Config,
}

/// Read a rig document, falling back to the configured settings when the
/// file carries none
fn read_document(path: &Path, cfg: &Config) -> Result<RigDocument> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let value: serde_json::Value =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    let has_settings = value.get("settings").is_some();

    let mut doc: RigDocument = serde_json::from_value(value)?;
    if !has_settings {
        doc.settings = cfg.defaults.clone();
    }
    doc.settings = cfg.effective_settings(doc.settings);
    Ok(doc)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = Config::load_from(&cli.config)?;
    init_tracing(&cfg.engine.log_filter);

    match cli.command {
        Commands::Recalc { rig, breakdown } => {
            let doc = read_document(&rig, &cfg)?;
            let ws = RigWorkspace::import_document(doc)?;
            info!(report = %ws.report(), "Recalculated");

            if breakdown {
                for gen in &ws.rig().generators {
                    println!("{}", gen.name);
                    for line in ws.derate_breakdown(gen.id).unwrap_or_default() {
                        println!("  {line}");
                    }
                }
            } else {
                println!("{}", ws.to_json()?);
            }
        }
        Commands::Formula { expr } => {
            let generated = parse_curve(&expr).with_context(|| format!("formula `{expr}`"))?;
            for p in generated.curve.points() {
                println!("{:>8} Hz  {:>5.1} dB", p.frequency, p.crest_factor);
            }
            for w in &generated.warnings {
                warn!("{}", w);
                println!("warning: {w}");
            }
        }
        Commands::Check { rig } => {
            let doc = read_document(&rig, &cfg)?;
            let violations = doc.rig.graph().check_invariants();
            for v in &violations {
                println!("violation: {v}");
            }
            doc.settings.validate().context("settings")?;
            doc.rig.validate()?;
            println!(
                "ok: {} generators, {} amplifiers, {} speakers, {} powered speakers, {} connections",
                doc.rig.generators.len(),
                doc.rig.amplifiers.len(),
                doc.rig.speakers.len(),
                doc.rig.powered_speakers.len(),
                doc.rig.connections.len()
            );
        }
        Commands::Config => {
            print!("{}", toml::to_string_pretty(&cfg)?);
        }
    }

    Ok(())
}
