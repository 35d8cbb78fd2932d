//! Redfish Generator CLI
//!
//! Builds node models from the declaration tree and emits the schema index.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use redfish_gen::{GenConfig, Generator, JsonModelRenderer};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "redfish-gen")]
#[command(about = "Compile Redfish node declarations against the schema bundles")]
struct Cli {
    /// Explicit configuration file (layered over the default locations)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render every node and emit the schema index tree
    Generate {
        /// Asset and declaration root (overrides the configuration)
        #[arg(short, long)]
        root: Option<PathBuf>,

        /// Output root for `www/` and `generated/`
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Print the effective configuration, or save it
    Config {
        /// Write the configuration to this file instead of printing it
        #[arg(short, long)]
        save: Option<String>,
    },
    /// Export the schema dependency graph of a run to DOT format (no index
    /// tree is written)
    Graph {
        /// Output file (defaults to schemas.dot)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = GenConfig::load_from(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Command::Generate { root, out } => {
            if let Some(root) = &root {
                config.set_root(root);
            }
            if let Some(out) = out.as_ref().or(root.as_ref()) {
                config.set_output(out);
            }
            let generated_dir = config.output.generated_dir.clone();
            let write_checksums = config.output.write_checksums;

            let mut generator = Generator::new(config);
            generator.load()?;
            let mut renderer = JsonModelRenderer::new(&generated_dir);
            let summary = generator.generate_all(&mut renderer)?;
            if write_checksums {
                renderer.finish()?;
            }

            println!(
                "Generated {} nodes, {} schemas, {} files",
                summary.nodes, summary.schemas, summary.files
            );
        }
        Command::Config { save } => match save {
            Some(path) => {
                config.save(&path).with_context(|| format!("saving configuration to {}", path))?;
                println!("Saved configuration to {}", path);
            }
            None => print!("{}", toml::to_string_pretty(&config)?),
        },
        Command::Graph { output } => {
            let generated_dir = std::env::temp_dir().join("redfish-gen-graph");
            let mut generator = Generator::new(config);
            generator.load()?;
            let mut renderer = JsonModelRenderer::new(&generated_dir);
            generator.render_all(&mut renderer)?;
            generator.finalize()?;

            let output = output.unwrap_or_else(|| PathBuf::from("schemas.dot"));
            std::fs::write(&output, generator.context().registry.to_dot())?;
            println!("Exported DOT to: {}", output.display());
        }
    }

    Ok(())
}
