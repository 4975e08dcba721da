// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::info;

use beatlight::config::PipelineConfig;
use beatlight::llm::LlmClient;
use beatlight::logging;
use beatlight::pipeline::{Pipeline, PredictOptions, SongOutcome};
use beatlight::report::{validate_file, ComparisonReport};
use beatlight::timeline::list_songs;

#[derive(Parser)]
#[command(author, version, about = "Stage light effect prediction", long_about = None)]
struct Cli {
    /// Configuration file (YAML or TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Predict light effects for one song or all songs
    Predict(PredictArgs),

    /// Audit an effects timeline, optionally against a reference
    Validate {
        /// Timeline to audit
        file: PathBuf,

        /// Reference timeline to compare with
        reference: Option<PathBuf>,
    },

    /// Compare a predicted timeline with a reference timeline
    Compare {
        predicted: PathBuf,
        reference: PathBuf,
    },

    /// List songs available in the beats directory
    List,
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct Target {
    /// Song name (e.g. 24KMagic)
    #[arg(long)]
    song: Option<String>,

    /// Process every song in the beats directory
    #[arg(long)]
    all: bool,
}

#[derive(Args)]
struct PredictArgs {
    #[command(flatten)]
    target: Target,

    /// Compare with the song's groundtruth afterwards
    #[arg(long)]
    compare: bool,

    /// Model name
    #[arg(long)]
    model: Option<String>,

    /// Do not use cached lyrics
    #[arg(long)]
    no_lyrics: bool,

    /// Beats generated at once
    #[arg(long)]
    max_concurrent: Option<usize>,

    /// Neighboring beats on each side used as context
    #[arg(long)]
    window_size: Option<usize>,

    /// Attempts per beat
    #[arg(long)]
    max_retries: Option<u32>,

    /// Require at least one active effect on every beat
    #[arg(long)]
    no_empty_beats: bool,
}

impl PredictArgs {
    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(model) = &self.model {
            config.llm.model = model.clone();
        }
        if let Some(n) = self.max_concurrent {
            config.generation.max_concurrent = n;
        }
        if let Some(n) = self.window_size {
            config.generation.window_size = n;
        }
        if let Some(n) = self.max_retries {
            config.generation.max_retries = n;
        }
        if self.no_empty_beats {
            config.generation.allow_empty_beats = false;
        }
    }
}

fn print_outcome(outcome: &SongOutcome, limit: usize) {
    println!("{}", outcome.report.render(limit));
    let fallbacks = outcome.fallback_count();
    if fallbacks > 0 {
        println!(
            "\n  {}/{} beats fell back to empty []",
            fallbacks,
            outcome.results.len()
        );
    }
    if let Some(comparison) = &outcome.comparison {
        println!("\n--- COMPARISON WITH GROUNDTRUTH ---");
        println!("{}", comparison.render(limit));
    }
}

async fn predict(args: PredictArgs, mut config: PipelineConfig) -> Result<()> {
    args.apply(&mut config);
    let limit = config.report.max_listed_violations;

    // Fails on a missing API key before any beat is attempted
    let client = LlmClient::from_config(&config.llm)?;
    info!("Using model {} at {}", client.model(), client.endpoint());

    let pipeline = Pipeline::new(config, Arc::new(client));
    let options = PredictOptions {
        use_lyrics: !args.no_lyrics,
        compare: args.compare,
    };

    let outcomes = match &args.target.song {
        Some(song) => vec![pipeline.process_song(song, &options).await?],
        None => pipeline.process_all(&options).await?,
    };
    for outcome in &outcomes {
        print_outcome(outcome, limit);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = PipelineConfig::resolve(cli.config.as_deref())?;
    logging::init(&config.logging, cli.verbose)?;

    match cli.command {
        Commands::Predict(args) => predict(args, config).await?,
        Commands::Validate { file, reference } => {
            let report = validate_file(&file)?;
            println!("{}", report.render(report.violations.len()));
            if let Some(reference) = reference {
                println!("\n--- COMPARISON ---");
                let comparison = ComparisonReport::from_files(&file, &reference)?;
                println!("{}", comparison.render(config.report.max_listed_violations));
            }
        }
        Commands::Compare {
            predicted,
            reference,
        } => {
            let comparison = ComparisonReport::from_files(&predicted, &reference)?;
            println!("{}", comparison.render(config.report.max_listed_violations));
        }
        Commands::List => {
            let songs = list_songs(&config.paths.beats_dir)?;
            if songs.is_empty() {
                println!("No songs found in {:?}", config.paths.beats_dir);
            }
            for song in songs {
                println!("{}", song);
            }
        }
    }
    Ok(())
}
