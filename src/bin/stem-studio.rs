use std::fs;
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use stem_studio_core::{
    mix_tracks, separate_file, EngineChoice, SeparateOptions, TrackEffectSpec,
};

#[derive(Parser)]
#[command(name = "stem-studio")]
#[command(about = "Audio stem separation and remixing tool", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split an audio file into instrument/vocal stems
    Separate {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Engine strategy: auto (external with DSP fallback), external, dsp
        #[arg(long, default_value = "auto")]
        engine: String,

        /// External model name
        #[arg(long)]
        model: Option<String>,

        /// Concurrency hint for the external engine
        #[arg(long)]
        jobs: Option<usize>,

        #[arg(short, long)]
        quiet: bool,
    },

    /// Render a JSON track list into a single mastered file
    Mix {
        /// JSON file holding an array of track descriptors
        #[arg(short, long)]
        tracks: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        #[arg(short, long)]
        quiet: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let quiet = match &cli.command {
        Commands::Separate { quiet, .. } => *quiet,
        Commands::Mix { quiet, .. } => *quiet,
    };
    init_logging(quiet);

    let result = match cli.command {
        Commands::Separate {
            input,
            output,
            engine,
            model,
            jobs,
            quiet,
        } => handle_separate(input, output, engine, model, jobs, quiet),
        Commands::Mix {
            tracks,
            output,
            quiet,
        } => handle_mix(tracks, output, quiet),
    };

    match result {
        Ok(()) => process::exit(0),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}

fn init_logging(quiet: bool) {
    let default = if quiet { "warn" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn handle_separate(
    input: PathBuf,
    output: PathBuf,
    engine: String,
    model: Option<String>,
    jobs: Option<usize>,
    quiet: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if !input.exists() {
        return Err(format!("Input file not found: {}", input.display()).into());
    }

    let mut opts = SeparateOptions {
        output_dir: output,
        ..SeparateOptions::default()
    };
    opts.engine = match engine.as_str() {
        "auto" => EngineChoice::Auto,
        "external" => EngineChoice::External,
        "dsp" => EngineChoice::Dsp,
        other => return Err(format!("Unknown engine: {other}").into()),
    };
    if let Some(model) = model {
        opts.demucs.model = model;
    }
    if let Some(jobs) = jobs {
        opts.demucs.jobs = jobs;
    }

    let result = separate_file(&input, &opts)?;

    if quiet {
        for path in result.stems.values() {
            println!("{}", path.display());
        }
    } else {
        eprintln!();
        eprintln!("Separation complete ({} Hz):", result.sample_rate);
        for (label, path) in &result.stems {
            eprintln!("  {:<7} {}", label, path.display());
        }
    }
    Ok(())
}

fn handle_mix(
    tracks: PathBuf,
    output: PathBuf,
    quiet: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let json = fs::read_to_string(&tracks)
        .map_err(|e| format!("Failed to read track list {}: {e}", tracks.display()))?;
    let specs: Vec<TrackEffectSpec> = serde_json::from_str(&json)
        .map_err(|e| format!("Invalid track list {}: {e}", tracks.display()))?;

    let result = mix_tracks(&specs, &output)?;

    if quiet {
        println!("{}", result.output_path.display());
    } else {
        eprintln!();
        eprintln!(
            "Mix complete: {} ({} tracks mixed, {} skipped)",
            result.output_path.display(),
            result.tracks_mixed,
            result.tracks_skipped
        );
    }
    Ok(())
}
