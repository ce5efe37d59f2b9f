use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use emotion_asr::transcription::ModelSize;
use emotion_asr::{AnalysisRecord, AnalysisRequest, AudioInput, Config, EmotionPipeline, ModelRegistry};

/// Emotion-aware speech transcription from an audio file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Audio file to analyze (WAV, MP3, FLAC, ...)
    #[arg(long)]
    audio_file: PathBuf,

    /// Whisper model size: tiny, base, small, medium, large
    #[arg(long)]
    model_size: Option<ModelSize>,

    /// Force the transcription language (e.g. "en"); "en" uses the English-only model
    #[arg(long)]
    force_lang: Option<String>,

    /// Print every emotion prediction with its score
    #[arg(long)]
    debug_emo: bool,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,

    /// Config file (default: ~/.emotion-asr/config.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding the model files
    #[arg(long)]
    models_dir: Option<PathBuf>,

    /// Number of threads for inference
    #[arg(long)]
    threads: Option<i32>,

    /// Timeout for each model call, in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(size) = self.model_size {
            config.whisper_model = size;
        }
        if let Some(lang) = &self.force_lang {
            let lang = lang.trim().to_lowercase();
            config.language = (!lang.is_empty() && lang != "auto").then_some(lang);
        }
        if let Some(dir) = &self.models_dir {
            config.models_dir = Some(dir.clone());
        }
        if let Some(threads) = self.threads {
            config.n_threads = threads;
        }
        if let Some(secs) = self.timeout_secs {
            config.model_timeout_secs = secs;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => Config::default_config_path()?,
    };
    let mut config = Config::load(&config_path)?;
    args.apply(&mut config);

    if !args.audio_file.exists() {
        anyhow::bail!("Audio file not found: {}", args.audio_file.display());
    }

    info!("Emotion-aware ASR starting...");
    info!("Audio: {:?}", args.audio_file);
    info!("Model: {}", config.whisper_model);
    info!("Language: {}", config.language.as_deref().unwrap_or("auto"));

    let registry = ModelRegistry::default();
    let pipeline = EmotionPipeline::from_config(&config, &registry)?;
    let request = AnalysisRequest {
        debug: args.debug_emo,
        ..AnalysisRequest::from_config(&config)
    };

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling analysis");
            ctrl_c.cancel();
        }
    });

    let record = pipeline
        .analyze(AudioInput::Path(args.audio_file.clone()), &request, cancel)
        .await
        .with_context(|| format!("Failed to analyze {}", args.audio_file.display()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        print_report(&record, args.debug_emo);
    }

    info!(
        "Done in {:.1}s",
        Duration::from_millis(record.elapsed_ms).as_secs_f32()
    );
    Ok(())
}

fn print_report(record: &AnalysisRecord, debug: bool) {
    let result = &record.result;

    println!("\nRunning Emotion-Aware ASR");
    println!("[ASR] Transcript: {}", result.transcript);
    println!(
        "[ASR] Detected language (text-based): {} | Whisper: {}",
        result.detected_language.as_deref().unwrap_or("unknown"),
        result.model_language.as_deref().unwrap_or("unknown"),
    );
    println!("[ASR] Resolved language: {}", result.resolved_language_or_unknown());

    if debug {
        println!("\n[DEBUG] Audio predictions:");
        for prediction in &result.audio.predictions {
            println!("  {}: {:.2}", prediction.label(), prediction.score);
        }
        println!("[DEBUG] Text predictions:");
        for prediction in &result.text.predictions {
            println!("  {}: {:.2}", prediction.label(), prediction.score);
        }
    }

    println!("\n[EMO] Audio Emotion:");
    println!("  {} ({:.2})", result.audio.final_label, result.audio.final_score);

    println!("\n[EMO] Text Emotion:");
    println!("  {} ({:.2})", result.text.final_label, result.text.final_score);

    println!("\nFinal Annotated Transcript:");
    println!("{}", result);
}
