use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tabscribe::chunks::{ChunkStore, FsChunkStore};
use tabscribe::cli::{Cli, Commands};
use tabscribe::config::Config;
use tabscribe::diarize::NullDiarizer;
use tabscribe::processor::{ProcessingConfig, Processor};
use tabscribe::repo::{FsRepository, SessionRepository};
use tabscribe::session::SessionRecord;
use tabscribe::stt::whisper::{WhisperConfig, WhisperRecognizer};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Ingest { session, chunks } => ingest(&config, session, &chunks),
        Commands::Process { session } => process(&config, session),
        Commands::Show { session } => show(&config, session),
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => Config::load_or_default(Path::new("tabscribe.toml"))?,
    };
    Ok(config.with_env_overrides())
}

fn ingest(config: &Config, session: Option<Uuid>, chunk_files: &[PathBuf]) -> Result<()> {
    let store = FsChunkStore::new(config.chunks_dir());
    let repo = FsRepository::new(&config.storage.root);

    let id = session.unwrap_or_else(Uuid::new_v4);
    let mut record = SessionRecord::new(id);
    repo.create(&record)?;

    for (sequence_number, path) in chunk_files.iter().enumerate() {
        let payload = std::fs::read(path)
            .with_context(|| format!("failed to read chunk file {}", path.display()))?;
        store.put_chunk(id, sequence_number as u64, &payload)?;
    }
    store.end_session(id)?;

    record.ended_at = Some(Utc::now());
    record.total_chunks = chunk_files.len() as u64;
    repo.update(&record)?;

    println!("{}", id);
    Ok(())
}

fn process(config: &Config, session: Uuid) -> Result<()> {
    let recognizer = WhisperRecognizer::new(WhisperConfig {
        model_path: config.stt.model_path.clone(),
        threads: None,
    })
    .context("failed to load recognition model")?;

    let processor = Processor::new(
        Arc::new(FsChunkStore::new(config.chunks_dir())),
        Arc::new(FsRepository::new(&config.storage.root)),
        Arc::new(recognizer),
        Arc::new(NullDiarizer::new()),
        ProcessingConfig {
            recordings_dir: config.recordings_dir(),
            language: config.stt.language.clone(),
            max_attempts: config.processing.max_attempts,
            retry_backoff: Duration::from_secs(config.processing.retry_backoff_secs),
        },
    );

    let report = processor.process(session)?;
    println!(
        "session {} {}: {} speaker(s), {} utterance(s)",
        report.session_id, report.status, report.total_speakers, report.total_utterances
    );
    Ok(())
}

fn show(config: &Config, session: Uuid) -> Result<()> {
    let repo = FsRepository::new(&config.storage.root);
    let Some(transcript) = repo.load_transcript(session)? else {
        anyhow::bail!("no transcript for session {}", session);
    };

    println!(
        "language: {}  speakers: {}  utterances: {}  confidence: {:.2}",
        transcript.language,
        transcript.total_speakers,
        transcript.total_utterances,
        transcript.confidence_avg
    );
    for utterance in &transcript.utterances {
        println!(
            "[{:>7.2}s - {:>7.2}s] {}: {}",
            utterance.start, utterance.end, utterance.speaker, utterance.text
        );
    }
    Ok(())
}
