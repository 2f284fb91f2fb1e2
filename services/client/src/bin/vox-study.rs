//! services/client/src/bin/vox-study.rs

use clap::{Parser, Subcommand};
use client_lib::{
    adapters::{HttpStudyApi, JsonFileStorage},
    app::{
        quiz_task::{run_quiz, SESSION_EXPIRED},
        render,
        study_task::run_study,
        Outcome, PanelKind, Viewer, ViewerOptions,
    },
    config::{normalize_base_url, Config, ConfigError},
    error::ClientError,
};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vox_study_core::domain::PlaybackRate;
use vox_study_core::ports::PortError;

#[derive(Debug, Parser)]
#[command(name = "vox-study", version, about = "Study slide decks and PDFs with an AI tutor")]
struct Cli {
    /// Backend base URL (overrides VOX_API_BASE).
    #[arg(long, global = true)]
    api_base: Option<String>,

    /// Model for this run only; the saved selection is left unchanged.
    #[arg(long, global = true)]
    model: Option<String>,

    /// Document id. Defaults to the most recently opened document.
    #[arg(long, global = true)]
    doc: Option<String>,

    /// Page to work on, starting at 1.
    #[arg(long, global = true)]
    page: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Upload a PDF or PowerPoint file.
    Upload {
        file: PathBuf,
        /// Display name for the document.
        #[arg(long)]
        name: Option<String>,
    },
    /// List the pages of a document.
    Pages,
    /// Explain the current page.
    Explain,
    /// Ask a question about the document.
    Ask {
        question: String,
        /// Number of passages the backend should retrieve.
        #[arg(long)]
        k: Option<u32>,
        /// Restrict the question to the current page.
        #[arg(long)]
        page_scoped: bool,
    },
    /// Show the flashcards for the current page.
    Flashcards,
    /// Take the quiz for the current page.
    Quiz,
    /// Show the cheatsheet for the current page.
    Cheatsheet,
    /// Read text aloud into an audio file.
    Speak {
        text: String,
        #[arg(long)]
        out: PathBuf,
        /// Playback rate to note with the clip: 1x, 1.25x or 1.5x.
        #[arg(long, default_value = "1x")]
        rate: String,
    },
    /// Transcribe a recorded question.
    Transcribe { file: PathBuf },
    /// Save the rendered image of the current page.
    Image {
        #[arg(long)]
        out: PathBuf,
    },
    /// List recently opened documents.
    Recent,
    /// Show or change saved preferences.
    Prefs {
        #[command(subcommand)]
        action: Option<PrefsAction>,
    },
    /// Interactive study session.
    Study,
}

#[derive(Debug, Subcommand)]
enum PrefsAction {
    Show,
    /// Toggle between light and dark.
    Theme,
    /// Toggle the dyslexia-friendly font.
    Dyslexia,
    /// Toggle high contrast.
    Contrast,
    /// Set the text scale: 100, 115 or 130.
    Scale { percent: u16 },
    /// Select the default model.
    Model { name: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Command failed.");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), ClientError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let mut config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Some(raw) = &cli.api_base {
        config.api_base =
            normalize_base_url(raw).ok_or_else(|| ConfigError::InvalidValue("--api-base".to_string(), raw.clone()))?;
    }
    if let Some(model) = cli.model.clone() {
        config.model_override = Some(model);
    }
    if let Command::Ask { k: Some(k), .. } = &cli.command {
        config.qa_top_k = *k;
    }
    info!(api_base = %config.api_base, "Configuration loaded.");

    // --- 2. Initialize Adapters ---
    let api = Arc::new(HttpStudyApi::new(config.api_base.clone()).map_err(|e| ClientError::Http(e.to_string()))?);
    let storage = Arc::new(match &config.state_dir {
        Some(dir) => JsonFileStorage::in_dir(dir),
        None => JsonFileStorage::platform_default()?,
    });
    let mut viewer = Viewer::new(api, storage, ViewerOptions::from(&config));
    let mut out = std::io::stdout();

    // --- 3. Dispatch ---
    match cli.command {
        Command::Upload { ref file, ref name } => {
            let uploaded = viewer.upload_path(file, name.as_deref()).await?;
            writeln!(
                out,
                "Uploaded {} as {} ({} pages)",
                uploaded.name, uploaded.doc_id, uploaded.page_count
            )?;
        }
        Command::Recent => writeln!(out, "{}", render::recent_documents(viewer.store().recent_documents()))?,
        Command::Prefs { ref action } => {
            match action {
                None | Some(PrefsAction::Show) => {}
                Some(PrefsAction::Theme) => viewer.toggle_theme()?,
                Some(PrefsAction::Dyslexia) => viewer.toggle_dyslexia_font()?,
                Some(PrefsAction::Contrast) => viewer.toggle_high_contrast()?,
                Some(PrefsAction::Scale { percent }) => viewer.set_text_scale_percent(*percent)?,
                Some(PrefsAction::Model { name }) => viewer.set_selected_model(name)?,
            }
            writeln!(out, "{}", render::preferences(viewer.store().ui()))?;
        }
        Command::Speak { ref text, out: ref path, ref rate } => {
            let rate: PlaybackRate = rate.parse()?;
            viewer.set_audio_rate(rate);
            let clip = viewer.speak(text).await?;
            tokio::fs::write(path, &clip.bytes).await?;
            writeln!(out, "Saved {} bytes of {} to {}", clip.len(), clip.content_type, path.display())?;
            writeln!(out, "{}", render::audio(viewer.store().audio()))?;
        }
        Command::Transcribe { ref file } => {
            let text = viewer.transcribe(file).await?;
            writeln!(out, "{text}")?;
        }
        ref command => {
            open_session(&mut viewer, &cli).await?;
            run_document_command(&mut viewer, command, &mut out).await?;
        }
    }
    Ok(())
}

/// Opens `--doc` (or the most recent document) and moves to `--page`.
async fn open_session(viewer: &mut Viewer, cli: &Cli) -> Result<(), ClientError> {
    let doc_id = match &cli.doc {
        Some(doc_id) => doc_id.clone(),
        None => viewer
            .store()
            .recent_documents()
            .first()
            .map(|d| d.doc_id.clone())
            .ok_or(ClientError::NoDocument)?,
    };
    if let Err(e) = viewer.open_document(&doc_id, None).await {
        if e.port().is_some_and(PortError::is_document_not_found) {
            eprintln!("{SESSION_EXPIRED}");
        }
        return Err(e);
    }

    if let Some(page) = cli.page {
        let count = viewer.store().document().map_or(0, |d| d.page_count());
        if !(1..=count).contains(&page) {
            return Err(PortError::invalid_input(format!("Page {page} is out of range (1-{count})")).into());
        }
        viewer.jump_to_display_page(page);
    }
    Ok(())
}

/// Turns a panel outcome into a result, reporting a lost document.
fn applied(outcome: Outcome) -> Result<(), ClientError> {
    match outcome {
        Outcome::Applied(_) => Ok(()),
        Outcome::Failed(_, e) => Err(e.into()),
        Outcome::SessionExpired(e) => {
            eprintln!("{SESSION_EXPIRED}");
            Err(e.into())
        }
        Outcome::Discarded(..) => Err(PortError::cancelled().into()),
    }
}

async fn run_document_command<W: Write>(viewer: &mut Viewer, command: &Command, out: &mut W) -> Result<(), ClientError> {
    match command {
        Command::Pages => {
            let doc = viewer.store().document().ok_or(ClientError::NoDocument)?;
            write!(out, "{}", render::page_list(doc))?;
        }
        Command::Explain => {
            applied(viewer.load(PanelKind::Explanation).await?)?;
            if let Some(explanation) = viewer.explanation() {
                writeln!(out, "{}", render::explanation(explanation))?;
            }
        }
        Command::Ask {
            question, page_scoped, ..
        } => {
            applied(viewer.ask(question, *page_scoped).await?)?;
            if let Some(answer) = viewer.answer(*page_scoped) {
                writeln!(out, "{}", render::answer(answer))?;
            }
        }
        Command::Flashcards => {
            applied(viewer.load(PanelKind::Flashcards).await?)?;
            if let Some(deck) = viewer.flashcards_mut() {
                if deck.is_empty() {
                    writeln!(out, "{}", render::flashcard(deck))?;
                }
                for _ in 0..deck.len() {
                    if let Some(card) = deck.current() {
                        writeln!(out, "Q: {}\nA: {}\n", card.q, card.a)?;
                    }
                    deck.next();
                }
            }
        }
        Command::Quiz => run_quiz(viewer, BufReader::new(tokio::io::stdin()), out).await?,
        Command::Cheatsheet => {
            applied(viewer.load(PanelKind::Cheatsheet).await?)?;
            if let Some(content) = viewer.cheatsheet() {
                writeln!(out, "{content}")?;
            }
        }
        Command::Image { out: path } => {
            let bytes = viewer.page_image().await?;
            tokio::fs::write(path, &bytes).await?;
            writeln!(out, "Saved page image ({} bytes) to {}", bytes.len(), path.display())?;
        }
        Command::Study => run_study(viewer, BufReader::new(tokio::io::stdin()), out).await?,
        Command::Upload { .. }
        | Command::Recent
        | Command::Prefs { .. }
        | Command::Speak { .. }
        | Command::Transcribe { .. } => {}
    }
    Ok(())
}
