use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use dotenvy::dotenv;
use teloxide::prelude::*;
use teloxide::update_listeners::Polling;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use reelbot::cli::{Cli, Commands};
use reelbot::session::{DownloadStatus, SessionContext};
use reelbot::telegram::{create_bot, schema, setup_bot_commands, HandlerDeps, TelegramSink};
use reelcore::core::process::tool_version;
use reelcore::core::utils::human_size;
use reelcore::core::{init_logger, log_tool_configuration};
use reelcore::download::source::PROGRESS_CHANNEL_CAPACITY;
use reelcore::download::{
    check_upload_size, parse_media_link, DownloadError, FfmpegMuxer, Muxer, RetrievalJob, RetrievedMedia, Retriever,
    ScratchSpace, YtDlpRetriever,
};
use reelcore::Settings;

/// Long-poll timeout for getUpdates
const POLL_TIMEOUT: Duration = Duration::from_secs(60);

/// How long in-flight sessions get to report their cancellation on shutdown
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Main entry point
///
/// Parses CLI arguments and dispatches to the appropriate subcommand.
///
/// # Errors
/// Returns an error if initialization fails (configuration, logging, bot creation).
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // Log panics with their location; sessions catch their own panics and keep the bot alive
    std::panic::set_hook(Box::new(|panic_info| {
        log::error!("Panic caught: {:?}", panic_info);
        if let Some(location) = panic_info.location() {
            log::error!("Panic at {}:{}:{}", location.file(), location.line(), location.column());
        }
        if let Some(msg) = panic_info.payload().downcast_ref::<&str>() {
            log::error!("Panic message: {}", msg);
        }
    }));

    // Load environment variables from .env if present
    let _ = dotenv();

    let settings = Settings::load()?;
    init_logger(&settings.log_file_path)?;

    match cli.command {
        Some(Commands::Run) | None => run_bot(settings).await,
        Some(Commands::Fetch { url, output }) => run_fetch(settings, &url, &output).await,
        Some(Commands::CheckTools) => run_check_tools(&settings).await,
    }
}

/// Runs the bot until Ctrl-C or SIGTERM, then drains in-flight sessions.
async fn run_bot(settings: Settings) -> Result<()> {
    log_tool_configuration(&settings);

    let bot = create_bot(&settings)?;
    fs_err::create_dir_all(&settings.temp_files_dir)?;

    if let Err(e) = setup_bot_commands(&bot).await {
        log::warn!("Failed to register bot commands: {}", e);
    }

    let shutdown = CancellationToken::new();
    let sink = Arc::new(TelegramSink::new(bot.clone()));
    let ctx = Arc::new(SessionContext::from_settings(&settings, sink, shutdown.clone()));

    let listener = Polling::builder(bot.clone())
        .timeout(POLL_TIMEOUT)
        .drop_pending_updates()
        .build();

    let mut dispatcher = Dispatcher::builder(bot, schema(HandlerDeps::new(Arc::clone(&ctx))))
        .enable_ctrlc_handler()
        .build();

    let shutdown_token = dispatcher.shutdown_token();
    tokio::spawn(async move {
        wait_for_terminate().await;
        log::info!("SIGTERM received, stopping dispatcher");
        if let Ok(stopped) = shutdown_token.shutdown() {
            stopped.await;
        }
    });

    log::info!("================================================");
    log::info!("📡 Starting bot in long polling mode");
    log::info!("================================================");

    dispatcher
        .dispatch_with_listener(
            listener,
            LoggingErrorHandler::with_custom_text("An error from the update listener"),
        )
        .await;

    log::info!("Dispatcher stopped, cancelling {} in-flight session(s)", ctx.tracker.len());
    shutdown.cancel();
    ctx.tracker.close();
    if tokio::time::timeout(SHUTDOWN_GRACE, ctx.tracker.wait()).await.is_err() {
        log::warn!("Sessions did not finish within {}s", SHUTDOWN_GRACE.as_secs());
    }

    log::info!("Shutdown complete");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_terminate() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            log::warn!("Cannot listen for SIGTERM: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_terminate() {
    std::future::pending::<()>().await;
}

/// Downloads one link into `output` without Telegram.
async fn run_fetch(settings: Settings, url: &str, output: &Path) -> Result<()> {
    let link = parse_media_link(url)?;
    let retriever = YtDlpRetriever::from_settings(&settings);
    let muxer = FfmpegMuxer::from_settings(&settings);

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let scratch = ScratchSpace::create(&settings.temp_files_dir, "cli")?;
    let job = RetrievalJob {
        link,
        scratch_dir: scratch.path().to_path_buf(),
        output_template: scratch.output_template(),
    };

    let (progress_tx, mut progress_rx) = mpsc::channel(PROGRESS_CHANNEL_CAPACITY);
    let printer = tokio::spawn(async move {
        while let Some(info) = progress_rx.recv().await {
            let text = DownloadStatus::from_progress(&info).to_message();
            log::info!("{}", text.replace('\n', " "));
        }
    });

    let media = retriever.retrieve(&job, progress_tx, &cancel).await;
    let _ = printer.await;

    let file = match media? {
        RetrievedMedia::Muxed(path) => path,
        RetrievedMedia::Separate { video, audio } => muxer.merge(&video, &audio, &cancel).await?,
    };

    match check_upload_size(&file, settings.telegram_max_bytes).await {
        Ok(size) => log::info!("{} fits the upload limit", human_size(size)),
        Err(DownloadError::Oversized { size, limit, .. }) => log::warn!(
            "{} is over the upload limit of {}; the bot would refuse it",
            human_size(size),
            human_size(limit)
        ),
        Err(e) => return Err(e.into()),
    }

    let destination = move_into(&file, output)?;
    scratch.close()?;
    println!("{}", destination.display());
    Ok(())
}

/// Moves `file` into `dir`, copying when a rename crosses filesystems.
fn move_into(file: &Path, dir: &Path) -> Result<PathBuf> {
    fs_err::create_dir_all(dir)?;
    let name = file
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("{} has no file name", file.display()))?;
    let destination = dir.join(name);

    if fs_err::rename(file, &destination).is_err() {
        fs_err::copy(file, &destination)?;
        fs_err::remove_file(file)?;
    }
    Ok(destination)
}

/// Prints tool versions; fails when either tool is unusable.
async fn run_check_tools(settings: &Settings) -> Result<()> {
    let mut missing = Vec::new();

    for (bin, flag) in [(&settings.ytdl_bin, "--version"), (&settings.ffmpeg_bin, "-version")] {
        match tool_version(bin, flag).await {
            Ok(version) => println!("✅ {}: {}", bin, version),
            Err(e) => {
                println!("❌ {}: {}", bin, e);
                missing.push(bin.as_str());
            }
        }
    }

    if !missing.is_empty() {
        anyhow::bail!("Unusable tools: {}", missing.join(", "));
    }
    Ok(())
}
