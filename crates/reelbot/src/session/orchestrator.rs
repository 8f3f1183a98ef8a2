//! Session orchestration
//!
//! One session per accepted link:
//! `Received → Validating → Downloading → [Merging] → SizeChecking → Sending → Done`,
//! with `Failed(category)` reachable from every non-terminal state.
//! The session owns the request's scratch space and its single status message.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use reelcore::core::utils::human_size;
use reelcore::download::source::PROGRESS_CHANNEL_CAPACITY;
use reelcore::download::{
    check_upload_size, parse_media_link, DownloadError, FfmpegMuxer, MediaLink, Muxer, ProgressThrottle, RetrievalJob,
    RetrievedMedia, Retriever, ScratchSpace, YtDlpRetriever,
};
use reelcore::{FailureCategory, Settings};
use teloxide::types::{ChatId, MessageId};
use tokio::sync::{mpsc, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::Instrument;
use uuid::Uuid;

use super::messages::{self, BUSY};
use super::policy::{ChatGate, GateTicket};
use super::sink::{ChatActivity, ChatSink, MediaKind};
use super::status::{self, DownloadStatus};

/// Shared dependencies of every session.
#[derive(Clone)]
pub struct SessionContext {
    pub sink: Arc<dyn ChatSink>,
    pub retriever: Arc<dyn Retriever>,
    pub muxer: Arc<dyn Muxer>,
    pub gate: ChatGate,
    pub scratch_root: PathBuf,
    pub max_upload_bytes: u64,
    pub upload_timeout: Duration,
    pub progress_interval: Duration,
    /// Cancelled on shutdown; every session runs under a child token
    pub shutdown: CancellationToken,
    /// Spawned sessions, awaited on shutdown
    pub tracker: TaskTracker,
}

impl SessionContext {
    /// Production context: yt-dlp and ffmpeg driven by `settings`.
    pub fn from_settings(settings: &Settings, sink: Arc<dyn ChatSink>, shutdown: CancellationToken) -> Self {
        Self {
            sink,
            retriever: Arc::new(YtDlpRetriever::from_settings(settings)),
            muxer: Arc::new(FfmpegMuxer::from_settings(settings)),
            gate: ChatGate::new(settings.per_chat_policy),
            scratch_root: settings.temp_files_dir.clone(),
            max_upload_bytes: settings.telegram_max_bytes,
            upload_timeout: settings.upload_timeout(),
            progress_interval: settings.progress_edit_interval(),
            shutdown,
            tracker: TaskTracker::new(),
        }
    }
}

/// One inbound link, from receipt to response.
#[derive(Debug, Clone)]
pub struct Request {
    pub id: Uuid,
    pub chat_id: ChatId,
    /// Text as submitted, trimmed
    pub url: String,
    pub created_at: DateTime<Utc>,
}

impl Request {
    pub fn new(chat_id: ChatId, text: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            chat_id,
            url: text.trim().to_string(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Received,
    Validating,
    Downloading,
    Merging,
    SizeChecking,
    Sending,
    Done,
    Failed(FailureCategory),
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Failed(category) => write!(f, "Failed({})", category),
            other => write!(f, "{:?}", other),
        }
    }
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Done | SessionState::Failed(_))
    }

    /// Whether `next` may follow `self`.
    pub fn can_advance_to(self, next: SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (from, Failed(_)) => !from.is_terminal(),
            (Received, Validating)
            | (Validating, Downloading)
            | (Downloading, Merging)
            | (Downloading, SizeChecking)
            | (Merging, SizeChecking)
            | (SizeChecking, Sending)
            | (Sending, Done) => true,
            _ => false,
        }
    }
}

/// What became of an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Not from a private chat; nothing was sent
    Ignored,
    InvalidLink,
    /// Refused by the per-chat policy
    Busy,
    /// A session was spawned for this request
    Started(Uuid),
}

/// Entry point for a text message.
///
/// Gates on chat type, validates the link, applies the per-chat policy and
/// spawns the session on the context's tracker.
pub async fn handle_text(ctx: &Arc<SessionContext>, chat_id: ChatId, is_private: bool, text: &str) -> Admission {
    if !is_private {
        log::debug!("Ignoring message from non-private chat {}", chat_id);
        return Admission::Ignored;
    }

    let mut session = Session::new(Arc::clone(ctx), Request::new(chat_id, text));
    session.advance(SessionState::Validating);

    let link = match parse_media_link(text) {
        Ok(link) => link,
        Err(e) => {
            log::info!("Chat {} sent an unsupported link: {}", chat_id, e);
            session.fail(&e).await;
            return Admission::InvalidLink;
        }
    };

    let Some(ticket) = ctx.gate.admit(chat_id) else {
        log::info!("Chat {} is busy, refusing {}", chat_id, link.url);
        if let Err(e) = ctx.sink.send_text(chat_id, BUSY).await {
            log::warn!("Failed to send busy notice to {}: {}", chat_id, e);
        }
        return Admission::Busy;
    };

    let id = session.request.id;
    log::info!("Accepted {} from chat {} as request {}", link.url, chat_id, id);
    ctx.tracker.spawn(session.run(link, ticket));
    Admission::Started(id)
}

struct Session {
    ctx: Arc<SessionContext>,
    request: Request,
    state: SessionState,
    status_message: Option<MessageId>,
    cancel: CancellationToken,
}

impl Session {
    fn new(ctx: Arc<SessionContext>, request: Request) -> Self {
        let cancel = ctx.shutdown.child_token();
        Self {
            ctx,
            request,
            state: SessionState::Received,
            status_message: None,
            cancel,
        }
    }

    fn advance(&mut self, next: SessionState) {
        if !self.state.can_advance_to(next) {
            log::warn!("Unexpected session transition {} -> {}", self.state, next);
        }
        log::debug!("Session {}: {} -> {}", self.request.id, self.state, next);
        self.state = next;
    }

    /// Runs the session to a terminal state. Never panics outward.
    async fn run(mut self, link: MediaLink, ticket: GateTicket) -> SessionState {
        let span = tracing::info_span!(
            "session",
            request_id = %self.request.id,
            chat_id = %self.request.chat_id
        );

        async move {
            let started = Instant::now();

            let outcome = AssertUnwindSafe(self.execute(&link, ticket)).catch_unwind().await;
            let result = outcome.unwrap_or_else(|payload| {
                let message = panic_message(payload.as_ref());
                log::error!("Session panicked: {}", message);
                Err(DownloadError::Unknown(format!("panic: {}", message)))
            });

            match result {
                Ok(()) => self.advance(SessionState::Done),
                Err(e) => self.fail(&e).await,
            }

            self.ctx.gate.release_idle();
            log::info!(
                "Request {} finished as {} in {:.1}s",
                self.request.id,
                self.state,
                started.elapsed().as_secs_f64()
            );
            self.state
        }
        .instrument(span)
        .await
    }

    /// Everything between admission and the terminal state.
    ///
    /// The scratch space lives in this frame, so it is removed on return
    /// and on unwind alike.
    async fn execute(&mut self, link: &MediaLink, ticket: GateTicket) -> Result<(), DownloadError> {
        let _turn = self.wait_for_turn(ticket).await?;

        self.show(status::ANALYZING).await;
        self.activity(ChatActivity::Typing).await;

        let scratch = ScratchSpace::create(&self.ctx.scratch_root, &self.request.id.simple().to_string())?;
        let result = self.process(link, &scratch).await;
        if let Err(e) = scratch.close() {
            log::warn!("Failed to remove scratch space: {}", e);
        }
        result
    }

    async fn wait_for_turn(&mut self, ticket: GateTicket) -> Result<Option<OwnedMutexGuard<()>>, DownloadError> {
        match ticket {
            GateTicket::Unrestricted => Ok(None),
            GateTicket::Held(guard) => Ok(Some(guard)),
            GateTicket::Queued(slot) => {
                if let Ok(guard) = Arc::clone(&slot).try_lock_owned() {
                    return Ok(Some(guard));
                }
                self.show(status::QUEUED).await;
                tokio::select! {
                    guard = slot.lock_owned() => Ok(Some(guard)),
                    _ = self.cancel.cancelled() => Err(DownloadError::Cancelled("queue")),
                }
            }
        }
    }

    async fn process(&mut self, link: &MediaLink, scratch: &ScratchSpace) -> Result<(), DownloadError> {
        self.advance(SessionState::Downloading);
        let job = RetrievalJob {
            link: link.clone(),
            scratch_dir: scratch.path().to_path_buf(),
            output_template: scratch.output_template(),
        };
        let media = self.download(&job).await?;

        let file = match media {
            RetrievedMedia::Muxed(path) => path,
            RetrievedMedia::Separate { video, audio } => {
                self.advance(SessionState::Merging);
                self.show(status::MERGING).await;
                let muxer = Arc::clone(&self.ctx.muxer);
                muxer.merge(&video, &audio, &self.cancel).await?
            }
        };

        self.advance(SessionState::SizeChecking);
        let size = check_upload_size(&file, self.ctx.max_upload_bytes).await?;

        self.advance(SessionState::Sending);
        self.upload(&file, size).await
    }

    /// Runs the retriever while turning its progress samples into throttled status edits.
    async fn download(&mut self, job: &RetrievalJob) -> Result<RetrievedMedia, DownloadError> {
        let (progress_tx, mut progress_rx) = mpsc::channel(PROGRESS_CHANNEL_CAPACITY);
        let retriever = Arc::clone(&self.ctx.retriever);
        let cancel = self.cancel.clone();

        let retrieval = retriever.retrieve(job, progress_tx, &cancel);
        tokio::pin!(retrieval);

        let mut throttle = ProgressThrottle::starting_at(self.ctx.progress_interval, Instant::now());

        loop {
            tokio::select! {
                result = &mut retrieval => return result,
                Some(sample) = progress_rx.recv() => {
                    if let Some(shown) = throttle.admit(&sample, Instant::now()) {
                        let text = DownloadStatus::from_progress(&shown).to_message();
                        self.show(&text).await;
                    }
                }
            }
        }
    }

    async fn upload(&mut self, file: &Path, size: u64) -> Result<(), DownloadError> {
        self.show(status::UPLOADING).await;

        let kind = MediaKind::for_path(file);
        self.activity(kind.activity()).await;

        let file_name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let caption = format!("{} ({})", file_name, human_size(size));
        log::info!("Uploading {} as {:?}", caption, kind);

        let sink = Arc::clone(&self.ctx.sink);
        let timeout = self.ctx.upload_timeout;
        let sent = tokio::select! {
            sent = tokio::time::timeout(timeout, sink.send_media(self.request.chat_id, file, kind, &caption)) => sent,
            _ = self.cancel.cancelled() => return Err(DownloadError::Cancelled("upload")),
        };

        match sent {
            Ok(Ok(())) => {
                self.show(status::DONE).await;
                Ok(())
            }
            Ok(Err(e)) => Err(DownloadError::Unknown(format!("upload failed: {}", e))),
            Err(_) => Err(DownloadError::TimedOut {
                stage: "upload",
                after: timeout,
            }),
        }
    }

    /// Moves to `Failed` and tells the user why.
    async fn fail(&mut self, err: &DownloadError) {
        let category = err.category();
        self.advance(SessionState::Failed(category));

        match category {
            FailureCategory::InvalidLink | FailureCategory::Oversized | FailureCategory::Cancelled => {
                log::info!("Request {} failed [{}]: {}", self.request.id, category, err)
            }
            _ => log::error!("Request {} failed [{}]: {}", self.request.id, category, err),
        }

        self.show(&messages::failure_text(err)).await;
    }

    /// Edits the status message, or sends it when there is none yet.
    ///
    /// Telegram errors here never fail the request.
    async fn show(&mut self, text: &str) {
        let chat_id = self.request.chat_id;
        match self.status_message {
            Some(message_id) => {
                if let Err(e) = self.ctx.sink.edit_text(chat_id, message_id, text).await {
                    log::debug!("Status edit failed: {}", e);
                }
            }
            None => match self.ctx.sink.send_text(chat_id, text).await {
                Ok(message_id) => self.status_message = Some(message_id),
                Err(e) => log::warn!("Failed to send status message: {}", e),
            },
        }
    }

    async fn activity(&self, activity: ChatActivity) {
        if let Err(e) = self.ctx.sink.send_activity(self.request.chat_id, activity).await {
            log::debug!("Chat action {:?} failed: {}", activity, e);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
