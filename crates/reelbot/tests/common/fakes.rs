//! In-memory stand-ins for Telegram, yt-dlp and ffmpeg

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reelbot::session::{ChatActivity, ChatSink, MediaKind, SinkError};
use reelcore::download::{DownloadError, Muxer, ProgressInfo, ProgressSender, RetrievalJob, RetrievedMedia, Retriever};
use reelcore::FailureCategory;
use teloxide::types::{ChatId, MessageId};
use tokio_util::sync::CancellationToken;

/// Everything the bot said, in order
#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    Sent {
        chat_id: ChatId,
        text: String,
    },
    Edited {
        chat_id: ChatId,
        message_id: MessageId,
        text: String,
    },
    Activity {
        chat_id: ChatId,
        activity: ChatActivity,
    },
    Media {
        chat_id: ChatId,
        file_name: String,
        kind: MediaKind,
        caption: String,
        /// Whether the file was on disk when the upload started
        existed: bool,
    },
}

#[derive(Default)]
pub struct FakeSink {
    events: Mutex<Vec<SinkEvent>>,
    next_id: AtomicI32,
    pub fail_uploads: bool,
}

impl FakeSink {
    pub fn failing_uploads() -> Self {
        Self {
            fail_uploads: true,
            ..Self::default()
        }
    }

    fn record(&self, event: SinkEvent) {
        self.events.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Sent and edited texts for a chat, in order
    pub fn texts(&self, chat: ChatId) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SinkEvent::Sent { chat_id, text } | SinkEvent::Edited { chat_id, text, .. } if chat_id == chat => {
                    Some(text)
                }
                _ => None,
            })
            .collect()
    }

    pub fn sent_count(&self, chat: ChatId) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, SinkEvent::Sent { chat_id, .. } if *chat_id == chat))
            .count()
    }

    pub fn media(&self) -> Vec<SinkEvent> {
        self.events()
            .into_iter()
            .filter(|e| matches!(e, SinkEvent::Media { .. }))
            .collect()
    }

    pub fn last_text(&self, chat: ChatId) -> Option<String> {
        self.texts(chat).pop()
    }
}

#[async_trait]
impl ChatSink for FakeSink {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageId, SinkError> {
        let id = MessageId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.record(SinkEvent::Sent {
            chat_id,
            text: text.to_string(),
        });
        Ok(id)
    }

    async fn edit_text(&self, chat_id: ChatId, message_id: MessageId, text: &str) -> Result<(), SinkError> {
        self.record(SinkEvent::Edited {
            chat_id,
            message_id,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn send_activity(&self, chat_id: ChatId, activity: ChatActivity) -> Result<(), SinkError> {
        self.record(SinkEvent::Activity { chat_id, activity });
        Ok(())
    }

    async fn send_media(&self, chat_id: ChatId, path: &Path, kind: MediaKind, caption: &str) -> Result<(), SinkError> {
        self.record(SinkEvent::Media {
            chat_id,
            file_name: path.file_name().unwrap().to_string_lossy().into_owned(),
            kind,
            caption: caption.to_string(),
            existed: path.exists(),
        });
        if self.fail_uploads {
            return Err(SinkError::Request("Bad Request: file too big".to_string()));
        }
        Ok(())
    }
}

/// What the fake downloader does when called
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Writes files of the given sizes (sparse); one file is muxed, two are video + audio
    Produce(Vec<(&'static str, u64)>),
    Fail(FailureCategory, &'static str),
    /// Writes a file, then panics
    Panic,
    /// Blocks until cancelled
    Hang,
}

pub struct FakeRetriever {
    behavior: Behavior,
    scratch_dirs: Mutex<Vec<PathBuf>>,
}

impl FakeRetriever {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            scratch_dirs: Mutex::new(Vec::new()),
        }
    }

    pub fn muxed_mp4() -> Self {
        Self::new(Behavior::Produce(vec![("abc123.mp4", 1024)]))
    }

    pub fn calls(&self) -> usize {
        self.scratch_dirs.lock().unwrap().len()
    }

    pub fn scratch_dirs(&self) -> Vec<PathBuf> {
        self.scratch_dirs.lock().unwrap().clone()
    }
}

fn sample(percent: u8) -> ProgressInfo {
    ProgressInfo {
        percent,
        speed_bytes_sec: Some(1_048_576.0),
        eta_seconds: Some(3),
        current_size: None,
        total_size: Some(1024),
        part: 1,
    }
}

fn write_sparse(path: &Path, size: u64) {
    let file = std::fs::File::create(path).unwrap();
    file.set_len(size).unwrap();
}

#[async_trait]
impl Retriever for FakeRetriever {
    fn name(&self) -> &str {
        "fake"
    }

    async fn retrieve(
        &self,
        job: &RetrievalJob,
        progress: ProgressSender,
        cancel: &CancellationToken,
    ) -> Result<RetrievedMedia, DownloadError> {
        assert!(job.scratch_dir.is_dir(), "scratch space must exist before retrieval");
        self.scratch_dirs.lock().unwrap().push(job.scratch_dir.clone());

        match &self.behavior {
            Behavior::Produce(files) => {
                for percent in [10, 60, 100] {
                    let _ = progress.try_send(sample(percent));
                    tokio::time::sleep(Duration::from_millis(15)).await;
                }

                let paths: Vec<PathBuf> = files
                    .iter()
                    .map(|(name, size)| {
                        let path = job.scratch_dir.join(name);
                        write_sparse(&path, *size);
                        path
                    })
                    .collect();

                match paths.as_slice() {
                    [file] => Ok(RetrievedMedia::Muxed(file.clone())),
                    [video, audio] => Ok(RetrievedMedia::Separate {
                        video: video.clone(),
                        audio: audio.clone(),
                    }),
                    _ => panic!("fake retriever supports one or two files"),
                }
            }
            Behavior::Fail(category, detail) => Err(DownloadError::from_category(*category, *detail)),
            Behavior::Panic => {
                write_sparse(&job.scratch_dir.join("abc123.f137.mp4.part"), 10);
                panic!("retriever exploded");
            }
            Behavior::Hang => {
                cancel.cancelled().await;
                Err(DownloadError::Cancelled("download"))
            }
        }
    }
}

#[derive(Default)]
pub struct FakeMuxer {
    pub fail: bool,
    calls: AtomicUsize,
}

impl FakeMuxer {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Muxer for FakeMuxer {
    fn name(&self) -> &str {
        "fake"
    }

    async fn merge(&self, video: &Path, audio: &Path, _cancel: &CancellationToken) -> Result<PathBuf, DownloadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(DownloadError::MergeFailed("Could not find tag for codec".to_string()));
        }

        let size = std::fs::metadata(video).unwrap().len() + std::fs::metadata(audio).unwrap().len();
        let output = video.with_file_name("abc123.mp4");
        write_sparse(&output, size);
        std::fs::remove_file(video).unwrap();
        std::fs::remove_file(audio).unwrap();
        Ok(output)
    }
}
