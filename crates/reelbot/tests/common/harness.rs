//! Session context wired to fakes

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use reelbot::session::{ChatGate, SessionContext};
use reelcore::core::config::DEFAULT_MAX_UPLOAD_BYTES;
use reelcore::PerChatPolicy;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use super::fakes::{FakeMuxer, FakeRetriever, FakeSink};

pub struct Harness {
    pub ctx: Arc<SessionContext>,
    pub sink: Arc<FakeSink>,
    pub retriever: Arc<FakeRetriever>,
    pub muxer: Arc<FakeMuxer>,
    pub scratch_root: TempDir,
}

impl Harness {
    pub fn new(retriever: FakeRetriever) -> Self {
        Self::build(retriever, FakeMuxer::default(), FakeSink::default(), PerChatPolicy::Allow)
    }

    pub fn build(retriever: FakeRetriever, muxer: FakeMuxer, sink: FakeSink, policy: PerChatPolicy) -> Self {
        Self::build_with_interval(retriever, muxer, sink, policy, Duration::ZERO)
    }

    /// Like [`Harness::build`], with a minimum gap between status edits
    pub fn build_with_interval(
        retriever: FakeRetriever,
        muxer: FakeMuxer,
        sink: FakeSink,
        policy: PerChatPolicy,
        progress_interval: Duration,
    ) -> Self {
        let scratch_root = tempfile::tempdir().unwrap();
        let sink = Arc::new(sink);
        let retriever = Arc::new(retriever);
        let muxer = Arc::new(muxer);

        let ctx = Arc::new(SessionContext {
            sink: sink.clone(),
            retriever: retriever.clone(),
            muxer: muxer.clone(),
            gate: ChatGate::new(policy),
            scratch_root: scratch_root.path().to_path_buf(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            upload_timeout: Duration::from_secs(5),
            progress_interval,
            shutdown: CancellationToken::new(),
            tracker: TaskTracker::new(),
        });

        Self {
            ctx,
            sink,
            retriever,
            muxer,
            scratch_root,
        }
    }

    /// Waits for every spawned session to reach a terminal state
    pub async fn finish(&self) {
        self.ctx.tracker.close();
        tokio::time::timeout(Duration::from_secs(10), self.ctx.tracker.wait())
            .await
            .expect("sessions did not finish in time");
    }

    /// Entries left under the scratch root
    pub fn scratch_leftovers(&self) -> Vec<PathBuf> {
        std::fs::read_dir(self.scratch_root.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect()
    }
}
