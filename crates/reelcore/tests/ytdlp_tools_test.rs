//! Drives the yt-dlp and ffmpeg adapters against scripted stand-ins.
//!
//! Each test writes a small shell script that behaves like the real tool for
//! one scenario. Tests are serialized: executing a file that another thread
//! still holds open for writing fails with ETXTBSY.
//!
//! Run: cargo test -p reelcore --test ytdlp_tools_test
#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reelcore::download::source::PROGRESS_CHANNEL_CAPACITY;
use reelcore::download::{
    parse_media_link, FfmpegMuxer, Muxer, RetrievalJob, RetrievedMedia, Retriever, ScratchSpace, YtDlpRetriever,
};
use reelcore::FailureCategory;
use serial_test::serial;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Writes an executable script and returns its path
fn write_tool(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Script prologue that stores the `--output` value in `$out` and its directory in `$dir`
const FIND_OUTPUT: &str = r#"
out=""
while [ $# -gt 0 ]; do
  case "$1" in
    --output) out="$2"; shift 2 ;;
    *) shift ;;
  esac
done
dir=$(dirname "$out")
"#;

// Field order matters: the scratch space must go before its root
struct Fixture {
    scratch: ScratchSpace,
    tools_dir: PathBuf,
    _tools: TempDir,
    _root: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let tools = tempfile::tempdir().unwrap();
        let root = tempfile::tempdir().unwrap();
        let scratch = ScratchSpace::create(root.path(), "test").unwrap();
        Self {
            scratch,
            tools_dir: tools.path().to_path_buf(),
            _tools: tools,
            _root: root,
        }
    }

    fn job(&self) -> RetrievalJob {
        RetrievalJob {
            link: parse_media_link("https://youtu.be/abc123").unwrap(),
            scratch_dir: self.scratch.path().to_path_buf(),
            output_template: self.scratch.output_template(),
        }
    }
}

#[tokio::test]
#[serial]
async fn test_separate_streams_are_reported_in_order() {
    let fixture = Fixture::new();
    let body = format!(
        r#"{FIND_OUTPUT}
echo "[youtube] abc123: Downloading webpage"
echo "[download] Destination: $dir/abc123.f137.mp4"
echo "[download]  50.0% of 1.00MiB at 1.00MiB/s ETA 00:01"
printf video > "$dir/abc123.f137.mp4"
echo "[download] 100% of 1.00MiB in 00:00:01 at 1.00MiB/s"
echo "[download] Destination: $dir/abc123.f140.m4a"
echo "[download]  20.0% of 100.00KiB at 1.00MiB/s ETA 00:01"
printf audio > "$dir/abc123.f140.m4a"
exit 0"#
    );
    let bin = write_tool(&fixture.tools_dir, "yt-dlp", &body);
    let retriever = YtDlpRetriever::new(bin.to_string_lossy(), Duration::from_secs(30));

    let (tx, mut rx) = mpsc::channel(PROGRESS_CHANNEL_CAPACITY);
    let media = retriever
        .retrieve(&fixture.job(), tx, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        media,
        RetrievedMedia::Separate {
            video: fixture.scratch.path().join("abc123.f137.mp4"),
            audio: fixture.scratch.path().join("abc123.f140.m4a"),
        }
    );

    let mut samples = Vec::new();
    while let Ok(sample) = rx.try_recv() {
        samples.push((sample.part, sample.percent));
    }
    assert_eq!(samples, vec![(1, 50), (1, 100), (2, 20)]);
}

#[tokio::test]
#[serial]
async fn test_single_file_is_muxed() {
    let fixture = Fixture::new();
    let body = format!(
        r#"{FIND_OUTPUT}
echo "[download] Destination: $dir/abc123.mp4"
printf both > "$dir/abc123.mp4"
printf partial > "$dir/abc123.mp4.part"
exit 0"#
    );
    let bin = write_tool(&fixture.tools_dir, "yt-dlp", &body);
    let retriever = YtDlpRetriever::new(bin.to_string_lossy(), Duration::from_secs(30));

    let (tx, _rx) = mpsc::channel(PROGRESS_CHANNEL_CAPACITY);
    let media = retriever
        .retrieve(&fixture.job(), tx, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(media, RetrievedMedia::Muxed(fixture.scratch.path().join("abc123.mp4")));
    assert!(!media.needs_merge());
}

#[tokio::test]
#[serial]
async fn test_geo_block_is_classified() {
    let fixture = Fixture::new();
    let bin = write_tool(
        &fixture.tools_dir,
        "yt-dlp",
        r#"echo "[youtube] abc123: Downloading webpage"
echo "ERROR: [youtube] abc123: The uploader has not made this video available in your country" >&2
exit 1"#,
    );
    let retriever = YtDlpRetriever::new(bin.to_string_lossy(), Duration::from_secs(30));

    let (tx, _rx) = mpsc::channel(PROGRESS_CHANNEL_CAPACITY);
    let err = retriever
        .retrieve(&fixture.job(), tx, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.category(), FailureCategory::GeoRestricted);
    assert!(err.to_string().contains("available in your country"));
}

#[tokio::test]
#[serial]
async fn test_unrecognized_failure_is_unknown() {
    let fixture = Fixture::new();
    let bin = write_tool(&fixture.tools_dir, "yt-dlp", "exit 2");
    let retriever = YtDlpRetriever::new(bin.to_string_lossy(), Duration::from_secs(30));

    let (tx, _rx) = mpsc::channel(PROGRESS_CHANNEL_CAPACITY);
    let err = retriever
        .retrieve(&fixture.job(), tx, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.category(), FailureCategory::Unknown);
}

#[tokio::test]
#[serial]
async fn test_download_timeout_kills_the_tool() {
    let fixture = Fixture::new();
    let bin = write_tool(&fixture.tools_dir, "yt-dlp", "exec sleep 30");
    let retriever = YtDlpRetriever::new(bin.to_string_lossy(), Duration::from_millis(200));

    let (tx, _rx) = mpsc::channel(PROGRESS_CHANNEL_CAPACITY);
    let started = std::time::Instant::now();
    let err = retriever
        .retrieve(&fixture.job(), tx, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.category(), FailureCategory::TimedOut);
    assert!(started.elapsed() < Duration::from_secs(10));
}

/// Script body that starts a background helper, records its pid and waits for it
fn spawn_helper_and_wait(pid_file: &Path) -> String {
    format!(
        "sleep 37.25 </dev/null >/dev/null 2>&1 &\necho $! > '{}'\nwait",
        pid_file.display()
    )
}

/// Whether `pid` is still running; zombies count as gone
fn is_running(pid: &str) -> bool {
    match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        Ok(stat) => stat
            .rsplit_once(')')
            .is_some_and(|(_, rest)| !rest.trim_start().starts_with('Z')),
        Err(_) => std::process::Command::new("kill")
            .args(["-0", pid])
            .status()
            .is_ok_and(|s| s.success()),
    }
}

async fn assert_helper_gone(pid_file: &Path) {
    let pid = std::fs::read_to_string(pid_file).unwrap().trim().to_string();
    for _ in 0..50 {
        if !is_running(&pid) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("helper process {} is still running", pid);
}

#[tokio::test]
#[serial]
async fn test_download_timeout_kills_helper_processes() {
    let fixture = Fixture::new();
    let pid_file = fixture.tools_dir.join("helper.pid");
    let bin = write_tool(&fixture.tools_dir, "yt-dlp", &spawn_helper_and_wait(&pid_file));
    let retriever = YtDlpRetriever::new(bin.to_string_lossy(), Duration::from_millis(300));

    let (tx, _rx) = mpsc::channel(PROGRESS_CHANNEL_CAPACITY);
    let err = retriever
        .retrieve(&fixture.job(), tx, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.category(), FailureCategory::TimedOut);
    assert_eq!(err.to_string(), "download timed out after 0.3s");
    assert_helper_gone(&pid_file).await;
}

#[tokio::test]
#[serial]
async fn test_cancelled_merge_kills_helper_processes() {
    let fixture = Fixture::new();
    let pid_file = fixture.tools_dir.join("helper.pid");
    let bin = write_tool(&fixture.tools_dir, "ffmpeg", &spawn_helper_and_wait(&pid_file));
    let video = fixture.scratch.path().join("abc123.f137.mp4");
    let audio = fixture.scratch.path().join("abc123.f140.m4a");
    std::fs::write(&video, b"video").unwrap();
    std::fs::write(&audio, b"audio").unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        trigger.cancel();
    });

    let muxer = FfmpegMuxer::new(bin.to_string_lossy(), Duration::from_secs(60));
    let err = muxer.merge(&video, &audio, &cancel).await.unwrap_err();

    assert_eq!(err.category(), FailureCategory::Cancelled);
    assert_helper_gone(&pid_file).await;
}

#[tokio::test]
#[serial]
async fn test_cancellation_stops_the_tool() {
    let fixture = Fixture::new();
    let bin = write_tool(&fixture.tools_dir, "yt-dlp", "exec sleep 30");
    let retriever = YtDlpRetriever::new(bin.to_string_lossy(), Duration::from_secs(60));

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let (tx, _rx) = mpsc::channel(PROGRESS_CHANNEL_CAPACITY);
    let err = retriever.retrieve(&fixture.job(), tx, &cancel).await.unwrap_err();
    assert_eq!(err.category(), FailureCategory::Cancelled);
}

#[tokio::test]
#[serial]
async fn test_missing_binary_is_reported() {
    let fixture = Fixture::new();
    let retriever = YtDlpRetriever::new("/nonexistent/yt-dlp", Duration::from_secs(5));

    let (tx, _rx) = mpsc::channel(PROGRESS_CHANNEL_CAPACITY);
    let err = retriever
        .retrieve(&fixture.job(), tx, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.category(), FailureCategory::Unknown);
}

#[tokio::test]
#[serial]
async fn test_merge_replaces_inputs_with_output() {
    let fixture = Fixture::new();
    // The output path is the last argument
    let bin = write_tool(
        &fixture.tools_dir,
        "ffmpeg",
        r#"for last; do :; done
printf merged > "$last"
exit 0"#,
    );
    let video = fixture.scratch.path().join("abc123.f137.mp4");
    let audio = fixture.scratch.path().join("abc123.f140.m4a");
    std::fs::write(&video, b"video").unwrap();
    std::fs::write(&audio, b"audio").unwrap();

    let muxer = FfmpegMuxer::new(bin.to_string_lossy(), Duration::from_secs(30));
    let output = muxer.merge(&video, &audio, &CancellationToken::new()).await.unwrap();

    assert_eq!(output, fixture.scratch.path().join("abc123.mp4"));
    assert_eq!(std::fs::read(&output).unwrap(), b"merged");
    assert!(!video.exists());
    assert!(!audio.exists());
}

#[tokio::test]
#[serial]
async fn test_failed_merge_keeps_inputs_and_removes_partial_output() {
    let fixture = Fixture::new();
    let bin = write_tool(
        &fixture.tools_dir,
        "ffmpeg",
        r#"for last; do :; done
printf half > "$last"
echo "Could not find tag for codec opus in stream #1" >&2
exit 1"#,
    );
    let video = fixture.scratch.path().join("abc123.f137.mp4");
    let audio = fixture.scratch.path().join("abc123.f140.m4a");
    std::fs::write(&video, b"video").unwrap();
    std::fs::write(&audio, b"audio").unwrap();

    let muxer = FfmpegMuxer::new(bin.to_string_lossy(), Duration::from_secs(30));
    let err = muxer
        .merge(&video, &audio, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.category(), FailureCategory::MergeFailed);
    assert!(err.to_string().contains("Could not find tag"));
    assert!(!fixture.scratch.path().join("abc123.mp4").exists());
    assert!(video.exists());
}

#[tokio::test]
#[serial]
async fn test_merge_timeout() {
    let fixture = Fixture::new();
    let bin = write_tool(&fixture.tools_dir, "ffmpeg", "exec sleep 30");
    let video = fixture.scratch.path().join("abc123.f137.mp4");
    let audio = fixture.scratch.path().join("abc123.f140.m4a");
    std::fs::write(&video, b"video").unwrap();
    std::fs::write(&audio, b"audio").unwrap();

    let muxer = FfmpegMuxer::new(bin.to_string_lossy(), Duration::from_millis(200));
    let err = muxer
        .merge(&video, &audio, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.category(), FailureCategory::TimedOut);
}
