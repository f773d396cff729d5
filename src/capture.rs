use std::{
    path::{Path, PathBuf},
    process::{Child, ChildStdin, Command, Stdio},
    time::{SystemTime, UNIX_EPOCH},
};

use crate::{
    error::{ReplayError, ReplayResult},
    playback::{PlaybackClock, PlaybackState},
    render::{FrameRgba, RenderSurface},
    scene::SceneBinder,
};

/// Fixed-step capture tuning.
#[derive(Clone, Debug)]
pub struct CaptureConfig {
    /// Simulated seconds per exported frame. Must be finite and `> 0`.
    pub step_secs: f64,
    /// How often the capture loop cedes control back to the scheduler so
    /// sink I/O can flush. A courtesy, not a correctness requirement.
    pub yield_every: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            step_secs: 1.0 / 60.0,
            yield_every: 10,
        }
    }
}

impl CaptureConfig {
    pub fn validate(&self) -> ReplayResult<()> {
        if !self.step_secs.is_finite() || self.step_secs <= 0.0 {
            return Err(ReplayError::validation(
                "capture step_secs must be finite and > 0",
            ));
        }
        if self.yield_every == 0 {
            return Err(ReplayError::validation("capture yield_every must be > 0"));
        }
        Ok(())
    }

    /// Output frame rate implied by the step size.
    pub fn fps(&self) -> u32 {
        (1.0 / self.step_secs).round().max(1.0) as u32
    }

    pub fn with_step_secs(mut self, step_secs: f64) -> Self {
        self.step_secs = step_secs;
        self
    }
}

/// Session-oriented export sink: one open video stream at a time, plus
/// stream-independent single stills.
pub trait ExportSink {
    /// Begin a new output stream. An already-open stream is terminated
    /// first.
    fn start(&mut self, filename: &str) -> ReplayResult<()>;

    /// Append one still as the next video frame. Errors when no stream is
    /// open. The sink is stream-ordered; frames arrive strictly in order.
    fn add_frame(&mut self, frame: &FrameRgba) -> ReplayResult<()>;

    /// Finalize and close the current stream.
    fn stop(&mut self) -> ReplayResult<()>;

    /// Write a single still image independent of any video stream.
    fn save_snapshot(&mut self, frame: &FrameRgba, filename: &str) -> ReplayResult<()>;
}

pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

fn ensure_parent_dir(path: &Path) -> ReplayResult<()> {
    if let Some(parent) = path.parent() {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Timestamped default names for record/snapshot requests that don't supply
/// one.
pub fn default_video_filename() -> String {
    format!("capture-{}.mp4", unix_secs())
}

pub fn default_snapshot_filename() -> String {
    format!("snapshot-{}.png", unix_secs())
}

fn unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

struct FfmpegStream {
    child: Child,
    stdin: Option<ChildStdin>,
    path: PathBuf,
}

/// Export sink backed by the system `ffmpeg` binary.
///
/// Frames are piped as rawvideo rgba on stdin and encoded to
/// libx264/yuv420p, so width and height must be even. We intentionally use
/// the system binary rather than linking FFmpeg to avoid native dev
/// header/lib requirements.
pub struct FfmpegSink {
    width: u32,
    height: u32,
    fps: u32,
    out_dir: PathBuf,
    active: Option<FfmpegStream>,
}

impl FfmpegSink {
    pub fn new(
        width: u32,
        height: u32,
        fps: u32,
        out_dir: impl Into<PathBuf>,
    ) -> ReplayResult<Self> {
        if width == 0 || height == 0 {
            return Err(ReplayError::validation(
                "sink width/height must be non-zero",
            ));
        }
        if !width.is_multiple_of(2) || !height.is_multiple_of(2) {
            return Err(ReplayError::validation(
                "sink width/height must be even (required for yuv420p output)",
            ));
        }
        if fps == 0 {
            return Err(ReplayError::validation("sink fps must be non-zero"));
        }
        Ok(Self {
            width,
            height,
            fps,
            out_dir: out_dir.into(),
            active: None,
        })
    }

    fn check_frame(&self, frame: &FrameRgba) -> ReplayResult<()> {
        if frame.width != self.width || frame.height != self.height {
            return Err(ReplayError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, self.width, self.height
            )));
        }
        Ok(())
    }

    fn finalize(stream: FfmpegStream) -> ReplayResult<()> {
        let FfmpegStream {
            mut child,
            stdin,
            path,
        } = stream;
        drop(stdin);
        let output = child.wait_with_output().map_err(|e| {
            ReplayError::capture_failed(format!("failed to wait for ffmpeg: {e}"))
        })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ReplayError::capture_failed(format!(
                "ffmpeg exited with status {} writing '{}': {}",
                output.status,
                path.display(),
                stderr.trim()
            )));
        }
        tracing::info!(path = %path.display(), "video stream finalized");
        Ok(())
    }
}

impl ExportSink for FfmpegSink {
    fn start(&mut self, filename: &str) -> ReplayResult<()> {
        if let Some(stream) = self.active.take() {
            tracing::warn!("terminating an already-open ffmpeg stream");
            if let Err(e) = Self::finalize(stream) {
                tracing::warn!(error = %e, "previous stream did not finalize cleanly");
            }
        }

        if !is_ffmpeg_on_path() {
            return Err(ReplayError::capture_failed(
                "ffmpeg is required for video export, but was not found on PATH",
            ));
        }

        let out_path = self.out_dir.join(filename);
        ensure_parent_dir(&out_path)?;

        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        cmd.args([
            "-y",
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &format!("{}x{}", self.width, self.height),
            "-r",
            &self.fps.to_string(),
            "-i",
            "pipe:0",
            "-an",
            "-c:v",
            "libx264",
            "-pix_fmt",
            "yuv420p",
            "-movflags",
            "+faststart",
        ])
        .arg(&out_path);

        let mut child = cmd.spawn().map_err(|e| {
            ReplayError::capture_failed(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;
        let stdin = child.stdin.take().ok_or_else(|| {
            ReplayError::capture_failed("failed to open ffmpeg stdin (unexpected)")
        })?;

        tracing::info!(path = %out_path.display(), fps = self.fps, "video stream started");
        self.active = Some(FfmpegStream {
            child,
            stdin: Some(stdin),
            path: out_path,
        });
        Ok(())
    }

    fn add_frame(&mut self, frame: &FrameRgba) -> ReplayResult<()> {
        self.check_frame(frame)?;
        let Some(stream) = self.active.as_mut() else {
            return Err(ReplayError::capture_failed(
                "add_frame with no open video stream",
            ));
        };
        let Some(stdin) = stream.stdin.as_mut() else {
            return Err(ReplayError::capture_failed(
                "ffmpeg stream is already finalized",
            ));
        };
        use std::io::Write as _;
        stdin.write_all(&frame.data).map_err(|e| {
            ReplayError::capture_failed(format!("failed to write frame to ffmpeg stdin: {e}"))
        })
    }

    fn stop(&mut self) -> ReplayResult<()> {
        let Some(stream) = self.active.take() else {
            return Err(ReplayError::capture_failed(
                "stop with no open video stream",
            ));
        };
        Self::finalize(stream)
    }

    fn save_snapshot(&mut self, frame: &FrameRgba, filename: &str) -> ReplayResult<()> {
        let out_path = self.out_dir.join(filename);
        ensure_parent_dir(&out_path)?;
        let still = image::RgbaImage::from_raw(frame.width, frame.height, frame.data.clone())
            .ok_or_else(|| {
                ReplayError::validation("frame data does not match its dimensions")
            })?;
        still.save(&out_path).map_err(|e| {
            ReplayError::capture_failed(format!(
                "failed to write snapshot '{}': {e}",
                out_path.display()
            ))
        })?;
        tracing::info!(path = %out_path.display(), "snapshot saved");
        Ok(())
    }
}

/// Summary of a completed capture session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaptureReport {
    pub filename: String,
    pub frames: u64,
}

/// Drives the playback clock at a fixed step, rendering and forwarding one
/// frame per step, for exactly one full loop of the bound timeline.
///
/// Each exported frame represents exactly `step_secs` of simulated time
/// regardless of how long rendering it actually took; wall-clock playback
/// resumes ownership of the clock when the session ends.
pub struct CaptureSession {
    config: CaptureConfig,
}

impl CaptureSession {
    pub fn new(config: CaptureConfig) -> ReplayResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Run one capture to completion.
    ///
    /// Frame advancement is strictly sequential: frame N is rendered and
    /// forwarded before frame N+1 begins, because the sink has no
    /// reordering capability. The loop re-reads the shared scrub every
    /// iteration and terminates on the wrap signal (the scrub crossing back
    /// below its previous value); for a zero-duration dataset the very
    /// first step reports the loop complete, so exactly one frame is
    /// exported.
    #[tracing::instrument(skip_all, fields(filename))]
    pub async fn run(
        &self,
        state: &PlaybackState,
        clock: &PlaybackClock,
        binder: &SceneBinder,
        surface: &mut dyn RenderSurface,
        sink: &mut dyn ExportSink,
        filename: Option<&str>,
    ) -> ReplayResult<CaptureReport> {
        if binder.bound().is_none() {
            return Err(ReplayError::no_active_scene("capture requested"));
        }

        let filename = filename
            .map(str::to_string)
            .unwrap_or_else(default_video_filename);
        tracing::Span::current().record("filename", filename.as_str());

        state.set_playing(false);
        state.set_recording(true);
        state.set_scrub_time(0.0);

        let result = self
            .capture_loop(state, clock, binder, surface, sink, &filename)
            .await;

        match result {
            Ok(frames) => {
                let stopped = sink.stop();
                state.set_recording(false);
                stopped?;
                tracing::info!(frames, "capture complete");
                Ok(CaptureReport { filename, frames })
            }
            Err(e) => {
                // Best effort: never leave an orphaned stream open or the
                // recording flag stuck.
                if let Err(stop_err) = sink.stop() {
                    tracing::warn!(error = %stop_err, "sink did not close cleanly after failure");
                }
                state.set_recording(false);
                Err(e)
            }
        }
    }

    async fn capture_loop(
        &self,
        state: &PlaybackState,
        clock: &PlaybackClock,
        binder: &SceneBinder,
        surface: &mut dyn RenderSurface,
        sink: &mut dyn ExportSink,
        filename: &str,
    ) -> ReplayResult<u64> {
        sink.start(filename)?;

        let mut frames: u64 = 0;
        loop {
            // Re-read the live scrub rather than carrying a copy across the
            // yield point.
            let sample = binder.sample_at(state.get().scrub_time)?;
            let frame = surface
                .render_at(&sample)
                .map_err(|e| ReplayError::capture_failed(format!("render failed: {e}")))?;
            sink.add_frame(&frame)?;
            frames += 1;

            if clock.step_fixed(self.config.step_secs)? {
                break;
            }

            if frames % u64::from(self.config.yield_every) == 0 {
                tokio::task::yield_now().await;
            }
        }
        Ok(frames)
    }
}
