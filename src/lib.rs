//! Playback and capture synchronization engine for time-ordered LiDAR
//! recordings.
//!
//! The crate turns a sparse set of timestamped sensor samples (point-cloud
//! frames plus vehicle poses) into a continuous, scrubbable timeline and
//! advances that timeline under two clocks:
//!
//! 1. **Live playback**: real elapsed seconds, scaled by a speed factor,
//!    wrapping modulo the dataset duration ([`PlaybackClock::advance`]).
//! 2. **Deterministic capture**: a fixed simulated step per exported frame,
//!    driving an external frame-by-frame encoder in lock-step with the
//!    simulated timeline rather than with wall time ([`CaptureSession`]).
//!
//! # Pipeline overview
//!
//! 1. **Load**: [`DatasetLoader`] fetches timestamps, poses, and per-sample
//!    point buffers from an [`AssetSource`] into a [`LoadedDataset`].
//! 2. **Bind**: [`SceneBinder`] installs the dataset (releasing the previous
//!    one) and resets the shared [`PlaybackState`].
//! 3. **Tick**: the host's per-refresh callback calls [`Player::tick`]; the
//!    returned [`SceneSample`] says what to render at the current scrub.
//! 4. **Export**: a record request hands the clock to a [`CaptureSession`],
//!    which renders one frame per fixed step through a [`RenderSurface`] and
//!    streams it to an [`ExportSink`] (system `ffmpeg` by default) until the
//!    scrub wraps, i.e. exactly one loop.
//!
//! Rendering itself (meshes, shaders, cameras) and window chrome stay
//! outside the crate, behind the [`RenderSurface`] and [`ExportSink`]
//! seams.

#![forbid(unsafe_code)]

pub mod capture;
pub mod error;
pub mod loader;
pub mod playback;
pub mod player;
pub mod render;
pub mod scene;
pub mod source;
pub mod timeline;

pub use capture::{
    CaptureConfig, CaptureReport, CaptureSession, ExportSink, FfmpegSink,
    default_snapshot_filename, default_video_filename, is_ffmpeg_on_path,
};
pub use error::{ReplayError, ReplayResult};
pub use loader::{DatasetLoader, FramePayload, FrameSet, LoadedDataset};
pub use playback::{ClockState, PlaybackClock, PlaybackConfig, PlaybackState, PlaybackStatus};
pub use player::Player;
pub use render::{FrameRgba, RenderSurface};
pub use scene::{BoundScene, SceneBinder, SceneSample};
pub use source::{AssetSource, HttpAssetSource, MemorySource, MemorySourceBuilder};
pub use timeline::{Pose, Timeline};
