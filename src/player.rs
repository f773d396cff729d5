use std::sync::Arc;

use crate::{
    capture::{
        CaptureConfig, CaptureReport, CaptureSession, ExportSink, default_snapshot_filename,
    },
    error::{ReplayError, ReplayResult},
    loader::{DatasetLoader, LoadedDataset},
    playback::{PlaybackClock, PlaybackConfig, PlaybackState},
    render::RenderSurface,
    scene::{SceneBinder, SceneSample},
    source::AssetSource,
};

/// Ties the loader, clock, and binder together for a host scheduler.
///
/// The host calls [`tick`](Self::tick) from its per-display-refresh
/// callback with the real elapsed seconds since the previous call; the
/// returned sample is what it should render. The UI layer drives everything
/// else through the explicit operations here and observes progress via
/// [`PlaybackState::subscribe`].
pub struct Player {
    state: PlaybackState,
    clock: PlaybackClock,
    binder: SceneBinder,
    loader: DatasetLoader,
}

impl Player {
    pub fn new(source: Arc<dyn AssetSource>, config: PlaybackConfig) -> ReplayResult<Self> {
        let state = PlaybackState::new();
        let clock = PlaybackClock::new(state.clone(), config)?;
        let binder = SceneBinder::new(state.clone());
        Ok(Self {
            state,
            clock,
            binder,
            loader: DatasetLoader::new(source),
        })
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn binder(&self) -> &SceneBinder {
        &self.binder
    }

    /// Load and bind dataset `name`, auto-playing on success.
    ///
    /// On failure the previously bound scene, if any, stays in place: the
    /// load assembles everything before the binder swaps.
    #[tracing::instrument(skip(self))]
    pub async fn load_scene(&mut self, name: &str) -> ReplayResult<()> {
        let dataset = self.loader.load(name).await?;
        self.bind_dataset(dataset)
    }

    /// Install an already-assembled dataset, bypassing the loader. Useful
    /// for hosts that source data elsewhere, and for tests.
    pub fn bind_dataset(&mut self, dataset: LoadedDataset) -> ReplayResult<()> {
        self.binder.bind(dataset)
    }

    pub fn unload_scene(&mut self) -> ReplayResult<()> {
        self.binder.unbind()
    }

    pub fn play(&self) -> ReplayResult<()> {
        self.clock.play()
    }

    pub fn pause(&self) {
        self.clock.pause();
    }

    /// Scrub directly to `t` seconds from the dataset origin, clamped into
    /// the valid range. Used by the timeline slider.
    pub fn seek(&self, t: f64) -> ReplayResult<()> {
        let status = self.state.get();
        if status.dataset.is_none() {
            return Err(ReplayError::no_active_scene("seek requested"));
        }
        if status.recording {
            return Err(ReplayError::validation(
                "cannot seek while a capture session is active",
            ));
        }
        let clamped = if status.duration > 0.0 {
            t.clamp(0.0, status.duration) % status.duration
        } else {
            0.0
        };
        self.state.set_scrub_time(clamped);
        Ok(())
    }

    /// Per-tick wall-clock advancement. Returns the sample to render, or
    /// `None` when no dataset is bound. A no-op (beyond sampling) while
    /// paused or while a capture session owns the clock.
    pub fn tick(&mut self, elapsed_real_secs: f64) -> ReplayResult<Option<SceneSample>> {
        if self.binder.bound().is_none() {
            return Ok(None);
        }
        if !self.state.get().recording {
            self.clock.advance(elapsed_real_secs);
        }
        let sample = self.binder.sample_at(self.state.get().scrub_time)?;
        Ok(Some(sample))
    }

    /// Record one full loop of the bound timeline through `sink`,
    /// fixed-step. Wall-clock playback stays paused for the duration.
    pub async fn record(
        &mut self,
        config: CaptureConfig,
        surface: &mut dyn RenderSurface,
        sink: &mut dyn ExportSink,
        filename: Option<&str>,
    ) -> ReplayResult<CaptureReport> {
        let session = CaptureSession::new(config)?;
        session
            .run(&self.state, &self.clock, &self.binder, surface, sink, filename)
            .await
    }

    /// Render the current scrub position once and save it as a single
    /// still.
    pub fn snapshot(
        &mut self,
        surface: &mut dyn RenderSurface,
        sink: &mut dyn ExportSink,
        filename: Option<&str>,
    ) -> ReplayResult<String> {
        let sample = self
            .binder
            .sample_at(self.state.get().scrub_time)
            .map_err(|_| ReplayError::no_active_scene("snapshot requested"))?;
        let frame = surface.render_at(&sample)?;
        let filename = filename
            .map(str::to_string)
            .unwrap_or_else(default_snapshot_filename);
        sink.save_snapshot(&frame, &filename)?;
        Ok(filename)
    }
}
