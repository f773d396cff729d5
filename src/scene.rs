use crate::{
    error::{ReplayError, ReplayResult},
    loader::{FrameSet, LoadedDataset},
    playback::PlaybackState,
    timeline::{Pose, Timeline},
};

/// The timeline/frame pair currently installed for rendering.
#[derive(Debug)]
pub struct BoundScene {
    pub timeline: Timeline,
    pub frames: FrameSet,
}

/// What should be visible at a queried simulated time.
///
/// The pose positions the vehicle proxy; `time` is what the rendering
/// surface feeds its decay/fade windowing. Which frames fall inside that
/// window is the surface's concern, not a synchronization one.
#[derive(Clone, Copy, Debug)]
pub struct SceneSample {
    pub time: f64,
    pub pose: Pose,
}

/// Exclusive owner of the currently bound timeline/frame pair.
///
/// At most one pair is live at a time: binding drops the previous pair's
/// resources before the replacement is installed, and unbinding leaves the
/// binder empty.
pub struct SceneBinder {
    state: PlaybackState,
    bound: Option<BoundScene>,
}

impl SceneBinder {
    pub fn new(state: PlaybackState) -> Self {
        Self { state, bound: None }
    }

    pub fn bound(&self) -> Option<&BoundScene> {
        self.bound.as_ref()
    }

    /// Install a freshly loaded dataset and reset playback: scrub back to
    /// zero, duration recorded, auto-play on load.
    ///
    /// Swapping while a capture session is active is not a supported
    /// transition and is rejected; stop the session first.
    pub fn bind(&mut self, dataset: LoadedDataset) -> ReplayResult<()> {
        if self.state.get().recording {
            return Err(ReplayError::validation(
                "cannot swap the bound dataset while a capture session is active",
            ));
        }

        // Release the previous pair before installing the new one.
        drop(self.bound.take());

        let LoadedDataset { timeline, frames } = dataset;
        let name = timeline.name().to_string();
        let duration = timeline.duration();
        self.bound = Some(BoundScene { timeline, frames });

        self.state.set_dataset(Some(name));
        self.state.set_duration(duration);
        self.state.set_scrub_time(0.0);
        self.state.set_playing(duration > 0.0);
        Ok(())
    }

    /// Drop the bound pair and return playback to the idle defaults.
    pub fn unbind(&mut self) -> ReplayResult<()> {
        if self.state.get().recording {
            return Err(ReplayError::validation(
                "cannot unbind the dataset while a capture session is active",
            ));
        }
        drop(self.bound.take());
        self.state.set_playing(false);
        self.state.set_scrub_time(0.0);
        self.state.set_duration(0.0);
        self.state.set_dataset(None);
        Ok(())
    }

    /// What should be visible at simulated time `t`.
    pub fn sample_at(&self, t: f64) -> ReplayResult<SceneSample> {
        let scene = self
            .bound
            .as_ref()
            .ok_or_else(|| ReplayError::no_active_scene("sample requested"))?;
        Ok(SceneSample {
            time: t,
            pose: scene.timeline.pose_at(t),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::Pose;
    use glam::Vec3;

    fn dataset(name: &str, timestamps: Vec<f64>) -> LoadedDataset {
        let poses = timestamps
            .iter()
            .enumerate()
            .map(|(i, _)| Pose::at(Vec3::new(i as f32, 0.0, 0.0)))
            .collect();
        LoadedDataset {
            timeline: Timeline::new(name, timestamps, poses).unwrap(),
            frames: FrameSet::default(),
        }
    }

    #[test]
    fn bind_resets_playback_and_autoplays() {
        let state = PlaybackState::new();
        let mut binder = SceneBinder::new(state.clone());
        state.set_scrub_time(3.0);

        binder.bind(dataset("001", vec![0.0, 2.0])).unwrap();
        let status = state.get();
        assert_eq!(status.dataset.as_deref(), Some("001"));
        assert_eq!(status.scrub_time, 0.0);
        assert_eq!(status.duration, 2.0);
        assert!(status.playing);
    }

    #[test]
    fn zero_duration_bind_does_not_autoplay() {
        let state = PlaybackState::new();
        let mut binder = SceneBinder::new(state.clone());
        binder.bind(dataset("solo", vec![5.0])).unwrap();
        assert!(!state.get().playing);
        assert_eq!(state.get().duration, 0.0);
    }

    #[test]
    fn rebinding_swaps_the_pair_and_resets_each_time() {
        let state = PlaybackState::new();
        let mut binder = SceneBinder::new(state.clone());

        binder.bind(dataset("a", vec![0.0, 4.0])).unwrap();
        state.set_scrub_time(2.5);
        binder.bind(dataset("b", vec![0.0, 1.0])).unwrap();
        assert_eq!(state.get().duration, 1.0);
        assert_eq!(state.get().scrub_time, 0.0);

        state.set_scrub_time(0.75);
        binder.bind(dataset("a", vec![0.0, 4.0])).unwrap();
        assert_eq!(state.get().duration, 4.0);
        assert_eq!(state.get().scrub_time, 0.0);
        assert_eq!(binder.bound().unwrap().timeline.name(), "a");
    }

    #[test]
    fn unbind_returns_to_idle_defaults() {
        let state = PlaybackState::new();
        let mut binder = SceneBinder::new(state.clone());
        binder.bind(dataset("001", vec![0.0, 2.0])).unwrap();
        binder.unbind().unwrap();
        assert_eq!(state.get(), crate::playback::PlaybackStatus::default());
        assert!(binder.bound().is_none());
        assert!(matches!(
            binder.sample_at(0.0),
            Err(ReplayError::NoActiveScene(_))
        ));
    }

    #[test]
    fn swap_is_rejected_while_recording() {
        let state = PlaybackState::new();
        let mut binder = SceneBinder::new(state.clone());
        binder.bind(dataset("001", vec![0.0, 2.0])).unwrap();
        state.set_recording(true);
        assert!(binder.bind(dataset("002", vec![0.0, 2.0])).is_err());
        assert!(binder.unbind().is_err());
        assert_eq!(binder.bound().unwrap().timeline.name(), "001");
    }

    #[test]
    fn sample_carries_queried_time_and_pose() {
        let state = PlaybackState::new();
        let mut binder = SceneBinder::new(state);
        binder.bind(dataset("001", vec![0.0, 2.0])).unwrap();
        let sample = binder.sample_at(1.0).unwrap();
        assert_eq!(sample.time, 1.0);
        assert_eq!(sample.pose.position, Vec3::new(0.5, 0.0, 0.0));
    }
}
