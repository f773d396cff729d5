use glam::{Quat, Vec3};

use crate::error::{ReplayError, ReplayResult};

/// One vehicle pose sample: position plus heading as a unit quaternion.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub heading: Quat,
}

impl Pose {
    pub const IDENTITY: Pose = Pose {
        position: Vec3::ZERO,
        heading: Quat::IDENTITY,
    };

    pub fn new(position: Vec3, heading: Quat) -> Self {
        Self { position, heading }
    }

    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            heading: Quat::IDENTITY,
        }
    }
}

/// Immutable per-dataset value: the ordered sample timestamps, the
/// index-aligned poses, and the derived duration.
///
/// Timestamps are absolute seconds; the first entry is the dataset's time
/// origin (not necessarily zero). All continuous-time queries take seconds
/// relative to that origin.
#[derive(Clone, Debug)]
pub struct Timeline {
    name: String,
    timestamps: Vec<f64>,
    poses: Vec<Pose>,
    duration: f64,
}

impl Timeline {
    pub fn new(
        name: impl Into<String>,
        timestamps: Vec<f64>,
        poses: Vec<Pose>,
    ) -> ReplayResult<Self> {
        let name = name.into();
        if timestamps.is_empty() {
            return Err(ReplayError::validation(
                "timeline requires at least one sample",
            ));
        }
        if timestamps.len() != poses.len() {
            return Err(ReplayError::malformed(format!(
                "dataset '{name}' has {} timestamps but {} poses",
                timestamps.len(),
                poses.len()
            )));
        }
        if timestamps.iter().any(|t| !t.is_finite() || *t < 0.0) {
            return Err(ReplayError::malformed(format!(
                "dataset '{name}' contains a negative or non-finite timestamp"
            )));
        }
        if timestamps.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ReplayError::malformed(format!(
                "dataset '{name}' timestamps are not strictly increasing"
            )));
        }

        let duration = timestamps[timestamps.len() - 1] - timestamps[0];
        Ok(Self {
            name,
            timestamps,
            poses,
            duration,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sample_count(&self) -> usize {
        self.timestamps.len()
    }

    pub fn timestamps(&self) -> &[f64] {
        &self.timestamps
    }

    pub fn poses(&self) -> &[Pose] {
        &self.poses
    }

    /// Seconds spanned by the sample sequence. Zero for single-sample
    /// datasets; callers must guard division/modulo accordingly.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Sample timestamp at `index`, relative to the dataset's time origin.
    pub fn rel_time(&self, index: usize) -> f64 {
        self.timestamps[index] - self.timestamps[0]
    }

    /// Pose at continuous time `t` seconds from the dataset's time origin.
    ///
    /// Position is linearly interpolated between the bracketing samples.
    /// Heading is the lower bracket's heading unmodified: nearest-sample, no
    /// spherical interpolation. That is a deliberate policy, preserved for
    /// output parity with prior captures; do not "upgrade" it to slerp.
    ///
    /// `t` at or past the last sample clamps to the last pose; negative `t`
    /// clamps to the first. Linear scan is fine at tens of samples.
    pub fn pose_at(&self, t: f64) -> Pose {
        if t <= 0.0 {
            return self.poses[0];
        }
        for i in 0..self.timestamps.len() - 1 {
            let t1 = self.rel_time(i);
            let t2 = self.rel_time(i + 1);
            if t1 <= t && t < t2 {
                let fraction = ((t - t1) / (t2 - t1)) as f32;
                let p1 = self.poses[i];
                let p2 = self.poses[i + 1];
                return Pose {
                    position: p1.position.lerp(p2.position, fraction),
                    heading: p1.heading,
                };
            }
        }
        self.poses[self.poses.len() - 1]
    }
}
