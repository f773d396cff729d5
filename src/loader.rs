use std::sync::Arc;

use glam::{Quat, Vec3};
use serde::Deserialize;

use crate::{
    error::{ReplayError, ReplayResult},
    source::AssetSource,
    timeline::{Pose, Timeline},
};

/// Metres per degree of latitude/longitude, matching the capture tooling's
/// flat-earth approximation for short vehicle tracks.
const LATLONG_TO_METERS: f64 = 111_139.0;

/// One sample's point-cloud buffer plus per-point classification labels.
///
/// `labels` is always index-aligned with `points`; a missing annotation
/// buffer degrades to all zeros rather than an absent field.
#[derive(Clone, Debug, Default)]
pub struct FramePayload {
    pub points: Vec<[f32; 3]>,
    pub labels: Vec<i32>,
}

impl FramePayload {
    pub fn new(points: Vec<[f32; 3]>, labels: Vec<i32>) -> ReplayResult<Self> {
        if labels.len() != points.len() {
            return Err(ReplayError::validation(format!(
                "frame payload has {} points but {} labels",
                points.len(),
                labels.len()
            )));
        }
        Ok(Self { points, labels })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn point_count(&self) -> usize {
        self.points.len()
    }
}

/// The dataset's frame payloads, index-aligned with its timeline samples.
#[derive(Clone, Debug, Default)]
pub struct FrameSet {
    frames: Vec<FramePayload>,
}

impl FrameSet {
    pub fn new(frames: Vec<FramePayload>) -> Self {
        Self { frames }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&FramePayload> {
        self.frames.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FramePayload> {
        self.frames.iter()
    }
}

/// A fully loaded dataset, ready to hand to the scene binder.
#[derive(Clone, Debug)]
pub struct LoadedDataset {
    pub timeline: Timeline,
    pub frames: FrameSet,
}

#[derive(Debug, Deserialize)]
struct Vec3Record {
    x: f64,
    y: f64,
    z: f64,
}

#[derive(Debug, Deserialize)]
struct QuatRecord {
    x: f64,
    y: f64,
    z: f64,
    w: f64,
}

#[derive(Debug, Deserialize)]
struct PoseRecord {
    position: Vec3Record,
    heading: QuatRecord,
}

#[derive(Debug, Deserialize)]
struct GpsRecord {
    lat: f64,
    long: f64,
    height: f64,
    #[serde(default)]
    #[allow(dead_code)]
    xvel: f64,
    #[serde(default)]
    #[allow(dead_code)]
    yvel: f64,
}

/// Fetches a named dataset's timestamps, poses, and per-sample point buffers
/// from an [`AssetSource`] and assembles a [`LoadedDataset`].
pub struct DatasetLoader {
    source: Arc<dyn AssetSource>,
}

impl DatasetLoader {
    pub fn new(source: Arc<dyn AssetSource>) -> Self {
        Self { source }
    }

    /// Load dataset `name`.
    ///
    /// Metadata failures surface as [`ReplayError::DataUnavailable`] (or
    /// [`ReplayError::MalformedDataset`] for cardinality/ordering problems)
    /// and install nothing. Per-index frame fetches run concurrently but the
    /// result settles in index order; a failed point buffer degrades to an
    /// empty payload and a missing annotation buffer to zero labels, neither
    /// fails the load.
    #[tracing::instrument(skip(self))]
    pub async fn load(&self, name: &str) -> ReplayResult<LoadedDataset> {
        let timestamps = self.load_timestamps(name).await?;
        let poses = self.load_poses(name, &timestamps).await?;
        if poses.len() != timestamps.len() {
            return Err(ReplayError::malformed(format!(
                "dataset '{name}' has {} timestamps but {} poses",
                timestamps.len(),
                poses.len()
            )));
        }

        let timeline = Timeline::new(name, timestamps, poses)?;
        let frames = self.load_frames(name, timeline.sample_count()).await?;
        tracing::info!(
            dataset = name,
            samples = timeline.sample_count(),
            duration_secs = timeline.duration(),
            "dataset loaded"
        );
        Ok(LoadedDataset { timeline, frames })
    }

    async fn load_timestamps(&self, name: &str) -> ReplayResult<Vec<f64>> {
        let bytes = self
            .source
            .fetch(&format!("{name}/meta/timestamps.json"))
            .await?;
        serde_json::from_slice(&bytes).map_err(|e| {
            ReplayError::data_unavailable(format!("dataset '{name}' timestamps.json: {e}"))
        })
    }

    /// Camera poses are preferred; datasets without a camera track fall back
    /// to the GPS trace, projected to local metres with identity headings.
    async fn load_poses(&self, name: &str, timestamps: &[f64]) -> ReplayResult<Vec<Pose>> {
        let camera_path = format!("{name}/camera/front_camera/poses.json");
        if let Some(bytes) = self.source.fetch_optional(&camera_path).await? {
            let records: Vec<PoseRecord> = serde_json::from_slice(&bytes).map_err(|e| {
                ReplayError::data_unavailable(format!("dataset '{name}' poses.json: {e}"))
            })?;
            return Ok(records
                .iter()
                .map(|r| {
                    Pose::new(
                        Vec3::new(r.position.x as f32, r.position.y as f32, r.position.z as f32),
                        Quat::from_xyzw(
                            r.heading.x as f32,
                            r.heading.y as f32,
                            r.heading.z as f32,
                            r.heading.w as f32,
                        ),
                    )
                })
                .collect());
        }

        tracing::debug!(dataset = name, "no camera poses, falling back to gps track");
        let bytes = self.source.fetch(&format!("{name}/meta/gps.json")).await?;
        let records: Vec<GpsRecord> = serde_json::from_slice(&bytes).map_err(|e| {
            ReplayError::data_unavailable(format!("dataset '{name}' gps.json: {e}"))
        })?;
        if records.is_empty() && !timestamps.is_empty() {
            return Err(ReplayError::malformed(format!(
                "dataset '{name}' gps track is empty"
            )));
        }
        Ok(gps_to_local_poses(&records))
    }

    async fn load_frames(&self, name: &str, count: usize) -> ReplayResult<FrameSet> {
        // Independent indices fetch concurrently; awaiting the handles in
        // spawn order settles the list back into index order, so consumers
        // never observe a partial reordering.
        let mut handles = Vec::with_capacity(count);
        for index in 0..count {
            let source = Arc::clone(&self.source);
            let dataset = name.to_string();
            handles.push(tokio::spawn(async move {
                load_frame(source.as_ref(), &dataset, index).await
            }));
        }

        let mut frames = Vec::with_capacity(count);
        for (index, handle) in handles.into_iter().enumerate() {
            let payload = handle.await.map_err(|e| {
                ReplayError::data_unavailable(format!(
                    "dataset '{name}' frame {index} task aborted: {e}"
                ))
            })?;
            frames.push(payload);
        }
        Ok(FrameSet::new(frames))
    }
}

/// Fetch and decode one sample's point buffer plus optional annotations.
/// Recovery is local: a failed point fetch yields an empty payload, a
/// missing or mis-sized annotation buffer yields zero labels.
async fn load_frame(source: &dyn AssetSource, dataset: &str, index: usize) -> FramePayload {
    let points_path = format!("{dataset}/lidar_bin/{index:02}.bin");
    let points = match source.fetch(&points_path).await {
        Ok(bytes) => decode_points(&bytes),
        Err(e) => {
            tracing::warn!(dataset, index, error = %e, "point buffer fetch failed, frame degrades to empty");
            return FramePayload::empty();
        }
    };

    let labels_path = format!("{dataset}/annotations_bin/semseg/{index:02}.bin");
    let labels = match source.fetch_optional(&labels_path).await {
        Ok(Some(bytes)) => {
            let labels = decode_labels(&bytes);
            if labels.len() == points.len() {
                labels
            } else {
                tracing::warn!(
                    dataset,
                    index,
                    got = labels.len(),
                    expected = points.len(),
                    "annotation cardinality mismatch, using zero labels"
                );
                vec![0; points.len()]
            }
        }
        Ok(None) => vec![0; points.len()],
        Err(e) => {
            tracing::warn!(dataset, index, error = %e, "annotation fetch failed, using zero labels");
            vec![0; points.len()]
        }
    };

    FramePayload { points, labels }
}

fn gps_to_local_poses(records: &[GpsRecord]) -> Vec<Pose> {
    let Some(origin) = records.first() else {
        return Vec::new();
    };
    records
        .iter()
        .map(|r| {
            Pose::at(Vec3::new(
                ((r.lat - origin.lat) * LATLONG_TO_METERS) as f32,
                ((r.long - origin.long) * LATLONG_TO_METERS) as f32,
                (r.height - origin.height) as f32,
            ))
        })
        .collect()
}

/// Raw little-endian f32 (x, y, z) triples. A trailing partial triple is
/// dropped rather than rejected; sensor exports occasionally pad.
fn decode_points(bytes: &[u8]) -> Vec<[f32; 3]> {
    let floats: Vec<f32> = bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    floats
        .chunks_exact(3)
        .map(|c| [c[0], c[1], c[2]])
        .collect()
}

/// Raw little-endian i32 labels, one per point.
fn decode_labels(bytes: &[u8]) -> Vec<i32> {
    bytes
        .chunks_exact(4)
        .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_points_drops_partial_triple() {
        let mut bytes = Vec::new();
        for v in [1.0f32, 2.0, 3.0, 4.0] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        let points = decode_points(&bytes);
        assert_eq!(points, vec![[1.0, 2.0, 3.0]]);
    }

    #[test]
    fn decode_labels_roundtrips_le() {
        let mut bytes = Vec::new();
        for v in [0i32, 7, -1] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        assert_eq!(decode_labels(&bytes), vec![0, 7, -1]);
    }

    #[test]
    fn gps_track_is_relative_to_first_fix() {
        let records = vec![
            GpsRecord {
                lat: 37.0,
                long: -122.0,
                height: 10.0,
                xvel: 0.0,
                yvel: 0.0,
            },
            GpsRecord {
                lat: 37.00001,
                long: -122.0,
                height: 12.0,
                xvel: 0.0,
                yvel: 0.0,
            },
        ];
        let poses = gps_to_local_poses(&records);
        assert_eq!(poses[0].position, Vec3::ZERO);
        assert!((poses[1].position.x - 1.11139).abs() < 1e-3);
        assert_eq!(poses[1].position.z, 2.0);
    }

    #[test]
    fn payload_requires_aligned_labels() {
        assert!(FramePayload::new(vec![[0.0; 3]], vec![]).is_err());
        assert!(FramePayload::new(vec![[0.0; 3]], vec![0]).is_ok());
    }
}
