use crate::{
    error::{ReplayError, ReplayResult},
    scene::SceneSample,
};

/// One rendered still: tightly packed RGBA8 pixels, row-major.
#[derive(Clone, Debug)]
pub struct FrameRgba {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl FrameRgba {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> ReplayResult<Self> {
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(ReplayError::validation(format!(
                "frame data is {} bytes, expected {expected} for {width}x{height} rgba8",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let mut data = Vec::with_capacity(width as usize * height as usize * 4);
        for _ in 0..width as usize * height as usize {
            data.extend_from_slice(&rgba);
        }
        Self {
            width,
            height,
            data,
        }
    }
}

/// The rendering surface collaborator.
///
/// The engine only ever says "render simulated time T"; mesh drawing, shader
/// uniforms, and camera handling live behind this seam. Offscreen capture
/// renders go through the same call as live ticks.
pub trait RenderSurface {
    fn render_at(&mut self, sample: &SceneSample) -> ReplayResult<FrameRgba>;
}
