use glam::Mat4;

use crate::frame_buffer::SampleCount;

/// Restarts accumulation when the camera or the light moves.
///
/// Movement is detected by comparing this frame's transforms bit for bit with
/// the ones seen last frame; there is no tolerance. This is the only place
/// movement restarts accumulation.
#[derive(Debug, Default)]
pub struct InvalidationTracker {
    camera: Option<Mat4>,
    light: Option<Mat4>,
    dirty: bool,
}

impl InvalidationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Force a restart on the next observation, for changes the transforms
    /// do not capture.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Compare against the cached snapshot, refresh it, and reset `samples`
    /// once if anything changed. Returns whether a reset happened.
    pub fn observe(&mut self, camera: Mat4, light: Mat4, samples: &mut SampleCount) -> bool {
        let camera_moved = self.camera != Some(camera);
        let light_moved = self.light != Some(light);

        if camera_moved {
            self.camera = Some(camera);
        }
        if light_moved {
            self.light = Some(light);
        }

        let reset = camera_moved || light_moved || std::mem::take(&mut self.dirty);
        if reset {
            tracing::debug!(camera_moved, light_moved, "restarting accumulation");
            samples.reset();
        }
        reset
    }

    /// Forget the snapshot so the next observation restarts accumulation.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
