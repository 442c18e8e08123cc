//! Accumulation target lifecycle, tied to the output resolution.

use crate::{
    device::RenderDevice,
    error::{Error, Result},
};

/// Samples accumulated in the current convergence run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SampleCount(u32);

impl SampleCount {
    pub fn get(self) -> u32 {
        self.0
    }

    pub fn reset(&mut self) {
        self.0 = 0;
    }

    pub fn increment(&mut self) {
        self.0 = self.0.saturating_add(1);
    }
}

/// Images backing one convergence run.
///
/// The kernel writes each new sample into `result`; the compositing pass reads
/// the front accumulation image and writes the blend into the back one, after
/// which the two are swapped.
pub struct Target<I> {
    width: u32,
    height: u32,
    result: I,
    accumulation: [I; 2],
    front: usize,
}

impl<I> Target<I> {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Image the kernel writes its sample into.
    pub fn result(&self) -> &I {
        &self.result
    }

    /// Accumulated average of all samples composited so far.
    pub fn accumulation(&self) -> &I {
        &self.accumulation[self.front]
    }

    /// `(previous, next)` accumulation images for the compositing pass.
    pub fn composite_images(&self) -> (&I, &I) {
        (&self.accumulation[self.front], &self.accumulation[1 - self.front])
    }

    /// Promote the image just written by the compositing pass.
    pub fn swap(&mut self) {
        self.front = 1 - self.front;
    }

    fn release<D>(self, device: &mut D)
    where
        D: RenderDevice<Image = I> + ?Sized,
    {
        let [a, b] = self.accumulation;
        device.release_image(self.result);
        device.release_image(a);
        device.release_image(b);
    }
}

/// Owns the accumulation target and reallocates it when the output size
/// changes. This is the only place a resize restarts accumulation.
pub struct FrameBufferManager<I> {
    target: Option<Target<I>>,
}

impl<I> Default for FrameBufferManager<I> {
    fn default() -> Self {
        Self { target: None }
    }
}

impl<I> FrameBufferManager<I> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target(&self) -> Option<&Target<I>> {
        self.target.as_ref()
    }

    /// Return a target of exactly `width` x `height`, reallocating (and
    /// resetting `samples`) only when the size differs from the current one.
    pub fn ensure_target<D>(
        &mut self,
        device: &mut D,
        width: u32,
        height: u32,
        samples: &mut SampleCount,
    ) -> Result<&mut Target<I>>
    where
        D: RenderDevice<Image = I> + ?Sized,
    {
        if width == 0 || height == 0 {
            return Err(Error::InvalidTargetSize { width, height });
        }

        let target = match self.target.take() {
            Some(current) if current.width == width && current.height == height => current,
            stale => {
                if let Some(old) = stale {
                    tracing::debug!(
                        from_width = old.width,
                        from_height = old.height,
                        "releasing accumulation target"
                    );
                    old.release(device);
                }
                let target = allocate(device, width, height)?;
                tracing::info!(width, height, "allocated accumulation target");
                samples.reset();
                target
            }
        };

        Ok(self.target.insert(target))
    }

    pub fn release<D>(&mut self, device: &mut D)
    where
        D: RenderDevice<Image = I> + ?Sized,
    {
        if let Some(target) = self.target.take() {
            target.release(device);
        }
    }
}

fn allocate<D>(device: &mut D, width: u32, height: u32) -> Result<Target<D::Image>>
where
    D: RenderDevice + ?Sized,
{
    let result = device.create_image(width, height)?;
    let first = match device.create_image(width, height) {
        Ok(image) => image,
        Err(e) => {
            device.release_image(result);
            return Err(e);
        }
    };
    let second = match device.create_image(width, height) {
        Ok(image) => image,
        Err(e) => {
            device.release_image(result);
            device.release_image(first);
            return Err(e);
        }
    };

    Ok(Target {
        width,
        height,
        result,
        accumulation: [first, second],
        front: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockDevice;

    #[test]
    fn same_size_is_idempotent() {
        let mut device = MockDevice::new();
        let mut frame_buffer = FrameBufferManager::new();
        let mut samples = SampleCount::default();

        frame_buffer
            .ensure_target(&mut device, 64, 32, &mut samples)
            .unwrap();
        samples.increment();
        samples.increment();
        let allocations = device.image_allocations;

        let target = frame_buffer
            .ensure_target(&mut device, 64, 32, &mut samples)
            .unwrap();
        assert_eq!((target.width(), target.height()), (64, 32));
        assert_eq!(device.image_allocations, allocations);
        assert_eq!(samples.get(), 2);
    }

    #[test]
    fn resize_reallocates_and_resets() {
        let mut device = MockDevice::new();
        let mut frame_buffer = FrameBufferManager::new();
        let mut samples = SampleCount::default();

        frame_buffer
            .ensure_target(&mut device, 64, 32, &mut samples)
            .unwrap();
        samples.increment();

        let target = frame_buffer
            .ensure_target(&mut device, 64, 48, &mut samples)
            .unwrap();
        assert_eq!((target.width(), target.height()), (64, 48));
        assert_eq!(samples.get(), 0);
        assert_eq!(device.image_allocations, 6);
        assert_eq!(device.live_images(), 3);
    }

    #[test]
    fn zero_size_is_rejected_before_allocation() {
        let mut device = MockDevice::new();
        let mut frame_buffer = FrameBufferManager::new();
        let mut samples = SampleCount::default();

        let err = frame_buffer
            .ensure_target(&mut device, 0, 100, &mut samples)
            .err();
        assert!(matches!(
            err,
            Some(Error::InvalidTargetSize {
                width: 0,
                height: 100
            })
        ));
        assert_eq!(device.image_allocations, 0);
        assert!(frame_buffer.target().is_none());
    }

    #[test]
    fn failed_allocation_leaks_nothing() {
        let mut device = MockDevice::new();
        device.fail_image_after = Some(2);
        let mut frame_buffer = FrameBufferManager::new();
        let mut samples = SampleCount::default();

        let result = frame_buffer.ensure_target(&mut device, 16, 16, &mut samples);
        assert!(matches!(result, Err(Error::Allocation { .. })));
        assert_eq!(device.live_images(), 0);
        assert!(frame_buffer.target().is_none());
    }

    #[test]
    fn swap_flips_accumulation_images() {
        let mut device = MockDevice::new();
        let mut frame_buffer = FrameBufferManager::new();
        let mut samples = SampleCount::default();
        let target = frame_buffer
            .ensure_target(&mut device, 8, 8, &mut samples)
            .unwrap();

        let (previous, next) = target.composite_images();
        let (previous, next) = (*previous, *next);
        assert_eq!(*target.accumulation(), previous);
        target.swap();
        assert_eq!(*target.accumulation(), next);
        assert_eq!(*target.composite_images().1, previous);
    }

    #[test]
    fn release_frees_all_images() {
        let mut device = MockDevice::new();
        let mut frame_buffer = FrameBufferManager::new();
        let mut samples = SampleCount::default();
        frame_buffer
            .ensure_target(&mut device, 8, 8, &mut samples)
            .unwrap();
        assert_eq!(device.live_images(), 3);

        frame_buffer.release(&mut device);
        assert_eq!(device.live_images(), 0);
        frame_buffer.release(&mut device);
    }
}
