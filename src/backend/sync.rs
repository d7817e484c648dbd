// Synchronization primitives
//
// Fences, semaphores for GPU-CPU and GPU-GPU sync, plus the ring that decides
// which in-flight slot a frame uses.

use ash::vk;
use std::time::Duration;

use super::Device;
use crate::error::{RenderError, RenderResult};

/// Frame synchronization - one per frame in flight
pub struct FrameSync<'d> {
    pub image_available: vk::Semaphore,
    pub render_finished: vk::Semaphore,
    pub in_flight_fence: vk::Fence,
    device: &'d Device,
}

impl<'d> FrameSync<'d> {
    pub fn new(device: &'d Device) -> RenderResult<Self> {
        let semaphore_info = vk::SemaphoreCreateInfo::builder();
        let fence_info = vk::FenceCreateInfo::builder()
            .flags(vk::FenceCreateFlags::SIGNALED); // Start signaled

        // Null handles are valid to destroy, so a half-built set drops cleanly
        let mut sync = Self {
            image_available: vk::Semaphore::null(),
            render_finished: vk::Semaphore::null(),
            in_flight_fence: vk::Fence::null(),
            device,
        };

        let handle = device.handle();
        unsafe {
            sync.image_available = handle.create_semaphore(&semaphore_info, None)?;
            sync.render_finished = handle.create_semaphore(&semaphore_info, None)?;
            sync.in_flight_fence = handle.create_fence(&fence_info, None)?;
        }

        Ok(sync)
    }

    /// Block until the GPU has finished the last submission made with this slot
    pub fn wait(&self, timeout: u64) -> RenderResult<()> {
        unsafe {
            self.device
                .handle()
                .wait_for_fences(&[self.in_flight_fence], true, timeout)
        }
        .map_err(RenderError::from_frame_result)
    }

    pub fn reset(&self) -> RenderResult<()> {
        unsafe { self.device.handle().reset_fences(&[self.in_flight_fence]) }?;
        Ok(())
    }
}

impl Drop for FrameSync<'_> {
    fn drop(&mut self) {
        let device = self.device.handle();
        unsafe {
            device.destroy_semaphore(self.image_available, None);
            device.destroy_semaphore(self.render_finished, None);
            device.destroy_fence(self.in_flight_fence, None);
        }
    }
}

/// Fence operations the frame ring drives, one fence per in-flight slot
pub trait SlotFences {
    /// Block until the last submission made with `slot` has finished
    fn wait(&mut self, slot: usize, timeout: u64) -> RenderResult<()>;

    fn reset(&mut self, slot: usize) -> RenderResult<()>;
}

impl SlotFences for [FrameSync<'_>] {
    fn wait(&mut self, slot: usize, timeout: u64) -> RenderResult<()> {
        self[slot].wait(timeout)
    }

    fn reset(&mut self, slot: usize) -> RenderResult<()> {
        self[slot].reset()
    }
}

/// Time left of a `total` nanosecond budget after `elapsed`.
///
/// `u64::MAX` means wait indefinitely and stays that way.
pub fn remaining_timeout(total: u64, elapsed: Duration) -> u64 {
    if total == u64::MAX {
        return u64::MAX;
    }
    let elapsed = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
    total.saturating_sub(elapsed)
}

/// Frame pacing ring.
///
/// Hands out in-flight slots round-robin and remembers which slot last
/// rendered into each swap-chain image, so a new frame never writes an image
/// whose previous frame is still on the GPU.
///
/// Per frame: [`begin_acquire`](Self::begin_acquire), then
/// [`begin_submit`](Self::begin_submit), submit with the returned slot's
/// fence, then [`advance`](Self::advance).
#[derive(Debug, Clone)]
pub struct FrameRing {
    slots: usize,
    current: usize,
    image_owners: Vec<Option<usize>>,
    frames_submitted: u64,
}

impl FrameRing {
    pub fn new(slots: usize, image_count: usize) -> Self {
        assert!(slots > 0, "frame ring needs at least one in-flight slot");
        Self {
            slots,
            current: 0,
            image_owners: vec![None; image_count],
            frames_submitted: 0,
        }
    }

    #[inline]
    pub fn current_slot(&self) -> usize {
        self.current
    }

    #[inline]
    pub fn slot_count(&self) -> usize {
        self.slots
    }

    #[inline]
    pub fn frames_submitted(&self) -> u64 {
        self.frames_submitted
    }

    /// Slot that last rendered into `image`, if any
    pub fn image_owner(&self, image: usize) -> Option<usize> {
        self.image_owners[image]
    }

    /// Wait until the current slot's previous frame is off the GPU, so its
    /// semaphores and fence can be reused. Returns the current slot.
    pub fn begin_acquire<F: SlotFences + ?Sized>(
        &self,
        fences: &mut F,
        timeout: u64,
    ) -> RenderResult<usize> {
        fences.wait(self.current, timeout)?;
        Ok(self.current)
    }

    /// Prepare the current slot to render into `image`.
    ///
    /// Waits for the frame that last rendered `image` when that was another
    /// slot, marks the image as owned by the current slot and resets the
    /// current slot's fence. Returns the slot whose fence the submission
    /// must signal.
    pub fn begin_submit<F: SlotFences + ?Sized>(
        &mut self,
        image: usize,
        fences: &mut F,
    ) -> RenderResult<usize> {
        let slot = self.current;

        if let Some(previous) = self.image_owners[image] {
            if previous != slot {
                fences.wait(previous, u64::MAX)?;
            }
        }
        self.image_owners[image] = Some(slot);

        fences.reset(slot)?;
        Ok(slot)
    }

    /// Move to the next slot once the current frame has been submitted
    pub fn advance(&mut self) {
        self.current = (self.current + 1) % self.slots;
        self.frames_submitted += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;

    #[test]
    fn slots_wrap_around() {
        let mut ring = FrameRing::new(2, 3);
        let visited: Vec<usize> = (0..5)
            .map(|_| {
                let slot = ring.current_slot();
                ring.advance();
                slot
            })
            .collect();
        assert_eq!(visited, vec![0, 1, 0, 1, 0]);
        assert_eq!(ring.frames_submitted(), 5);
    }

    #[test]
    #[should_panic(expected = "at least one in-flight slot")]
    fn zero_slots_rejected() {
        FrameRing::new(0, 2);
    }

    #[test]
    fn remaining_timeout_counts_down() {
        assert_eq!(remaining_timeout(1_000_000, Duration::from_micros(400)), 600_000);
        assert_eq!(remaining_timeout(1_000_000, Duration::ZERO), 1_000_000);
    }

    #[test]
    fn remaining_timeout_saturates_at_zero() {
        assert_eq!(remaining_timeout(1_000_000, Duration::from_millis(5)), 0);
        assert_eq!(remaining_timeout(0, Duration::from_nanos(1)), 0);
    }

    #[test]
    fn indefinite_timeout_stays_indefinite() {
        assert_eq!(remaining_timeout(u64::MAX, Duration::from_secs(3600)), u64::MAX);
        assert_eq!(remaining_timeout(u64::MAX, Duration::MAX), u64::MAX);
    }

    /// Records every fence call the ring makes
    #[derive(Default)]
    struct FenceLog {
        calls: Vec<(&'static str, usize, u64)>,
    }

    impl SlotFences for FenceLog {
        fn wait(&mut self, slot: usize, timeout: u64) -> RenderResult<()> {
            self.calls.push(("wait", slot, timeout));
            Ok(())
        }

        fn reset(&mut self, slot: usize) -> RenderResult<()> {
            self.calls.push(("reset", slot, 0));
            Ok(())
        }
    }

    #[test]
    fn acquire_waits_on_current_slot_with_given_timeout() {
        let mut ring = FrameRing::new(2, 3);
        ring.advance();
        let mut fences = FenceLog::default();

        assert_eq!(ring.begin_acquire(&mut fences, 250).unwrap(), 1);
        assert_eq!(fences.calls, vec![("wait", 1, 250)]);
    }

    #[test]
    fn submit_waits_for_image_previous_owner_then_resets() {
        let mut ring = FrameRing::new(2, 3);
        let mut fences = FenceLog::default();

        // Slot 0 renders image 2
        assert_eq!(ring.begin_submit(2, &mut fences).unwrap(), 0);
        assert_eq!(fences.calls, vec![("reset", 0, 0)]);
        ring.advance();

        // Slot 1 gets image 2 back while slot 0 may still be drawing it
        fences.calls.clear();
        assert_eq!(ring.begin_submit(2, &mut fences).unwrap(), 1);
        assert_eq!(fences.calls, vec![("wait", 0, u64::MAX), ("reset", 1, 0)]);
        assert_eq!(ring.image_owner(2), Some(1));
    }

    #[test]
    fn submit_skips_wait_when_image_owner_is_current_slot() {
        let mut ring = FrameRing::new(1, 2);
        let mut fences = FenceLog::default();

        ring.begin_submit(0, &mut fences).unwrap();
        ring.advance();
        fences.calls.clear();

        // Acquire already waited on this slot's fence
        ring.begin_submit(0, &mut fences).unwrap();
        assert_eq!(fences.calls, vec![("reset", 0, 0)]);
    }

    #[test]
    fn failed_wait_leaves_image_owner_unchanged() {
        struct Stuck;
        impl SlotFences for Stuck {
            fn wait(&mut self, _slot: usize, _timeout: u64) -> RenderResult<()> {
                Err(RenderError::FrameTimeout)
            }
            fn reset(&mut self, _slot: usize) -> RenderResult<()> {
                Ok(())
            }
        }

        let mut ring = FrameRing::new(2, 2);
        ring.begin_submit(1, &mut FenceLog::default()).unwrap();
        ring.advance();

        assert!(ring.begin_submit(1, &mut Stuck).is_err());
        assert_eq!(ring.image_owner(1), Some(0));
    }

    /// Fence state of one slot in the simulated GPU
    #[derive(Clone, Copy)]
    struct SimFence {
        signaled: bool,
        frame: Option<u64>,
    }

    /// Minimal stand-in for the GPU queue: submissions complete in order,
    /// either on their own or when the CPU blocks on their fence.
    struct SimGpu {
        fences: Vec<SimFence>,
        queue: VecDeque<(usize, u64)>,
        completed: Vec<bool>,
    }

    impl SimGpu {
        fn new(slots: usize, frames: usize) -> Self {
            Self {
                fences: vec![SimFence { signaled: true, frame: None }; slots],
                queue: VecDeque::new(),
                completed: vec![false; frames],
            }
        }

        fn complete_oldest(&mut self) {
            if let Some((slot, frame)) = self.queue.pop_front() {
                self.completed[frame as usize] = true;
                if self.fences[slot].frame == Some(frame) {
                    self.fences[slot].signaled = true;
                }
            }
        }

        fn submit(&mut self, slot: usize, frame: u64) {
            assert!(!self.fences[slot].signaled, "submitted with a fence that was not reset");
            self.fences[slot].frame = Some(frame);
            self.queue.push_back((slot, frame));
        }
    }

    impl SlotFences for SimGpu {
        /// CPU wait: drain the queue until the fence signals
        fn wait(&mut self, slot: usize, _timeout: u64) -> RenderResult<()> {
            while !self.fences[slot].signaled {
                assert!(!self.queue.is_empty(), "waiting on a fence nothing will signal");
                self.complete_oldest();
            }
            Ok(())
        }

        fn reset(&mut self, slot: usize) -> RenderResult<()> {
            self.fences[slot].signaled = false;
            Ok(())
        }
    }

    fn run_frames(slots: usize, image_count: usize, frames: usize, acquire: impl Fn(u64) -> usize) {
        let mut ring = FrameRing::new(slots, image_count);
        let mut gpu = SimGpu::new(slots, frames);
        let mut image_last_frame: Vec<Option<u64>> = vec![None; image_count];

        for frame in 0..frames as u64 {
            let slot = ring.begin_acquire(&mut gpu, u64::MAX).unwrap();
            if let Some(previous) = gpu.fences[slot].frame {
                assert_eq!(previous + slots as u64, frame, "slot reused out of order");
                assert!(gpu.completed[previous as usize]);
            }
            let image = acquire(frame);

            let submit_slot = ring.begin_submit(image, &mut gpu).unwrap();
            assert_eq!(submit_slot, slot);
            if let Some(previous) = image_last_frame[image] {
                assert!(gpu.completed[previous as usize], "image {image} written while in use");
            }

            gpu.submit(submit_slot, frame);
            image_last_frame[image] = Some(frame);
            assert!(gpu.queue.len() <= slots, "backlog exceeded the in-flight bound");

            ring.advance();

            // the GPU sometimes gets ahead on its own
            if frame % 3 == 0 {
                gpu.complete_oldest();
            }
        }

        assert_eq!(ring.frames_submitted(), frames as u64);
    }

    #[test]
    fn ten_thousand_frames_two_slots_round_robin_images() {
        run_frames(2, 3, 10_000, |frame| (frame % 3) as usize);
    }

    #[test]
    fn ten_thousand_frames_two_slots_irregular_images() {
        // Presentation engines may hand images back in any order
        run_frames(2, 3, 10_000, |frame| ((frame * 7 + frame / 5) % 3) as usize);
    }

    #[test]
    fn image_count_equal_to_slot_count() {
        run_frames(2, 2, 2_000, |frame| (frame % 2) as usize);
        run_frames(3, 3, 2_000, |frame| ((frame + frame / 4) % 3) as usize);
    }
}
