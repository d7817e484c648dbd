// Frame orchestration
//
// FRAME FLOW:
// 1. Acquire a swap-chain image (waits on the current slot's fence)
// 2. Pick the command buffer pre-recorded for that image
// 3. Submit it, waiting on image-available, signaling render-finished
// 4. Present, waiting on render-finished
// 5. Advance to the next in-flight slot

use ash::vk;
use std::path::Path;
use std::time::{Duration, Instant};

use crate::backend::pipeline::{GraphicsPipeline, PipelineConfig, PipelineLayout};
use crate::backend::swapchain::{PresentStatus, Swapchain};
use crate::backend::device::log_idle_failure;
use crate::backend::Device;
use crate::error::{RenderError, RenderResult};
use crate::model::{Model, Vertex};

/// Where the current frame is in its acquire/record/submit/present cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FramePhase {
    #[default]
    Idle,
    Acquired,
    Recorded,
    Submitted,
    Presented,
}

impl FramePhase {
    pub fn next(self) -> Self {
        match self {
            FramePhase::Idle => FramePhase::Acquired,
            FramePhase::Acquired => FramePhase::Recorded,
            FramePhase::Recorded => FramePhase::Submitted,
            FramePhase::Submitted => FramePhase::Presented,
            FramePhase::Presented => FramePhase::Idle,
        }
    }

    /// Whether `to` may follow `self`. Dropping back to `Idle` is always
    /// allowed so a frame can be abandoned.
    pub fn can_advance_to(self, to: Self) -> bool {
        to == self.next() || to == FramePhase::Idle
    }

    pub fn advance(&mut self, to: Self) {
        debug_assert!(
            self.can_advance_to(to),
            "illegal frame transition {:?} -> {:?}",
            self,
            to
        );
        *self = to;
    }
}

/// What happened to one call of [`FrameOrchestrator::draw_frame`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Presented { image_index: u32, suboptimal: bool },
    /// Surface no longer matches the swap chain; the frame was skipped
    OutOfDate,
}

/// One FPS reading, produced about once per second
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FpsSample {
    pub fps: f32,
    pub frame_time_ms: f32,
}

/// Frame counter with a once-per-second FPS summary
#[derive(Debug, Clone)]
pub struct FrameStats {
    total_frames: u64,
    window_frames: u32,
    window_start: Instant,
    last_frame: Instant,
    interval: Duration,
}

impl FrameStats {
    pub fn new(now: Instant) -> Self {
        Self {
            total_frames: 0,
            window_frames: 0,
            window_start: now,
            last_frame: now,
            interval: Duration::from_secs(1),
        }
    }

    /// Count a presented frame; returns a sample once the interval has passed
    pub fn record_frame(&mut self, now: Instant) -> Option<FpsSample> {
        let frame_time = now.duration_since(self.last_frame);
        self.last_frame = now;
        self.total_frames += 1;
        self.window_frames += 1;

        let elapsed = now.duration_since(self.window_start);
        if elapsed < self.interval {
            return None;
        }

        let sample = FpsSample {
            fps: self.window_frames as f32 / elapsed.as_secs_f32(),
            frame_time_ms: frame_time.as_secs_f32() * 1000.0,
        };
        self.window_frames = 0;
        self.window_start = now;
        Some(sample)
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }
}

/// Primary command buffers, one per swap-chain image
struct CommandBuffers<'d> {
    buffers: Vec<vk::CommandBuffer>,
    device: &'d Device,
}

impl<'d> CommandBuffers<'d> {
    fn allocate(device: &'d Device, count: usize) -> RenderResult<Self> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(device.command_pool())
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count as u32);

        let buffers = unsafe { device.handle().allocate_command_buffers(&alloc_info) }?;
        Ok(Self { buffers, device })
    }
}

impl Drop for CommandBuffers<'_> {
    fn drop(&mut self) {
        if !self.buffers.is_empty() {
            unsafe {
                self.device
                    .handle()
                    .free_command_buffers(self.device.command_pool(), &self.buffers)
            };
        }
    }
}

/// Counts consecutive out-of-date frames so a window stuck in that state
/// warns once instead of every frame.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct OutOfDateStreak {
    frames: u64,
}

impl OutOfDateStreak {
    /// Count one more out-of-date frame and return the level to log it at
    pub fn record(&mut self) -> log::Level {
        self.frames += 1;
        if self.frames == 1 {
            log::Level::Warn
        } else {
            log::Level::Trace
        }
    }

    /// A frame reached the screen; the next out-of-date warns again
    pub fn clear(&mut self) -> u64 {
        std::mem::take(&mut self.frames)
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

/// Drives acquire → record → submit → present for one swap chain.
///
/// IMPORTANT: field order is teardown order. `Drop` waits for the device to
/// go idle, then the pipeline, command buffers, layout, model and swap chain
/// are released in that order.
pub struct FrameOrchestrator<'d> {
    pipeline: GraphicsPipeline<'d>,
    command_buffers: CommandBuffers<'d>,
    pipeline_layout: PipelineLayout<'d>,
    model: Model<'d>,
    swapchain: Swapchain<'d>,

    phase: FramePhase,
    out_of_date: OutOfDateStreak,
    clear_color: [f32; 4],
    acquire_timeout: u64,
    device: &'d Device,
}

impl<'d> FrameOrchestrator<'d> {
    /// Build the pipeline for `swapchain` and record one command buffer per
    /// image. Recording happens once; frames only resubmit.
    pub fn new(
        device: &'d Device,
        swapchain: Swapchain<'d>,
        vertex_shader: impl AsRef<Path>,
        fragment_shader: impl AsRef<Path>,
        clear_color: [f32; 4],
    ) -> RenderResult<Self> {
        let pipeline_layout = PipelineLayout::new(device)?;

        let extent = swapchain.extent();
        let mut config = PipelineConfig::default_for(extent.width, extent.height);
        config.render_pass = swapchain.render_pass();
        config.pipeline_layout = pipeline_layout.handle();

        let pipeline = GraphicsPipeline::from_files(
            device,
            vertex_shader,
            fragment_shader,
            &config,
            &Vertex::input_layout(),
        )?;

        let model = Model::triangle(device)?;
        let command_buffers = CommandBuffers::allocate(device, swapchain.image_count())?;

        let orchestrator = Self {
            pipeline,
            command_buffers,
            pipeline_layout,
            model,
            swapchain,
            phase: FramePhase::Idle,
            out_of_date: OutOfDateStreak::default(),
            clear_color,
            acquire_timeout: u64::MAX,
            device,
        };

        orchestrator.record_command_buffers()?;
        log::info!(
            "Recorded {} command buffers",
            orchestrator.command_buffers.buffers.len()
        );

        Ok(orchestrator)
    }

    /// Nanoseconds `draw_frame` may block on acquire before giving up
    pub fn with_acquire_timeout(mut self, timeout_ns: u64) -> Self {
        self.acquire_timeout = timeout_ns;
        self
    }

    fn record_command_buffers(&self) -> RenderResult<()> {
        let device = self.device.handle();
        let extent = self.swapchain.extent();

        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: self.clear_color,
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            },
        ];

        for (i, &cmd) in self.command_buffers.buffers.iter().enumerate() {
            let begin_info = vk::CommandBufferBeginInfo::builder();

            let render_pass_info = vk::RenderPassBeginInfo::builder()
                .render_pass(self.swapchain.render_pass())
                .framebuffer(self.swapchain.framebuffer(i))
                .render_area(vk::Rect2D {
                    offset: vk::Offset2D { x: 0, y: 0 },
                    extent,
                })
                .clear_values(&clear_values);

            unsafe {
                device.begin_command_buffer(cmd, &begin_info)?;
                device.cmd_begin_render_pass(cmd, &render_pass_info, vk::SubpassContents::INLINE);

                self.pipeline.bind(cmd);
                self.model.bind(cmd);
                self.model.draw(cmd);

                device.cmd_end_render_pass(cmd);
                device.end_command_buffer(cmd)?;
            }
        }

        Ok(())
    }

    /// Render and present one frame.
    ///
    /// Out-of-date surfaces come back as [`FrameOutcome::OutOfDate`]; the
    /// swap chain is not rebuilt. Other errors propagate, including the
    /// recoverable `FrameTimeout`.
    pub fn draw_frame(&mut self) -> RenderResult<FrameOutcome> {
        debug_assert_eq!(self.phase, FramePhase::Idle);

        let acquired = match self.swapchain.acquire_next_image(self.acquire_timeout) {
            Ok(acquired) => acquired,
            Err(RenderError::SwapChainOutOfDate) => {
                let level = self.out_of_date.record();
                log::log!(level, "Swap chain out of date on acquire, skipping frame");
                return Ok(FrameOutcome::OutOfDate);
            }
            Err(e) => return Err(e),
        };
        self.phase.advance(FramePhase::Acquired);

        let cmd = self.command_buffers.buffers[acquired.index as usize];
        self.phase.advance(FramePhase::Recorded);

        let status = self.swapchain.submit_command_buffer(acquired.index, cmd);
        let outcome = match status {
            Ok(status) => {
                self.phase.advance(FramePhase::Submitted);
                self.phase.advance(FramePhase::Presented);
                let skipped = self.out_of_date.clear();
                if skipped > 0 {
                    log::info!("Presenting again after {} out-of-date frames", skipped);
                }
                FrameOutcome::Presented {
                    image_index: acquired.index,
                    suboptimal: acquired.suboptimal || status == PresentStatus::Suboptimal,
                }
            }
            Err(RenderError::SwapChainOutOfDate) => {
                let level = self.out_of_date.record();
                log::log!(level, "Swap chain out of date on present, frame dropped");
                FrameOutcome::OutOfDate
            }
            Err(e) => {
                self.phase.advance(FramePhase::Idle);
                return Err(e);
            }
        };
        self.phase.advance(FramePhase::Idle);

        log::trace!("Frame outcome: {:?}", outcome);
        Ok(outcome)
    }

    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    pub fn swapchain(&self) -> &Swapchain<'d> {
        &self.swapchain
    }
}

impl Drop for FrameOrchestrator<'_> {
    fn drop(&mut self) {
        log::info!("Shutting down frame orchestrator...");
        // Command buffers may still be executing
        log_idle_failure("Frame orchestrator", self.device.wait_idle());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn phases_cycle_in_order() {
        let mut phase = FramePhase::default();
        let mut seen = vec![phase];
        for _ in 0..5 {
            let next = phase.next();
            phase.advance(next);
            seen.push(phase);
        }
        assert_eq!(
            seen,
            vec![
                FramePhase::Idle,
                FramePhase::Acquired,
                FramePhase::Recorded,
                FramePhase::Submitted,
                FramePhase::Presented,
                FramePhase::Idle,
            ]
        );
    }

    #[test]
    fn skipping_ahead_is_illegal() {
        assert!(!FramePhase::Idle.can_advance_to(FramePhase::Submitted));
        assert!(!FramePhase::Acquired.can_advance_to(FramePhase::Presented));
        assert!(!FramePhase::Presented.can_advance_to(FramePhase::Acquired));
    }

    #[test]
    fn any_phase_can_abandon_to_idle() {
        for phase in [
            FramePhase::Acquired,
            FramePhase::Recorded,
            FramePhase::Submitted,
            FramePhase::Presented,
        ] {
            assert!(phase.can_advance_to(FramePhase::Idle));
        }
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "illegal frame transition")]
    fn illegal_advance_panics_in_debug() {
        let mut phase = FramePhase::Idle;
        phase.advance(FramePhase::Presented);
    }

    #[test]
    fn stats_report_once_per_second() {
        let start = Instant::now();
        let mut stats = FrameStats::new(start);

        for i in 1..60 {
            let now = start + Duration::from_millis(i * 16);
            assert_eq!(stats.record_frame(now), None);
        }

        let sample = stats
            .record_frame(start + Duration::from_millis(1000))
            .unwrap();
        assert!((sample.fps - 60.0).abs() < 0.01);
        assert!((sample.frame_time_ms - 56.0).abs() < 0.01);
        assert_eq!(stats.total_frames(), 60);

        // Window restarts after a sample
        assert_eq!(stats.record_frame(start + Duration::from_millis(1016)), None);
    }

    #[test]
    fn out_of_date_warns_once_per_streak() {
        let mut streak = OutOfDateStreak::default();
        let levels: Vec<log::Level> = (0..4).map(|_| streak.record()).collect();
        assert_eq!(
            levels,
            vec![log::Level::Warn, log::Level::Trace, log::Level::Trace, log::Level::Trace]
        );
        assert_eq!(streak.frames(), 4);

        assert_eq!(streak.clear(), 4);
        assert_eq!(streak.frames(), 0);
        assert_eq!(streak.record(), log::Level::Warn);
    }
}
