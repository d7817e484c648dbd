// =============================================================================
// VKE RENDERER - process entry
// =============================================================================
//
// FRAME FLOW:
// 1. Pump window events
// 2. Acquire swapchain image (waits for the in-flight slot)
// 3. Submit pre-recorded commands to GPU
// 4. Present rendered image to screen
//
// Objects are created top to bottom in `run` and dropped bottom to top when
// it returns.
//
// =============================================================================

use anyhow::{Context, Result};
use std::time::{Duration, Instant};

use vke_renderer::backend::{Device, DeviceOptions, SurfaceProvider, Swapchain, SwapchainOptions};
use vke_renderer::{Config, FrameOrchestrator, FrameOutcome, FrameStats, HostWindow};

/// Pause between frames while the surface is out of date
const OUT_OF_DATE_BACKOFF: Duration = Duration::from_millis(16);

fn main() -> Result<()> {
    // Load configuration from config.toml
    let config = Config::load();

    init_logging(&config);
    log::info!("Starting Vulkan renderer");
    log::info!("Present mode: {}", config.graphics.present_mode);

    if let Err(e) = run(&config) {
        log::error!("Fatal: {:#}", e);
        return Err(e);
    }

    log::info!("Clean shutdown");
    Ok(())
}

/// `RUST_LOG` wins over `debug.log_level`
fn init_logging(config: &Config) {
    use env_logger::Builder;

    let mut builder = Builder::new();
    builder.filter_level(config.log_level());
    builder.parse_default_env();
    // Logging may already be set up when embedded; that's fine
    let _ = builder.try_init();
}

fn run(config: &Config) -> Result<()> {
    let mut window = HostWindow::open(&config.window).context("Failed to open window")?;

    // Validation only in debug builds, and only if the layer is installed
    let enable_validation = cfg!(debug_assertions) && config.debug.validation_layers;
    let device = Device::new(
        &window,
        &DeviceOptions::new(&config.window.title, enable_validation),
    )
    .context("Failed to initialize Vulkan device")?;
    log::info!("Using adapter: {}", device.adapter_name());

    let swapchain = Swapchain::new(
        &device,
        &SwapchainOptions {
            extent: window.drawable_extent(),
            image_count: config.graphics.image_count,
            present_mode: config.present_mode(),
            frames_in_flight: config.frames_in_flight(),
        },
    )
    .context("Failed to create swapchain")?;
    log::info!(
        "Swapchain ready: {} images, {} frames in flight",
        swapchain.image_count(),
        swapchain.frames_in_flight()
    );

    let mut orchestrator = FrameOrchestrator::new(
        &device,
        swapchain,
        &config.shaders.vertex,
        &config.shaders.fragment,
        config.graphics.clear_color,
    )
    .context("Failed to build graphics pipeline")?
    .with_acquire_timeout(config.acquire_timeout_ns());

    log::info!("Vulkan initialized successfully!");

    let mut stats = FrameStats::new(Instant::now());

    while !window.should_close() {
        window.poll_events();

        match orchestrator.draw_frame() {
            Ok(FrameOutcome::Presented { .. }) => {
                if let Some(sample) = stats.record_frame(Instant::now()) {
                    if config.debug.show_fps {
                        window.set_title(&format!(
                            "{} - {:.0} FPS ({:.2}ms)",
                            config.window.title, sample.fps, sample.frame_time_ms
                        ));
                    }
                }
            }
            // Swap chain recreation is not supported; keep pumping events
            // without spinning on a surface that cannot present
            Ok(FrameOutcome::OutOfDate) => std::thread::sleep(OUT_OF_DATE_BACKOFF),
            Err(e) if e.is_recoverable() => {
                log::warn!("Frame skipped: {}", e);
            }
            Err(e) => return Err(e).context("Render error"),
        }
    }

    log::info!("Rendered {} frames", stats.total_frames());
    device.wait_idle().context("Failed to wait for device idle")?;

    // Drop order: orchestrator (pipeline, buffers, swapchain), then device,
    // then the window that backs the surface
    drop(orchestrator);
    drop(device);
    drop(window);

    Ok(())
}
