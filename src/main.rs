use std::any::Any;
use std::env;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use log::{error, info, warn};
use pollster::block_on;
use winit::dpi::PhysicalSize;
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop, EventLoopWindowTarget};
use winit::platform::run_on_demand::EventLoopExtRunOnDemand;
use winit::window::WindowBuilder;

use ssao_demo::app::print_summary;
use ssao_demo::{DemoConfig, RenderError, Renderer};

const USAGE: &str =
    "Usage: ssao-demo [--summary-only] [--dynamic-geometry] [--no-ssao] [--no-direct-light] [--frames N]";

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        error!("{err:#}");
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = CliOptions::parse_from(env::args().skip(1))?;
    let config = options.demo_config();
    config.validate().context("invalid demo configuration")?;

    if options.summary_only {
        print_summary(&config);
        return Ok(());
    }

    match run_interactive(config.clone(), options.frames) {
        Ok(()) => Ok(()),
        Err(err) => {
            if err.downcast_ref::<WindowInitError>().is_some() {
                eprintln!(
                    "{err}. Falling back to --summary-only mode (set DISPLAY or install X11 libs to enable rendering)."
                );
                print_summary(&config);
                Ok(())
            } else {
                Err(err)
            }
        }
    }
}

fn run_interactive(config: DemoConfig, frame_limit: Option<u64>) -> Result<()> {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(|_| {}));
    let event_loop = panic::catch_unwind(AssertUnwindSafe(EventLoop::new));
    panic::set_hook(default_hook);
    let mut event_loop = event_loop
        .map_err(|payload| WindowInitError::from_panic(WindowStage::EventLoop, &*payload))?
        .map_err(|err| WindowInitError::new(WindowStage::EventLoop, err))?;

    let (width, height) = config.window_size;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title("SSAO demo")
            .with_inner_size(PhysicalSize::new(width, height))
            .with_resizable(false)
            .build(&event_loop)
            .map_err(|err| WindowInitError::new(WindowStage::Window, err))?,
    );

    let renderer = block_on(Renderer::new(Arc::clone(&window), config))
        .context("failed to initialize renderer")?;

    let mut app = AppState {
        renderer,
        frame_limit,
        presented: 0,
        last_error: None,
    };

    event_loop
        .run_on_demand(|event, elwt| {
            elwt.set_control_flow(ControlFlow::Poll);
            if let Err(err) = app.process_event(&event, elwt) {
                app.last_error = Some(err);
                elwt.exit();
            }
        })
        .context("event loop terminated abnormally")?;

    info!("presented {} frame(s)", app.presented);

    if let Some(err) = app.last_error {
        return Err(err);
    }

    Ok(())
}

struct AppState {
    renderer: Renderer,
    frame_limit: Option<u64>,
    presented: u64,
    last_error: Option<anyhow::Error>,
}

/// Platform object the demo could not create before its first frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WindowStage {
    EventLoop,
    Window,
}

impl fmt::Display for WindowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EventLoop => f.write_str("event loop"),
            Self::Window => f.write_str("window"),
        }
    }
}

/// No display to render the SSAO demo into; `run` falls back to the summary.
#[derive(Debug, thiserror::Error)]
#[error("no display for the SSAO demo: could not create the {stage} ({reason})")]
struct WindowInitError {
    stage: WindowStage,
    reason: String,
}

impl WindowInitError {
    fn new(stage: WindowStage, reason: impl fmt::Display) -> Self {
        Self {
            stage,
            reason: reason.to_string(),
        }
    }

    /// winit panics instead of erroring on some headless X11 setups.
    fn from_panic(stage: WindowStage, payload: &(dyn Any + Send)) -> Self {
        Self::new(stage, panic_reason(payload))
    }
}

fn panic_reason(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&'static str>().copied())
        .unwrap_or("platform setup panicked")
}

impl AppState {
    fn process_event(&mut self, event: &Event<()>, elwt: &EventLoopWindowTarget<()>) -> Result<()> {
        match event {
            Event::WindowEvent { event, window_id } if *window_id == self.renderer.window_id() => {
                match event {
                    WindowEvent::CloseRequested => elwt.exit(),
                    WindowEvent::Resized(size) => self.renderer.resize(*size),
                    WindowEvent::RedrawRequested => self.redraw(elwt)?,
                    _ => {}
                }
            }
            Event::AboutToWait => {
                self.renderer.window().request_redraw();
            }
            _ => {}
        }
        Ok(())
    }

    fn redraw(&mut self, elwt: &EventLoopWindowTarget<()>) -> Result<()> {
        match self.renderer.render() {
            Ok(plan) => {
                self.presented += 1;
                if plan.run_geometry {
                    info!(
                        "G-buffer populated on frame {}",
                        self.renderer.frame_state().frame_index()
                    );
                }
                if self.frame_limit.is_some_and(|limit| self.presented >= limit) {
                    elwt.exit();
                }
            }
            Err(RenderError::Frame(err)) => match err {
                wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => {
                    let size = self.renderer.window().inner_size();
                    self.renderer.resize(size);
                }
                wgpu::SurfaceError::OutOfMemory => {
                    return Err(anyhow!("GPU is out of memory"));
                }
                wgpu::SurfaceError::Timeout => {
                    warn!("Surface timeout; retrying next frame");
                }
                other => {
                    return Err(anyhow!("failed to acquire frame: {other}"));
                }
            },
            Err(err) => return Err(err.into()),
        }
        Ok(())
    }
}

#[derive(Debug, Default, PartialEq)]
struct CliOptions {
    summary_only: bool,
    dynamic_geometry: bool,
    no_ssao: bool,
    no_direct_light: bool,
    frames: Option<u64>,
}

impl CliOptions {
    fn parse_from(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut options = Self::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--summary-only" => options.summary_only = true,
                "--dynamic-geometry" => options.dynamic_geometry = true,
                "--no-ssao" => options.no_ssao = true,
                "--no-direct-light" => options.no_direct_light = true,
                "--frames" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow!("--frames expects a frame count. {USAGE}"))?;
                    let frames = value
                        .parse::<u64>()
                        .with_context(|| format!("invalid frame count {value:?}"))?;
                    options.frames = Some(frames);
                }
                other => {
                    return Err(anyhow!("Unknown argument: {other}. {USAGE}"));
                }
            }
        }
        Ok(options)
    }

    fn demo_config(&self) -> DemoConfig {
        DemoConfig {
            static_geometry: !self.dynamic_geometry,
            ssao_enabled: !self.no_ssao,
            direct_lighting_enabled: !self.no_direct_light,
            ..DemoConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<CliOptions> {
        CliOptions::parse_from(args.iter().map(|arg| arg.to_string()))
    }

    #[test]
    fn flags_map_onto_the_config() {
        let options = parse(&["--dynamic-geometry", "--no-ssao", "--frames", "12"]).unwrap();
        assert_eq!(options.frames, Some(12));
        let config = options.demo_config();
        assert!(!config.static_geometry);
        assert!(!config.ssao_enabled);
        assert!(config.direct_lighting_enabled);
    }

    #[test]
    fn window_errors_name_the_failed_stage() {
        let payload: Box<dyn Any + Send> = Box::new("Failed to open display".to_string());
        let err = WindowInitError::from_panic(WindowStage::EventLoop, &*payload);
        assert_eq!(
            err.to_string(),
            "no display for the SSAO demo: could not create the event loop (Failed to open display)"
        );

        let payload: Box<dyn Any + Send> = Box::new(42_u8);
        let err = WindowInitError::from_panic(WindowStage::Window, &*payload);
        assert_eq!(err.stage, WindowStage::Window);
        assert_eq!(err.reason, "platform setup panicked");
    }

    #[test]
    fn frames_requires_a_number() {
        assert!(parse(&["--frames"]).is_err());
        assert!(parse(&["--frames", "soon"]).is_err());
    }
}
