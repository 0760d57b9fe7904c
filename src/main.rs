#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(err) = cli::run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {}

#[cfg(not(target_arch = "wasm32"))]
mod cli {
    use std::any::Any;
    use std::env;
    use std::fmt;
    use std::fs;
    use std::panic::{self, AssertUnwindSafe};
    use std::path::{Path, PathBuf};
    use std::rc::Rc;
    use std::sync::Arc;

    use anyhow::{anyhow, Context, Result};
    use log::info;
    use winit::dpi::LogicalSize;
    use winit::event::{Event, WindowEvent};
    use winit::event_loop::{ControlFlow, EventLoop};
    use winit::platform::run_return::EventLoopExtRunReturn;
    use winit::window::WindowBuilder;

    use portfolio_viewer::config::SiteConfig;
    use portfolio_viewer::pages::site_pages;
    use portfolio_viewer::paths::DeployMode;
    use portfolio_viewer::platform::desktop::DesktopPlatform;
    use portfolio_viewer::platform::{AssetSource, HeadlessPlatform};
    use portfolio_viewer::projects::ModelType;
    use portfolio_viewer::render::SurfaceStats;
    use portfolio_viewer::widget::{SceneWidget, SessionSnapshot, WidgetProps};

    const USAGE: &str = "Usage:
  portfolio-viewer build <out-dir> [--production]
  portfolio-viewer preview <model-type> [--scale <m>] [--assets <dir>] [--frames <n>] [--summary-only] [--production]";

    const PREVIEW_WIDTH: u32 = 960;
    const PREVIEW_HEIGHT: u32 = 640;
    const DEFAULT_SUMMARY_FRAMES: u64 = 60;

    pub fn run() -> Result<()> {
        match Command::parse()? {
            Command::Build { out_dir, production } => {
                let mut config = SiteConfig::from_env();
                if production {
                    config = config.with_deploy(DeployMode::Production);
                }
                build_site(&out_dir, &config)
            }
            Command::Preview(options) => preview(options),
        }
    }

    fn build_site(out_dir: &Path, config: &SiteConfig) -> Result<()> {
        let pages = site_pages(config);
        for (relative, html) in &pages {
            let path = out_dir.join(relative);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            fs::write(&path, html).with_context(|| format!("failed to write {}", path.display()))?;
            println!("Wrote {}", relative.display());
        }
        println!(
            "Generated {} pages into {} ({:?})",
            pages.len(),
            out_dir.display(),
            config.deploy
        );
        Ok(())
    }

    fn preview(options: PreviewOptions) -> Result<()> {
        let model = ModelType::from_name_or_default(&options.model);
        let props = WidgetProps::new(model).with_scale(options.scale);
        let mut config = SiteConfig::from_env();
        if options.production {
            config = config.with_deploy(DeployMode::Production);
        }
        if let Some(assets) = &options.assets {
            config.asset_root = assets.clone();
        }
        println!("Previewing {model} at scale {}", props.scale);

        if options.summary_only {
            return run_headless(props, config, options.frames);
        }
        match run_interactive(props, config.clone(), options.frames) {
            Ok(()) => Ok(()),
            Err(err) => {
                if err.downcast_ref::<WindowInitError>().is_some() {
                    eprintln!(
                        "{err}. Falling back to --summary-only mode (set DISPLAY or install X11 libs to enable rendering)."
                    );
                    run_headless(props, config, options.frames)
                } else {
                    Err(err)
                }
            }
        }
    }

    fn run_headless(props: WidgetProps, config: SiteConfig, frames: Option<u64>) -> Result<()> {
        let source = AssetSource::Directory {
            root: config.asset_root.clone(),
            base_path: config.base_path.clone(),
        };
        let platform =
            Rc::new(HeadlessPlatform::new(PREVIEW_WIDTH, PREVIEW_HEIGHT).with_source(source));
        let mut widget = SceneWidget::new(Rc::clone(&platform), props, config);
        widget.mount().context("failed to mount the scene widget")?;

        platform.settle_fetches();
        for _ in 0..frames.unwrap_or(DEFAULT_SUMMARY_FRAMES) {
            platform.run_frames();
        }

        if let Some(snapshot) = widget.snapshot() {
            print_summary(&snapshot);
        }
        print_stats(&platform.stats());
        widget.unmount();
        let stats = platform.stats();
        println!(
            "After unmount: listeners={} frames={} surfaces={} geometries={} materials={}",
            platform.listener_count(),
            platform.pending_frames(),
            stats.live_surfaces,
            stats.live_geometries,
            stats.live_materials
        );
        Ok(())
    }

    fn run_interactive(props: WidgetProps, config: SiteConfig, frames: Option<u64>) -> Result<()> {
        let default_hook = panic::take_hook();
        panic::set_hook(Box::new(|_| {}));
        let event_loop = panic::catch_unwind(AssertUnwindSafe(EventLoop::new));
        panic::set_hook(default_hook);
        let event_loop =
            event_loop.map_err(|panic| WindowInitError::from_panic("event loop", panic))?;
        let window = Arc::new(
            WindowBuilder::new()
                .with_title(format!("Portfolio viewer - {}", props.model))
                .with_inner_size(LogicalSize::new(PREVIEW_WIDTH as f64, PREVIEW_HEIGHT as f64))
                .build(&event_loop)
                .map_err(|err| WindowInitError::from_error("window", err))?,
        );

        let platform = Rc::new(DesktopPlatform::new(
            Arc::clone(&window),
            config.asset_root.clone(),
            config.base_path.clone(),
        ));
        let mut widget = SceneWidget::new(Rc::clone(&platform), props, config);
        widget
            .mount()
            .map_err(|err| WindowInitError::from_error("rendering surface", err))?;
        info!("window open; close it to exit");

        let mut event_loop = event_loop;
        event_loop.run_return(|event, _, control_flow| {
            *control_flow = ControlFlow::Poll;
            match &event {
                Event::WindowEvent { event, window_id } if *window_id == window.id() => {
                    if matches!(event, WindowEvent::CloseRequested) {
                        control_flow.set_exit();
                    } else {
                        platform.handle_window_event(event);
                    }
                }
                Event::RedrawRequested(window_id) if *window_id == window.id() => {
                    platform.run_frames();
                    let rendered = widget.snapshot().map_or(0, |snapshot| snapshot.frames);
                    if frames.is_some_and(|limit| rendered >= limit) {
                        control_flow.set_exit();
                    }
                }
                Event::MainEventsCleared => {
                    platform.pump_fetches();
                }
                _ => {}
            }
        });

        if let Some(snapshot) = widget.snapshot() {
            print_summary(&snapshot);
        }
        widget.unmount();
        Ok(())
    }

    fn print_summary(snapshot: &SessionSnapshot) {
        println!("Session {}: {:?}", snapshot.session, snapshot.phase);
        match &snapshot.displayed {
            Some(content) => println!("Displayed: {}", content.describe()),
            None => println!("Displayed: nothing"),
        }
        if snapshot.attempted.is_empty() {
            println!("Attempted: none");
        } else {
            println!("Attempted: {}", snapshot.attempted.join(", "));
        }
        println!("Scene objects: {}", snapshot.scene_objects);
        println!("Triangles: {}", snapshot.triangles);
        let size = snapshot.bounds.size();
        let center = snapshot.bounds.center();
        println!(
            "Bounds: size=({:.2}, {:.2}, {:.2}) center=({:.2}, {:.2}, {:.2})",
            size.x, size.y, size.z, center.x, center.y, center.z
        );
        println!(
            "Rotation: ({:.3}, {:.3}) after {} frames",
            snapshot.rotation.x, snapshot.rotation.y, snapshot.frames
        );
        println!("Live resources: {}", snapshot.live_resources);
    }

    fn print_stats(stats: &SurfaceStats) {
        println!(
            "Surface: {}x{} frames={} last_triangles={}",
            stats.last_size.0, stats.last_size.1, stats.frames_rendered, stats.last_triangles
        );
    }

    #[derive(Debug)]
    struct WindowInitError {
        message: String,
    }

    impl WindowInitError {
        fn from_panic(stage: &str, panic: Box<dyn Any + Send>) -> Self {
            Self {
                message: format!("failed to initialize {stage}: {}", panic_message(panic)),
            }
        }

        fn from_error(stage: &str, err: impl fmt::Display) -> Self {
            Self {
                message: format!("failed to initialize {stage}: {err}"),
            }
        }
    }

    impl fmt::Display for WindowInitError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(&self.message)
        }
    }

    impl std::error::Error for WindowInitError {}

    fn panic_message(panic: Box<dyn Any + Send>) -> String {
        match panic.downcast::<String>() {
            Ok(msg) => *msg,
            Err(panic) => match panic.downcast::<&'static str>() {
                Ok(msg) => (*msg).to_string(),
                Err(_) => "unknown panic".into(),
            },
        }
    }

    struct PreviewOptions {
        model: String,
        scale: f32,
        assets: Option<PathBuf>,
        frames: Option<u64>,
        summary_only: bool,
        production: bool,
    }

    enum Command {
        Build { out_dir: PathBuf, production: bool },
        Preview(PreviewOptions),
    }

    impl Command {
        fn parse() -> Result<Self> {
            let mut args = env::args().skip(1);
            let Some(command) = args.next() else {
                return Err(anyhow!(USAGE));
            };
            match command.as_str() {
                "build" => {
                    let Some(out_dir) = args.next() else {
                        return Err(anyhow!("Missing output directory.\n{USAGE}"));
                    };
                    let mut production = false;
                    for arg in args {
                        match arg.as_str() {
                            "--production" => production = true,
                            other => {
                                return Err(anyhow!(
                                    "Unknown argument: {other}. Expected --production"
                                ));
                            }
                        }
                    }
                    Ok(Self::Build {
                        out_dir: PathBuf::from(out_dir),
                        production,
                    })
                }
                "preview" => {
                    let Some(model) = args.next() else {
                        return Err(anyhow!("Missing model type.\n{USAGE}"));
                    };
                    let mut options = PreviewOptions {
                        model,
                        scale: 1.0,
                        assets: None,
                        frames: None,
                        summary_only: false,
                        production: false,
                    };
                    while let Some(arg) = args.next() {
                        match arg.as_str() {
                            "--summary-only" => options.summary_only = true,
                            "--production" => options.production = true,
                            "--scale" => {
                                let value = value_of(&mut args, "--scale")?;
                                options.scale = value
                                    .parse()
                                    .with_context(|| format!("invalid scale {value:?}"))?;
                            }
                            "--frames" => {
                                let value = value_of(&mut args, "--frames")?;
                                options.frames = Some(
                                    value
                                        .parse()
                                        .with_context(|| format!("invalid frame count {value:?}"))?,
                                );
                            }
                            "--assets" => {
                                options.assets = Some(PathBuf::from(value_of(&mut args, "--assets")?));
                            }
                            other => {
                                return Err(anyhow!(
                                    "Unknown argument: {other}. Expected --scale, --assets, --frames, --summary-only or --production"
                                ));
                            }
                        }
                    }
                    Ok(Self::Preview(options))
                }
                other => Err(anyhow!("Unknown command: {other}.\n{USAGE}")),
            }
        }
    }

    fn value_of(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<String> {
        args.next()
            .ok_or_else(|| anyhow!("{flag} expects a value"))
    }
}
