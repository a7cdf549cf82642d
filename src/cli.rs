use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

use crate::config::DreamConfig;
use crate::focus::Topic;
use crate::frame::{FocusText, FrameDriver, FrameReport};
use crate::gpu::offscreen::OffscreenBackend;
use crate::render::{FrameRecord, HeadlessBackend};
use crate::worlds::{World, WorldKind};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command.
#[derive(Args)]
struct SceneArgs {
    /// World to load (reverie or abyss)
    #[arg(long, default_value = "reverie")]
    world: WorldKind,

    /// JSON config file; missing sections use defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Post effect to switch off (repeatable)
    #[arg(long = "disable-effect", value_name = "EFFECT")]
    disabled_effects: Vec<String>,
}

impl SceneArgs {
    fn driver(&self) -> Result<FrameDriver> {
        let config = match &self.config {
            Some(path) => DreamConfig::load(path)?,
            None => DreamConfig::default(),
        };
        let world = World::build(self.world, &config)?;
        let mut driver = FrameDriver::new(world, config);
        for effect in &self.disabled_effects {
            anyhow::ensure!(driver.set_effect_enabled(effect, false), "Unknown post effect '{}'", effect);
        }
        Ok(driver)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Render frames to disk
    Render {
        #[command(flatten)]
        scene: SceneArgs,

        /// Output directory for frames
        #[arg(long)]
        out: PathBuf,

        /// Number of frames to render
        #[arg(long, default_value_t = 180)]
        frames: u32,

        /// Frames per second
        #[arg(long, default_value_t = 60.0)]
        fps: f32,

        /// Click this topic's object on the first frame
        #[arg(long)]
        focus: Option<Topic>,

        /// Output width
        #[arg(long, default_value_t = 800)]
        width: u32,

        /// Output height
        #[arg(long, default_value_t = 600)]
        height: u32,
    },
    /// Run the frame loop without a GPU and print a JSON report
    Simulate {
        #[command(flatten)]
        scene: SceneArgs,

        /// Number of ticks to run
        #[arg(long, default_value_t = 180)]
        frames: u32,

        /// Ticks per second
        #[arg(long, default_value_t = 60.0)]
        fps: f32,

        /// Click this topic's object on the first tick
        #[arg(long)]
        focus: Option<Topic>,

        /// Include every tick in the report, not just the summary
        #[arg(long)]
        verbose: bool,
    },
    /// Open an interactive window
    Window {
        #[command(flatten)]
        scene: SceneArgs,

        #[arg(long, default_value_t = 1280)]
        width: u32,

        #[arg(long, default_value_t = 720)]
        height: u32,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Render { scene, out, frames, fps, focus, width, height } => {
            let driver = scene.driver()?;
            pollster::block_on(render_offline(driver, out, frames, fps, focus, width, height))?;
        }
        Commands::Simulate { scene, frames, fps, focus, verbose } => {
            let driver = scene.driver()?;
            let report = simulate(driver, frames, fps, focus, verbose)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Window { scene, width, height } => {
            let driver = scene.driver()?;
            crate::window::run(driver, width, height)?;
        }
    }
    Ok(())
}

fn frame_step(fps: f32) -> Result<f32> {
    anyhow::ensure!(fps.is_finite() && fps > 0.0, "fps must be positive, got {}", fps);
    Ok(1.0 / fps)
}

fn click_topic(driver: &mut FrameDriver, topic: Topic) {
    if driver.aim_at(topic) {
        driver.on_click();
    } else {
        log::warn!("No interactive object tagged '{}' in view", topic);
    }
}

async fn render_offline(
    mut driver: FrameDriver,
    out_dir: PathBuf,
    frames: u32,
    fps: f32,
    focus: Option<Topic>,
    width: u32,
    height: u32,
) -> Result<()> {
    let dt = frame_step(fps)?;
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    let mut backend = OffscreenBackend::new(width, height).await?;
    driver.resize(width as f32, height as f32);
    if let Some(topic) = focus {
        click_topic(&mut driver, topic);
    }

    println!("Rendering {} frames to {:?}...", frames, out_dir);

    for i in 0..frames {
        driver.tick(dt, &mut backend);
        backend.save_png(&out_dir.join(format!("frame_{:05}.png", i)))?;

        if i % 60 == 0 {
            print!(".");
            use std::io::Write;
            std::io::stdout().flush()?;
        }
    }
    println!("\nDone.");

    let text = driver.focus_text();
    if !text.title.is_empty() {
        println!("{}: {}", text.title, text.description);
    }

    Ok(())
}

#[derive(Serialize)]
struct SimulationReport {
    world: WorldKind,
    ticks: u32,
    elapsed: f32,
    content_ready: bool,
    focus: FocusText,
    last_frame: Option<FrameRecord>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    frames: Vec<FrameReport>,
}

fn simulate(
    mut driver: FrameDriver,
    ticks: u32,
    fps: f32,
    focus: Option<Topic>,
    verbose: bool,
) -> Result<SimulationReport> {
    let dt = frame_step(fps)?;
    let mut backend = HeadlessBackend::new();
    if let Some(topic) = focus {
        click_topic(&mut driver, topic);
    }

    let mut frames = Vec::new();
    for _ in 0..ticks {
        let report = driver.tick(dt, &mut backend);
        if verbose {
            frames.push(report);
        }
    }

    Ok(SimulationReport {
        world: driver.world().kind,
        ticks,
        elapsed: driver.elapsed(),
        content_ready: driver.is_content_ready(),
        focus: driver.focus_text().clone(),
        last_frame: backend.last_frame().cloned(),
        frames,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn driver(kind: WorldKind) -> FrameDriver {
        let mut config = DreamConfig::default();
        config.particles.seed = Some(11);
        config.physics.drift_seed = Some(11);
        FrameDriver::new(World::build(kind, &config).unwrap(), config)
    }

    #[test]
    fn test_cli_parses_render() {
        let cli = Cli::try_parse_from([
            "dreamscape", "render", "--world", "abyss", "--out", "frames", "--focus", "eating",
        ])
        .unwrap();
        match cli.command {
            Commands::Render { scene, focus, frames, .. } => {
                assert_eq!(scene.world, WorldKind::Abyss);
                assert_eq!(focus, Some(Topic::Eating));
                assert_eq!(frames, 180);
            }
            _ => panic!("expected render"),
        }
    }

    #[test]
    fn test_simulate_focus() {
        let report = simulate(driver(WorldKind::Reverie), 150, 60.0, Some(Topic::Programming), false).unwrap();
        assert_eq!(report.focus.title, "Programming");
        assert!(report.content_ready);
        assert!(report.frames.is_empty());
        assert_eq!(report.last_frame.unwrap().camera_target, [5.0, 0.5, 1.0]);
    }

    #[test]
    fn test_disable_effect_drops_stage() {
        let cli = Cli::try_parse_from([
            "dreamscape", "simulate", "--disable-effect", "vignette", "--frames", "2",
        ])
        .unwrap();
        let Commands::Simulate { scene, frames, fps, .. } = cli.command else {
            panic!("expected simulate");
        };
        let report = simulate(scene.driver().unwrap(), frames, fps, None, false).unwrap();
        let stages = report.last_frame.unwrap().post;
        assert!(!stages.iter().any(|s| s == "vignette"), "{:?}", stages);
        assert!(stages.iter().any(|s| s == "bloom"));

        let cli = Cli::try_parse_from(["dreamscape", "simulate", "--disable-effect", "film_grain"]).unwrap();
        let Commands::Simulate { scene, .. } = cli.command else {
            panic!("expected simulate");
        };
        assert!(scene.driver().is_err());
    }

    #[test]
    fn test_rejects_zero_fps() {
        assert!(simulate(driver(WorldKind::Abyss), 1, 0.0, None, false).is_err());
    }
}
