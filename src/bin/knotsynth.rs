use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use knotsynth::config::{GenerationConfig, RopeParams};
use knotsynth::dataset::Generator;
use knotsynth::env::{ChainRope, ChainSettings};
use knotsynth::observe;
use knotsynth::render::{Layout, PinholeCamera, for_engine};
use knotsynth::video::{Ffmpeg, assemble};
use knotsynth::vis::annotate_dir;

#[derive(Parser, Debug)]
#[command(name = "knotsynth", version, about = "Synthetic knotted-rope datasets")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Tie, straighten and loosen knots, rendering images and keypoints.
    Generate {
        /// Rope and render settings.
        #[arg(long, env = "KNOTSYNTH_PARAMS", default_value = "rigidbody_params.json")]
        params: PathBuf,
        /// Generation settings; defaults apply to missing keys.
        #[arg(long, env = "KNOTSYNTH_CONFIG")]
        config: Option<PathBuf>,
        /// Headless chain simulator settings.
        #[arg(long)]
        chain: Option<PathBuf>,
        /// Dataset root; `images/`, `images_depth/` and `image_masks/` go here.
        #[arg(long, default_value = ".")]
        dir: PathBuf,
        #[arg(long)]
        episodes: Option<usize>,
        #[arg(long)]
        loosens: Option<usize>,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Draw the keypoints of `knots_info.json` over the RGB frames.
    Vis {
        #[arg(long, default_value = "images")]
        images: PathBuf,
        #[arg(long, default_value = "annotated")]
        out: PathBuf,
    },
    /// Encode the RGB and annotated frames into one side-by-side video.
    Video {
        #[arg(long, default_value = "images")]
        images: PathBuf,
        #[arg(long, default_value = "annotated")]
        annotated: PathBuf,
        #[arg(long, default_value = "output.mp4")]
        out: PathBuf,
        #[arg(long, default_value = "ffmpeg")]
        ffmpeg: String,
        #[arg(long, default_value_t = 15)]
        fps: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    observe::init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Generate {
            params,
            config,
            chain,
            dir,
            episodes,
            loosens,
            seed,
        } => {
            let params = RopeParams::from_path(&params)
                .with_context(|| format!("loading {}", params.display()))?;
            let mut cfg = match config {
                Some(path) => GenerationConfig::from_path(&path)
                    .with_context(|| format!("loading {}", path.display()))?,
                None => GenerationConfig::default(),
            };
            cfg.episodes = episodes.unwrap_or(cfg.episodes);
            cfg.num_loosens = loosens.unwrap_or(cfg.num_loosens);
            cfg.seed = seed.unwrap_or(cfg.seed);
            cfg.output_dir = Some(dir.clone());
            let settings = match chain {
                Some(path) => read_chain(&path)?,
                None => ChainSettings::default(),
            };
            generate(&params, cfg, settings, &dir)
        }
        Command::Vis { images, out } => {
            let written = annotate_dir(&images, &out)
                .with_context(|| format!("annotating {}", images.display()))?;
            info!(written, out = %out.display(), "done");
            Ok(())
        }
        Command::Video {
            images,
            annotated,
            out,
            ffmpeg,
            fps,
        } => {
            let path = assemble(&Ffmpeg::new(ffmpeg, fps), &images, &annotated, &out)
                .await
                .context("assembling video")?;
            info!(path = %path.display(), "done");
            Ok(())
        }
    }
}

fn generate(
    params: &RopeParams,
    cfg: GenerationConfig,
    settings: ChainSettings,
    dir: &Path,
) -> Result<()> {
    let env = ChainRope::new(params, settings);
    let camera = PinholeCamera::new(params.render_width, params.render_height);
    let renderer = for_engine(
        &params.engine,
        Layout::new(dir),
        camera,
        params.segment_radius,
        settings.table_z,
    )
    .context("preparing output directories")?;

    let mut generator = Generator::new(env, renderer, params, cfg)?;
    let summary = generator.run()?;
    info!(
        run_id = %summary.run_id,
        episodes = summary.episodes.len(),
        frames_rendered = summary.frames_rendered,
        "dataset written"
    );
    Ok(())
}

fn read_chain(path: &Path) -> Result<ChainSettings> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}
