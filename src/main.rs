//! Command-line entry point for pointanno.
//!
//! ```bash
//! pointanno export --image slide.png --annotations slide.csv --out results/
//! pointanno export --image slide.png --annotations slide.csv --contours slide.json
//! pointanno patches --width 2048 --height 1536 --overlap 0.1
//! pointanno apply --workspace data/ --image slide.png --report report.json
//! pointanno queue --todo anotaciones_a_corregir --done anotaciones_corregidas
//! pointanno config --init
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use pointanno::config::AppConfig;
use pointanno::format::{ContourSet, read_store_from_path};
use pointanno::geometry::PatchGrid;
use pointanno::queue::{LocalFolderStorage, ReviewQueue};
use pointanno::reconcile::ViewportReport;
use pointanno::session::AnnotationSession;
use pointanno::workspace::{Workspace, stem_of};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "pointanno")]
#[command(about = "Point annotation reconciliation and export", long_about = None)]
struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write normalized CSV, text report and annotated PNG for one image
    Export {
        #[arg(long)]
        image: PathBuf,

        /// `X,Y,Label` CSV with the image's points
        #[arg(long)]
        annotations: PathBuf,

        /// Output workspace root
        #[arg(long, default_value = ".")]
        out: PathBuf,

        /// Segmentation mask blended under the markers (black is transparent)
        #[arg(long)]
        mask: Option<PathBuf>,

        /// JSON contour file drawn under the markers
        #[arg(long)]
        contours: Option<PathBuf>,
    },

    /// Print the patch grid for an image size
    Patches {
        #[arg(long)]
        height: u32,

        #[arg(long)]
        width: u32,

        #[arg(long)]
        patch_height: Option<u32>,

        #[arg(long)]
        patch_width: Option<u32>,

        #[arg(long)]
        overlap: Option<f64>,
    },

    /// Reconcile a viewport report JSON into a workspace
    Apply {
        #[arg(long, default_value = ".")]
        workspace: PathBuf,

        /// Image name inside the workspace
        #[arg(long)]
        image: String,

        /// JSON array of `{"point": [x, y], "label_id": n}` entries
        #[arg(long)]
        report: PathBuf,

        /// Treat the report as local to this patch index
        #[arg(long)]
        patch: Option<usize>,
    },

    /// List samples of a review queue
    Queue {
        #[arg(long)]
        todo: Option<String>,

        #[arg(long)]
        done: Option<String>,
    },

    /// Print the effective configuration
    Config {
        /// Write the defaults to the config file (`--config` or the user config directory)
        #[arg(long)]
        init: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref());

    let level = config.preferences.log_level.raised(cli.verbose);
    env_logger::Builder::new()
        .filter_level(level.to_level_filter())
        .parse_default_env()
        .init();

    let result = match cli.command {
        Commands::Export {
            image,
            annotations,
            out,
            mask,
            contours,
        } => run_export(
            &config,
            &image,
            &annotations,
            &out,
            mask.as_deref(),
            contours.as_deref(),
        ),
        Commands::Patches {
            height,
            width,
            patch_height,
            patch_width,
            overlap,
        } => run_patches(&config, width, height, patch_width, patch_height, overlap),
        Commands::Apply {
            workspace,
            image,
            report,
            patch,
        } => run_apply(&config, &workspace, &image, &report, patch),
        Commands::Queue { todo, done } => run_queue(&config, todo, done),
        Commands::Config { init } => run_config(&config, cli.config.as_deref(), init),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn load_config(path: Option<&Path>) -> AppConfig {
    match path {
        Some(path) => match AppConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load config {:?}: {}, using defaults", path, e);
                AppConfig::default()
            }
        },
        None => AppConfig::load_from_default_path().unwrap_or_default(),
    }
}

fn run_export(
    config: &AppConfig,
    image: &Path,
    annotations: &Path,
    out: &Path,
    mask: Option<&Path>,
    contours: Option<&Path>,
) -> CliResult<()> {
    let catalog = config.catalog()?;
    let store = read_store_from_path(annotations, &catalog)?;
    let base = image::open(image)?;

    let mut renderer = config.render.renderer();
    if let Some(mask) = mask {
        renderer = renderer.layer(config.render.mask_layer(&image::open(mask)?));
    }
    if let Some(contours) = contours {
        let contours = ContourSet::from_json(&std::fs::read_to_string(contours)?)?;
        log::info!("Drawing {} contours", contours.len());
        renderer = renderer.layer(config.render.contour_layer(&contours, base.width(), base.height()));
    }

    let image_name = image
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| stem_of(&annotations.to_string_lossy()));

    let workspace = Workspace::from_config(out, &config.workspace);
    let projection = workspace.persist(&image_name, &store)?;
    let png = renderer.render_png(&base, &store)?;
    let overlay = workspace.write_overlay(&image_name, &png)?;

    println!("Exported {} points", projection.rows().len());
    for count in projection.stats().iter() {
        println!("  {}: {} ({:.2}%)", count.name, count.count, count.percentage);
    }
    println!("CSV: {}", workspace.annotation_path(&image_name).display());
    println!("Report: {}", workspace.report_path(&image_name).display());
    println!("Overlay: {}", overlay.display());
    Ok(())
}

fn run_patches(
    config: &AppConfig,
    width: u32,
    height: u32,
    patch_width: Option<u32>,
    patch_height: Option<u32>,
    overlap: Option<f64>,
) -> CliResult<()> {
    let grid = PatchGrid::new(
        width,
        height,
        patch_width.unwrap_or(config.patches.width),
        patch_height.unwrap_or(config.patches.height),
        overlap.unwrap_or(config.patches.overlap),
    )?;

    let (stride_x, stride_y) = grid.stride();
    println!(
        "{} rows x {} columns, stride {:.2}x{:.2}",
        grid.rows(),
        grid.columns(),
        stride_x,
        stride_y
    );
    for (index, patch) in grid.patches().enumerate() {
        println!("{:>4}: {}", index, patch);
    }
    Ok(())
}

fn run_apply(
    config: &AppConfig,
    root: &Path,
    image_name: &str,
    report_path: &Path,
    patch_index: Option<usize>,
) -> CliResult<()> {
    let report = ViewportReport::from_json(&std::fs::read_to_string(report_path)?)?;
    let workspace = Workspace::from_config(root, &config.workspace);
    let mut session = AnnotationSession::new(workspace, config.catalog()?)
        .with_renderer(config.render.renderer());

    let outcome = match patch_index {
        None => session.apply_report(image_name, Some(&report))?,
        Some(index) => {
            let base = session.workspace().open_image(image_name)?;
            let grid = PatchGrid::new(
                base.width(),
                base.height(),
                config.patches.width,
                config.patches.height,
                config.patches.overlap,
            )?;
            let patch = grid
                .patch_for_index(index, config.patches.indexing)
                .ok_or_else(|| format!("patch index {index} outside {} patches", grid.len()))?;
            session.apply_patch_report(image_name, &patch, Some(&report))?
        }
    };

    if let Some(outcome) = outcome {
        println!(
            "{} added, {} removed, {} retained",
            outcome.added.len(),
            outcome.removed.len(),
            outcome.retained
        );
    }
    if session.workspace().has_image(image_name) {
        session.export_overlay()?;
    }
    Ok(())
}

fn run_queue(config: &AppConfig, todo: Option<String>, done: Option<String>) -> CliResult<()> {
    let todo = todo.unwrap_or_else(|| config.queue.todo_dir.clone());
    let done = done.unwrap_or_else(|| config.queue.done_dir.clone());
    let queue = ReviewQueue::load(LocalFolderStorage::new("."), &todo, &done)?;

    for sample in queue.samples() {
        println!("{}", sample.display_name());
    }
    Ok(())
}

fn run_config(config: &AppConfig, path: Option<&Path>, init: bool) -> CliResult<()> {
    if init {
        let defaults = AppConfig::default();
        match path {
            Some(path) => defaults.save(path)?,
            None => defaults.save_to_default_path()?,
        }
        let written = path.map(Path::to_path_buf).or_else(AppConfig::default_path);
        if let Some(written) = written {
            println!("Wrote default configuration to {}", written.display());
        }
        println!("{}", serde_json::to_string_pretty(&defaults)?);
        return Ok(());
    }
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}
