//! traywell CLI: analyze photographs of multi-well assay trays.

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

use traywell::{
    render_overlay, AnalyzeConfig, LightMode, TrayAnalyzer, TrayKind, TrayLayout, TrayRequest,
};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "traywell")]
#[command(about = "Locate and classify the wells of photographed water-assay trays")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze and classify one tray image.
    Analyze(CliAnalyzeArgs),

    /// Write the resized, lens-corrected image.
    Unwarp(CliUnwarpArgs),

    /// Print the physical tray layout.
    LayoutInfo {
        /// Describe the tray variant with small wells.
        #[arg(long)]
        small_wells: bool,
    },
}

#[derive(Debug, Clone, Args)]
struct ConfigArgs {
    /// JSON file with configuration overrides.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Working width. Applied after --config; pixel-unit values are
    /// rescaled from the loaded width to this one.
    #[arg(long)]
    target_width: Option<u32>,

    /// Radial distortion coefficient.
    #[arg(long)]
    k: Option<f64>,

    /// Seed for the region-growing sampler.
    #[arg(long)]
    seed: Option<u64>,

    /// Directory for persisted unwarp maps.
    #[arg(long)]
    unwarp_cache: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct CliAnalyzeArgs {
    /// Path to the input image.
    #[arg(long)]
    image: PathBuf,

    /// Path to write the classified result (JSON).
    #[arg(long)]
    out: PathBuf,

    /// Image was taken under UV light.
    #[arg(long)]
    uv: bool,

    /// Tray carries the small-well grid.
    #[arg(long)]
    small_wells: bool,

    /// Fraction of positive signal needed to call a well positive.
    #[arg(long)]
    fraction: Option<f64>,

    /// Directory for the debug dump, intermediate images and histogram.
    #[arg(long)]
    debug_dir: Option<PathBuf>,

    #[command(flatten)]
    config: ConfigArgs,
}

#[derive(Debug, Clone, Args)]
struct CliUnwarpArgs {
    /// Path to the input image.
    #[arg(long)]
    image: PathBuf,

    /// Path to write the unwarped image.
    #[arg(long)]
    out: PathBuf,

    #[command(flatten)]
    config: ConfigArgs,
}

impl ConfigArgs {
    fn build_config(&self) -> CliResult<AnalyzeConfig> {
        let mut config = match &self.config {
            Some(path) => AnalyzeConfig::from_json_file(path)?,
            None => AnalyzeConfig::default(),
        };
        if let Some(w) = self.target_width {
            config = config.with_target_width(w);
        }
        if let Some(k) = self.k {
            config.unwarp.k = k;
        }
        if let Some(seed) = self.seed {
            config.grow.rng_seed = Some(seed);
        }
        config.validate()?;
        Ok(config)
    }

    fn analyzer(&self, config: AnalyzeConfig) -> TrayAnalyzer {
        let analyzer = TrayAnalyzer::with_config(config);
        match &self.unwarp_cache {
            Some(dir) => analyzer.with_unwarp_cache_dir(dir),
            None => analyzer,
        }
    }
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze(args) => run_analyze(&args),
        Commands::Unwarp(args) => run_unwarp(&args),
        Commands::LayoutInfo { small_wells } => run_layout_info(small_wells),
    }
}

// ── layout-info ───────────────────────────────────────────────────────

fn run_layout_info(small_wells: bool) -> CliResult<()> {
    let layout = TrayLayout::for_kind(TrayKind::from_small_wells(small_wells));

    println!("traywell tray layout ({:?})", layout.kind);
    println!(
        "  big wells:      {}x{}, {} mm pitch, {} mm size",
        layout.big_rows, layout.big_cols, layout.big_well_spacing_mm, layout.big_well_size_mm
    );
    println!(
        "  big grid span:  {:.1}x{:.1} mm",
        layout.big_grid_width_mm(),
        layout.big_grid_height_mm()
    );
    if layout.has_small_wells() {
        println!(
            "  small wells:    {}x{} (outer corners omitted), {} mm pitch, {} mm size",
            layout.small_rows,
            layout.small_cols,
            layout.small_well_spacing_mm,
            layout.small_well_size_mm
        );
        println!(
            "  first small:    {} mm across, {} mm down from the origin well",
            layout.first_small_well_col_mm, layout.first_small_well_row_mm
        );
    }
    println!(
        "  overflow band:  {}..{} mm right of the last big well",
        layout.overflow_x_start_mm, layout.overflow_x_end_mm
    );
    println!("  wells total:    {} + overflow", layout.n_wells());

    Ok(())
}

// ── unwarp ────────────────────────────────────────────────────────────

fn run_unwarp(args: &CliUnwarpArgs) -> CliResult<()> {
    tracing::info!("Loading image: {}", args.image.display());
    let analyzer = args.config.analyzer(args.config.build_config()?);
    let image = traywell::load_image(&args.image)?;
    let unwarped = analyzer.unwarp(&image)?;
    unwarped.save(&args.out)?;
    tracing::info!(
        "Unwarped {}x{} image written to {}",
        unwarped.width(),
        unwarped.height(),
        args.out.display()
    );
    Ok(())
}

// ── analyze ───────────────────────────────────────────────────────────

fn image_id(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn debug_path(dir: &Path, stem: &str, suffix: &str) -> PathBuf {
    dir.join(format!("{}{}", stem, suffix))
}

fn run_analyze(args: &CliAnalyzeArgs) -> CliResult<()> {
    tracing::info!("Loading image: {}", args.image.display());
    let mut config = args.config.build_config()?;
    if let Some(fraction) = args.fraction {
        config.classify.fractional_threshold = fraction;
    }
    let analyzer = args.config.analyzer(config);

    let image = traywell::load_image(&args.image)?;
    tracing::info!("Image size: {}x{}", image.width(), image.height());

    let request = TrayRequest::new(image_id(&args.image))
        .with_mode(LightMode::from_uv(args.uv))
        .with_small_wells(args.small_wells);

    let (result, debug) = match &args.debug_dir {
        Some(dir) => {
            let (result, dump, images) = analyzer.analyze_with_debug(&image, &request);
            std::fs::create_dir_all(dir)?;
            let stem = args
                .image
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "tray".to_string());

            let dump_path = debug_path(dir, &stem, ".debug.json");
            std::fs::write(&dump_path, serde_json::to_string_pretty(&dump)?)?;
            std::fs::write(debug_path(dir, &stem, ".hst"), dump.histogram_text())?;
            if let Some(img) = &images.unwarped {
                img.save(debug_path(dir, &stem, "_unwarped.png"))?;
            }
            if let Some(img) = &images.normalized {
                img.save(debug_path(dir, &stem, "_normalized.png"))?;
            }
            tracing::info!("Debug dump written to {}", dump_path.display());
            (result, Some((dir.clone(), stem, images)))
        }
        None => (analyzer.analyze(&image, &request), None),
    };

    let classified = analyzer.classify(result?);
    tracing::info!(
        "{}: {} positive big wells (overflow included), {} positive small wells",
        classified.image_id(),
        classified.big_positive_count,
        classified.small_positive_count
    );

    if let Some((dir, stem, images)) = debug {
        if let Some(normalized) = &images.normalized {
            let overlay_path = debug_path(&dir, &stem, "_overlay.png");
            render_overlay(normalized, &classified.analysis).save(&overlay_path)?;
            tracing::info!("Overlay written to {}", overlay_path.display());
        }
    }

    let json = serde_json::to_string_pretty(&classified)?;
    std::fs::write(&args.out, &json)?;
    tracing::info!("Results written to {}", args.out.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_args(config: Option<PathBuf>, target_width: Option<u32>) -> ConfigArgs {
        ConfigArgs {
            config,
            target_width,
            k: None,
            seed: None,
            unwarp_cache: None,
        }
    }

    #[test]
    fn target_width_rescales_a_loaded_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "background": { "smoothing_width": 40 } }"#).unwrap();

        let config = config_args(Some(path), Some(1280)).build_config().unwrap();
        assert_eq!(config.target_width, 1280);
        assert_eq!(config.background.smoothing_width, 80);
        assert_eq!(config.background.edge_shift, 12);
        assert_eq!(config.overflow.fallback_col_offset, 112);
    }

    #[test]
    fn target_width_alone_matches_rescaled_defaults() {
        let config = config_args(None, Some(960)).build_config().unwrap();
        assert_eq!(config, AnalyzeConfig::for_target_width(960));
    }
}
