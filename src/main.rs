use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use idscan::camera::{self, PixelBounds};
use idscan::{
    load_config, CaptureContext, DocumentScanner, Extent, Frame, ScanOutcome, ScannerConfig,
    ScreenRect, SupportedSize,
};

#[derive(Parser)]
#[command(name = "idscan")]
#[command(about = "Locate barcode and text-line regions on photographed ID documents")]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Scanner configuration (TOML)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum Target {
    Barcode,
    Text,
}

#[derive(Subcommand)]
enum Command {
    /// Detect regions inside the framing guide of a captured frame
    Scan {
        /// Path to the captured frame
        #[arg(value_name = "IMAGE")]
        image_path: PathBuf,

        /// What to look for
        #[arg(long, value_enum, default_value = "text")]
        target: Target,

        /// Screen size the guide was drawn on, e.g. 1920x1080
        #[arg(long)]
        screen: Extent,

        /// Framing guide in screen pixels: LEFT,TOP,RIGHT,BOTTOM
        #[arg(long)]
        guide: ScreenRect,

        /// Frame size reported by the camera (defaults to the decoded size)
        #[arg(long)]
        frame: Option<Extent>,

        /// Device model, for per-device corrections
        #[arg(long, default_value = "")]
        device_model: String,

        /// Sensor orientation in degrees
        #[arg(long, default_value_t = 90)]
        sensor_orientation: u16,

        /// Directory to write cropped regions to
        #[arg(long, value_name = "DIR")]
        out: Option<PathBuf>,

        /// Save debug outputs to directory (must be empty)
        #[arg(long, value_name = "DIR")]
        debug_out: Option<PathBuf>,

        /// Read the detected text lines with the OCR engine
        #[cfg(feature = "ocr")]
        #[arg(long)]
        ocr: bool,
    },

    /// Pick the capture size that best matches a screen
    SelectSize {
        /// Screen size, e.g. 1080x1920
        #[arg(long)]
        screen: Extent,

        /// Comma-separated supported sizes, e.g. 640x480,800x600
        #[arg(long, value_delimiter = ',', required = true)]
        sizes: Vec<SupportedSize>,

        /// Size the device uses when nothing fits
        #[arg(long)]
        default: SupportedSize,
    },
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    init_logging(args.verbose);

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ScannerConfig::default(),
    };

    match args.command {
        Command::Scan {
            image_path,
            target,
            screen,
            guide,
            frame,
            device_model,
            sensor_orientation,
            out,
            debug_out,
            #[cfg(feature = "ocr")]
            ocr,
        } => {
            info!("loading frame {}", image_path.display());
            let bytes = std::fs::read(&image_path)?;
            let extent = match frame {
                Some(extent) => extent,
                None => {
                    let (w, h) = image::image_dimensions(&image_path)
                        .map_err(|e| anyhow::anyhow!("Failed to read image header: {}", e))?;
                    Extent::new(w, h)
                }
            };
            let frame = Frame::new(bytes, extent);
            let capture = CaptureContext::new(guide, screen).with_device(device_model, sensor_orientation);

            let mut scanner = DocumentScanner::new(config);
            if let Some(debug_dir) = debug_out {
                scanner = scanner.with_debug(debug_dir)?;
            }

            let regions = match target {
                Target::Barcode => scanner.scan_barcode(&frame, &capture).found().map(|r| vec![r]),
                Target::Text => match scanner.scan_text_lines(&frame, &capture) {
                    ScanOutcome::Found(lines) => Some(lines),
                    ScanOutcome::NotFound(reason) => {
                        println!("Not found: {:?}", reason);
                        None
                    }
                },
            };

            let Some(regions) = regions else {
                if matches!(target, Target::Barcode) {
                    println!("No barcode found.");
                }
                return Ok(());
            };

            println!("\n=== Detected Regions ===");
            for (i, region) in regions.iter().enumerate() {
                let b = region.frame_bbox();
                println!(
                    "  {} {} at ({}, {}) {}x{} - density: {:.2}",
                    region.kind,
                    i + 1,
                    b.x,
                    b.y,
                    b.width,
                    b.height,
                    region.density
                );
            }

            #[cfg(feature = "ocr")]
            if ocr && matches!(target, Target::Text) {
                use idscan::detection::ocr::{default_model_dir, recognize_lines, OcrsReader};

                let reader = OcrsReader::load(&default_model_dir()?)?;
                let texts = recognize_lines(&reader, &regions, scanner.config().binarization.reader)?;
                println!("\n=== Recognized Text ===");
                for text in &texts {
                    println!("  {}", text);
                }
            }

            if let Some(out_dir) = out {
                std::fs::create_dir_all(&out_dir)?;
                for (i, region) in regions.iter().enumerate() {
                    let name = match target {
                        Target::Barcode => "barcode.png".to_string(),
                        Target::Text => format!("line-{:02}.png", i + 1),
                    };
                    region
                        .image
                        .save(out_dir.join(&name))
                        .map_err(|e| anyhow::anyhow!("Failed to save {}: {}", name, e))?;
                }
                println!("Saved {} image(s) to {}", regions.len(), out_dir.display());
            }
        }

        Command::SelectSize { screen, sizes, default } => {
            let bounds: PixelBounds = config.capture.pixel_bounds;
            let chosen = camera::select_capture_size(&sizes, screen, default, bounds);
            println!("{}", chosen);
        }
    }

    Ok(())
}
