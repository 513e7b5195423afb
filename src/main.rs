use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ocrpost::{ImageDump, OcrParams, OwnedTensor, QuantInfo, Roi, TextDetection, TextRecognition};

#[derive(Parser)]
#[command(name = "ocrpost")]
#[command(about = "Decode quantized OCR tensors into text-region boxes and strings", long_about = None)]
struct Cli {
    /// Optional JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the detection stage on a raw probability-map tensor dump
    Det {
        /// Raw 8-bit tensor dump
        #[arg(long)]
        tensor: PathBuf,

        /// Tensor shape, comma separated (e.g. 1,1,32,128)
        #[arg(long)]
        shape: String,

        /// Dequantization scale
        #[arg(long, default_value_t = 1.0 / 255.0)]
        scale: f32,

        /// Dequantization zero point
        #[arg(long, default_value_t = 0.0)]
        zero_point: f32,

        /// Directory for intermediate map dumps
        #[arg(long)]
        debug_dir: Option<PathBuf>,
    },
    /// Run the recognition stage on a raw sequence tensor dump
    Rec {
        /// Raw 8-bit tensor dump
        #[arg(long)]
        tensor: PathBuf,

        /// Tensor shape, comma separated (e.g. 1,40,97)
        #[arg(long)]
        shape: String,

        /// Dequantization scale
        #[arg(long, default_value_t = 1.0 / 255.0)]
        scale: f32,

        /// Dequantization zero point
        #[arg(long, default_value_t = 0.0)]
        zero_point: f32,
    },
}

fn parse_shape(s: &str) -> Result<Vec<usize>, String> {
    s.split(',')
        .map(|d| {
            d.trim()
                .parse::<usize>()
                .map_err(|e| format!("bad shape component {d:?}: {e}"))
        })
        .collect()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let params = Arc::new(match &cli.config {
        Some(path) => OcrParams::from_file(path)?,
        None => OcrParams::default(),
    });

    match cli.command {
        Command::Det {
            tensor,
            shape,
            scale,
            zero_point,
            debug_dir,
        } => {
            let data = fs::read(&tensor)?;
            let shape = parse_shape(&shape)?;
            let mut roi = Roi::new();
            roi.add_tensor(OwnedTensor::new(
                "input",
                shape,
                data,
                QuantInfo { scale, zero_point },
            ));

            let mut det = TextDetection::new(params);
            if let Some(dir) = debug_dir {
                det = det.with_debug_sink(Box::new(ImageDump::new(dir)));
            }
            det.run(&mut roi)?;

            let json = serde_json::json!({
                "detections": roi.detections().iter().map(|d| serde_json::json!({
                    "label": d.label,
                    "score": d.confidence,
                    "bbox": {
                        "xmin": d.bbox.xmin,
                        "ymin": d.bbox.ymin,
                        "width": d.bbox.width,
                        "height": d.bbox.height,
                    },
                })).collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        Command::Rec {
            tensor,
            shape,
            scale,
            zero_point,
        } => {
            let data = fs::read(&tensor)?;
            let shape = parse_shape(&shape)?;
            let mut roi = Roi::new();
            roi.add_tensor(OwnedTensor::new(
                "input",
                shape,
                data,
                QuantInfo { scale, zero_point },
            ));

            let rec = TextRecognition::new(params);
            let decoded = rec.run(&mut roi)?;

            let json = match decoded {
                Some(line) => serde_json::json!({
                    "text": line.text,
                    "confidence": line.confidence,
                }),
                None => serde_json::json!({
                    "text": "",
                    "confidence": 0.0,
                }),
            };
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
    }

    Ok(())
}
