//! Optional diagnostic sinks for intermediate detection maps.
//!
//! A sink is a capability the detection stage may call when one is attached;
//! the algorithms behave identically with no sink. Dump failures are logged
//! and never propagated.

use std::path::PathBuf;

use ndarray::Array2;
use tracing::warn;

/// Receiver for intermediate probability and binary maps.
pub trait DebugSink {
    fn dump_map(&self, name: &str, map: &Array2<f32>);
    fn dump_binary(&self, name: &str, map: &Array2<u8>);
}

/// Writes maps as grayscale PNGs into a directory.
pub struct ImageDump {
    dir: PathBuf,
}

impl ImageDump {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn write_gray(&self, name: &str, w: usize, h: usize, pixels: Vec<u8>) {
        let path = self.dir.join(format!("{name}.png"));
        let img = match image::GrayImage::from_raw(w as u32, h as u32, pixels) {
            Some(img) => img,
            None => {
                warn!(name, "diagnostic map has inconsistent dimensions");
                return;
            }
        };
        if let Err(e) = img.save(&path) {
            warn!(name, error = %e, "failed to write diagnostic map");
        }
    }
}

impl DebugSink for ImageDump {
    fn dump_map(&self, name: &str, map: &Array2<f32>) {
        let (h, w) = map.dim();
        let pixels = map
            .iter()
            .map(|v| (v.clamp(0.0, 1.0) * 255.0) as u8)
            .collect();
        self.write_gray(name, w, h, pixels);
    }

    fn dump_binary(&self, name: &str, map: &Array2<u8>) {
        let (h, w) = map.dim();
        self.write_gray(name, w, h, map.iter().copied().collect());
    }
}
