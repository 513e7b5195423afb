//! Quantized tensor surface consumed by the decoding stages.
//!
//! The inference pipeline owns the device buffers; the stages only read
//! them. The `Tensor` trait is the capability set the stages rely on, so the
//! algorithms stay decoupled from any concrete device representation.

use ndarray::Array2;

/// Dequantization parameters attached to a device output buffer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QuantInfo {
    pub scale: f32,
    pub zero_point: f32,
}

impl QuantInfo {
    /// Maps the full 8-bit range onto [0, 1].
    pub fn unit() -> Self {
        Self {
            scale: 1.0 / 255.0,
            zero_point: 0.0,
        }
    }

    #[inline]
    pub fn dequantize(&self, raw: u8) -> f32 {
        (raw as f32 - self.zero_point) * self.scale
    }
}

impl Default for QuantInfo {
    fn default() -> Self {
        Self::unit()
    }
}

/// Read-only view of a device output tensor.
pub trait Tensor {
    fn name(&self) -> &str;
    /// Rank 2-4 shape as reported by the device.
    fn shape(&self) -> &[usize];
    /// Raw 8-bit quantized buffer.
    fn data(&self) -> &[u8];
    fn quant(&self) -> QuantInfo;
}

/// Tensor backed by an owned buffer, used by the CLI and tests.
#[derive(Clone, Debug)]
pub struct OwnedTensor {
    name: String,
    shape: Vec<usize>,
    data: Vec<u8>,
    quant: QuantInfo,
}

impl OwnedTensor {
    pub fn new(
        name: impl Into<String>,
        shape: Vec<usize>,
        data: Vec<u8>,
        quant: QuantInfo,
    ) -> Self {
        Self {
            name: name.into(),
            shape,
            data,
            quant,
        }
    }
}

impl Tensor for OwnedTensor {
    fn name(&self) -> &str {
        &self.name
    }

    fn shape(&self) -> &[usize] {
        &self.shape
    }

    fn data(&self) -> &[u8] {
        &self.data
    }

    fn quant(&self) -> QuantInfo {
        self.quant
    }
}

/// Dequantizes an 8-bit map tensor into an (h, w) float probability map.
///
/// Values are clamped to [0, 1]; a buffer shorter than h*w reads as zero
/// probability past its end.
pub fn probability_map(tensor: &dyn Tensor, h: usize, w: usize) -> Array2<f32> {
    let quant = tensor.quant();
    let data = tensor.data();
    Array2::from_shape_fn((h, w), |(y, x)| {
        let raw = data.get(y * w + x).copied().unwrap_or(0);
        quant.dequantize(raw).clamp(0.0, 1.0)
    })
}
