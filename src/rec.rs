//! CTC greedy decoding of a quantized recognition tensor.
//!
//! The tensor is rank 3 with batch 1; the orientation of the two trailing
//! axes is inferred, not declared. The decoded string is attached as a
//! classification on the first detection of the ROI.

use std::sync::Arc;

use ndarray::Array2;
use tracing::debug;

use crate::config::OcrParams;
use crate::error::OcrError;
use crate::roi::{Classification, Roi};

/// Category under which decoded text is attached.
pub const TEXT_CATEGORY: &str = "license_plate";

/// Placeholder emitted for a class index outside the symbol table.
pub const PLACEHOLDER_SYMBOL: &str = "?";

/// Resolved orientation of a recognition tensor's trailing axes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeqLayout {
    /// `[1, T, C]` - timesteps vary along the first trailing axis.
    TimeMajor,
    /// `[1, C, T]` - classes vary along the first trailing axis.
    ClassMajor,
}

/// Infers which trailing axis holds the classes.
///
/// An axis matching the symbol-table length is taken as the class axis;
/// otherwise the larger axis is taken as timesteps. A square shape (T == C)
/// resolves to class-major - the tie cannot be decided from the shape alone.
/// Returns the layout plus (timesteps, classes).
pub fn resolve_seq_layout(d1: usize, d2: usize, charset_len: usize) -> (SeqLayout, usize, usize) {
    if d2 == charset_len && d1 != charset_len {
        return (SeqLayout::TimeMajor, d1, d2);
    }
    if d1 == charset_len && d2 != charset_len {
        return (SeqLayout::ClassMajor, d2, d1);
    }
    let timesteps = d1.max(d2);
    let classes = d1.min(d2);
    if d1 == classes {
        (SeqLayout::ClassMajor, timesteps, classes)
    } else {
        (SeqLayout::TimeMajor, timesteps, classes)
    }
}

/// Decoded line of text with its mean per-character confidence.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedText {
    pub text: String,
    pub confidence: f32,
}

/// Greedy CTC decode over a (T, C) probability matrix.
///
/// Emits a symbol when the arg-max class differs from the previous
/// timestep's class and is not `blank_index`; a class index outside the
/// symbol table decodes to "?". Confidence is the mean of the emitted
/// arg-max probabilities, 0 when nothing was emitted.
pub fn ctc_greedy_decode(
    probs: &Array2<f32>,
    blank_index: usize,
    charset: &[String],
) -> DecodedText {
    let (timesteps, classes) = probs.dim();
    let mut text = String::with_capacity(timesteps);
    let mut conf_sum = 0.0f32;
    let mut conf_count = 0usize;
    let mut prev: Option<usize> = None;

    for t in 0..timesteps {
        let mut best_idx = 0usize;
        let mut best_val = f32::MIN;
        for c in 0..classes {
            let v = probs[[t, c]];
            if v > best_val {
                best_val = v;
                best_idx = c;
            }
        }

        if prev != Some(best_idx) && best_idx != blank_index {
            match charset.get(best_idx) {
                Some(symbol) => text.push_str(symbol),
                None => text.push_str(PLACEHOLDER_SYMBOL),
            }
            conf_sum += best_val;
            conf_count += 1;
        }
        prev = Some(best_idx);
    }

    let confidence = if conf_count > 0 {
        conf_sum / conf_count as f32
    } else {
        0.0
    };
    DecodedText { text, confidence }
}

/// Numerically-stable softmax applied independently per timestep row.
fn softmax_rows(probs: &mut Array2<f32>) {
    for mut row in probs.rows_mut() {
        let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let mut sum = 0.0f64;
        for v in row.iter_mut() {
            *v = (*v - max).exp();
            sum += *v as f64;
        }
        if sum > 0.0 {
            for v in row.iter_mut() {
                *v = (*v as f64 / sum) as f32;
            }
        }
    }
}

/// Recognition Stage plugin.
pub struct TextRecognition {
    params: Arc<OcrParams>,
}

impl TextRecognition {
    pub fn new(params: Arc<OcrParams>) -> Self {
        Self { params }
    }

    /// Decodes the ROI's recognition tensor and attaches the text as a
    /// classification on the first detection.
    ///
    /// A tensorless ROI is a no-op. A tensor of rank other than 3, or with a
    /// batch dimension other than 1, is fatal.
    pub fn run(&self, roi: &mut Roi) -> Result<Option<DecodedText>, OcrError> {
        if !roi.has_tensors() {
            return Ok(None);
        }
        let p = self.params.as_ref();

        let probs = {
            let tensor = roi.tensor_by_name_or_first(&p.rec_output_name)?;
            let shape = tensor.shape();
            if shape.len() != 3 {
                return Err(OcrError::InvalidRecRank(shape.len()));
            }
            if shape[0] != 1 {
                return Err(OcrError::InvalidRecBatch(shape[0]));
            }

            let (layout, timesteps, classes) =
                resolve_seq_layout(shape[1], shape[2], p.charset.len());
            debug!(?layout, timesteps, classes, "resolved recognition layout");

            let quant = tensor.quant();
            let data = tensor.data();
            let mut probs = Array2::<f32>::zeros((timesteps, classes));
            for t in 0..timesteps {
                for c in 0..classes {
                    let idx = match layout {
                        SeqLayout::TimeMajor => t * classes + c,
                        SeqLayout::ClassMajor => c * timesteps + t,
                    };
                    let raw = data.get(idx).copied().unwrap_or(0);
                    probs[[t, c]] = quant.dequantize(raw).clamp(0.0, 1.0);
                }
            }
            if !p.logits_are_softmax {
                softmax_rows(&mut probs);
            }
            probs
        };

        let decoded = ctc_greedy_decode(&probs, p.blank_index, &p.charset);
        debug!(text = %decoded.text, confidence = decoded.confidence, "decoded text");

        if decoded.text.trim().is_empty() {
            return Ok(None);
        }
        if let Some(det) = roi.detections_mut().first_mut() {
            det.add_classification(Classification::new(
                TEXT_CATEGORY,
                decoded.text.clone(),
                decoded.confidence,
            ));
        }
        Ok(Some(decoded))
    }
}
