//! # ocrpost - Post-inference OCR decoding
//!
//! Decoding plugins for a neural-network accelerator pipeline: raw quantized
//! tensor output is converted into frame-relative scene annotations on a
//! shared region-of-interest object.
//!
//! ## Stages
//!
//! - **Detection** ([`TextDetection`]): a quantized probability map becomes
//!   "text_region" detections via adaptive thresholding, morphological
//!   closing, contour extraction, horizontal merging, growth, and filtering
//!   with a widest-rectangles fallback.
//! - **Crop/region selection** ([`crop_text_regions`]): detected boxes are
//!   made crop-ready for the external cropper.
//! - **Recognition** ([`TextRecognition`]): a per-timestep class-probability
//!   tensor is CTC-greedy decoded and attached as a classification.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ocrpost::{OcrParams, OwnedTensor, QuantInfo, Roi, TextDetection};
//!
//! let params = Arc::new(OcrParams::from_file("ocr.json")?);
//! let det = TextDetection::new(params);
//!
//! let mut roi = Roi::new();
//! roi.add_tensor(OwnedTensor::new(
//!     "det_out",
//!     vec![1, 1, 32, 128],
//!     vec![0u8; 32 * 128],
//!     QuantInfo::unit(),
//! ));
//! det.run(&mut roi)?;
//!
//! for d in roi.detections() {
//!     println!("{} {:.3}", d.label, d.confidence);
//! }
//! # Ok::<(), ocrpost::OcrError>(())
//! ```
//!
//! Each invocation processes one ROI synchronously; the parameter bundle is
//! immutable after load and safe to share across worker threads.

mod charset;
mod config;
mod contours;
mod crop;
mod det;
mod diag;
mod error;
mod geometry;
mod rec;
mod roi;
mod tensor;

pub use crate::charset::{default_charset, load_charset, BLANK_TOKEN, DEFAULT_CHARSET_LEN};
pub use crate::config::OcrParams;
pub use crate::contours::{find_external_contours, Contour};
pub use crate::crop::{crop_text_regions, crop_text_regions_filter, CropTunables};
pub use crate::det::{
    resolve_map_shape, DetTunables, MapLayout, TextDetection, TEXT_REGION_LABEL,
};
pub use crate::diag::{DebugSink, ImageDump};
pub use crate::error::OcrError;
pub use crate::geometry::{
    db_unclip_rect_iter, db_unclip_rect_iter_aniso, merge_horizontal_boxes, region_score, Rect,
};
pub use crate::rec::{
    ctc_greedy_decode, resolve_seq_layout, DecodedText, SeqLayout, TextRecognition,
    PLACEHOLDER_SYMBOL, TEXT_CATEGORY,
};
pub use crate::roi::{BBox, Classification, Detection, Roi};
pub use crate::tensor::{probability_map, OwnedTensor, QuantInfo, Tensor};
