//! Plugin configuration.
//!
//! Parameters are loaded once at initialization and shared read-only across
//! invocations; nothing here is mutated after `from_file` returns.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::charset::{default_charset, load_charset};
use crate::error::OcrError;

/// Immutable parameter bundle for the detection and recognition stages.
#[derive(Clone, Debug)]
pub struct OcrParams {
    // Detection
    pub det_bin_thresh: f32,
    pub det_box_thresh: f32,
    pub det_unclip_ratio: f32,
    pub det_max_candidates: usize,
    pub det_min_box_size: f32,
    pub det_output_name: String,
    pub det_map_h: usize,
    pub det_map_w: usize,
    pub letterbox_fix: bool,

    // Recognition
    pub rec_output_name: String,
    pub charset_path: String,
    pub blank_index: usize,
    pub logits_are_softmax: bool,
    /// Accepted for config compatibility; decode infers orientation itself.
    pub time_major: bool,
    /// Accepted for config compatibility; not consumed by the decode path.
    pub text_conf_smooth: f32,
    /// Accepted for config compatibility; not consumed by the decode path.
    pub attach_caption_box: bool,

    /// Class-index-to-symbol table, index 0 reserved for the CTC blank.
    pub charset: Vec<String>,
}

impl Default for OcrParams {
    fn default() -> Self {
        Self {
            det_bin_thresh: 0.3,
            det_box_thresh: 0.6,
            det_unclip_ratio: 1.6,
            det_max_candidates: 100,
            det_min_box_size: 3.0,
            det_output_name: String::new(),
            det_map_h: 736,
            det_map_w: 736,
            letterbox_fix: true,
            rec_output_name: String::new(),
            charset_path: String::new(),
            blank_index: 0,
            logits_are_softmax: true,
            time_major: false,
            text_conf_smooth: 0.0,
            attach_caption_box: false,
            charset: default_charset(),
        }
    }
}

/// On-disk layout. Strictly typed: an unknown key or a mistyped value fails
/// the load, so a half-understood file never half-configures a plugin.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    det_bin_thresh: Option<f32>,
    det_box_thresh: Option<f32>,
    det_unclip_ratio: Option<f32>,
    det_max_candidates: Option<u32>,
    det_min_box_size: Option<f32>,
    det_output_name: Option<String>,
    det_map_h: Option<u32>,
    det_map_w: Option<u32>,
    letterbox_fix: Option<bool>,

    rec_output_name: Option<String>,
    charset_path: Option<String>,
    blank_index: Option<u32>,
    logits_are_softmax: Option<bool>,
    time_major: Option<bool>,
    text_conf_smooth: Option<f32>,
    attach_caption_box: Option<bool>,
}

impl OcrParams {
    /// Loads parameters from an optional JSON config file.
    ///
    /// A missing file keeps every default. An unreadable, unparseable, or
    /// schema-violating file is a fatal initialization error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, OcrError> {
        let path = path.as_ref();
        let mut params = Self::default();
        if path.exists() {
            let raw = fs::read_to_string(path).map_err(|e| {
                OcrError::Config(format!("cannot read {}: {e}", path.display()))
            })?;
            let file: ConfigFile = serde_json::from_str(&raw).map_err(|e| {
                OcrError::Config(format!(
                    "{} does not match the config schema: {e}",
                    path.display()
                ))
            })?;
            params.apply(file);
        }
        params.charset = load_charset(&params.charset_path)?;
        Ok(params)
    }

    fn apply(&mut self, file: ConfigFile) {
        if let Some(v) = file.det_bin_thresh {
            self.det_bin_thresh = v;
        }
        if let Some(v) = file.det_box_thresh {
            self.det_box_thresh = v;
        }
        if let Some(v) = file.det_unclip_ratio {
            self.det_unclip_ratio = v;
        }
        if let Some(v) = file.det_max_candidates {
            self.det_max_candidates = v as usize;
        }
        if let Some(v) = file.det_min_box_size {
            self.det_min_box_size = v;
        }
        if let Some(v) = file.det_output_name {
            self.det_output_name = v;
        }
        if let Some(v) = file.det_map_h {
            self.det_map_h = v as usize;
        }
        if let Some(v) = file.det_map_w {
            self.det_map_w = v as usize;
        }
        if let Some(v) = file.letterbox_fix {
            self.letterbox_fix = v;
        }
        if let Some(v) = file.rec_output_name {
            self.rec_output_name = v;
        }
        if let Some(v) = file.charset_path {
            self.charset_path = v;
        }
        if let Some(v) = file.blank_index {
            self.blank_index = v as usize;
        }
        if let Some(v) = file.logits_are_softmax {
            self.logits_are_softmax = v;
        }
        if let Some(v) = file.time_major {
            self.time_major = v;
        }
        if let Some(v) = file.text_conf_smooth {
            self.text_conf_smooth = v;
        }
        if let Some(v) = file.attach_caption_box {
            self.attach_caption_box = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn missing_file_keeps_defaults() {
        let params = OcrParams::from_file("/nonexistent/ocr.json").unwrap();
        assert_eq!(params.det_bin_thresh, 0.3);
        assert_eq!(params.det_max_candidates, 100);
        assert_eq!(params.charset.len(), 97);
    }

    #[test]
    fn file_values_override_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"det_bin_thresh": 0.25, "det_max_candidates": 7, "letterbox_fix": false}}"#
        )
        .unwrap();
        let params = OcrParams::from_file(file.path()).unwrap();
        assert_eq!(params.det_bin_thresh, 0.25);
        assert_eq!(params.det_max_candidates, 7);
        assert!(!params.letterbox_fix);
        // untouched keys keep their defaults
        assert_eq!(params.det_box_thresh, 0.6);
    }

    #[test]
    fn unknown_key_is_fatal() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"not_a_key": 1}}"#).unwrap();
        let err = OcrParams::from_file(file.path()).unwrap_err();
        assert!(matches!(err, OcrError::Config(_)));
    }

    #[test]
    fn mistyped_value_is_fatal() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"det_max_candidates": 1.5}}"#).unwrap();
        let err = OcrParams::from_file(file.path()).unwrap_err();
        assert!(matches!(err, OcrError::Config(_)));
    }

    #[test]
    fn malformed_json_is_fatal() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let err = OcrParams::from_file(file.path()).unwrap_err();
        assert!(matches!(err, OcrError::Config(_)));
    }

    #[test]
    fn charset_path_from_config_is_loaded() {
        let mut charset_file = NamedTempFile::new().unwrap();
        writeln!(charset_file, "blank").unwrap();
        writeln!(charset_file, "X").unwrap();
        let mut config_file = NamedTempFile::new().unwrap();
        write!(
            config_file,
            r#"{{"charset_path": "{}"}}"#,
            charset_file.path().display()
        )
        .unwrap();
        let params = OcrParams::from_file(config_file.path()).unwrap();
        assert_eq!(params.charset, vec!["blank", "X"]);
    }
}
