//! End-to-end scenarios across the detection, crop, and recognition stages.

use std::io::Write;
use std::sync::Arc;

use ocrpost::{
    crop_text_regions, default_charset, load_charset, BBox, CropTunables, Detection, OcrParams,
    OwnedTensor, QuantInfo, Roi, TextDetection, TextRecognition, BLANK_TOKEN, TEXT_CATEGORY,
    TEXT_REGION_LABEL,
};

fn det_map_tensor(h: usize, w: usize, blob: (usize, usize, usize, usize)) -> OwnedTensor {
    let (bx, by, bw, bh) = blob;
    let mut data = vec![0u8; h * w];
    for y in by..by + bh {
        for x in bx..bx + bw {
            data[y * w + x] = 255;
        }
    }
    OwnedTensor::new("det_out", vec![1, 1, h, w], data, QuantInfo::unit())
}

#[test]
fn detection_finds_a_single_blob_in_an_nchw_map() {
    let params = Arc::new(OcrParams::default());
    assert_eq!(params.det_bin_thresh, 0.3);

    // 40 x 10 px blob centered at (50, 15) on a 32 x 128 map
    let mut roi = Roi::new();
    roi.set_scaling_bbox(BBox::FULL);
    roi.add_tensor(det_map_tensor(32, 128, (30, 10, 40, 10)));

    TextDetection::new(params).run(&mut roi).unwrap();

    assert_eq!(roi.detections().len(), 1);
    let det = &roi.detections()[0];
    assert_eq!(det.label, TEXT_REGION_LABEL);

    let b = det.bbox;
    assert!(b.xmin >= 0.0 && b.xmax() <= 1.0);
    assert!(b.ymin >= 0.0 && b.ymax() <= 1.0);

    // the box covers the blob (padding only grows it)
    let blob = BBox::new(30.0 / 128.0, 10.0 / 32.0, 40.0 / 128.0, 10.0 / 32.0);
    assert!(b.xmin <= blob.xmin && b.xmax() >= blob.xmax());
    assert!(b.ymin <= blob.ymin && b.ymax() >= blob.ymax());

    // and stays centered on it
    let cx = b.xmin + b.width * 0.5;
    let cy = b.ymin + b.height * 0.5;
    assert!((cx - (blob.xmin + blob.width * 0.5)).abs() < 2.0 / 128.0);
    assert!((cy - (blob.ymin + blob.height * 0.5)).abs() < 2.0 / 32.0);

    // identity scaling bbox was consumed by the letterbox fix
    assert!(roi.scaling_bbox().is_none());
}

#[test]
fn detection_then_crop_keeps_boxes_normalized() {
    let params = Arc::new(OcrParams::default());
    let mut roi = Roi::new();
    roi.add_tensor(det_map_tensor(32, 128, (0, 0, 50, 12)));

    TextDetection::new(params).run(&mut roi).unwrap();
    assert!(!roi.detections().is_empty());

    let count = crop_text_regions(&mut roi, 1280, 720, true, &CropTunables::default());
    assert!(count > 0);
    for d in roi.detections() {
        let b = d.bbox;
        assert!(0.0 <= b.xmin && b.xmin <= b.xmax() && b.xmax() <= 1.0);
        assert!(0.0 <= b.ymin && b.ymin <= b.ymax() && b.ymax() <= 1.0);
    }
}

#[test]
fn recognition_decodes_ab_from_a_one_hot_sequence() {
    let charset = default_charset();
    let classes = charset.len();
    assert_eq!(classes, 97);
    let a_idx = charset.iter().position(|s| s == "A").unwrap();
    let b_idx = charset.iter().position(|s| s == "B").unwrap();

    // [1, 40, 97]: blank everywhere except an 'A' peak and a 'B' peak
    // separated by blank rows
    let timesteps = 40;
    let mut data = vec![0u8; timesteps * classes];
    for t in 0..timesteps {
        data[t * classes] = 255;
    }
    data[10 * classes] = 0;
    data[10 * classes + a_idx] = 200;
    data[20 * classes] = 0;
    data[20 * classes + b_idx] = 250;

    let mut roi = Roi::new();
    roi.add_detections(vec![Detection::new(
        BBox::new(0.2, 0.2, 0.4, 0.1),
        TEXT_REGION_LABEL,
        0.9,
    )]);
    roi.add_tensor(OwnedTensor::new(
        "rec_out",
        vec![1, timesteps, classes],
        data,
        QuantInfo::unit(),
    ));

    let rec = TextRecognition::new(Arc::new(OcrParams::default()));
    let decoded = rec.run(&mut roi).unwrap().unwrap();

    assert_eq!(decoded.text, "AB");
    let expected = (200.0 / 255.0 + 250.0 / 255.0) / 2.0;
    assert!((decoded.confidence - expected).abs() < 1e-5);

    let attached = &roi.detections()[0].classifications;
    assert_eq!(attached.len(), 1);
    assert_eq!(attached[0].category, TEXT_CATEGORY);
    assert_eq!(attached[0].value, "AB");
}

#[test]
fn empty_charset_file_falls_back_to_the_default_table() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let charset = load_charset(file.path().to_str().unwrap()).unwrap();
    assert_eq!(charset.len(), 97);
    assert_eq!(charset[0], BLANK_TOKEN);
}

#[test]
fn config_file_drives_both_stages() {
    let mut charset_file = tempfile::NamedTempFile::new().unwrap();
    for symbol in ["blank", "7", "X"] {
        writeln!(charset_file, "{symbol}").unwrap();
    }
    let mut config_file = tempfile::NamedTempFile::new().unwrap();
    write!(
        config_file,
        r#"{{"det_output_name": "db_map", "charset_path": "{}", "blank_index": 0}}"#,
        charset_file.path().display()
    )
    .unwrap();

    let params = Arc::new(OcrParams::from_file(config_file.path()).unwrap());
    assert_eq!(params.det_output_name, "db_map");
    assert_eq!(params.charset, vec!["blank", "7", "X"]);

    // [1, 5, 3] matches the 3-symbol charset on the trailing axis
    let classes = 3;
    let timesteps = 5;
    let mut data = vec![0u8; timesteps * classes];
    for t in 0..timesteps {
        data[t * classes] = 255;
    }
    data[classes] = 0;
    data[classes + 2] = 255; // 'X'
    data[3 * classes] = 0;
    data[3 * classes + 1] = 255; // '7'

    let mut roi = Roi::new();
    roi.add_detections(vec![Detection::new(
        BBox::new(0.2, 0.2, 0.4, 0.1),
        TEXT_REGION_LABEL,
        0.9,
    )]);
    roi.add_tensor(OwnedTensor::new(
        "rec_out",
        vec![1, timesteps, classes],
        data,
        QuantInfo::unit(),
    ));

    let decoded = TextRecognition::new(params).run(&mut roi).unwrap().unwrap();
    assert_eq!(decoded.text, "X7");
}
