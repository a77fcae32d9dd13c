/// Face classifier backed by a YOLO face model running in ONNX Runtime.
///
/// The network's raw candidate boxes play the part of multiscale window
/// hits: every anchor that fires above the confidence threshold becomes a
/// candidate, and neighbour grouping decides which faces survive.
use std::path::Path;

use crate::detection::domain::face_classifier::FaceClassifier;
use crate::detection::domain::rectangle_grouper::{group_rectangles, DEFAULT_GROUP_EPS};
use crate::shared::frame::Frame;
use crate::shared::rectangle::Rectangle;

/// Fallback model input resolution when the model doesn't specify dimensions.
const DEFAULT_INPUT_SIZE: u32 = 640;

/// Padding value for letterboxed areas (YOLO convention).
const PAD_VALUE: f32 = 114.0 / 255.0;

pub struct OnnxYoloClassifier {
    session: ort::session::Session,
    confidence: f64,
    input_size: u32,
}

impl OnnxYoloClassifier {
    /// Load a YOLO ONNX model.
    ///
    /// The input resolution is read from the model's NCHW input shape and
    /// falls back to 640 when the shape is dynamic.
    pub fn new(model_path: &Path, confidence: f64) -> Result<Self, Box<dyn std::error::Error>> {
        let session = ort::session::Session::builder()?
            .with_execution_providers(preferred_execution_providers())?
            .commit_from_file(model_path)?;

        let input_size = session
            .inputs()
            .first()
            .and_then(|input| match input.dtype() {
                ort::value::ValueType::Tensor { ref shape, .. }
                    if shape.len() >= 4 && shape[2] > 0 =>
                {
                    Some(shape[2] as u32)
                }
                _ => None,
            })
            .unwrap_or(DEFAULT_INPUT_SIZE);

        log::info!(
            "Loaded face model {} (input {input_size}px, confidence {confidence})",
            model_path.display()
        );

        Ok(Self {
            session,
            confidence,
            input_size,
        })
    }
}

impl FaceClassifier for OnnxYoloClassifier {
    fn detect_multi_scale(
        &mut self,
        image: &Frame,
        min_size: u32,
        min_neighbors: u32,
    ) -> Result<Vec<Rectangle>, Box<dyn std::error::Error>> {
        if image.is_empty() {
            return Ok(Vec::new());
        }

        let (input_tensor, lb) = letterbox(image, self.input_size);
        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("face model produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let data = tensor.as_slice().ok_or("face model output is not contiguous")?;

        let boxes = parse_candidates(data, tensor.shape(), self.confidence)?;
        let candidates = to_candidates(&boxes, &lb, image.width(), image.height(), min_size);
        log::trace!(
            "{} raw boxes, {} candidates at min size {min_size}",
            boxes.len(),
            candidates.len()
        );
        Ok(group_rectangles(&candidates, min_neighbors, DEFAULT_GROUP_EPS))
    }
}

/// Preferred ONNX execution providers; CPU is always the implicit fallback.
fn preferred_execution_providers() -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    {
        vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
    }
    #[cfg(target_os = "windows")]
    {
        vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        vec![]
    }
}

/// Mapping from letterboxed model coordinates back to the frame.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Letterbox {
    scale: f64,
    pad_x: u32,
    pad_y: u32,
}

impl Letterbox {
    fn to_frame(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.pad_x as f64) / self.scale,
            (y - self.pad_y as f64) / self.scale,
        )
    }
}

/// Letterbox-resize a frame into a `target_size`² NCHW float tensor.
///
/// Grayscale frames are replicated into all three input channels.
fn letterbox(frame: &Frame, target_size: u32) -> (ndarray::Array4<f32>, Letterbox) {
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = ((fw * scale).round() as u32).min(target_size);
    let new_h = ((fh * scale).round() as u32).min(target_size);
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    let size = target_size as usize;
    let mut tensor = ndarray::Array4::<f32>::from_elem((1, 3, size, size), PAD_VALUE);

    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;
    let last_channel = frame.channels() as usize - 1;

    // Nearest-neighbour sampling
    for y in 0..new_h as usize {
        let src_y = ((y as f64 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let src_x = ((x as f64 / scale) as usize).min(src_w - 1);
            let ty = pad_y as usize + y;
            let tx = pad_x as usize + x;
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = src[[src_y, src_x, c.min(last_channel)]] as f32 / 255.0;
            }
        }
    }

    (
        tensor,
        Letterbox {
            scale,
            pad_x,
            pad_y,
        },
    )
}

/// Candidate box in letterbox space: `[cx, cy, w, h]`.
type RawBox = [f64; 4];

/// Reads confident boxes from a YOLO output tensor.
///
/// Accepts `[1, features, detections]` (transposed, the usual export) or
/// `[1, detections, features]`. Each row starts with `cx, cy, w, h, conf`;
/// trailing keypoint values are ignored.
fn parse_candidates(
    data: &[f32],
    shape: &[usize],
    confidence: f64,
) -> Result<Vec<RawBox>, Box<dyn std::error::Error>> {
    if shape.len() != 3 {
        return Err(format!("unexpected face model output shape: {shape:?}").into());
    }
    let transposed = shape[1] < shape[2];
    let (num_dets, num_feats) = if transposed {
        (shape[2], shape[1])
    } else {
        (shape[1], shape[2])
    };
    if num_feats < 5 || data.len() < num_dets * num_feats {
        return Err(format!("face model output too small for shape {shape:?}").into());
    }

    let value = |det: usize, feat: usize| -> f64 {
        if transposed {
            data[feat * num_dets + det] as f64
        } else {
            data[det * num_feats + feat] as f64
        }
    };

    Ok((0..num_dets)
        .filter(|&i| value(i, 4) >= confidence)
        .map(|i| [value(i, 0), value(i, 1), value(i, 2), value(i, 3)])
        .collect())
}

/// Maps boxes back to the frame, clamps them and drops those under `min_size`.
fn to_candidates(
    boxes: &[RawBox],
    lb: &Letterbox,
    frame_width: u32,
    frame_height: u32,
    min_size: u32,
) -> Vec<Rectangle> {
    boxes
        .iter()
        .filter_map(|&[cx, cy, w, h]| {
            let (x1, y1) = lb.to_frame(cx - w / 2.0, cy - h / 2.0);
            let (x2, y2) = lb.to_frame(cx + w / 2.0, cy + h / 2.0);
            Rectangle::from_corners_clamped(x1, y1, x2, y2, frame_width, frame_height)
        })
        .filter(|r| r.width >= min_size && r.height >= min_size)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_letterbox_preserves_aspect_ratio() {
        let frame = Frame::new(vec![128u8; 200 * 100 * 3], 200, 100, 3, 0);
        let (tensor, lb) = letterbox(&frame, 640);

        assert_eq!(tensor.shape(), &[1, 3, 640, 640]);
        assert_relative_eq!(lb.scale, 3.2, epsilon = 1e-9);
        assert_eq!(lb.pad_x, 0);
        assert_eq!(lb.pad_y, 160);
    }

    #[test]
    fn test_letterbox_pads_with_gray() {
        let frame = Frame::new(vec![255u8; 100 * 50 * 3], 100, 50, 3, 0);
        let (tensor, lb) = letterbox(&frame, 640);

        let y = lb.pad_y as usize + 1;
        assert_relative_eq!(tensor[[0, 0, y, 1]], 1.0, epsilon = 1e-6);
        assert_relative_eq!(tensor[[0, 0, 0, 0]], PAD_VALUE, epsilon = 1e-6);
    }

    #[test]
    fn test_letterbox_replicates_grayscale() {
        let frame = Frame::new(vec![51u8; 64 * 64], 64, 64, 1, 0);
        let (tensor, _) = letterbox(&frame, 128);
        for c in 0..3 {
            assert_relative_eq!(tensor[[0, c, 10, 10]], 0.2, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_letterbox_mapping_inverts() {
        let lb = Letterbox {
            scale: 2.0,
            pad_x: 0,
            pad_y: 40,
        };
        assert_eq!(lb.to_frame(100.0, 140.0), (50.0, 50.0));
    }

    #[test]
    fn test_parse_transposed_layout() {
        // 6 features x 3 detections, column-major per detection.
        let shape = [1, 6, 3];
        #[rustfmt::skip]
        let data = [
            10.0, 20.0, 30.0, // cx
            11.0, 21.0, 31.0, // cy
            4.0, 4.0, 4.0,    // w
            6.0, 6.0, 6.0,    // h
            0.9, 0.1, 0.5,    // conf
            0.0, 0.0, 0.0,    // extra
        ];
        let boxes = parse_candidates(&data, &shape, 0.25).unwrap();
        assert_eq!(boxes, vec![[10.0, 11.0, 4.0, 6.0], [30.0, 31.0, 4.0, 6.0]]);
    }

    #[test]
    fn test_parse_row_layout() {
        let shape = [1, 2, 5];
        let data = [50.0, 60.0, 20.0, 30.0, 0.8, 1.0, 1.0, 1.0, 1.0, 0.2];
        let boxes = parse_candidates(&data, &shape, 0.25).unwrap();
        assert_eq!(boxes, vec![[50.0, 60.0, 20.0, 30.0]]);
    }

    #[test]
    fn test_parse_rejects_bad_shape() {
        assert!(parse_candidates(&[0.0; 4], &[1, 4], 0.25).is_err());
        assert!(parse_candidates(&[0.0; 4], &[1, 4, 1], 0.25).is_err());
    }

    #[test]
    fn test_candidates_clamped_and_size_filtered() {
        let lb = Letterbox {
            scale: 1.0,
            pad_x: 0,
            pad_y: 0,
        };
        let boxes = [
            [100.0, 100.0, 100.0, 100.0], // 50..150 square
            [10.0, 10.0, 40.0, 40.0],     // clamped to 0..30, below min
            [500.0, 500.0, 10.0, 10.0],   // outside the frame
        ];
        let rects = to_candidates(&boxes, &lb, 200, 200, 50);
        assert_eq!(rects, vec![Rectangle::new(50, 50, 100, 100)]);
    }

    #[test]
    fn test_grouping_merges_overlapping_anchor_hits() {
        let lb = Letterbox {
            scale: 1.0,
            pad_x: 0,
            pad_y: 0,
        };
        let boxes = [
            [100.0, 100.0, 100.0, 100.0],
            [102.0, 101.0, 100.0, 100.0],
            [98.0, 99.0, 100.0, 100.0],
        ];
        let rects = to_candidates(&boxes, &lb, 300, 300, 10);
        let grouped = group_rectangles(&rects, 2, DEFAULT_GROUP_EPS);
        assert_eq!(grouped, vec![Rectangle::new(50, 50, 100, 100)]);
    }
}
