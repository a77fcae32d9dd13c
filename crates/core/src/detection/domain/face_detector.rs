use std::sync::{Arc, Mutex};

use crate::detection::domain::face_classifier::FaceClassifier;
use crate::imaging::grayscale::{equalize_histogram, to_grayscale};
use crate::shared::constants::{PREVIEW_MIN_NEIGHBORS, UPLOAD_MIN_NEIGHBORS};
use crate::shared::frame::Frame;
use crate::shared::rectangle::Rectangle;

/// Which of the two fixed classifier configurations to run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectionTuning {
    /// Live preview: grayscale + histogram equalisation, loose grouping.
    Preview,
    /// Save/check: frame as received, stricter grouping.
    Precision,
}

impl DetectionTuning {
    pub fn min_neighbors(self) -> u32 {
        match self {
            DetectionTuning::Preview => PREVIEW_MIN_NEIGHBORS,
            DetectionTuning::Precision => UPLOAD_MIN_NEIGHBORS,
        }
    }

    pub fn equalizes(self) -> bool {
        matches!(self, DetectionTuning::Preview)
    }
}

/// Stateless front for the shared classifier.
///
/// Cloning is cheap; clones share the one loaded classifier, which is used
/// by both the capture task and upload workers.
#[derive(Clone)]
pub struct FaceDetector {
    classifier: Arc<Mutex<Box<dyn FaceClassifier>>>,
    min_face_size: u32,
}

impl FaceDetector {
    pub fn new(classifier: Box<dyn FaceClassifier>, min_face_size: u32) -> Self {
        Self {
            classifier: Arc::new(Mutex::new(classifier)),
            min_face_size,
        }
    }

    /// Detects faces. Never fails: classifier errors are logged and count
    /// as zero detections so the caller's tick carries on.
    pub fn detect(&self, frame: &Frame, tuning: DetectionTuning) -> Vec<Rectangle> {
        if frame.is_empty() {
            return Vec::new();
        }

        let prepared;
        let input = if tuning.equalizes() {
            let mut gray = to_grayscale(frame);
            equalize_histogram(&mut gray);
            prepared = gray;
            &prepared
        } else {
            frame
        };

        let result = {
            let mut classifier = match self.classifier.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            classifier.detect_multi_scale(input, self.min_face_size, tuning.min_neighbors())
        };

        match result {
            Ok(faces) => faces
                .into_iter()
                .filter(|r| {
                    let inside = r.fits_within(frame.width(), frame.height());
                    if !inside {
                        log::debug!("Dropping out-of-frame detection {r:?}");
                    }
                    inside
                })
                .collect(),
            Err(e) => {
                log::warn!("Face detection failed on frame {}: {e}", frame.index());
                Vec::new()
            }
        }
    }

    pub fn detect_for_preview(&self, frame: &Frame) -> Vec<Rectangle> {
        self.detect(frame, DetectionTuning::Preview)
    }

    pub fn detect_for_upload(&self, frame: &Frame) -> Vec<Rectangle> {
        self.detect(frame, DetectionTuning::Precision)
    }
}
