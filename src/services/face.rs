// ONNX face detector
//
// UltraFace-style single-shot detector: 320x240 input, per-anchor
// [background, face] scores plus normalized corner boxes. Candidates below
// `min_face_size` pixels on either side are discarded.

use crate::core::config::Config;
use crate::core::errors::{AnalysisError, AnalysisResult};
use crate::core::types::{DetectedFace, FaceRegion};
use crate::services::onnx::SessionPool;
use anyhow::Result;
use image::DynamicImage;
use ndarray::Array4;
use ort::value::Value;
use tracing::{debug, info};

const INPUT_WIDTH: u32 = 320;
const INPUT_HEIGHT: u32 = 240;

pub struct FaceDetector {
    pool: SessionPool,
    confidence_threshold: f32,
    iou_threshold: f32,
    min_face_size: u32,
}

impl FaceDetector {
    pub fn new(config: &Config) -> Result<Self> {
        let pool_size = config.analysis.onnx_pool_size;
        let (backend, pool) = SessionPool::build(
            &config.detection.model_path,
            "face detector",
            pool_size,
            config.detection.inference_backend.as_deref(),
        )?;
        info!("✓ Face detector: {} ({} sessions)", backend, pool_size);

        Ok(Self {
            pool,
            confidence_threshold: config.detection.confidence_threshold,
            iou_threshold: config.detection.iou_threshold,
            min_face_size: config.detection.min_face_size,
        })
    }

    /// Locate every face in the image, highest confidence first.
    /// Zero detections is a normal outcome, not an error.
    pub fn detect(&self, img: &DynamicImage) -> AnalysisResult<Vec<DetectedFace>> {
        let input = Value::from_array(Self::preprocess(img))?;

        let (scores, boxes) = {
            let mut session = self.pool.acquire();
            let outputs = session.run(ort::inputs!["input" => input])?;

            let (_, scores) = outputs["scores"].try_extract_tensor::<f32>()?;
            let scores = scores.to_vec();
            let (_, boxes) = outputs["boxes"].try_extract_tensor::<f32>()?;
            let boxes = boxes.to_vec();

            drop(outputs);
            self.pool.release(session);
            (scores, boxes)
        };

        if scores.len() / 2 != boxes.len() / 4 {
            return Err(AnalysisError::InvalidOutput(format!(
                "detector returned {} scores for {} boxes",
                scores.len() / 2,
                boxes.len() / 4
            )));
        }

        let (img_w, img_h) = (img.width() as f32, img.height() as f32);
        let mut candidates = Vec::new();

        for i in 0..scores.len() / 2 {
            let confidence = scores[i * 2 + 1];
            if confidence < self.confidence_threshold {
                continue;
            }

            let x1 = (boxes[i * 4].clamp(0.0, 1.0) * img_w).round() as u32;
            let y1 = (boxes[i * 4 + 1].clamp(0.0, 1.0) * img_h).round() as u32;
            let x2 = (boxes[i * 4 + 2].clamp(0.0, 1.0) * img_w).round() as u32;
            let y2 = (boxes[i * 4 + 3].clamp(0.0, 1.0) * img_h).round() as u32;

            if x2 <= x1 || y2 <= y1 {
                continue;
            }
            let (w, h) = (x2 - x1, y2 - y1);
            if w < self.min_face_size || h < self.min_face_size {
                continue;
            }

            candidates.push(DetectedFace {
                region: FaceRegion { x: x1, y: y1, w, h },
                confidence,
            });
        }

        let faces = nms(candidates, self.iou_threshold);
        debug!(
            "Detected {} face(s) above confidence {:.2}",
            faces.len(),
            self.confidence_threshold
        );
        Ok(faces)
    }

    fn preprocess(img: &DynamicImage) -> Array4<f32> {
        let resized = img
            .resize_exact(
                INPUT_WIDTH,
                INPUT_HEIGHT,
                image::imageops::FilterType::Triangle,
            )
            .to_rgb8();

        let (w, h) = (INPUT_WIDTH as usize, INPUT_HEIGHT as usize);
        let mut array = Array4::<f32>::zeros((1, 3, h, w));
        for y in 0..h {
            for x in 0..w {
                let pixel = resized.get_pixel(x as u32, y as u32);
                array[[0, 0, y, x]] = (pixel[0] as f32 - 127.0) / 128.0;
                array[[0, 1, y, x]] = (pixel[1] as f32 - 127.0) / 128.0;
                array[[0, 2, y, x]] = (pixel[2] as f32 - 127.0) / 128.0;
            }
        }
        array
    }
}

fn iou(a: &FaceRegion, b: &FaceRegion) -> f32 {
    let x1 = a.x.max(b.x);
    let y1 = a.y.max(b.y);
    let x2 = (a.x + a.w).min(b.x + b.w);
    let y2 = (a.y + a.h).min(b.y + b.h);

    if x2 <= x1 || y2 <= y1 {
        return 0.0;
    }

    let intersection = ((x2 - x1) * (y2 - y1)) as f32;
    let union = (a.w * a.h + b.w * b.h) as f32 - intersection;
    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}

/// Greedy non-maximum suppression, result sorted by confidence
fn nms(detections: Vec<DetectedFace>, iou_threshold: f32) -> Vec<DetectedFace> {
    if detections.is_empty() {
        return vec![];
    }

    let mut sorted = detections;
    sorted.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep = Vec::new();
    let mut suppressed = vec![false; sorted.len()];

    for i in 0..sorted.len() {
        if suppressed[i] {
            continue;
        }
        keep.push(sorted[i]);

        for j in (i + 1)..sorted.len() {
            if !suppressed[j] && iou(&sorted[i].region, &sorted[j].region) > iou_threshold {
                suppressed[j] = true;
            }
        }
    }

    keep
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face(x: u32, y: u32, w: u32, h: u32, confidence: f32) -> DetectedFace {
        DetectedFace {
            region: FaceRegion { x, y, w, h },
            confidence,
        }
    }

    #[test]
    fn test_iou_disjoint_is_zero() {
        let a = FaceRegion {
            x: 0,
            y: 0,
            w: 10,
            h: 10,
        };
        let b = FaceRegion {
            x: 20,
            y: 20,
            w: 10,
            h: 10,
        };
        assert_eq!(iou(&a, &b), 0.0);
    }

    #[test]
    fn test_iou_identical_is_one() {
        let a = FaceRegion {
            x: 5,
            y: 5,
            w: 20,
            h: 20,
        };
        assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_nms_suppresses_overlapping_lower_confidence() {
        let detections = vec![
            face(0, 0, 100, 100, 0.8),
            face(5, 5, 100, 100, 0.9),
            face(300, 300, 80, 80, 0.7),
        ];
        let kept = nms(detections, 0.5);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].confidence, 0.9);
        assert_eq!(kept[1].confidence, 0.7);
    }

    #[test]
    fn test_nms_empty_input() {
        assert!(nms(vec![], 0.5).is_empty());
    }

    #[test]
    fn test_preprocess_shape_and_range() {
        let img = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            64,
            64,
            image::Rgb([255, 0, 127]),
        ));
        let array = FaceDetector::preprocess(&img);
        assert_eq!(array.shape(), &[1, 3, 240, 320]);
        assert!((array[[0, 0, 0, 0]] - 1.0).abs() < 1e-3);
        assert!((array[[0, 1, 0, 0]] + 127.0 / 128.0).abs() < 1e-3);
        assert!(array[[0, 2, 0, 0]].abs() < 1e-2);
    }
}
