// Facial attribute analysis engine
//
// `FacialAnalyzer` is the seam between the HTTP layer and the pretrained
// models: handlers only see typed results, never tensors. The ONNX
// implementation runs a face detector plus one classifier head per requested
// action. Detection is never enforced: with no detectable face the whole
// frame is analyzed as the primary face, so a result always comes back.

use crate::core::config::Config;
use crate::core::errors::{AnalysisError, AnalysisResult};
use crate::core::types::{
    Action, DetectedFace, EmotionScores, FaceAnalysis, FaceRegion, GenderScores, RaceScores,
};
use crate::services::face::FaceDetector;
use crate::services::onnx::SessionPool;
use crate::utils::image_ops::crop_region;
use anyhow::Result;
use image::DynamicImage;
use ndarray::Array4;
use ort::value::Value;
use tracing::{debug, info};

/// Emotion head input side (grayscale)
const EMOTION_INPUT: u32 = 48;
/// Age/gender/race head input side (RGB)
const ATTRIBUTE_INPUT: u32 = 224;
/// The age head predicts a distribution over whole years 0..=100
const AGE_BINS: usize = 101;

/// Inference seam used by the request handlers
pub trait FacialAnalyzer: Send + Sync {
    /// Run the requested prediction actions on the primary face of `img`
    fn analyze(&self, img: &DynamicImage, actions: &[Action]) -> AnalysisResult<FaceAnalysis>;

    /// Locate every face in `img`, highest confidence first
    fn detect_faces(&self, img: &DynamicImage) -> AnalysisResult<Vec<DetectedFace>>;
}

/// ONNX-backed implementation of [`FacialAnalyzer`]
pub struct OnnxAnalysisService {
    detector: FaceDetector,
    emotion: SessionPool,
    age: SessionPool,
    gender: SessionPool,
    race: SessionPool,
}

impl OnnxAnalysisService {
    pub fn new(config: &Config) -> Result<Self> {
        let detector = FaceDetector::new(config)?;

        let pool_size = config.analysis.onnx_pool_size;
        let backend = config.detection.inference_backend.as_deref();
        let (_, emotion) = SessionPool::build(
            &config.analysis.emotion_model_path,
            "emotion",
            pool_size,
            backend,
        )?;
        let (_, age) =
            SessionPool::build(&config.analysis.age_model_path, "age", pool_size, backend)?;
        let (_, gender) = SessionPool::build(
            &config.analysis.gender_model_path,
            "gender",
            pool_size,
            backend,
        )?;
        let (_, race) =
            SessionPool::build(&config.analysis.race_model_path, "race", pool_size, backend)?;
        info!("✓ Attribute heads ready: emotion, age, gender, race");

        Ok(Self {
            detector,
            emotion,
            age,
            gender,
            race,
        })
    }

    fn run_emotion(&self, face: &DynamicImage) -> AnalysisResult<EmotionScores> {
        let logits = run_head(&self.emotion, gray_tensor(face, EMOTION_INPUT))?;
        let probs = softmax(&expect_len(logits, 7, "emotion")?);
        Ok(EmotionScores::from_probabilities(
            &probs.try_into().expect("length checked above"),
        ))
    }

    fn run_age(&self, face: &DynamicImage) -> AnalysisResult<u32> {
        let logits = run_head(&self.age, rgb_tensor(face, ATTRIBUTE_INPUT))?;
        let probs = softmax(&expect_len(logits, AGE_BINS, "age")?);
        Ok(expected_age(&probs))
    }

    fn run_gender(&self, face: &DynamicImage) -> AnalysisResult<GenderScores> {
        let logits = run_head(&self.gender, rgb_tensor(face, ATTRIBUTE_INPUT))?;
        let probs = softmax(&expect_len(logits, 2, "gender")?);
        Ok(GenderScores::from_probabilities(
            &probs.try_into().expect("length checked above"),
        ))
    }

    fn run_race(&self, face: &DynamicImage) -> AnalysisResult<RaceScores> {
        let logits = run_head(&self.race, rgb_tensor(face, ATTRIBUTE_INPUT))?;
        let probs = softmax(&expect_len(logits, 6, "race")?);
        Ok(RaceScores::from_probabilities(
            &probs.try_into().expect("length checked above"),
        ))
    }
}

impl FacialAnalyzer for OnnxAnalysisService {
    fn analyze(&self, img: &DynamicImage, actions: &[Action]) -> AnalysisResult<FaceAnalysis> {
        let faces = self.detector.detect(img)?;

        // Best effort: no detectable face means the whole frame is the face
        let (region, face_confidence) = match faces.first() {
            Some(face) => (face.region, face.confidence),
            None => (
                FaceRegion {
                    x: 0,
                    y: 0,
                    w: img.width(),
                    h: img.height(),
                },
                0.0,
            ),
        };
        let face_img = crop_region(img, &region);
        debug!(
            "Analyzing face at ({}, {}) {}x{} (confidence {:.2})",
            region.x, region.y, region.w, region.h, face_confidence
        );

        let mut analysis = FaceAnalysis {
            region,
            face_confidence,
            ..Default::default()
        };

        for action in actions {
            match action {
                Action::Emotion => {
                    let scores = self.run_emotion(&face_img)?;
                    analysis.dominant_emotion = Some(scores.dominant().0.to_string());
                    analysis.emotion = Some(scores);
                }
                Action::Age => {
                    analysis.age = Some(self.run_age(&face_img)?);
                }
                Action::Gender => {
                    let scores = self.run_gender(&face_img)?;
                    analysis.dominant_gender = Some(scores.dominant().0.to_string());
                    analysis.gender = Some(scores);
                }
                Action::Race => {
                    let scores = self.run_race(&face_img)?;
                    analysis.dominant_race = Some(scores.dominant().0.to_string());
                    analysis.race = Some(scores);
                }
            }
        }

        Ok(analysis)
    }

    fn detect_faces(&self, img: &DynamicImage) -> AnalysisResult<Vec<DetectedFace>> {
        self.detector.detect(img)
    }
}

/// Run a classifier head and return its flat output vector
fn run_head(pool: &SessionPool, input: Array4<f32>) -> AnalysisResult<Vec<f32>> {
    let value = Value::from_array(input)?;

    let mut session = pool.acquire();
    let outputs = session.run(ort::inputs!["input" => value])?;
    let (_, data) = outputs["output"].try_extract_tensor::<f32>()?;
    let data = data.to_vec();
    drop(outputs);
    pool.release(session);

    Ok(data)
}

fn expect_len(data: Vec<f32>, expected: usize, head: &str) -> AnalysisResult<Vec<f32>> {
    if data.len() != expected {
        return Err(AnalysisError::InvalidOutput(format!(
            "{head} head returned {} values, expected {expected}",
            data.len()
        )));
    }
    Ok(data)
}

/// NCHW tensor from an RGB resize, scaled to [0, 1]
fn rgb_tensor(img: &DynamicImage, side: u32) -> Array4<f32> {
    let resized = img
        .resize_exact(side, side, image::imageops::FilterType::Triangle)
        .to_rgb8();

    let side = side as usize;
    let mut array = Array4::<f32>::zeros((1, 3, side, side));
    for y in 0..side {
        for x in 0..side {
            let pixel = resized.get_pixel(x as u32, y as u32);
            array[[0, 0, y, x]] = pixel[0] as f32 / 255.0;
            array[[0, 1, y, x]] = pixel[1] as f32 / 255.0;
            array[[0, 2, y, x]] = pixel[2] as f32 / 255.0;
        }
    }
    array
}

/// NCHW tensor from a grayscale resize, scaled to [0, 1]
fn gray_tensor(img: &DynamicImage, side: u32) -> Array4<f32> {
    let resized = img
        .resize_exact(side, side, image::imageops::FilterType::Triangle)
        .to_luma8();

    let side = side as usize;
    let mut array = Array4::<f32>::zeros((1, 1, side, side));
    for y in 0..side {
        for x in 0..side {
            array[[0, 0, y, x]] = resized.get_pixel(x as u32, y as u32)[0] as f32 / 255.0;
        }
    }
    array
}

fn softmax(x: &[f32]) -> Vec<f32> {
    let max_val = x.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exp_vals: Vec<f32> = x.iter().map(|v| (v - max_val).exp()).collect();
    let sum: f32 = exp_vals.iter().sum();
    exp_vals.iter().map(|v| v / sum).collect()
}

/// Reduce the 101-bin age distribution to its expected value in whole years
fn expected_age(probs: &[f32]) -> u32 {
    let expectation: f32 = probs
        .iter()
        .enumerate()
        .map(|(year, p)| year as f32 * p)
        .sum();
    expectation.round().clamp(0.0, 100.0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_softmax_sums_to_one_and_orders() {
        let probs = softmax(&[1.0, 2.0, 3.0]);
        let sum: f32 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        assert!(probs[2] > probs[1]);
        assert!(probs[1] > probs[0]);
    }

    #[test]
    fn test_expected_age_of_point_mass() {
        let mut probs = vec![0.0f32; AGE_BINS];
        probs[30] = 1.0;
        assert_eq!(expected_age(&probs), 30);
    }

    #[test]
    fn test_expected_age_of_uniform_distribution() {
        let probs = vec![1.0 / AGE_BINS as f32; AGE_BINS];
        assert_eq!(expected_age(&probs), 50);
    }

    #[test]
    fn test_tensor_shapes() {
        let img = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            100,
            80,
            image::Rgb([10, 20, 30]),
        ));
        assert_eq!(
            rgb_tensor(&img, ATTRIBUTE_INPUT).shape(),
            &[1, 3, 224, 224]
        );
        assert_eq!(gray_tensor(&img, EMOTION_INPUT).shape(), &[1, 1, 48, 48]);
    }

    #[test]
    fn test_expect_len_rejects_mismatch() {
        assert!(expect_len(vec![0.0; 5], 7, "emotion").is_err());
        assert!(expect_len(vec![0.0; 7], 7, "emotion").is_ok());
    }
}
