// Request and response types for the analysis API
//
// The inference result is pinned to an explicit schema at the engine boundary:
// fixed label sets, native numeric types, no open-ended maps. Response structs
// keep the localized field names the upstream consumer already parses.

use chrono::Local;
use serde::{Deserialize, Serialize};

/// Prediction categories the engine can run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Emotion,
    Age,
    Gender,
    Race,
}

/// Default action set for single-face analysis
pub const DEFAULT_ACTIONS: &[Action] = &[Action::Emotion, Action::Age, Action::Gender];

/// Fixed action set applied to every face on the multi-face endpoint
pub const MULTI_FACE_ACTIONS: &[Action] = &[Action::Emotion, Action::Age, Action::Gender];

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Emotion => "emotion",
            Action::Age => "age",
            Action::Gender => "gender",
            Action::Race => "race",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "emotion" => Some(Action::Emotion),
            "age" => Some(Action::Age),
            "gender" => Some(Action::Gender),
            "race" => Some(Action::Race),
            _ => None,
        }
    }

    /// Parse a comma-separated action list, de-duplicated in request order.
    /// Unknown names are rejected instead of being forwarded to the engine.
    pub fn parse_csv(csv: &str) -> Result<Vec<Self>, String> {
        let mut actions = Vec::new();
        for part in csv.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let action =
                Action::parse(part).ok_or_else(|| format!("Ação desconhecida: '{part}'"))?;
            if !actions.contains(&action) {
                actions.push(action);
            }
        }
        if actions.is_empty() {
            return Err("Nenhuma ação válida informada".to_string());
        }
        Ok(actions)
    }
}

/// Detector backend catalog: (name, speed label, recommended)
pub const DETECTOR_CATALOG: &[(&str, &str, bool)] = &[
    ("opencv", "rápido", true),
    ("ssd", "rápido", false),
    ("dlib", "médio", false),
    ("mtcnn", "lento", false),
    ("retinaface", "lento", false),
    ("mediapipe", "muito rápido", false),
    ("yunet", "rápido", false),
];

pub const DEFAULT_DETECTOR: &str = "opencv";

pub fn is_supported_detector(name: &str) -> bool {
    DETECTOR_CATALOG.iter().any(|(n, _, _)| *n == name)
}

/// Validate a requested detector name against the catalog
pub fn validate_detector(name: &str) -> Result<String, String> {
    let normalized = name.trim().to_ascii_lowercase();
    if is_supported_detector(&normalized) {
        Ok(normalized)
    } else {
        Err(format!("Detector desconhecido: '{name}'"))
    }
}

/// Per-class emotion scores, percentages over the fixed 7-label set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmotionScores {
    pub angry: f32,
    pub disgust: f32,
    pub fear: f32,
    pub happy: f32,
    pub sad: f32,
    pub surprise: f32,
    pub neutral: f32,
}

impl EmotionScores {
    pub const LABELS: [&'static str; 7] = [
        "angry", "disgust", "fear", "happy", "sad", "surprise", "neutral",
    ];

    /// Build from a probability distribution in label order, scaled to percentages
    pub fn from_probabilities(p: &[f32; 7]) -> Self {
        Self {
            angry: p[0] * 100.0,
            disgust: p[1] * 100.0,
            fear: p[2] * 100.0,
            happy: p[3] * 100.0,
            sad: p[4] * 100.0,
            surprise: p[5] * 100.0,
            neutral: p[6] * 100.0,
        }
    }

    fn scores(&self) -> [f32; 7] {
        [
            self.angry,
            self.disgust,
            self.fear,
            self.happy,
            self.sad,
            self.surprise,
            self.neutral,
        ]
    }

    pub fn dominant(&self) -> (&'static str, f32) {
        dominant_label(&Self::LABELS, &self.scores())
    }
}

/// Gender scores, percentages. Labels follow the pretrained model's casing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenderScores {
    #[serde(rename = "Woman")]
    pub woman: f32,
    #[serde(rename = "Man")]
    pub man: f32,
}

impl GenderScores {
    pub const LABELS: [&'static str; 2] = ["Woman", "Man"];

    pub fn from_probabilities(p: &[f32; 2]) -> Self {
        Self {
            woman: p[0] * 100.0,
            man: p[1] * 100.0,
        }
    }

    pub fn dominant(&self) -> (&'static str, f32) {
        dominant_label(&Self::LABELS, &[self.woman, self.man])
    }
}

/// Race scores, percentages over the fixed 6-label set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RaceScores {
    pub asian: f32,
    pub indian: f32,
    pub black: f32,
    pub white: f32,
    #[serde(rename = "middle eastern")]
    pub middle_eastern: f32,
    #[serde(rename = "latino hispanic")]
    pub latino_hispanic: f32,
}

impl RaceScores {
    pub const LABELS: [&'static str; 6] = [
        "asian",
        "indian",
        "black",
        "white",
        "middle eastern",
        "latino hispanic",
    ];

    pub fn from_probabilities(p: &[f32; 6]) -> Self {
        Self {
            asian: p[0] * 100.0,
            indian: p[1] * 100.0,
            black: p[2] * 100.0,
            white: p[3] * 100.0,
            middle_eastern: p[4] * 100.0,
            latino_hispanic: p[5] * 100.0,
        }
    }

    fn scores(&self) -> [f32; 6] {
        [
            self.asian,
            self.indian,
            self.black,
            self.white,
            self.middle_eastern,
            self.latino_hispanic,
        ]
    }

    pub fn dominant(&self) -> (&'static str, f32) {
        dominant_label(&Self::LABELS, &self.scores())
    }
}

fn dominant_label<'a>(labels: &[&'a str], scores: &[f32]) -> (&'a str, f32) {
    let mut best = 0;
    for i in 1..scores.len() {
        if scores[i] > scores[best] {
            best = i;
        }
    }
    (labels[best], scores[best])
}

/// Face bounding box in pixel coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceRegion {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

/// A located face with its detection confidence
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectedFace {
    pub region: FaceRegion,
    pub confidence: f32,
}

/// Typed engine output for one face. Serialized as `dados_completos`,
/// keeping the field names the pretrained models are known by.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FaceAnalysis {
    pub region: FaceRegion,
    pub face_confidence: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emotion: Option<EmotionScores>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dominant_emotion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<GenderScores>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dominant_gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub race: Option<RaceScores>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dominant_race: Option<String>,
}

/// Localized analysis block of the single-face response
#[derive(Debug, Clone, Serialize)]
pub struct Analise {
    pub emocao_dominante: Option<String>,
    pub emocoes: Option<EmotionScores>,
    pub idade: Option<u32>,
    pub genero: Option<String>,
    pub raca_dominante: Option<String>,
    pub regiao_face: FaceRegion,
}

/// Single-face analysis response
#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeResponse {
    pub sucesso: bool,
    pub timestamp: String,
    pub detector_usado: String,
    pub analise: Analise,
    pub dados_completos: FaceAnalysis,
}

impl AnalyzeResponse {
    pub fn from_analysis(detector: &str, analysis: FaceAnalysis) -> Self {
        Self {
            sucesso: true,
            timestamp: now_timestamp(),
            detector_usado: detector.to_string(),
            analise: Analise {
                emocao_dominante: analysis.dominant_emotion.clone(),
                emocoes: analysis.emotion.clone(),
                idade: analysis.age,
                genero: analysis.dominant_gender.clone(),
                raca_dominante: analysis.dominant_race.clone(),
                regiao_face: analysis.region,
            },
            dados_completos: analysis,
        }
    }
}

/// One face entry of the multi-face response
#[derive(Debug, Clone, Serialize)]
pub struct FaceEntry {
    pub face_id: usize,
    pub coordenadas: FaceRegion,
    pub emocao_dominante: Option<String>,
    pub emocoes: Option<EmotionScores>,
    pub idade: Option<u32>,
    pub genero: Option<String>,
}

/// Multi-face analysis response
#[derive(Debug, Clone, Serialize)]
pub struct MultiFaceResponse {
    pub sucesso: bool,
    pub timestamp: String,
    pub detector_usado: String,
    pub total_faces: usize,
    pub faces: Vec<FaceEntry>,
}

/// JSON body accepted by /analyze-base64
#[derive(Debug, Deserialize)]
pub struct Base64Request {
    pub image_base64: Option<String>,
    pub detector: Option<String>,
    pub actions: Option<ActionsSpec>,
}

/// Actions may arrive as a JSON array or a comma-separated string
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ActionsSpec {
    List(Vec<String>),
    Csv(String),
}

impl ActionsSpec {
    pub fn to_actions(&self) -> Result<Vec<Action>, String> {
        match self {
            ActionsSpec::Csv(csv) => Action::parse_csv(csv),
            ActionsSpec::List(items) => Action::parse_csv(&items.join(",")),
        }
    }
}

/// Local wall-clock timestamp in the ISO-8601 shape the consumer expects
pub fn now_timestamp() -> String {
    Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}
