use std::time::Instant;

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};
use tracing::info;

use super::AppState;
use crate::core::errors::{AnalysisError, ApiError, ApiResult};
use crate::core::types::{
    self, Action, AnalyzeResponse, Base64Request, FaceAnalysis, FaceEntry, MultiFaceResponse,
    DEFAULT_ACTIONS, DETECTOR_CATALOG, MULTI_FACE_ACTIONS,
};
use crate::utils::image_ops;
use crate::utils::metrics::MetricsSnapshot;

/// Valid paths, echoed by the 404 fallback
pub const ENDPOINTS: &[&str] = &[
    "/",
    "/analyze",
    "/analyze-base64",
    "/analyze-multiple",
    "/models",
    "/health",
    "/stats",
];

/// GET / - service banner, always open
pub async fn home(State(state): State<AppState>) -> Json<Value> {
    let seguranca = if state.config.api_key().is_some() {
        "Protegido por API Key (header X-API-Key)"
    } else {
        "Sem autenticação"
    };

    Json(json!({
        "status": "online",
        "mensagem": "API de análise facial em funcionamento",
        "versao": env!("CARGO_PKG_VERSION"),
        "seguranca": seguranca,
        "endpoints": [
            "POST /analyze - Analisa uma imagem (multipart)",
            "POST /analyze-base64 - Analisa imagem em base64",
            "POST /analyze-multiple - Analisa múltiplas faces",
            "GET /models - Lista detectores disponíveis",
            "GET /health - Verifica saúde da API",
            "GET /stats - Métricas de uso",
        ],
    }))
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    state.metrics.record_request("/health");
    Json(json!({
        "status": "healthy",
        "timestamp": types::now_timestamp(),
    }))
}

/// GET /models - static catalog of supported detector backends
pub async fn list_models(State(state): State<AppState>) -> Json<Value> {
    state.metrics.record_request("/models");
    let detectores: Vec<Value> = DETECTOR_CATALOG
        .iter()
        .map(|(nome, velocidade, recomendado)| {
            json!({
                "nome": nome,
                "velocidade": velocidade,
                "recomendado": recomendado,
            })
        })
        .collect();

    Json(json!({
        "detectores_disponiveis": detectores,
        "detector_padrao": state.config.default_detector(),
    }))
}

/// GET /stats - usage metrics snapshot
pub async fn stats(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

/// POST /analyze - single-face analysis of a multipart upload
pub async fn analyze(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<AnalyzeResponse>> {
    state.metrics.record_request("/analyze");

    let upload = parse_upload(multipart).await?;
    let detector = resolve_detector(&state, upload.detector.as_deref())?;
    let actions = match upload.actions.as_deref() {
        Some(csv) => Action::parse_csv(csv).map_err(ApiError::validation)?,
        None => DEFAULT_ACTIONS.to_vec(),
    };

    let analysis = run_analysis(
        &state,
        upload.bytes,
        actions,
        "Não foi possível decodificar a imagem",
    )
    .await?;
    Ok(Json(AnalyzeResponse::from_analysis(&detector, analysis)))
}

/// POST /analyze-base64 - single-face analysis of a base64 JSON payload
pub async fn analyze_base64(
    State(state): State<AppState>,
    Json(payload): Json<Base64Request>,
) -> ApiResult<Json<AnalyzeResponse>> {
    state.metrics.record_request("/analyze-base64");

    let encoded = payload
        .image_base64
        .as_deref()
        .ok_or_else(|| ApiError::validation("Campo 'image_base64' é obrigatório no JSON"))?;
    let bytes = image_ops::decode_base64_image(encoded)
        .map_err(|_| ApiError::validation("Base64 inválido no campo 'image_base64'"))?;

    let detector = resolve_detector(&state, payload.detector.as_deref())?;
    let actions = match &payload.actions {
        Some(spec) => spec.to_actions().map_err(ApiError::validation)?,
        None => DEFAULT_ACTIONS.to_vec(),
    };

    let analysis = run_analysis(
        &state,
        bytes,
        actions,
        "Não foi possível decodificar a imagem base64",
    )
    .await?;
    Ok(Json(AnalyzeResponse::from_analysis(&detector, analysis)))
}

/// POST /analyze-multiple - per-face analysis of every detected face.
/// Zero faces is a valid, empty result.
pub async fn analyze_multiple(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<MultiFaceResponse>> {
    state.metrics.record_request("/analyze-multiple");

    let upload = parse_upload(multipart).await?;
    let detector = resolve_detector(&state, upload.detector.as_deref())?;

    let img = image_ops::load_image_from_memory_async(&upload.bytes)
        .await
        .map_err(|_| ApiError::decode("Imagem inválida"))?;

    let analyzer = state.analyzer.clone();
    let debug_errors = state.config.debug_errors();
    let started = Instant::now();

    let outcome = tokio::task::spawn_blocking(move || -> Result<Vec<FaceEntry>, AnalysisError> {
        let faces = analyzer.detect_faces(&img)?;
        let mut entries = Vec::with_capacity(faces.len());

        for (face_id, face) in faces.iter().enumerate() {
            let crop = image_ops::crop_region(&img, &face.region);
            let analysis = analyzer.analyze(&crop, MULTI_FACE_ACTIONS)?;
            entries.push(FaceEntry {
                face_id,
                coordenadas: face.region,
                emocao_dominante: analysis.dominant_emotion,
                emocoes: analysis.emotion,
                idade: analysis.age,
                genero: analysis.dominant_gender,
            });
        }

        Ok(entries)
    })
    .await
    .map_err(|e| {
        ApiError::internal("Erro interno ao processar múltiplas faces", &e, debug_errors)
    })?;

    match outcome {
        Ok(faces) => {
            state
                .metrics
                .record_analysis(true, faces.len(), started.elapsed());
            info!("Analyzed {} face(s) in multi-face request", faces.len());
            Ok(Json(MultiFaceResponse {
                sucesso: true,
                timestamp: types::now_timestamp(),
                detector_usado: detector,
                total_faces: faces.len(),
                faces,
            }))
        }
        Err(e) => {
            state.metrics.record_analysis(false, 0, started.elapsed());
            Err(ApiError::internal(
                "Erro interno ao processar múltiplas faces",
                &e,
                debug_errors,
            ))
        }
    }
}

/// Fallback for unmatched routes
pub async fn not_found() -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "sucesso": false,
            "erro": "Endpoint não encontrado",
            "endpoints_disponiveis": ENDPOINTS,
        })),
    )
}

/// Fields extracted from a multipart analysis request
struct Upload {
    bytes: Vec<u8>,
    detector: Option<String>,
    actions: Option<String>,
}

async fn parse_upload(mut multipart: Multipart) -> ApiResult<Upload> {
    let mut bytes = None;
    let mut detector = None;
    let mut actions = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation(format!("Requisição multipart inválida: {e}")))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                if field.file_name().map(str::is_empty).unwrap_or(true) {
                    return Err(ApiError::validation("Nome do arquivo vazio"));
                }
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::validation(format!("Erro ao ler o arquivo: {e}")))?;
                bytes = Some(data.to_vec());
            }
            "detector" => {
                detector = Some(field.text().await.map_err(|e| {
                    ApiError::validation(format!("Erro ao ler o campo 'detector': {e}"))
                })?);
            }
            "actions" => {
                actions = Some(field.text().await.map_err(|e| {
                    ApiError::validation(format!("Erro ao ler o campo 'actions': {e}"))
                })?);
            }
            _ => {}
        }
    }

    let bytes =
        bytes.ok_or_else(|| ApiError::validation("Nenhum arquivo enviado. Use o campo 'file'"))?;
    Ok(Upload {
        bytes,
        detector,
        actions,
    })
}

fn resolve_detector(state: &AppState, requested: Option<&str>) -> ApiResult<String> {
    let name = requested.unwrap_or_else(|| state.config.default_detector());
    types::validate_detector(name).map_err(ApiError::validation)
}

/// Decode the image and run the engine on its primary face
async fn run_analysis(
    state: &AppState,
    bytes: Vec<u8>,
    actions: Vec<Action>,
    decode_message: &'static str,
) -> ApiResult<FaceAnalysis> {
    let img = image_ops::load_image_from_memory_async(&bytes)
        .await
        .map_err(|_| ApiError::decode(decode_message))?;

    let analyzer = state.analyzer.clone();
    let debug_errors = state.config.debug_errors();
    let started = Instant::now();

    let result = tokio::task::spawn_blocking(move || analyzer.analyze(&img, &actions))
        .await
        .map_err(|e| ApiError::internal("Erro interno ao processar a imagem", &e, debug_errors))?;

    match result {
        Ok(analysis) => {
            state.metrics.record_analysis(true, 1, started.elapsed());
            Ok(analysis)
        }
        Err(e) => {
            state.metrics.record_analysis(false, 0, started.elapsed());
            Err(ApiError::internal(
                "Erro interno ao processar a imagem",
                &e,
                debug_errors,
            ))
        }
    }
}
