// HTTP entry point for the facial analysis service

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use face_analysis_api::api::{router, AppState};
use face_analysis_api::core::Config;
use face_analysis_api::services::OnnxAnalysisService;
use face_analysis_api::utils::Metrics;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Arc::new(Config::new()?);

    // Initialize logging
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::new(format!(
        "face_analysis_api={},ort=off",
        match config.log_level() {
            tracing::Level::TRACE => "trace",
            tracing::Level::DEBUG => "debug",
            tracing::Level::INFO => "info",
            tracing::Level::WARN => "warn",
            tracing::Level::ERROR => "error",
        }
    ));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("=== API DE ANÁLISE FACIAL ===");
    info!(
        "Detector padrão: {} | Autenticação: {} | Erros detalhados: {}",
        config.default_detector(),
        if config.api_key().is_some() { "ON" } else { "OFF" },
        if config.debug_errors() { "ON" } else { "OFF" },
    );

    // Load the pretrained models
    info!("Carregando modelos ONNX...");
    let analyzer = Arc::new(OnnxAnalysisService::new(&config)?);
    let metrics = Metrics::new();

    let state = AppState {
        config: config.clone(),
        analyzer,
        metrics,
    };

    let app = router(state);

    let addr = format!("{}:{}", config.host(), config.port());
    info!("{}", "=".repeat(60));
    info!("Servidor iniciando em http://{}", addr);
    info!("{}", "-".repeat(60));
    info!("Endpoints:");
    info!("  GET  /                 - Informações da API");
    info!("  GET  /health           - Health check");
    info!("  GET  /models           - Lista detectores");
    info!("  GET  /stats            - Métricas de uso");
    info!("  POST /analyze          - Analisa imagem (multipart)");
    info!("  POST /analyze-base64   - Analisa imagem (base64)");
    info!("  POST /analyze-multiple - Múltiplas faces");
    info!("{}", "=".repeat(60));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
