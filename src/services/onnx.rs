// ONNX Runtime session plumbing shared by the face detector and attribute heads
//
// Sessions are built once at startup from configured model paths and recycled
// through a bounded channel; the channel doubles as backpressure under load.

use anyhow::{Context, Result};
use crossbeam::channel::{bounded, Receiver, Sender};
use ort::execution_providers::CPUExecutionProvider;
use ort::session::{builder::GraphOptimizationLevel, Session};
use tracing::{debug, info, warn};

#[cfg(feature = "cuda")]
use ort::execution_providers::CUDAExecutionProvider;

#[cfg(all(target_os = "macos", feature = "coreml"))]
use ort::execution_providers::CoreMLExecutionProvider;

/// Fixed-size pool of ONNX sessions for one model
pub struct SessionPool {
    sender: Sender<Session>,
    receiver: Receiver<Session>,
}

impl SessionPool {
    /// Load a model from disk and fill a pool with `size` sessions.
    /// Returns the backend name that ended up being used.
    pub fn build(
        model_path: &str,
        model_name: &str,
        size: usize,
        forced_backend: Option<&str>,
    ) -> Result<(String, Self)> {
        let model_bytes = std::fs::read(model_path)
            .with_context(|| format!("failed to read {model_name} model from {model_path}"))?;
        debug!(
            "Loaded {} model from {} ({} bytes)",
            model_name,
            model_path,
            model_bytes.len()
        );

        let (sender, receiver) = bounded(size);
        let mut backend = String::new();
        for _ in 0..size {
            let (name, session) = build_session(&model_bytes, model_name, forced_backend)?;
            backend = name;
            sender
                .send(session)
                .expect("session pool channel sized below session count");
        }

        Ok((backend, Self { sender, receiver }))
    }

    /// Acquire a session from the pool (blocks if the pool is empty)
    pub fn acquire(&self) -> Session {
        self.receiver.recv().expect("session pool exhausted")
    }

    /// Release a session back to the pool
    pub fn release(&self, session: Session) {
        self.sender
            .send(session)
            .expect("failed to return session to pool");
    }
}

/// Build one session, honoring a forced backend before probing acceleration
fn build_session(
    model_bytes: &[u8],
    model_name: &str,
    forced_backend: Option<&str>,
) -> Result<(String, Session)> {
    if let Some(backend) = forced_backend {
        if !backend.eq_ignore_ascii_case("auto") {
            return build_forced(backend, model_bytes, model_name);
        }
    }

    // Try hardware acceleration in order of preference.
    // Only providers compiled in via Cargo features are attempted.

    #[cfg(feature = "cuda")]
    {
        if let Ok(session) = Session::builder()
            .and_then(|b| b.with_execution_providers([CUDAExecutionProvider::default().build()]))
            .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|b| b.with_intra_threads(intra_threads()))
            .and_then(|b| b.commit_from_memory(model_bytes))
        {
            info!("✓ Using CUDA acceleration for {}", model_name);
            return Ok(("CUDA".to_string(), session));
        }
    }

    #[cfg(all(target_os = "macos", feature = "coreml"))]
    {
        if let Ok(session) = Session::builder()
            .and_then(|b| b.with_execution_providers([CoreMLExecutionProvider::default().build()]))
            .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|b| b.with_intra_threads(intra_threads()))
            .and_then(|b| b.commit_from_memory(model_bytes))
        {
            info!("✓ Using CoreML acceleration for {}", model_name);
            return Ok(("CoreML".to_string(), session));
        }
    }

    let session = cpu_session(model_bytes)
        .with_context(|| format!("failed to load {model_name} ONNX model"))?;
    Ok(("CPU".to_string(), session))
}

fn build_forced(backend: &str, model_bytes: &[u8], model_name: &str) -> Result<(String, Session)> {
    match backend.to_lowercase().as_str() {
        #[cfg(feature = "cuda")]
        "cuda" => {
            let session = Session::builder()?
                .with_execution_providers([CUDAExecutionProvider::default().build()])?
                .with_optimization_level(GraphOptimizationLevel::Level3)?
                .with_intra_threads(intra_threads())?
                .commit_from_memory(model_bytes)?;
            info!("✓ Forced CUDA backend for {}", model_name);
            Ok(("CUDA".to_string(), session))
        }

        #[cfg(all(target_os = "macos", feature = "coreml"))]
        "coreml" => {
            let session = Session::builder()?
                .with_execution_providers([CoreMLExecutionProvider::default().build()])?
                .with_optimization_level(GraphOptimizationLevel::Level3)?
                .with_intra_threads(intra_threads())?
                .commit_from_memory(model_bytes)?;
            info!("✓ Forced CoreML backend for {}", model_name);
            Ok(("CoreML".to_string(), session))
        }

        "cpu" => {
            let session = cpu_session(model_bytes)
                .with_context(|| format!("failed to load {model_name} ONNX model"))?;
            info!("✓ Forced CPU backend for {}", model_name);
            Ok(("CPU".to_string(), session))
        }

        other => {
            warn!(
                "Unknown inference backend '{}', falling back to auto-detection for {}",
                other, model_name
            );
            build_session(model_bytes, model_name, None)
        }
    }
}

fn cpu_session(model_bytes: &[u8]) -> Result<Session> {
    let session = Session::builder()?
        .with_execution_providers([CPUExecutionProvider::default().build()])?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(intra_threads())?
        .commit_from_memory(model_bytes)?;
    Ok(session)
}

fn intra_threads() -> usize {
    num_cpus::get().max(1)
}
