use anyhow::Context;
use log::{info, warn};
use std::sync::Arc;

use certverify_api::config::Config;
use certverify_api::services::classifier::ClassifierHandle;
use certverify_api::{AppState, build_app};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    certverify::logging::init();

    let config = Config::from_env()?;

    if !config.upload_dir.exists() {
        tokio::fs::create_dir_all(&config.upload_dir)
            .await
            .with_context(|| format!("Failed to create {}", config.upload_dir.display()))?;
        info!("Created upload folder: {}", config.upload_dir.display());
    }
    info!("Model artifact: {}", config.model_path.display());

    let classifier = ClassifierHandle::lazy(config.model_path.clone());
    let state = Arc::new(AppState { config, classifier });

    if state.config.preload_model {
        match state.classifier.get().await {
            Ok(_) => info!("Model preloaded"),
            Err(e) => warn!("Model preload failed, retrying on first request: {:#}", e),
        }
    }

    let app = build_app(state.clone());

    let addr = format!("0.0.0.0:{}", state.config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Listening on http://{}", addr);
    axum::serve(listener, app).await.context("Server failed")?;
    Ok(())
}
