//! Certificate verification endpoint

use axum::{
    Json, Router,
    body::Bytes,
    extract::{
        Multipart, State,
        multipart::MultipartRejection,
    },
    middleware,
    routing::post,
};
use log::{info, warn};
use std::sync::Arc;

use crate::AppState;
use crate::constants::{ALLOWED_EXTENSIONS, UPLOAD_FIELD};
use crate::models::VerifyResponse;
use crate::services::auth::require_api_key;
use crate::services::error::{ApiError, LogErr};
use crate::services::uploads::{TempUpload, has_allowed_extension};

pub fn routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/verify", post(verify))
        .route_layer(middleware::from_fn_with_state(state, require_api_key))
}

/// POST /verify - Classify an uploaded certificate image
async fn verify(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let mut multipart = multipart.map_err(|e| {
        warn!("Rejected non-multipart upload: {}", e);
        ApiError::BadRequest("No file provided".to_string())
    })?;

    let (filename, bytes) = read_upload(&mut multipart)
        .await?
        .ok_or_else(|| ApiError::BadRequest("No file provided".to_string()))?;

    if filename.is_empty() {
        return Err(ApiError::BadRequest("No file selected".to_string()));
    }
    if !has_allowed_extension(&filename) {
        return Err(ApiError::BadRequest(format!(
            "Invalid file type. Allowed types: {}",
            ALLOWED_EXTENSIONS.join(", ")
        )));
    }

    let classifier = state.classifier.get().await.log_500("Failed to load model")?;

    let upload = TempUpload::persist(&state.config.upload_dir, &filename, &bytes)
        .await
        .log_500("Failed to save upload")?;

    let verdict = tokio::task::spawn_blocking(move || {
        let verdict = classifier.verify(upload.path());
        drop(upload);
        verdict
    })
    .await
    .log_500("Inference task failed")?
    .log_500("Error processing certificate")?;

    info!(
        "Verified {}: prediction={} confidence={:.4}",
        filename, verdict.prediction, verdict.confidence
    );

    Ok(Json(verdict.into()))
}

/// First part named `file` that carries a filename, with its bytes.
/// Reading past the body limit surfaces as 413 through `From<MultipartError>`.
async fn read_upload(multipart: &mut Multipart) -> Result<Option<(String, Bytes)>, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let Some(filename) = field.file_name().map(str::to_owned) else {
            continue;
        };
        let bytes = field.bytes().await?;
        return Ok(Some((filename, bytes)));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use anyhow::{Result, bail};
    use axum::http::StatusCode;
    use certverify::{CertificateClassifier, FixedClassifier};
    use std::path::Path;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    use crate::constants::MAX_UPLOAD_SIZE;
    use crate::test_support::{
        TEST_KEY, TestApp, multipart_body, png_bytes, read_json, verify_request,
    };

    /// Counts calls and checks the upload exists while inference runs
    struct CountingClassifier {
        calls: Arc<AtomicUsize>,
    }

    impl CertificateClassifier for CountingClassifier {
        fn probability(&self, path: &Path) -> Result<f32> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !path.exists() {
                bail!("upload missing during inference");
            }
            Ok(0.8)
        }
    }

    struct FailingClassifier;

    impl CertificateClassifier for FailingClassifier {
        fn probability(&self, _path: &Path) -> Result<f32> {
            bail!("corrupt image")
        }
    }

    struct PanickingClassifier;

    impl CertificateClassifier for PanickingClassifier {
        fn probability(&self, _path: &Path) -> Result<f32> {
            panic!("forward pass blew up")
        }
    }

    fn counting() -> (CountingClassifier, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            CountingClassifier {
                calls: Arc::clone(&calls),
            },
            calls,
        )
    }

    #[tokio::test]
    async fn accepted_extensions_return_verdict_and_clean_up() {
        let (classifier, calls) = counting();
        let test = TestApp::new("verify-ok", classifier);

        for name in ["cert.png", "cert.jpg", "cert.JPEG"] {
            let body = multipart_body("file", name, &png_bytes());
            let response = test
                .app()
                .oneshot(verify_request(Some(TEST_KEY), body))
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::OK, "{name}");
            let json = read_json(response).await;
            assert_eq!(json["status"], "success");
            assert_eq!(json["prediction"], true);
            assert_eq!(json["message"], "Certificate appears to be valid");
            let confidence = json["confidence"].as_f64().unwrap();
            assert!((0.0..=1.0).contains(&confidence));
            assert!((confidence - 0.8).abs() < 1e-6);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(test.upload_dir_is_empty());
    }

    #[tokio::test]
    async fn low_probability_is_reported_invalid() {
        let test = TestApp::new("verify-invalid", FixedClassifier::new(0.1));
        let body = multipart_body("file", "cert.png", &png_bytes());
        let response = test
            .app()
            .oneshot(verify_request(Some(TEST_KEY), body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = read_json(response).await;
        assert_eq!(json["prediction"], false);
        assert_eq!(json["message"], "Certificate appears to be invalid");
        assert!((json["confidence"].as_f64().unwrap() - 0.9).abs() < 1e-6);
    }

    #[tokio::test]
    async fn bad_extension_is_rejected_before_inference() {
        let (classifier, calls) = counting();
        let test = TestApp::new("verify-ext", classifier);

        let body = multipart_body("file", "cert.gif", b"GIF89a");
        let response = test
            .app()
            .oneshot(verify_request(Some(TEST_KEY), body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = read_json(response).await;
        assert_eq!(json["status"], "error");
        assert_eq!(
            json["message"],
            "Invalid file type. Allowed types: png, jpg, jpeg"
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(test.upload_dir_is_empty());
    }

    #[tokio::test]
    async fn missing_or_wrong_key_is_unauthorized() {
        let (classifier, calls) = counting();
        let test = TestApp::new("verify-auth", classifier);

        for key in [None, Some("wrong-key"), Some("")] {
            let body = multipart_body("file", "cert.png", &png_bytes());
            let response = test
                .app()
                .oneshot(verify_request(key, body))
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            let json = read_json(response).await;
            assert_eq!(json["message"], "Invalid or missing API key");
        }

        // A bad payload still gets 401 first
        let body = multipart_body("file", "cert.gif", b"nope");
        let response = test.app().oneshot(verify_request(None, body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn oversize_body_is_payload_too_large() {
        let (classifier, calls) = counting();
        let test = TestApp::new("verify-large", classifier);

        let payload = vec![0u8; MAX_UPLOAD_SIZE + 1024];
        let body = multipart_body("file", "cert.png", &payload);
        let response = test
            .app()
            .oneshot(verify_request(Some(TEST_KEY), body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let json = read_json(response).await;
        assert_eq!(json["message"], "File too large. Maximum size is 16MB");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(test.upload_dir_is_empty());
    }

    #[tokio::test]
    async fn missing_file_part_and_empty_filename() {
        let test = TestApp::new("verify-missing", FixedClassifier::default());

        let body = multipart_body("image", "cert.png", &png_bytes());
        let response = test
            .app()
            .oneshot(verify_request(Some(TEST_KEY), body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(read_json(response).await["message"], "No file provided");

        let body = multipart_body("file", "", &png_bytes());
        let response = test
            .app()
            .oneshot(verify_request(Some(TEST_KEY), body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(read_json(response).await["message"], "No file selected");
    }

    #[tokio::test]
    async fn processing_failure_is_generic_500_and_cleans_up() {
        let test = TestApp::new("verify-fail", FailingClassifier);
        let body = multipart_body("file", "cert.png", &png_bytes());
        let response = test
            .app()
            .oneshot(verify_request(Some(TEST_KEY), body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = read_json(response).await;
        assert_eq!(json["status"], "error");
        assert_eq!(json["message"], "Error processing the certificate");
        assert!(test.upload_dir_is_empty());
    }

    #[tokio::test]
    async fn panic_during_inference_still_cleans_up() {
        let test = TestApp::new("verify-panic", PanickingClassifier);
        let body = multipart_body("file", "cert.png", &png_bytes());
        let response = test
            .app()
            .oneshot(verify_request(Some(TEST_KEY), body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(test.upload_dir_is_empty());
    }
}
