//! HTTP service for medical certificate verification.

pub mod client;
pub mod config;
pub mod constants;
pub mod models;
pub mod routes;
pub mod services;

use axum::{Router, extract::DefaultBodyLimit};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use config::Config;
use services::classifier::ClassifierHandle;

/// Immutable per-process state handed to every handler
pub struct AppState {
    pub config: Config,
    pub classifier: ClassifierHandle,
}

/// Build the application router with body limit, CORS and the JSON 404 fallback.
pub fn build_app(state: Arc<AppState>) -> Router {
    routes::build_routes(state.clone())
        .fallback(routes::docs::not_found)
        .layer(DefaultBodyLimit::max(state.config.max_upload_size))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod test_support {
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::{Request, header::CONTENT_TYPE},
        response::Response,
    };
    use certverify::CertificateClassifier;
    use std::io::Cursor;
    use std::path::PathBuf;
    use std::sync::Arc;

    use super::{AppState, build_app};
    use crate::config::Config;
    use crate::constants::API_KEY_HEADER;
    use crate::services::classifier::ClassifierHandle;

    pub const TEST_KEY: &str = "test-key";
    const BOUNDARY: &str = "certverify-test-boundary";

    /// App state over a scratch upload directory that is removed on drop
    pub struct TestApp {
        state: Arc<AppState>,
        upload_dir: PathBuf,
    }

    impl TestApp {
        pub fn new(name: &str, classifier: impl CertificateClassifier + 'static) -> Self {
            let upload_dir =
                std::env::temp_dir().join(format!("certverify-{}-{}", name, uuid::Uuid::new_v4()));
            std::fs::create_dir_all(&upload_dir).unwrap();

            let config = Config::new(TEST_KEY, upload_dir.clone(), PathBuf::from("unused"));
            let state = Arc::new(AppState {
                config,
                classifier: ClassifierHandle::ready(Arc::new(classifier)),
            });
            Self { state, upload_dir }
        }

        pub fn app(&self) -> Router {
            build_app(Arc::clone(&self.state))
        }

        pub fn upload_dir_is_empty(&self) -> bool {
            std::fs::read_dir(&self.upload_dir).unwrap().next().is_none()
        }
    }

    impl Drop for TestApp {
        fn drop(&mut self) {
            std::fs::remove_dir_all(&self.upload_dir).ok();
        }
    }

    /// Single-part multipart body
    pub fn multipart_body(field: &str, filename: &str, data: &[u8]) -> Vec<u8> {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    pub fn verify_request(api_key: Option<&str>, body: Vec<u8>) -> Request<Body> {
        let mut builder = Request::post("/verify").header(
            CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
        if let Some(key) = api_key {
            builder = builder.header(API_KEY_HEADER, key);
        }
        builder.body(Body::from(body)).unwrap()
    }

    pub fn png_bytes() -> Vec<u8> {
        let image = image::RgbImage::from_pixel(8, 8, image::Rgb([200, 40, 40]));
        let mut bytes = Cursor::new(Vec::new());
        image.write_to(&mut bytes, image::ImageFormat::Png).unwrap();
        bytes.into_inner()
    }

    pub async fn read_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }
}
