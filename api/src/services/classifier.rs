//! Shared, lazily loaded classifier

use anyhow::Context;
use certverify::{CandleClassifier, CertificateClassifier};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Loads the model once on first use and shares it read-only across requests.
/// A failed load is not cached; the next request tries again.
pub struct ClassifierHandle {
    model_path: PathBuf,
    cell: OnceCell<Arc<dyn CertificateClassifier>>,
}

impl ClassifierHandle {
    /// Load the artifact at `model_path` on first use
    pub fn lazy(model_path: PathBuf) -> Self {
        Self {
            model_path,
            cell: OnceCell::new(),
        }
    }

    /// Wrap an already constructed classifier
    pub fn ready(classifier: Arc<dyn CertificateClassifier>) -> Self {
        Self {
            model_path: PathBuf::new(),
            cell: OnceCell::new_with(Some(classifier)),
        }
    }

    #[cfg(test)]
    fn is_loaded(&self) -> bool {
        self.cell.initialized()
    }

    pub async fn get(&self) -> anyhow::Result<Arc<dyn CertificateClassifier>> {
        let classifier = self
            .cell
            .get_or_try_init(|| async {
                let path = self.model_path.clone();
                let loaded = tokio::task::spawn_blocking(move || CandleClassifier::load(&path))
                    .await
                    .context("Model loading task failed")??;
                Ok::<_, anyhow::Error>(Arc::new(loaded) as Arc<dyn CertificateClassifier>)
            })
            .await?;

        Ok(Arc::clone(classifier))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use certverify::FixedClassifier;
    use std::path::Path;

    #[tokio::test]
    async fn ready_handle_returns_wrapped_classifier() {
        let handle = ClassifierHandle::ready(Arc::new(FixedClassifier::new(0.25)));
        assert!(handle.is_loaded());

        let classifier = handle.get().await.unwrap();
        assert_eq!(classifier.probability(Path::new("unused")).unwrap(), 0.25);
    }

    #[tokio::test]
    async fn failed_load_is_retried() {
        let missing = std::env::temp_dir().join(format!("missing-{}.safetensors", uuid::Uuid::new_v4()));
        let handle = ClassifierHandle::lazy(missing);

        assert!(handle.get().await.is_err());
        assert!(!handle.is_loaded());
        assert!(handle.get().await.is_err());
    }
}
