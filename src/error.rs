use thiserror::Error;

pub type ViewerResult<T> = Result<T, ViewerError>;

/// Failures raised inside the viewer library.
///
/// None of these are fatal to the page: asset failures feed the widget's
/// fallback chain and surface failures leave the container empty.
#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("asset not found: {url}")]
    AssetNotFound { url: String },

    #[error("failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("failed to decode model: {0}")]
    Decode(#[from] gltf::Error),

    #[error("model is unusable: {0}")]
    InvalidModel(String),

    #[error("container is not available: {0}")]
    ContainerUnavailable(String),

    #[error("rendering surface error: {0}")]
    Surface(String),
}

impl ViewerError {
    pub fn fetch(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fetch {
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn invalid_model(message: impl Into<String>) -> Self {
        Self::InvalidModel(message.into())
    }

    pub fn surface(message: impl Into<String>) -> Self {
        Self::Surface(message.into())
    }

    /// Returns true for errors that the widget's fallback chain absorbs.
    pub fn is_asset_failure(&self) -> bool {
        matches!(
            self,
            Self::AssetNotFound { .. } | Self::Fetch { .. } | Self::Decode(_) | Self::InvalidModel(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_failures_are_classified() {
        assert!(ViewerError::AssetNotFound {
            url: "/models/a.gltf".into()
        }
        .is_asset_failure());
        assert!(ViewerError::invalid_model("empty").is_asset_failure());
        assert!(!ViewerError::surface("lost").is_asset_failure());
        assert!(!ViewerError::ContainerUnavailable("gone".into()).is_asset_failure());
    }

    #[test]
    fn display_mentions_url() {
        let err = ViewerError::fetch("/models/kagome.gltf", "503");
        assert_eq!(
            err.to_string(),
            "failed to fetch /models/kagome.gltf: 503"
        );
    }
}
