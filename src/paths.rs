use serde::{Deserialize, Serialize};

/// Sub-path the production site is served from.
pub const DEFAULT_BASE_PATH: &str = "/dimitry-portfolio";

/// Deployment target the site was built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployMode {
    #[default]
    Development,
    Production,
}

impl DeployMode {
    /// Interprets a deployment flag value. Only `production` (any case) and
    /// the short form `prod` select production.
    pub fn from_flag(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Maps a root-relative asset path to its deployed URL using the default
/// base path.
pub fn asset_path(path: &str, mode: DeployMode) -> String {
    asset_path_with_base(path, mode, DEFAULT_BASE_PATH)
}

/// Maps a root-relative asset path to its deployed URL.
///
/// Outside production the path is returned untouched. A path that already
/// carries the base path is never prefixed a second time.
pub fn asset_path_with_base(path: &str, mode: DeployMode, base: &str) -> String {
    let base = base.trim_end_matches('/');
    if !mode.is_production() || base.is_empty() || has_prefix(path, base) {
        return path.to_string();
    }
    format!("{base}{path}")
}

fn has_prefix(path: &str, base: &str) -> bool {
    match path.strip_prefix(base) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Resolves `reference` against the URL of the document that contains it,
/// the way a browser resolves a relative link. References with a scheme or a
/// leading slash are returned unchanged.
pub fn resolve_relative(document_url: &str, reference: &str) -> String {
    if reference.starts_with('/') || reference.contains("://") {
        return reference.to_string();
    }
    let document_url = document_url
        .split(['?', '#'])
        .next()
        .unwrap_or(document_url);
    let directory = match document_url.rfind('/') {
        Some(slash) => &document_url[..slash],
        None => "",
    };

    let mut segments: Vec<&str> = directory.split('/').collect();
    let mut parts = reference.split('/').peekable();
    while let Some(part) = parts.next() {
        match part {
            "." => {}
            // never climb above the root segment
            ".." => {
                if segments.len() > 1 {
                    segments.pop();
                }
            }
            "" if parts.peek().is_some() => {}
            _ => segments.push(part),
        }
    }
    segments.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn development_paths_are_unchanged() {
        assert_eq!(
            asset_path("/models/kagome.gltf", DeployMode::Development),
            "/models/kagome.gltf"
        );
    }

    #[test]
    fn production_paths_are_prefixed_once() {
        let once = asset_path("/models/kagome.gltf", DeployMode::Production);
        assert_eq!(once, "/dimitry-portfolio/models/kagome.gltf");
        assert_eq!(asset_path(&once, DeployMode::Production), once);
    }

    #[test]
    fn lookalike_prefix_is_still_prefixed() {
        assert_eq!(
            asset_path("/dimitry-portfolio-old/a.png", DeployMode::Production),
            "/dimitry-portfolio/dimitry-portfolio-old/a.png"
        );
    }

    #[test]
    fn custom_base_is_normalized() {
        assert_eq!(
            asset_path_with_base("/a.png", DeployMode::Production, "/site/"),
            "/site/a.png"
        );
        assert_eq!(
            asset_path_with_base("/a.png", DeployMode::Production, ""),
            "/a.png"
        );
    }

    #[test]
    fn buffers_resolve_next_to_their_document() {
        assert_eq!(
            resolve_relative("/models/kagome.gltf", "kagome.bin"),
            "/models/kagome.bin"
        );
        assert_eq!(
            resolve_relative("/dimitry-portfolio/models/projet2/projet2.gltf", "./data/projet2.bin"),
            "/dimitry-portfolio/models/projet2/data/projet2.bin"
        );
        assert_eq!(
            resolve_relative("/models/projet2/projet2.gltf?v=2", "../shared.bin"),
            "/models/shared.bin"
        );
        assert_eq!(resolve_relative("/a.gltf", "../../b.bin"), "/b.bin");
        assert_eq!(
            resolve_relative("/models/a.gltf", "https://cdn.test/b.bin"),
            "https://cdn.test/b.bin"
        );
    }

    #[test]
    fn flag_parsing() {
        assert_eq!(DeployMode::from_flag("PRODUCTION"), DeployMode::Production);
        assert_eq!(DeployMode::from_flag("prod"), DeployMode::Production);
        assert_eq!(DeployMode::from_flag("development"), DeployMode::Development);
        assert_eq!(DeployMode::from_flag(""), DeployMode::Development);
    }
}
