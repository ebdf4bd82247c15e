//! Prompt and reference image picked up from disk at startup.

use crate::config::InferenceConfig;
use crate::scan::DescribeInputs;
use std::path::Path;

/// Prompt from `prompt_file` when it exists and is non-blank, else the configured
/// prompt; reference image bytes when `reference_image` exists. Unreadable files
/// are logged and skipped.
pub async fn load_describe_inputs(config: &InferenceConfig) -> DescribeInputs {
    let mut prompt = config.prompt.clone();
    if let Some(path) = &config.prompt_file {
        if let Some(text) = read_optional(path).await {
            match String::from_utf8(text) {
                Ok(text) if !text.trim().is_empty() => {
                    tracing::info!("Loaded prompt from {}", path.display());
                    prompt = text.trim().to_string();
                }
                Ok(_) => tracing::debug!("{} is empty, keeping configured prompt", path.display()),
                Err(e) => tracing::warn!("{} is not UTF-8: {}", path.display(), e),
            }
        }
    }

    let mut reference = None;
    if let Some(path) = &config.reference_image {
        if let Some(bytes) = read_optional(path).await.filter(|b| !b.is_empty()) {
            tracing::info!(
                "Loaded reference photo from {} ({} bytes)",
                path.display(),
                bytes.len()
            );
            reference = Some(bytes);
        }
    }

    DescribeInputs { prompt, reference }
}

async fn read_optional(path: &Path) -> Option<Vec<u8>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Some(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            tracing::warn!("Error loading {}: {}", path.display(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_files_keep_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = InferenceConfig {
            prompt: "configured".into(),
            prompt_file: Some(dir.path().join("prompt.txt")),
            reference_image: Some(dir.path().join("reference_photo.jpg")),
            ..Default::default()
        };
        let inputs = load_describe_inputs(&config).await;
        assert_eq!(inputs.prompt, "configured");
        assert!(inputs.reference.is_none());
    }

    #[tokio::test]
    async fn test_files_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("prompt.txt"), "  Only count the dogs.\n").unwrap();
        std::fs::write(dir.path().join("reference_photo.jpg"), [0xff, 0xd8]).unwrap();
        let config = InferenceConfig {
            prompt_file: Some(dir.path().join("prompt.txt")),
            reference_image: Some(dir.path().join("reference_photo.jpg")),
            ..Default::default()
        };
        let inputs = load_describe_inputs(&config).await;
        assert_eq!(inputs.prompt, "Only count the dogs.");
        assert_eq!(inputs.reference, Some(vec![0xff, 0xd8]));
    }
}
