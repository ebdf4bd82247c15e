use crate::config::schema::{AppConfig, InferenceConfig, PollPolicy, ScanConfig};
use crate::error::{PhaiError, Result};
use std::path::Path;

/// Validate Chrome executable path
pub fn validate_chrome_path(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(PhaiError::Validation(format!(
            "Chrome executable not found at {:?}",
            path
        )));
    }

    if !path.is_file() {
        return Err(PhaiError::Validation(format!(
            "Chrome path {:?} is not a file",
            path
        )));
    }

    // On Unix systems, check if executable
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let metadata = path.metadata().map_err(|e| {
            PhaiError::Validation(format!("Cannot read Chrome file metadata: {}", e))
        })?;
        if metadata.permissions().mode() & 0o111 == 0 {
            return Err(PhaiError::Validation(format!(
                "Chrome executable {:?} is not executable",
                path
            )));
        }
    }

    Ok(())
}

fn validate_policy(name: &str, policy: &PollPolicy) -> Result<()> {
    if policy.max_attempts == 0 {
        return Err(PhaiError::Validation(format!(
            "{}: max_attempts must be at least 1",
            name
        )));
    }
    Ok(())
}

/// Validate loop tuning
pub fn validate_scan(scan: &ScanConfig) -> Result<()> {
    if scan.max_items == 0 {
        return Err(PhaiError::Validation(
            "max_items must be at least 1".to_string(),
        ));
    }

    validate_policy("first_locate", &scan.first_locate)?;
    validate_policy("relocate", &scan.relocate)?;
    validate_policy("navigation", &scan.navigation)?;

    if scan.detail_url_pattern.is_empty() || scan.detail_link_pattern.is_empty() {
        return Err(PhaiError::Validation(
            "Detail view patterns cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validate model settings
pub fn validate_inference(inference: &InferenceConfig) -> Result<()> {
    if inference.endpoint.trim().is_empty() {
        return Err(PhaiError::Validation(
            "Inference endpoint cannot be empty".to_string(),
        ));
    }

    if inference.model.trim().is_empty() {
        return Err(PhaiError::Validation(
            "Model name cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validate the whole configuration
pub fn validate_config(config: &AppConfig) -> Result<()> {
    validate_scan(&config.scan)?;
    validate_inference(&config.inference)?;

    let start_url = &config.browser.start_url;
    if !start_url.starts_with("http://") && !start_url.starts_with("https://") {
        return Err(PhaiError::Validation(format!(
            "Invalid start URL: {}. Must start with http:// or https://",
            start_url
        )));
    }

    if config.browser.launch {
        validate_chrome_path(&config.browser.effective_chrome_path())?;
    }

    Ok(())
}
