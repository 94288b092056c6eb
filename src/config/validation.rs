use crate::config::types::{Config, CrawlerConfig, DescriptorConfig, MirrorConfig, OutputConfig};
use crate::config::UserAgentConfig;
use crate::repo::validate_pattern;
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_mirror_config(&config.mirrors)?;
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    validate_descriptor_config(&config.descriptor)?;
    for entry in &config.exclude {
        validate_pattern(entry.pattern.trim().to_string())?;
    }
    Ok(())
}

/// Validates origin and mirror base URLs
fn validate_mirror_config(config: &MirrorConfig) -> Result<(), ConfigError> {
    validate_base_url("origin", &config.origin)?;

    for mirror in config.index.iter().chain(config.download.iter()) {
        validate_base_url("mirror", mirror)?;
    }

    Ok(())
}

fn validate_base_url(label: &str, raw: &str) -> Result<(), ConfigError> {
    let url = Url::parse(raw)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", label, raw, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use HTTP or HTTPS",
            label, raw
        )));
    }

    if url.query().is_some() || url.fragment().is_some() {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must not carry a query or fragment",
            label, raw
        )));
    }

    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("listing_workers", config.listing_workers),
        ("fetch_workers", config.fetch_workers),
    ] {
        if !(1..=256).contains(&value) {
            return Err(ConfigError::Validation(format!(
                "{} must be between 1 and 256, got {}",
                name, value
            )));
        }
    }

    if config.listing_timeout_secs < 1 || config.file_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "timeouts must be >= 1s, got listing={}s file={}s",
            config.listing_timeout_secs, config.file_timeout_secs
        )));
    }

    if !(10..=10_000).contains(&config.poll_interval_ms) {
        return Err(ConfigError::Validation(format!(
            "poll_interval_ms must be between 10 and 10000, got {}ms",
            config.poll_interval_ms
        )));
    }

    if config.metadata_marker.is_empty() || config.metadata_marker.contains('/') {
        return Err(ConfigError::Validation(format!(
            "metadata_marker must be a plain file name, got '{}'",
            config.metadata_marker
        )));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    if let Some(contact) = &config.contact_url {
        Url::parse(contact)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.root.is_empty() {
        return Err(ConfigError::Validation("root cannot be empty".to_string()));
    }

    if config.state_dir.is_empty()
        || config.state_dir.contains('/')
        || config.state_dir.contains('\\')
        || config.state_dir == "."
        || config.state_dir == ".."
    {
        return Err(ConfigError::Validation(format!(
            "state_dir must be a single directory name, got '{}'",
            config.state_dir
        )));
    }

    Ok(())
}

/// Validates descriptor suffixes
fn validate_descriptor_config(config: &DescriptorConfig) -> Result<(), ConfigError> {
    for suffix in &config.suffixes {
        if !suffix.starts_with('.') || suffix.len() < 2 {
            return Err(ConfigError::Validation(format!(
                "descriptor suffix must look like '.pom', got '{}'",
                suffix
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExcludeEntry;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_invalid_origin() {
        let mut config = Config::default();
        config.mirrors.origin = "not a url".to_string();
        assert!(matches!(validate(&config), Err(ConfigError::InvalidUrl(_))));

        config.mirrors.origin = "ftp://repo.example.com/".to_string();
        assert!(matches!(validate(&config), Err(ConfigError::InvalidUrl(_))));
    }

    #[test]
    fn test_invalid_mirror() {
        let mut config = Config::default();
        config.mirrors.download = vec!["https://ok.example.com/".into(), "nope".into()];
        assert!(matches!(validate(&config), Err(ConfigError::InvalidUrl(_))));
    }

    #[test]
    fn test_worker_bounds() {
        let mut config = Config::default();
        config.crawler.fetch_workers = 0;
        assert!(matches!(validate(&config), Err(ConfigError::Validation(_))));

        config.crawler.fetch_workers = 257;
        assert!(matches!(validate(&config), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_poll_interval_bounds() {
        let mut config = Config::default();
        config.crawler.poll_interval_ms = 1;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_state_dir_single_segment() {
        let mut config = Config::default();
        config.output.state_dir = "a/b".to_string();
        assert!(validate(&config).is_err());
        config.output.state_dir = "..".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_crawler_name_charset() {
        let mut config = Config::default();
        config.user_agent.crawler_name = "bad name!".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_descriptor_suffix_shape() {
        let mut config = Config::default();
        config.descriptor.suffixes = vec!["pom".to_string()];
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_invalid_exclude_pattern() {
        let mut config = Config::default();
        config.exclude = vec![ExcludeEntry {
            pattern: "org..bad".to_string(),
        }];
        assert!(matches!(validate(&config), Err(ConfigError::InvalidPattern(_))));
    }
}
