use crate::config::types::{Config, CrawlConfig, FetchConfig, OutputConfig, SiteConfig, UserAgentConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_site_config(&config.site)?;
    validate_fetch_config(&config.fetch)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    validate_crawl_config(&config.crawl)?;
    Ok(())
}

/// Validates the target site layout
fn validate_site_config(config: &SiteConfig) -> Result<(), ConfigError> {
    validate_http_url("start-page-url", &config.start_page_url)?;
    validate_http_url("sitemap-base-url", &config.sitemap_base_url)?;

    if config.seed_markers.is_empty() {
        return Err(ConfigError::Validation(
            "seed-markers must contain at least one marker".to_string(),
        ));
    }

    if config.seed_markers.iter().any(|m| m.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "seed-markers cannot contain empty markers".to_string(),
        ));
    }

    // `page` is owned by the paginator
    if config.fixed_params.contains_key("page") {
        return Err(ConfigError::Validation(
            "fixed-params cannot set the 'page' parameter".to_string(),
        ));
    }

    Ok(())
}

/// Validates fetch pipeline settings
fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.retry_attempts < 1 || config.retry_attempts > 20 {
        return Err(ConfigError::Validation(format!(
            "retry-attempts must be between 1 and 20, got {}",
            config.retry_attempts
        )));
    }

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "timeout-secs must be >= 1, got {}",
            config.timeout_secs
        )));
    }

    // Unlimited is spelled `None`; a zero budget would block forever
    if config.max_calls_per_minute == Some(0) {
        return Err(ConfigError::Validation(
            "max-calls-per-minute must be >= 1, or 0 in the config file to disable limiting"
                .to_string(),
        ));
    }

    Ok(())
}

/// Validates the identity sent with every request
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    let name = &config.crawler_name;
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(ConfigError::Validation(format!(
            "crawler-name must be non-empty ASCII letters, digits and hyphens, got '{}'",
            name
        )));
    }

    // Spaces or parentheses would break the product token
    let version = config.crawler_version.trim();
    if version.is_empty() || version.contains(|c: char| c.is_whitespace() || c == '(' || c == ')') {
        return Err(ConfigError::Validation(format!(
            "crawler-version must be a single token, got '{}'",
            config.crawler_version
        )));
    }

    validate_http_url("contact-url", &config.contact_url)?;
    validate_email(&config.contact_email)
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.data_dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "data-dir cannot be empty".to_string(),
        ));
    }

    if config.checkpoint_dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "checkpoint-dir cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates run bounds
fn validate_crawl_config(config: &CrawlConfig) -> Result<(), ConfigError> {
    if config.limit == Some(0) {
        return Err(ConfigError::Validation(
            "limit must be >= 1 when set".to_string(),
        ));
    }

    if config.max_pages_per_seed == Some(0) {
        return Err(ConfigError::Validation(
            "max-pages-per-seed must be >= 1 when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates that a configured URL parses and uses an HTTP(S) scheme
fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", field, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} must use http or https, got '{}'",
            field, value
        )));
    }

    Ok(())
}

/// `local@domain.tld`, nothing more; the address also travels as the `From` header
fn validate_email(email: &str) -> Result<(), ConfigError> {
    let well_formed = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.split('.').count() > 1
                && domain.split('.').all(|label| !label.is_empty())
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };

    if well_formed {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!(
            "contact-email is not a usable address: '{}'",
            email
        )))
    }
}
