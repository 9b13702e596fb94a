use crate::config::types::{
    BrowserConfig, Config, CrawlerConfig, FetchConfig, FilterRule, OutputConfig, RateLimitConfig,
};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_fetch_config(&config.fetch)?;
    validate_browser_config(&config.browser)?;
    validate_rate_limit_config(&config.rate_limit)?;
    validate_filters(&config.batch.filters)?;
    validate_output_config(&config.output)?;
    Ok(())
}

fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_pages < 1 {
        return Err(ConfigError::Validation(
            "max_pages must be >= 1".to_string(),
        ));
    }

    if config.page_cap < 1 {
        return Err(ConfigError::Validation(
            "page_cap must be >= 1".to_string(),
        ));
    }

    if config.max_concurrent_crawls < 1 || config.max_concurrent_crawls > 100 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_crawls must be between 1 and 100, got {}",
            config.max_concurrent_crawls
        )));
    }

    if config.max_consecutive_failures < 1 {
        return Err(ConfigError::Validation(
            "max_consecutive_failures must be >= 1".to_string(),
        ));
    }

    if config.max_failure_delay_ms < config.failure_delay_ms {
        return Err(ConfigError::Validation(format!(
            "max_failure_delay_ms ({}) must be >= failure_delay_ms ({})",
            config.max_failure_delay_ms, config.failure_delay_ms
        )));
    }

    if config.crawl_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "crawl_timeout_secs must be >= 1".to_string(),
        ));
    }

    if !(0.0..=1.0).contains(&config.domain_skip_min_success_rate) {
        return Err(ConfigError::Validation(format!(
            "domain_skip_min_success_rate must be between 0 and 1, got {}",
            config.domain_skip_min_success_rate
        )));
    }

    Ok(())
}

fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "fetch timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.retry_max_delay_ms < config.retry_base_delay_ms {
        return Err(ConfigError::Validation(format!(
            "retry_max_delay_ms ({}) must be >= retry_base_delay_ms ({})",
            config.retry_max_delay_ms, config.retry_base_delay_ms
        )));
    }

    Ok(())
}

fn validate_browser_config(config: &BrowserConfig) -> Result<(), ConfigError> {
    if config.max_sessions < 1 || config.max_sessions > 32 {
        return Err(ConfigError::Validation(format!(
            "browser max_sessions must be between 1 and 32, got {}",
            config.max_sessions
        )));
    }

    if config.challenge_poll_attempts < 1 {
        return Err(ConfigError::Validation(
            "challenge_poll_attempts must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_rate_limit_config(config: &RateLimitConfig) -> Result<(), ConfigError> {
    let rate = config.requests_per_second;
    if !rate.is_finite() || rate <= 0.0 {
        return Err(ConfigError::Validation(format!(
            "requests_per_second must be a positive number, got {}",
            config.requests_per_second
        )));
    }

    if config.burst < 1 {
        return Err(ConfigError::Validation("burst must be >= 1".to_string()));
    }

    let mut seen = HashSet::new();
    for credential in &config.credentials {
        if credential.id.trim().is_empty() {
            return Err(ConfigError::Validation(
                "credential id cannot be empty".to_string(),
            ));
        }

        if !seen.insert(credential.id.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate credential id '{}'",
                credential.id
            )));
        }

        if let Some(proxy) = &credential.proxy {
            Url::parse(proxy).map_err(|e| {
                ConfigError::InvalidUrl(format!(
                    "Invalid proxy for credential '{}': {}",
                    credential.id, e
                ))
            })?;
        }
    }

    Ok(())
}

fn validate_filters(filters: &[FilterRule]) -> Result<(), ConfigError> {
    for rule in filters {
        if rule.field.trim().is_empty() {
            return Err(ConfigError::Validation(
                "filter field cannot be empty".to_string(),
            ));
        }

        if rule.op.needs_value() && rule.value.is_none() {
            return Err(ConfigError::Validation(format!(
                "filter on '{}' with op {:?} requires a value",
                rule.field, rule.op
            )));
        }
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    if config.blob_dir.is_empty() {
        return Err(ConfigError::Validation(
            "blob_dir cannot be empty".to_string(),
        ));
    }

    if config.summary_path.is_empty() {
        return Err(ConfigError::Validation(
            "summary_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}
