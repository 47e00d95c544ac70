use super::{
    types::{Config, SessionTask},
    ConfigError,
};
use crate::signature::Signature;

/// Validate configuration
/// Currently validates:
/// - The selected alternative is mapped to a signature (walnut task)
/// - Poll intervals, timeouts and the retry budget are non-zero
/// - Every signature has an id, compiles, and has a normalized region
/// - The escape procedure has its signatures when enabled
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.session.task == SessionTask::Walnut {
        if config.session.alternative.is_empty() {
            return Err(ConfigError::ValidationError(
                "session.alternative must be set".to_string(),
            ));
        }
        if config.selected_alternative().is_none() {
            return Err(ConfigError::ValidationError(format!(
                "session.alternative '{}' has no entry in [alternatives]",
                config.session.alternative
            )));
        }
    }

    if config.session.max_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "session.max_attempts must be at least 1".to_string(),
        ));
    }

    let timing = &config.timing;
    for (name, value) in [
        ("timing.poll_interval_ms", timing.poll_interval_ms),
        ("timing.stage_timeout_ms", timing.stage_timeout_ms),
        ("timing.primary_timeout_ms", timing.primary_timeout_ms),
        ("timing.primary_poll_interval_ms", timing.primary_poll_interval_ms),
        ("dispel.replay_timeout_ms", config.dispel.replay_timeout_ms),
        ("dispel.replay_poll_interval_ms", config.dispel.replay_poll_interval_ms),
    ] {
        if value == 0 {
            return Err(ConfigError::ValidationError(format!("{name} cannot be 0")));
        }
    }

    let table = &config.signatures;
    let mut signatures: Vec<&Signature> = vec![
        &table.round_start,
        &table.confirm,
        &table.withdraw,
        &table.proceed,
    ];
    signatures.extend(table.selection_screen.iter());
    signatures.extend(table.abandon.iter());
    signatures.extend(table.dismiss.iter());
    signatures.extend(config.alternatives.values());
    signatures.extend([
        &config.dispel.start,
        &config.dispel.map_loaded,
        &config.dispel.replay,
    ]);

    for signature in signatures {
        validate_signature(signature)?;
    }

    if config.escape.enabled && (table.abandon.is_none() || table.dismiss.is_none()) {
        return Err(ConfigError::ValidationError(
            "escape is enabled but signatures.abandon or signatures.dismiss is missing"
                .to_string(),
        ));
    }

    if config.session.task == SessionTask::Dispel && config.dispel.skill_key.is_empty() {
        return Err(ConfigError::ValidationError(
            "dispel.skill_key cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_signature(signature: &Signature) -> Result<(), ConfigError> {
    if signature.id.is_empty() {
        return Err(ConfigError::ValidationError(
            "signature id cannot be empty".to_string(),
        ));
    }
    signature.compile_text().map_err(|e| {
        ConfigError::ValidationError(format!(
            "signature '{}' has an invalid pattern: {}",
            signature.id, e
        ))
    })?;
    if let Some(region) = &signature.region {
        if !region.is_normalized() {
            return Err(ConfigError::ValidationError(format!(
                "signature '{}' region must lie within the screen (fractions 0..1)",
                signature.id
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::Region;
    use crate::testing::fixtures;

    #[test]
    fn test_validate_valid_config() {
        let config = fixtures::config();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_unmapped_alternative_fails() {
        let mut config = fixtures::config();
        config.session.alternative = "unknown".to_string();
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
        assert!(err.to_string().contains("unknown"));
    }

    #[test]
    fn test_validate_empty_alternative_fails() {
        let mut config = fixtures::config();
        config.session.alternative.clear();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_zero_attempts_fails() {
        let mut config = fixtures::config();
        config.session.max_attempts = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_zero_poll_interval_fails() {
        let mut config = fixtures::config();
        config.timing.poll_interval_ms = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("timing.poll_interval_ms"));
    }

    #[test]
    fn test_validate_bad_pattern_fails() {
        let mut config = fixtures::config();
        config.signatures.withdraw = Signature::text("withdraw", ["撤离("]);
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("withdraw"));
    }

    #[test]
    fn test_validate_region_out_of_bounds_fails() {
        let mut config = fixtures::config();
        config.signatures.confirm =
            Signature::text("confirm", ["确认选择"]).within(Region::new(0.6, 0.6, 0.6, 0.6));
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_dispel_task_ignores_alternative() {
        let mut config = fixtures::dispel_config();
        config.session.alternative.clear();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_dispel_empty_skill_key_fails() {
        let mut config = fixtures::dispel_config();
        config.dispel.skill_key.clear();
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("dispel.skill_key"));
    }

    #[test]
    fn test_validate_dispel_zero_replay_poll_fails() {
        let mut config = fixtures::dispel_config();
        config.dispel.replay_poll_interval_ms = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_escape_requires_signatures() {
        let mut config = fixtures::config();
        config.signatures.abandon = None;
        assert!(validate_config(&config).is_err());

        config.escape.enabled = false;
        assert!(validate_config(&config).is_ok());
    }
}
