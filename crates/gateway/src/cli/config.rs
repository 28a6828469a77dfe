use kd_domain::config::{Config, ConfigSeverity};

/// Parse and validate the config, printing any issues.
///
/// Returns `true` when there are no errors (warnings are allowed).
pub fn validate(config: &Config, config_path: &str) -> bool {
    let issues = config.validate();

    if issues.is_empty() {
        println!("Config OK ({config_path})");
        return true;
    }

    let error_count = issues
        .iter()
        .filter(|e| e.severity == ConfigSeverity::Error)
        .count();
    let warning_count = issues.len() - error_count;

    for issue in &issues {
        println!("{issue}");
    }

    println!("\n{error_count} error(s), {warning_count} warning(s) in {config_path}");

    error_count == 0
}

/// Render the resolved config (with all defaults filled in) as TOML.
pub fn render(config: &Config) -> anyhow::Result<String> {
    toml::to_string_pretty(config).map_err(|e| anyhow::anyhow!("serializing config: {e}"))
}

/// Print [`render`]'s output to stdout.
pub fn show(config: &Config) -> anyhow::Result<()> {
    print!("{}", render(config)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rendered_config_round_trips() {
        let cfg = Config::default();
        let text = render(&cfg).unwrap();
        assert!(text.contains("[orchestrator]"));
        let back: Config = toml::from_str(&text).unwrap();
        assert_eq!(back.delivery.max_chunks, cfg.delivery.max_chunks);
    }

    #[test]
    fn invalid_config_fails_validation() {
        let mut cfg = Config::default();
        cfg.delivery.max_chunks = 0;
        assert!(!validate(&cfg, "test.toml"));
        assert!(validate(&Config::default(), "test.toml"));
    }
}
