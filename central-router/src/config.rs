use serde::Deserialize;
use std::fs::File;
use webhook_router::config::Config as WebhookRouterConfig;

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct MetricsConfig {
    pub statsd_host: String,
    pub statsd_port: u16,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct LoggingConfig {
    pub sentry_dsn: String,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct CommonConfig {
    pub metrics: Option<MetricsConfig>,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(flatten)]
    pub common: CommonConfig,
    pub webhook_router: Option<WebhookRouterConfig>,
}

impl Config {
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let data = serde_yaml::from_reader(file)?;

        Ok(data)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    LoadError(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_tmp_file(s: &str) -> tempfile::NamedTempFile {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        write!(tmp, "{}", s).expect("write yaml");

        tmp
    }

    #[test]
    fn webhook_router_config() {
        let yaml = r#"
            metrics:
                statsd_host: 127.0.0.1
                statsd_port: 8125
            logging:
                sentry_dsn: https://key@sentry.example/1
            webhook_router:
                listener:
                    host: 0.0.0.0
                    port: 3000
                admin_listener:
                    host: 127.0.0.1
                    port: 3001
                storage:
                    database_url: sqlite:///var/lib/central-router/router.db
                forwarding:
                    timeout_ms: 4000
            "#;
        let tmp = write_tmp_file(yaml);
        let config = Config::from_file(tmp.path()).expect("load config");

        assert_eq!(
            config.common.metrics,
            Some(MetricsConfig {
                statsd_host: "127.0.0.1".into(),
                statsd_port: 8125,
            })
        );
        assert_eq!(
            config.common.logging.expect("logging config").sentry_dsn,
            "https://key@sentry.example/1"
        );

        let router = config.webhook_router.expect("webhook router config");
        assert!(router.validate().is_ok());
        assert_eq!(router.listener.port, 3000);
        assert_eq!(
            router.storage.database_url,
            "sqlite:///var/lib/central-router/router.db"
        );
        assert_eq!(router.forwarding.timeout_ms, 4000);
        assert_eq!(router.paths.webhook, "/api/central-router/webhook");
    }

    #[test]
    fn common_sections_optional() {
        let tmp = write_tmp_file("webhook_router: ~\n");
        let config = Config::from_file(tmp.path()).expect("load config");
        assert_eq!(config.common, CommonConfig::default());
        assert!(config.webhook_router.is_none());
    }

    #[test]
    fn missing_file() {
        let err = Config::from_file(std::path::Path::new("/nonexistent/central-router.yaml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::LoadError(_)));
    }
}
