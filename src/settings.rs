use std::{collections::BTreeMap, time::Duration};

use anyhow::{Context, Result};
use clap::{Arg, Command};
use config::{builder::DefaultState, Config, ConfigBuilder};
use serde::Deserialize;
use serde_with::{serde_as, DurationSecondsWithFrac};

use crate::{
    log::LogSettings, profiles::ProfileSettings, telemetry_endpoint::TelemetryEndpointSettings,
    template::TemplateSettings, webhook_receiver::ReceiverSettings,
};

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub listen: ReceiverSettings,
    pub telemetry_endpoint: TelemetryEndpointSettings,
    #[serde(default)]
    pub log: LogSettings,
    #[serde(default)]
    pub templates: TemplateSettings,
    /// timeout of requests to dingtalk, reqwest's default if unset
    #[serde_as(as = "Option<DurationSecondsWithFrac<f64>>")]
    #[serde(default)]
    pub request_timeout: Option<Duration>,
    #[serde(default)]
    pub profiles: BTreeMap<String, ProfileSettings>,
}

impl Settings {
    /// parses the command line, then the config file, then `DINGHOOK__` prefixed
    /// environment variables
    pub fn load() -> Result<Self> {
        let opts = Command::new(clap::crate_name!())
            .version(clap::crate_version!())
            .about(clap::crate_description!())
            .author(clap::crate_authors!())
            .args(&[
                Arg::new("config")
                    .help("path of config file")
                    .takes_value(true)
                    .short('c')
                    .long("config")
                    .default_value("./config.yaml"),
                Arg::new("level")
                    .help("log level")
                    .possible_values(["Error", "Warn", "Info", "Debug", "Trace"])
                    .ignore_case(true)
                    .takes_value(true)
                    .long("log"),
            ])
            .get_matches();

        let config_path = opts
            .value_of("config")
            .context("config path has a default value")?;

        let mut settings = Self::from_config(
            Config::builder()
                .add_source(config::File::with_name(config_path))
                .add_source(
                    config::Environment::with_prefix("DINGHOOK")
                        .prefix_separator("__")
                        .separator("__"),
                ),
        )?;

        if let Some(level) = opts.value_of("level") {
            settings.log.level = level.to_string();
        }

        Ok(settings)
    }

    fn from_config(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        builder
            .build()
            .context("can't load config")?
            .try_deserialize()
            .context("can't load config")
    }
}

#[cfg(test)]
mod tests {
    use config::{File, FileFormat};

    use super::*;

    const CONFIG: &str = r#"
listen:
  bind_address: 0.0.0.0
  port: 8060
telemetry_endpoint:
  bind_address: 127.0.0.1
  port: 9060
request_timeout: 2.5
profiles:
  ops:
    url: https://oapi.dingtalk.com/robot/send?access_token=abc
    mention: "186,187"
  quiet:
    url: https://oapi.dingtalk.com/robot/send?access_token=def
"#;

    #[test]
    fn loads_yaml_config() {
        let settings =
            Settings::from_config(Config::builder().add_source(File::from_str(CONFIG, FileFormat::Yaml)))
                .unwrap();

        assert_eq!(settings.listen.port, 8060);
        assert_eq!(settings.request_timeout, Some(Duration::from_millis(2500)));
        assert_eq!(settings.log.level, "info");
        assert!(settings.templates.title.is_none());
        assert_eq!(settings.profiles["ops"].mention, "186,187");
        assert_eq!(settings.profiles["quiet"].mention, "");
    }

    #[test]
    fn listener_sections_are_required() {
        let res = Settings::from_config(
            Config::builder().add_source(File::from_str("profiles: {}", FileFormat::Yaml)),
        );

        assert!(res.is_err());
    }
}
