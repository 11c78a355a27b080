//! Runtime configuration, read from `FINGERSPAN_*` environment variables.

use std::{env, num::NonZeroU32, path::PathBuf, str::FromStr};

use anyhow::{bail, Context};

use crate::detector::DetectorConfig;

pub const ENV_WEBCAM_NAME: &str = "FINGERSPAN_WEBCAM_NAME";
pub const ENV_STILL_IMAGE: &str = "FINGERSPAN_STILL_IMAGE";
pub const ENV_DETECTOR: &str = "FINGERSPAN_DETECTOR";
pub const ENV_MIN_DETECTION_CONFIDENCE: &str = "FINGERSPAN_MIN_DETECTION_CONFIDENCE";
pub const ENV_MIN_TRACKING_CONFIDENCE: &str = "FINGERSPAN_MIN_TRACKING_CONFIDENCE";
pub const ENV_MAX_READ_FAILURES: &str = "FINGERSPAN_MAX_READ_FAILURES";
pub const ENV_WINDOW: &str = "FINGERSPAN_WINDOW";

const DEFAULT_DETECTOR: &str = "landmark-service";
const DEFAULT_WINDOW: &str = "CamOutput";

/// Where frames come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceConfig {
    /// Capture from a webcam, optionally selected by its card name.
    Webcam { name: Option<String> },
    /// Annotate the same still image over and over.
    StillImage(PathBuf),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub source: SourceConfig,
    /// Landmark service program and its arguments.
    pub detector_command: Vec<String>,
    pub detector: DetectorConfig,
    /// Number of consecutive failed frame reads after which the capture loop gives up.
    ///
    /// `None` retries forever.
    pub max_consecutive_read_failures: Option<NonZeroU32>,
    /// Title of the output window.
    pub window: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: SourceConfig::Webcam { name: None },
            detector_command: vec![DEFAULT_DETECTOR.to_string()],
            detector: DetectorConfig::default(),
            max_consecutive_read_failures: None,
            window: DEFAULT_WINDOW.to_string(),
        }
    }
}

impl Config {
    /// Reads the configuration from the process environment.
    ///
    /// Unset or empty variables keep their default value. Invalid values are an error.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| match env::var(name) {
            Ok(value) => Ok(Some(value)),
            Err(env::VarError::NotPresent) => Ok(None),
            Err(e) => Err(e).with_context(|| format!("invalid value for `{name}`")),
        })
    }

    fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> anyhow::Result<Option<String>>,
    {
        let vars = Vars(lookup);
        let mut config = Self::default();

        let webcam_name = vars.get(ENV_WEBCAM_NAME)?;
        config.source = match vars.get(ENV_STILL_IMAGE)? {
            Some(path) => {
                if webcam_name.is_some() {
                    log::warn!("`{ENV_STILL_IMAGE}` is set, ignoring `{ENV_WEBCAM_NAME}`");
                }
                SourceConfig::StillImage(path.into())
            }
            None => SourceConfig::Webcam { name: webcam_name },
        };

        if let Some(command) = vars.get(ENV_DETECTOR)? {
            config.detector_command = command.split_whitespace().map(String::from).collect();
        }

        let detection = vars
            .parse(ENV_MIN_DETECTION_CONFIDENCE)?
            .unwrap_or(config.detector.min_detection_confidence());
        let tracking = vars
            .parse(ENV_MIN_TRACKING_CONFIDENCE)?
            .unwrap_or(config.detector.min_tracking_confidence());
        config.detector = DetectorConfig::new(detection, tracking).with_context(|| {
            format!("invalid `{ENV_MIN_DETECTION_CONFIDENCE}` or `{ENV_MIN_TRACKING_CONFIDENCE}`")
        })?;

        config.max_consecutive_read_failures = vars.parse(ENV_MAX_READ_FAILURES)?;

        if let Some(window) = vars.get(ENV_WINDOW)? {
            config.window = window;
        }

        Ok(config)
    }
}

struct Vars<F>(F);

impl<F> Vars<F>
where
    F: Fn(&str) -> anyhow::Result<Option<String>>,
{
    /// Returns the value of `name`, treating empty values as unset.
    fn get(&self, name: &str) -> anyhow::Result<Option<String>> {
        Ok((self.0)(name)?.filter(|value| !value.trim().is_empty()))
    }

    fn parse<T>(&self, name: &str) -> anyhow::Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let Some(value) = self.get(name)? else {
            return Ok(None);
        };
        match value.trim().parse() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(e) => bail!("invalid value '{value}' for `{name}`: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();
        Config::from_lookup(|name| Ok(vars.get(name).cloned()))
    }

    #[test]
    fn defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.source, SourceConfig::Webcam { name: None });
        assert_eq!(config.detector_command, ["landmark-service"]);
        assert_eq!(config.window, "CamOutput");
        assert_eq!(config.max_consecutive_read_failures, None);
    }

    #[test]
    fn overrides() {
        let config = config(&[
            (ENV_WEBCAM_NAME, "HD Pro Webcam C920"),
            (ENV_DETECTOR, " python3  landmarks.py --model lite "),
            (ENV_MIN_DETECTION_CONFIDENCE, "0.7"),
            (ENV_MIN_TRACKING_CONFIDENCE, " 0.25"),
            (ENV_MAX_READ_FAILURES, "30"),
            (ENV_WINDOW, "Hands"),
        ])
        .unwrap();
        assert_eq!(
            config.source,
            SourceConfig::Webcam {
                name: Some("HD Pro Webcam C920".into())
            }
        );
        assert_eq!(
            config.detector_command,
            ["python3", "landmarks.py", "--model", "lite"]
        );
        assert_eq!(config.detector.min_detection_confidence(), 0.7);
        assert_eq!(config.detector.min_tracking_confidence(), 0.25);
        assert_eq!(config.max_consecutive_read_failures, NonZeroU32::new(30));
        assert_eq!(config.window, "Hands");
    }

    #[test]
    fn still_image_wins() {
        let config = config(&[
            (ENV_WEBCAM_NAME, "cam"),
            (ENV_STILL_IMAGE, "hand.jpg"),
        ])
        .unwrap();
        assert_eq!(config.source, SourceConfig::StillImage("hand.jpg".into()));
    }

    #[test]
    fn empty_is_unset() {
        let config = config(&[(ENV_DETECTOR, "  "), (ENV_MAX_READ_FAILURES, "")]).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn invalid_values_name_the_variable() {
        for vars in [
            [(ENV_MIN_DETECTION_CONFIDENCE, "high")],
            [(ENV_MIN_TRACKING_CONFIDENCE, "1.5")],
            [(ENV_MAX_READ_FAILURES, "0")],
            [(ENV_MAX_READ_FAILURES, "-3")],
        ] {
            let err = config(&vars).unwrap_err();
            let msg = format!("{err:#}");
            assert!(msg.contains(vars[0].0), "{msg}");
        }
    }
}
