use std::time::Duration;

use crate::ConfigError;

/// Batching knobs shared by every loader built from them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LoaderConfig {
    /// How long a batch collects keys before it is dispatched.
    #[cfg_attr(feature = "serde", serde(rename = "wait_ms", with = "millis"))]
    pub wait: Duration,
    /// Upper bound on keys per dispatch, `0` means unbounded.
    pub max_batch_size: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        LoaderConfig {
            wait: Duration::from_millis(100),
            max_batch_size: 100,
        }
    }
}

impl LoaderConfig {
    /// Specify how long a batch stays open, the default is `100ms`.
    #[must_use]
    pub fn wait(self, wait: Duration) -> Self {
        Self { wait, ..self }
    }

    /// Specify the max batch size, the default is `100`.
    ///
    /// A batch reaching this many keys is dispatched immediately, without
    /// waiting for its timer.
    #[must_use]
    pub fn max_batch_size(self, max_batch_size: usize) -> Self {
        Self {
            max_batch_size,
            ..self
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.wait.is_zero() && self.max_batch_size > 0 {
            return Err(ConfigError::ZeroWait {
                max_batch_size: self.max_batch_size,
            });
        }
        Ok(())
    }
}

#[cfg(feature = "serde")]
mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(wait: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(ms)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = LoaderConfig::default();
        assert_eq!(Duration::from_millis(100), config.wait);
        assert_eq!(100, config.max_batch_size);
        assert_eq!(Ok(()), config.validate());
    }

    #[test]
    fn zero_wait_needs_unbounded_batches() {
        let config = LoaderConfig::default().wait(Duration::ZERO);
        assert_eq!(
            Err(ConfigError::ZeroWait { max_batch_size: 100 }),
            config.validate()
        );
        assert_eq!(Ok(()), config.max_batch_size(0).validate());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn deserialize_with_defaults() {
        let config: LoaderConfig = serde_json::from_str(r#"{"wait_ms": 25}"#).unwrap();
        assert_eq!(Duration::from_millis(25), config.wait);
        assert_eq!(100, config.max_batch_size);

        let json = serde_json::to_value(config).unwrap();
        assert_eq!(serde_json::json!({"wait_ms": 25, "max_batch_size": 100}), json);
    }
}
