//! Host configuration.
//!
//! With the `policy-config` feature, a [`HostConfig`] can be loaded from a
//! TOML policy file:
//!
//! ```toml
//! default_debounce_ms = 300
//! retain_removed_values = true
//! ```

use web_time::Duration;

/// Default delay for sources registered with `Debounce::Default`.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(250);

/// Host behavior knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    /// Delay used when a source asks for the default debounce.
    pub default_debounce: Duration,
    /// Keep a removed source's value and hand it back when a source with the
    /// same name registers again. While the retained value is in place, the
    /// first `init` of the new registration is ignored.
    pub retain_removed_values: bool,
}

impl HostConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn default_debounce(mut self, delay: Duration) -> Self {
        self.default_debounce = delay;
        self
    }

    #[must_use]
    pub fn retain_removed_values(mut self, retain: bool) -> Self {
        self.retain_removed_values = retain;
        self
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            default_debounce: DEFAULT_DEBOUNCE,
            retain_removed_values: false,
        }
    }
}

/// Error loading a [`HostConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The policy text could not be parsed.
    Parse(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(msg) => write!(f, "invalid host policy: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(feature = "policy-config")]
#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct HostPolicy {
    default_debounce_ms: Option<u64>,
    retain_removed_values: Option<bool>,
}

#[cfg(feature = "policy-config")]
impl HostConfig {
    /// Parse a TOML policy. Missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] when the text is not valid TOML or carries
    /// unknown keys.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let policy: HostPolicy =
            toml::from_str(text).map_err(|err| ConfigError::Parse(err.to_string()))?;
        let mut config = Self::default();
        if let Some(ms) = policy.default_debounce_ms {
            config.default_debounce = Duration::from_millis(ms);
        }
        if let Some(retain) = policy.retain_removed_values {
            config.retain_removed_values = retain;
        }
        Ok(config)
    }
}
