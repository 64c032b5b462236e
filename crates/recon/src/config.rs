use serde::Deserialize;

use crate::error::ReconError;

pub const DEFAULT_BATCH_LIMIT: usize = 50;
pub const MAX_BATCH_LIMIT: usize = 1000;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReconConfig {
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub meta_keys: MetaKeys,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

// ---------------------------------------------------------------------------
// Batch
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchConfig {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    DEFAULT_BATCH_LIMIT
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { limit: DEFAULT_BATCH_LIMIT }
    }
}

// ---------------------------------------------------------------------------
// Term meta keys
// ---------------------------------------------------------------------------

/// Names of the term-meta slots the engine reads and writes.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetaKeys {
    /// Slot holding the linked user id.
    pub link: String,
    /// Verified user email (first source).
    pub user_email: String,
    /// Generic email (second source).
    pub email: String,
    /// Email under the alternate storage convention (last source).
    pub alt_email: String,
    pub display_name: String,
    pub user_url: String,
    pub description: String,
}

impl Default for MetaKeys {
    fn default() -> Self {
        Self {
            link: "user_id".into(),
            user_email: "user_email".into(),
            email: "email".into(),
            alt_email: "ma_email".into(),
            display_name: "display_name".into(),
            user_url: "user_url".into(),
            description: "description".into(),
        }
    }
}

impl MetaKeys {
    fn all(&self) -> [(&'static str, &str); 7] {
        [
            ("link", self.link.as_str()),
            ("user_email", self.user_email.as_str()),
            ("email", self.email.as_str()),
            ("alt_email", self.alt_email.as_str()),
            ("display_name", self.display_name.as_str()),
            ("user_url", self.user_url.as_str()),
            ("description", self.description.as_str()),
        ]
    }
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PolicyConfig {
    /// When true, bulk runs skip authors linked to a different user unless forced.
    /// Off by default: bulk runs rewrite every email match.
    pub bulk_respects_force: bool,
    pub ambiguity: AmbiguityPolicy,
}

/// What to do when a display-name lookup returns several users.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmbiguityPolicy {
    #[default]
    FirstWins,
    Reject,
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    /// Request token the driver must present. `None` disables the token check.
    pub token: Option<String>,
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &std::path::Path) -> Result<Self, ReconError> {
        let input = std::fs::read_to_string(path)?;
        Self::from_toml(&input)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.batch.limit == 0 || self.batch.limit > MAX_BATCH_LIMIT {
            return Err(ReconError::ConfigValidation(format!(
                "batch.limit must be between 1 and {MAX_BATCH_LIMIT}, got {}",
                self.batch.limit
            )));
        }

        let keys = self.meta_keys.all();
        for (field, value) in &keys {
            if value.trim().is_empty() {
                return Err(ReconError::ConfigValidation(format!(
                    "meta_keys.{field} must not be empty"
                )));
            }
        }

        // The link slot and the email sources must not alias each other
        for (i, (field_a, a)) in keys.iter().enumerate().take(4) {
            for (field_b, b) in keys.iter().take(4).skip(i + 1) {
                if a == b {
                    return Err(ReconError::ConfigValidation(format!(
                        "meta_keys.{field_a} and meta_keys.{field_b} both use '{a}'"
                    )));
                }
            }
        }

        if let Some(token) = &self.auth.token {
            if token.is_empty() {
                return Err(ReconError::ConfigValidation(
                    "auth.token must not be empty when set".into(),
                ));
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
