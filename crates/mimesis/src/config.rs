//! Mapper settings, loadable from JSON, YAML or TOML.
//!
//! ```toml
//! element_policy = "strict"
//!
//! [profiles."User -> UserDto"]
//! ignore = ["password"]
//! ```

use crate::profile::TypePair;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// What to do with a complex collection element that has no mapping to the
/// destination element type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementPolicy {
    /// Put the element into the destination collection as-is.
    #[default]
    PassThrough,
    /// Fail the mapping call.
    Strict,
}

/// Extra settings for one type pair, merged into its configuration at
/// registration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileOverride {
    /// Additional source properties to ignore.
    pub ignore: Vec<String>,
}

/// Mapper-wide settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperConfig {
    pub element_policy: ElementPolicy,
    /// Overrides keyed by `"Source -> Destination"`, using unqualified type
    /// names.
    pub profiles: IndexMap<String, ProfileOverride>,
}

impl MapperConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn element_policy(mut self, policy: ElementPolicy) -> Self {
        self.element_policy = policy;
        self
    }

    /// Ignore `name` whenever `pair` (e.g. `"User -> UserDto"`) is registered.
    pub fn ignore(mut self, pair: impl Into<String>, name: impl Into<String>) -> Self {
        self.profiles
            .entry(pair.into())
            .or_default()
            .ignore
            .push(name.into());
        self
    }

    /// Extra ignored names for `pair`, from every matching override.
    pub fn ignored_for(&self, pair: &TypePair) -> impl Iterator<Item = &str> {
        let source = pair.source.short_name();
        let destination = pair.destination.short_name();
        self.profiles
            .iter()
            .filter(move |(key, _)| {
                parse_pair_key(key).is_some_and(|(s, d)| s == source && d == destination)
            })
            .flat_map(|(_, profile)| profile.ignore.iter().map(String::as_str))
    }

    /// Parse settings, picking the format from the file extension
    /// (YAML when unknown).
    pub fn from_bytes(data: &[u8], path: Option<&str>) -> Result<Self, MapperConfigError> {
        let format = path
            .and_then(detect_format)
            .unwrap_or_else(|| "yaml".to_string());

        Self::from_bytes_format(data, &format)
    }

    /// Parse settings with an explicit format.
    pub fn from_bytes_format(data: &[u8], format: &str) -> Result<Self, MapperConfigError> {
        match format {
            "json" => {
                serde_json::from_slice(data).map_err(|e| MapperConfigError::Parse(e.to_string()))
            }
            "yaml" | "yml" => {
                serde_yaml::from_slice(data).map_err(|e| MapperConfigError::Parse(e.to_string()))
            }
            "toml" => {
                let s = std::str::from_utf8(data)
                    .map_err(|e| MapperConfigError::Parse(format!("Invalid UTF-8: {}", e)))?;
                toml::from_str(s).map_err(|e| MapperConfigError::Parse(e.to_string()))
            }
            _ => Err(MapperConfigError::UnsupportedFormat(format.to_string())),
        }
    }

    pub fn to_bytes(&self, format: &str) -> Result<Vec<u8>, MapperConfigError> {
        match format {
            "json" => serde_json::to_vec_pretty(self)
                .map_err(|e| MapperConfigError::Parse(e.to_string())),
            "yaml" | "yml" => serde_yaml::to_string(self)
                .map(|s| s.into_bytes())
                .map_err(|e| MapperConfigError::Parse(e.to_string())),
            "toml" => toml::to_string_pretty(self)
                .map(|s| s.into_bytes())
                .map_err(|e| MapperConfigError::Parse(e.to_string())),
            _ => Err(MapperConfigError::UnsupportedFormat(format.to_string())),
        }
    }
}

/// Errors from loading or saving [`MapperConfig`].
#[derive(Debug, thiserror::Error)]
pub enum MapperConfigError {
    #[error("failed to parse mapper config: {0}")]
    Parse(String),

    #[error("unsupported config format: {0}")]
    UnsupportedFormat(String),
}

fn detect_format(path: &str) -> Option<String> {
    let ext = path.rsplit('.').next()?;
    match ext.to_lowercase().as_str() {
        "json" => Some("json".into()),
        "yaml" | "yml" => Some("yaml".into()),
        "toml" => Some("toml".into()),
        _ => None,
    }
}

/// Split `"A -> B"` into its trimmed halves.
fn parse_pair_key(key: &str) -> Option<(&str, &str)> {
    let (source, destination) = key.split_once("->")?;
    Some((source.trim(), destination.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct User;
    struct UserDto;

    #[test]
    fn test_defaults() {
        let config = MapperConfig::default();
        assert_eq!(config.element_policy, ElementPolicy::PassThrough);
        assert!(config.profiles.is_empty());
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
element_policy = "strict"

[profiles."User -> UserDto"]
ignore = ["password", "salt"]
"#;
        let config = MapperConfig::from_bytes(toml.as_bytes(), Some("mapper.toml")).unwrap();

        assert_eq!(config.element_policy, ElementPolicy::Strict);
        let ignored: Vec<_> = config.ignored_for(&TypePair::of::<User, UserDto>()).collect();
        assert_eq!(ignored, vec!["password", "salt"]);
    }

    #[test]
    fn test_parse_yaml_default_format() {
        let yaml = "profiles:\n  UserDto->User:\n    ignore: [id]\n";
        let config = MapperConfig::from_bytes(yaml.as_bytes(), None).unwrap();

        assert_eq!(config.element_policy, ElementPolicy::PassThrough);
        let ignored: Vec<_> = config.ignored_for(&TypePair::of::<UserDto, User>()).collect();
        assert_eq!(ignored, vec!["id"]);
        assert_eq!(
            config.ignored_for(&TypePair::of::<User, UserDto>()).count(),
            0
        );
    }

    #[test]
    fn test_json_roundtrip() {
        let config = MapperConfig::new()
            .element_policy(ElementPolicy::Strict)
            .ignore("User -> UserDto", "password");

        let bytes = config.to_bytes("json").unwrap();
        let parsed = MapperConfig::from_bytes_format(&bytes, "json").unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_unsupported_format() {
        let err = MapperConfig::from_bytes_format(b"", "ron").unwrap_err();
        assert!(matches!(err, MapperConfigError::UnsupportedFormat(_)));

        let err = MapperConfig::from_bytes_format(b"element_policy = 3", "toml").unwrap_err();
        assert!(matches!(err, MapperConfigError::Parse(_)));
    }
}
