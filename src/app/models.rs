use crate::app::error::{DescriptorError, Field};
use crate::app::matcher::{build_globset, build_regexes};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

/// Profile applied when neither the CLI nor the descriptor file names one.
pub const DEFAULT_PROFILE: &str = "standard";

/// Unvalidated descriptor as read from files, profiles and CLI flags.
///
/// Every field is optional so partial profiles can be layered. The external
/// tool's key names are accepted as aliases. Any other key lands in
/// `unknown_keys` and is rejected by [`RawDescriptor::validate`].
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct RawDescriptor {
    #[serde(alias = "globDirectory")]
    pub source_directory: Option<String>,
    #[serde(alias = "globPatterns")]
    pub include_patterns: Option<Vec<String>>,
    #[serde(alias = "globIgnores")]
    pub exclude_patterns: Option<Vec<String>>,
    #[serde(alias = "swDest")]
    pub output_path: Option<String>,
    #[serde(alias = "ignoreURLParametersMatching")]
    pub ignored_query_parameter_patterns: Option<Vec<String>>,
    #[serde(flatten)]
    pub unknown_keys: BTreeMap<String, serde_json::Value>,
}

impl RawDescriptor {
    /// Base descriptor shared by every built-in profile.
    pub fn builtin_base() -> Self {
        Self {
            source_directory: Some("public/".into()),
            include_patterns: Some(vec!["**/*.{html,js}".into()]),
            exclude_patterns: None,
            output_path: Some("public/sw.js".into()),
            ignored_query_parameter_patterns: Some(vec!["^utm_".into(), "^fbclid$".into()]),
            unknown_keys: BTreeMap::new(),
        }
    }

    /// Named overrides shipped with the tool.
    ///
    /// `standard` leaves the ClojureScript dev runtime out of the precache;
    /// `unfiltered` takes the base as is.
    pub fn builtin_profiles() -> BTreeMap<String, RawDescriptor> {
        let mut profiles = BTreeMap::new();
        profiles.insert(
            "standard".to_string(),
            RawDescriptor {
                exclude_patterns: Some(vec!["js/cljs-runtime/*".into()]),
                ..Default::default()
            },
        );
        profiles.insert("unfiltered".to_string(), RawDescriptor::default());
        profiles
    }

    /// Layer `overlay` on top of `self`. Strings replace, lists append.
    pub fn merge(self, overlay: RawDescriptor) -> RawDescriptor {
        let mut unknown_keys = self.unknown_keys;
        unknown_keys.extend(overlay.unknown_keys);
        RawDescriptor {
            source_directory: overlay.source_directory.or(self.source_directory),
            include_patterns: merge_vecs(self.include_patterns, overlay.include_patterns),
            exclude_patterns: merge_vecs(self.exclude_patterns, overlay.exclude_patterns),
            output_path: overlay.output_path.or(self.output_path),
            ignored_query_parameter_patterns: merge_vecs(
                self.ignored_query_parameter_patterns,
                overlay.ignored_query_parameter_patterns,
            ),
            unknown_keys,
        }
    }

    /// Check required fields and compile every pattern.
    pub fn validate(self) -> Result<ConfigurationDescriptor, DescriptorError> {
        if !self.unknown_keys.is_empty() {
            return Err(DescriptorError::UnknownField {
                keys: self.unknown_keys.into_keys().collect(),
            });
        }
        let source_directory = require_text(self.source_directory, Field::SourceDirectory)?;
        let include_patterns = match self.include_patterns {
            Some(patterns) if !patterns.is_empty() => patterns,
            _ => {
                return Err(DescriptorError::MissingField {
                    field: Field::IncludePatterns,
                })
            }
        };
        let exclude_patterns = self.exclude_patterns.unwrap_or_default();
        let output_path = require_text(self.output_path, Field::OutputPath)?;
        let ignored_query_parameter_patterns =
            self.ignored_query_parameter_patterns
                .ok_or(DescriptorError::MissingField {
                    field: Field::IgnoredQueryParameterPatterns,
                })?;

        build_globset(Field::IncludePatterns, &include_patterns)?;
        build_globset(Field::ExcludePatterns, &exclude_patterns)?;
        build_regexes(
            Field::IgnoredQueryParameterPatterns,
            &ignored_query_parameter_patterns,
        )?;

        Ok(ConfigurationDescriptor {
            source_directory,
            include_patterns,
            exclude_patterns,
            output_path,
            ignored_query_parameter_patterns,
        })
    }
}

fn require_text(value: Option<String>, field: Field) -> Result<String, DescriptorError> {
    match value {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(DescriptorError::MissingField { field }),
    }
}

/// Append, keeping the first occurrence of each entry.
fn merge_vecs(base: Option<Vec<String>>, overlay: Option<Vec<String>>) -> Option<Vec<String>> {
    if base.is_none() && overlay.is_none() {
        return None;
    }
    let mut combined = base.unwrap_or_default();
    if let Some(mut items) = overlay {
        combined.append(&mut items);
    }
    let mut seen = HashSet::new();
    combined.retain(|item| seen.insert(item.clone()));
    Some(combined)
}

/// Validated, immutable precache descriptor handed to the external build tool.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(try_from = "RawDescriptor")]
pub struct ConfigurationDescriptor {
    source_directory: String,
    include_patterns: Vec<String>,
    exclude_patterns: Vec<String>,
    output_path: String,
    ignored_query_parameter_patterns: Vec<String>,
}

impl ConfigurationDescriptor {
    /// The descriptor the tool ships with: the base plus the default profile.
    pub fn builtin() -> Result<Self, DescriptorError> {
        let profile = RawDescriptor::builtin_profiles()
            .remove(DEFAULT_PROFILE)
            .unwrap_or_default();
        RawDescriptor::builtin_base().merge(profile).validate()
    }

    pub fn source_directory(&self) -> &str {
        &self.source_directory
    }

    pub fn include_patterns(&self) -> &[String] {
        &self.include_patterns
    }

    pub fn exclude_patterns(&self) -> &[String] {
        &self.exclude_patterns
    }

    pub fn output_path(&self) -> &str {
        &self.output_path
    }

    pub fn ignored_query_parameter_patterns(&self) -> &[String] {
        &self.ignored_query_parameter_patterns
    }
}

impl TryFrom<RawDescriptor> for ConfigurationDescriptor {
    type Error = DescriptorError;

    fn try_from(raw: RawDescriptor) -> Result<Self, Self::Error> {
        raw.validate()
    }
}

/// Where the base descriptor came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorOrigin {
    File(PathBuf),
    Builtin,
}

/// The final descriptor after merging file, profile and CLI overrides.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub descriptor: ConfigurationDescriptor,
    pub origin: DescriptorOrigin,
    pub profile: Option<String>,
}
