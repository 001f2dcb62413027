use std::fmt;
use thiserror::Error;

/// Descriptor fields, named the way they appear in descriptor files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    SourceDirectory,
    IncludePatterns,
    ExcludePatterns,
    OutputPath,
    IgnoredQueryParameterPatterns,
}

impl Field {
    pub fn as_str(self) -> &'static str {
        match self {
            Field::SourceDirectory => "source_directory",
            Field::IncludePatterns => "include_patterns",
            Field::ExcludePatterns => "exclude_patterns",
            Field::OutputPath => "output_path",
            Field::IgnoredQueryParameterPatterns => "ignored_query_parameter_patterns",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a single pattern failed to compile.
#[derive(Debug, Error)]
pub enum PatternError {
    #[error(transparent)]
    Glob(#[from] globset::Error),
    #[error(transparent)]
    Regex(#[from] regex::Error),
}

/// Load-time validation failures for a descriptor.
#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("missing required field `{field}` (absent or empty)")]
    MissingField { field: Field },

    #[error("invalid pattern in `{field}`[{index}]: {pattern:?}")]
    InvalidPattern {
        field: Field,
        index: usize,
        pattern: String,
        #[source]
        source: PatternError,
    },

    #[error("unknown field(s) {}", keys.iter().map(|k| format!("`{k}`")).collect::<Vec<_>>().join(", "))]
    UnknownField { keys: Vec<String> },
}

impl DescriptorError {
    /// The known field the diagnostic points at, if any.
    pub fn field(&self) -> Option<Field> {
        match self {
            DescriptorError::MissingField { field } => Some(*field),
            DescriptorError::InvalidPattern { field, .. } => Some(*field),
            DescriptorError::UnknownField { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_field_names_the_field() {
        let err = DescriptorError::MissingField {
            field: Field::OutputPath,
        };
        assert!(err.to_string().contains("output_path"));
        assert_eq!(err.field(), Some(Field::OutputPath));
    }

    #[test]
    fn invalid_pattern_keeps_the_source() {
        let source = regex::Regex::new("(").unwrap_err();
        let err = DescriptorError::InvalidPattern {
            field: Field::IgnoredQueryParameterPatterns,
            index: 2,
            pattern: "(".to_string(),
            source: source.into(),
        };
        let display = err.to_string();
        assert!(display.contains("ignored_query_parameter_patterns[2]"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn unknown_field_lists_every_key() {
        let err = DescriptorError::UnknownField {
            keys: vec!["exclude_pattern".into(), "swdest".into()],
        };
        assert_eq!(err.to_string(), "unknown field(s) `exclude_pattern`, `swdest`");
        assert_eq!(err.field(), None);
    }
}
