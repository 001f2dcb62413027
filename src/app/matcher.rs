use crate::app::error::{DescriptorError, Field};
use crate::app::models::ConfigurationDescriptor;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use pathdiff::diff_paths;
use regex::Regex;
use std::fmt;
use std::path::{Component, Path};
use url::{form_urlencoded, Url};

/// Outcome of checking one relative path against a descriptor.
///
/// Dotfiles follow the consuming tool's glob defaults: a path with a segment
/// starting with `.` is only selected by an include pattern that itself has
/// a segment starting with `.` (e.g. `.well-known/*.json`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Included,
    Excluded,
    NotIncluded,
    /// A dot segment that no include pattern names explicitly.
    Hidden,
    /// The path is the generated artifact itself.
    OutputArtifact,
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Selection::Included => "selected",
            Selection::Excluded => "excluded (exclude_patterns)",
            Selection::NotIncluded => "skipped (no include_patterns match)",
            Selection::Hidden => "skipped (dotfile)",
            Selection::OutputArtifact => "excluded (output_path)",
        };
        f.write_str(label)
    }
}

/// Compiled form of a descriptor, for answering selection and cache-key questions.
pub struct PrecacheMatcher {
    include_set: GlobSet,
    dot_include_set: GlobSet,
    exclude_set: GlobSet,
    ignored_params: Vec<Regex>,
    output_relative: Option<String>,
}

impl PrecacheMatcher {
    pub fn new(descriptor: &ConfigurationDescriptor) -> Result<Self, DescriptorError> {
        let output_relative =
            output_inside_source(descriptor.source_directory(), descriptor.output_path());
        if let Some(relative) = &output_relative {
            log::debug!("Output path is inside the source directory; leaving out {relative}");
        }

        let dot_patterns: Vec<String> = descriptor
            .include_patterns()
            .iter()
            .filter(|pat| has_dot_segment(pat))
            .cloned()
            .collect();

        Ok(Self {
            include_set: build_globset(Field::IncludePatterns, descriptor.include_patterns())?,
            dot_include_set: build_globset(Field::IncludePatterns, &dot_patterns)?,
            exclude_set: build_globset(Field::ExcludePatterns, descriptor.exclude_patterns())?,
            ignored_params: build_regexes(
                Field::IgnoredQueryParameterPatterns,
                descriptor.ignored_query_parameter_patterns(),
            )?,
            output_relative,
        })
    }

    /// Exclusion wins over inclusion; the output artifact is never selected.
    pub fn select(&self, relative_path: &str) -> Selection {
        let normalized = normalize_relative(relative_path);

        if self.output_relative.as_deref() == Some(normalized.as_str()) {
            return Selection::OutputArtifact;
        }
        if self.exclude_set.is_match(&normalized) {
            return Selection::Excluded;
        }
        if has_dot_segment(&normalized) {
            return if self.dot_include_set.is_match(&normalized) {
                Selection::Included
            } else {
                Selection::Hidden
            };
        }
        if self.include_set.is_match(&normalized) {
            Selection::Included
        } else {
            Selection::NotIncluded
        }
    }

    pub fn is_selected(&self, relative_path: &str) -> bool {
        self.select(relative_path) == Selection::Included
    }

    /// Drop every query parameter whose name matches an ignored pattern.
    ///
    /// Kept parameters stay byte-for-byte as they were, and a URL with
    /// nothing to drop comes back unchanged.
    pub fn cache_key(&self, url: &Url) -> Url {
        let Some(query) = url.query() else {
            return url.clone();
        };

        let mut dropped = false;
        let kept: Vec<&str> = query
            .split('&')
            .filter(|piece| {
                let ignored = self.is_ignored_param(piece);
                dropped |= ignored;
                !ignored
            })
            .collect();

        if !dropped {
            return url.clone();
        }

        let mut key = url.clone();
        let kept: Vec<&str> = kept.into_iter().filter(|piece| !piece.is_empty()).collect();
        if kept.is_empty() {
            key.set_query(None);
        } else {
            key.set_query(Some(&kept.join("&")));
        }
        key
    }

    fn is_ignored_param(&self, piece: &str) -> bool {
        let Some((name, _)) = form_urlencoded::parse(piece.as_bytes()).next() else {
            return false;
        };
        self.ignored_params.iter().any(|re| re.is_match(&name))
    }
}

fn has_dot_segment(path: &str) -> bool {
    path.split('/').any(|segment| segment.starts_with('.') && segment != "." && segment != "..")
}

/// Forward slashes only, no leading `./`.
fn normalize_relative(path: &str) -> String {
    let normalized = path.replace('\\', "/");
    let mut trimmed = normalized.as_str();
    while let Some(rest) = trimmed.strip_prefix("./") {
        trimmed = rest;
    }
    trimmed.to_string()
}

fn output_inside_source(source_directory: &str, output_path: &str) -> Option<String> {
    let source = normalize_relative(source_directory);
    let output = normalize_relative(output_path);
    let relative = diff_paths(Path::new(&output), Path::new(&source))?;

    if relative.as_os_str().is_empty()
        || relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
    {
        return None;
    }
    Some(normalize_relative(&relative.to_string_lossy()))
}

/// Compile globs so that `*` stops at `/` and `**` crosses directories.
pub(crate) fn build_globset(field: Field, patterns: &[String]) -> Result<GlobSet, DescriptorError> {
    let mut builder = GlobSetBuilder::new();
    for (index, pat) in patterns.iter().enumerate() {
        let glob = GlobBuilder::new(pat)
            .literal_separator(true)
            .build()
            .map_err(|source| DescriptorError::InvalidPattern {
                field,
                index,
                pattern: pat.clone(),
                source: source.into(),
            })?;
        builder.add(glob);
    }
    // Only fails when the combined automaton is too large.
    builder.build().map_err(|source| DescriptorError::InvalidPattern {
        field,
        index: 0,
        pattern: patterns.join(", "),
        source: source.into(),
    })
}

pub(crate) fn build_regexes(field: Field, patterns: &[String]) -> Result<Vec<Regex>, DescriptorError> {
    patterns
        .iter()
        .enumerate()
        .map(|(index, pat)| {
            Regex::new(pat).map_err(|source| DescriptorError::InvalidPattern {
                field,
                index,
                pattern: pat.clone(),
                source: source.into(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::models::RawDescriptor;

    fn matcher() -> PrecacheMatcher {
        PrecacheMatcher::new(&ConfigurationDescriptor::builtin().unwrap()).unwrap()
    }

    #[test]
    fn standard_profile_selection() {
        let m = matcher();
        assert!(m.is_selected("index.html"));
        assert!(m.is_selected("js/app.js"));
        assert!(m.is_selected("./blog/post/index.html"));
        assert_eq!(m.select("js/cljs-runtime/goog.base.js"), Selection::Excluded);
        assert_eq!(m.select("css/site.css"), Selection::NotIncluded);
        assert_eq!(m.select("sw.js"), Selection::OutputArtifact);
    }

    #[test]
    fn single_star_does_not_cross_directories() {
        let m = matcher();
        // Only direct children of js/cljs-runtime are excluded.
        assert!(m.is_selected("js/cljs-runtime/nested/deep.js"));
        assert!(m.is_selected("js\\main.js"));
    }

    #[test]
    fn output_outside_source_is_not_special() {
        assert_eq!(output_inside_source("public/", "dist/sw.js"), None);
        assert_eq!(output_inside_source("public", "public"), None);
        assert_eq!(
            output_inside_source("./public/", "public/workers/sw.js").as_deref(),
            Some("workers/sw.js")
        );
    }

    #[test]
    fn cache_key_strips_ignored_parameters() {
        let m = matcher();
        let url = Url::parse("https://a.test/?utm_source=x&id=1&fbclid=y").unwrap();
        assert_eq!(m.cache_key(&url).as_str(), "https://a.test/?id=1");
    }

    #[test]
    fn cache_key_drops_empty_query() {
        let m = matcher();
        let url = Url::parse("https://a.test/page.html?utm_medium=mail&utm_campaign=z#top").unwrap();
        assert_eq!(m.cache_key(&url).as_str(), "https://a.test/page.html#top");
    }

    #[test]
    fn cache_key_anchors_are_respected() {
        let m = matcher();
        // `^fbclid$` matches the exact name only.
        let url = Url::parse("https://a.test/?fbclid_extra=1&b=2").unwrap();
        assert_eq!(m.cache_key(&url).as_str(), "https://a.test/?fbclid_extra=1&b=2");

        let plain = Url::parse("https://a.test/app.js").unwrap();
        assert_eq!(m.cache_key(&plain), plain);
    }

    #[test]
    fn unfiltered_profile_keeps_runtime() {
        let descriptor = RawDescriptor::builtin_base().validate().unwrap();
        let m = PrecacheMatcher::new(&descriptor).unwrap();
        assert!(m.is_selected("js/cljs-runtime/goog.base.js"));
    }

    #[test]
    fn glob_errors_point_at_the_entry() {
        let patterns = vec!["**/*.html".to_string(), "{a,b".to_string()];
        match build_globset(Field::IncludePatterns, &patterns) {
            Err(DescriptorError::InvalidPattern { index, pattern, .. }) => {
                assert_eq!(index, 1);
                assert_eq!(pattern, "{a,b");
            }
            _ => panic!("expected an invalid pattern"),
        }
    }

    #[test]
    fn cache_key_leaves_unmatched_urls_alone() {
        let m = matcher();
        for raw in [
            "https://a.test/?q=a%20b",
            "https://a.test/?flag&x=1",
            "https://a.test/?v=%2Bb~",
        ] {
            let url = Url::parse(raw).unwrap();
            assert_eq!(m.cache_key(&url).as_str(), raw);
        }
    }

    #[test]
    fn cache_key_keeps_remaining_parameters_verbatim() {
        let m = matcher();
        let url = Url::parse("https://a.test/?flag&utm_source=x&q=a%20b&v=%2Bb~").unwrap();
        assert_eq!(m.cache_key(&url).as_str(), "https://a.test/?flag&q=a%20b&v=%2Bb~");

        // Names are compared decoded.
        let encoded = Url::parse("https://a.test/?utm%5Fsource=x&id=1").unwrap();
        assert_eq!(m.cache_key(&encoded).as_str(), "https://a.test/?id=1");
    }

    #[test]
    fn dotfiles_need_an_explicit_pattern() {
        let m = matcher();
        assert_eq!(m.select(".hidden.html"), Selection::Hidden);
        assert_eq!(m.select(".well-known/x.js"), Selection::Hidden);
        assert_eq!(m.select("js/.cache/app.js"), Selection::Hidden);

        let descriptor = RawDescriptor {
            include_patterns: Some(vec!["**/*.js".into(), ".well-known/*.js".into()]),
            ..RawDescriptor::builtin_base()
        }
        .validate()
        .unwrap();
        let m = PrecacheMatcher::new(&descriptor).unwrap();
        assert!(m.is_selected(".well-known/x.js"));
        assert!(m.is_selected("app.js"));
        assert!(!m.is_selected("js/.cache/app.js"));
    }
}
