use crate::app::cli::OutputFormat;
use crate::app::models::{ConfigurationDescriptor, DescriptorOrigin, ResolvedConfig};
use anyhow::{bail, Context, Result};

pub struct OutputGenerator;

impl OutputGenerator {
    pub fn render(descriptor: &ConfigurationDescriptor, format: OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Json => Self::generate_json(descriptor),
            OutputFormat::Toml => Self::generate_toml(descriptor),
            OutputFormat::Workbox => Self::generate_workbox_module(descriptor),
        }
    }

    pub fn generate_json(descriptor: &ConfigurationDescriptor) -> Result<String> {
        serde_json::to_string_pretty(descriptor).context("Failed to serialize descriptor as JSON")
    }

    pub fn generate_toml(descriptor: &ConfigurationDescriptor) -> Result<String> {
        toml::to_string(descriptor).context("Failed to serialize descriptor as TOML")
    }

    /// CommonJS config module in the shape the precaching tool reads.
    pub fn generate_workbox_module(descriptor: &ConfigurationDescriptor) -> Result<String> {
        let mut out = String::from("module.exports = {\n");

        out.push_str(&format!(
            "\tglobDirectory: {},\n",
            js_string(descriptor.source_directory())?
        ));
        out.push_str(&format!(
            "\tglobPatterns: {},\n",
            js_array(descriptor.include_patterns().iter().map(|p| js_string(p)))?
        ));
        if !descriptor.exclude_patterns().is_empty() {
            out.push_str(&format!(
                "\tglobIgnores: {},\n",
                js_array(descriptor.exclude_patterns().iter().map(|p| js_string(p)))?
            ));
        }
        out.push_str(&format!(
            "\tswDest: {},\n",
            js_string(descriptor.output_path())?
        ));
        out.push_str(&format!(
            "\tignoreURLParametersMatching: {}\n",
            js_array(
                descriptor
                    .ignored_query_parameter_patterns()
                    .iter()
                    .map(|p| {
                        js_regex(p).with_context(|| {
                            format!("Cannot render ignored_query_parameter_patterns entry {p:?}")
                        })
                    })
            )?
        ));

        out.push_str("};");
        Ok(out)
    }

    /// One-line report for `--check`.
    pub fn summary(resolved: &ResolvedConfig) -> String {
        let origin = match &resolved.origin {
            DescriptorOrigin::File(path) => path.display().to_string(),
            DescriptorOrigin::Builtin => "built-in descriptor".to_string(),
        };
        let profile = resolved.profile.as_deref().unwrap_or("none");
        let descriptor = &resolved.descriptor;
        format!(
            "ok: {} (profile: {}) -> {} from {}, {} include / {} exclude / {} ignored params",
            origin,
            profile,
            descriptor.output_path(),
            descriptor.source_directory(),
            descriptor.include_patterns().len(),
            descriptor.exclude_patterns().len(),
            descriptor.ignored_query_parameter_patterns().len()
        )
    }
}

fn js_string(value: &str) -> Result<String> {
    serde_json::to_string(value).context("Failed to encode string literal")
}

fn js_array(items: impl Iterator<Item = Result<String>>) -> Result<String> {
    let items = items.collect::<Result<Vec<_>>>()?;
    if items.is_empty() {
        return Ok("[]".to_string());
    }
    let mut out = String::from("[\n");
    out.push_str(
        &items
            .iter()
            .map(|item| format!("\t\t{item}"))
            .collect::<Vec<_>>()
            .join(",\n"),
    );
    out.push_str("\n\t]");
    Ok(out)
}

/// Regex literal with unescaped `/` and line terminators escaped; an empty
/// pattern becomes `(?:)`.
///
/// Syntax that compiles as a Rust regex but has no JS equivalent is rejected.
fn js_regex(pattern: &str) -> Result<String> {
    if pattern.is_empty() {
        return Ok("/(?:)/".to_string());
    }
    if pattern.contains("[[:") {
        bail!("{pattern:?} uses a POSIX class, which JavaScript regexes do not support");
    }

    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() + 2);
    out.push('/');
    let mut escaped = false;
    for (i, &ch) in chars.iter().enumerate() {
        if escaped && matches!(ch, 'A' | 'z' | 'p' | 'P') {
            bail!("{pattern:?} uses `\\{ch}`, which JavaScript regexes do not support");
        }
        if !escaped && ch == '(' && chars.get(i + 1) == Some(&'?') {
            match chars.get(i + 2) {
                Some(':') => {}
                Some('<') if !matches!(chars.get(i + 3), Some('=') | Some('!')) => {}
                _ => bail!(
                    "{pattern:?} uses an inline flag or `(?P` group, which JavaScript regexes do not support"
                ),
            }
        }
        match ch {
            '/' if !escaped => out.push_str("\\/"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            _ => out.push(ch),
        }
        escaped = ch == '\\' && !escaped;
    }
    out.push('/');
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::models::RawDescriptor;

    #[test]
    fn workbox_module_matches_tool_shape() {
        let descriptor = ConfigurationDescriptor::builtin().unwrap();
        let module = OutputGenerator::generate_workbox_module(&descriptor).unwrap();
        let expected = "module.exports = {\n\
            \tglobDirectory: \"public/\",\n\
            \tglobPatterns: [\n\t\t\"**/*.{html,js}\"\n\t],\n\
            \tglobIgnores: [\n\t\t\"js/cljs-runtime/*\"\n\t],\n\
            \tswDest: \"public/sw.js\",\n\
            \tignoreURLParametersMatching: [\n\t\t/^utm_/,\n\t\t/^fbclid$/\n\t]\n\
            };";
        assert_eq!(module, expected);
    }

    #[test]
    fn workbox_module_omits_empty_ignores() {
        let descriptor = RawDescriptor::builtin_base().validate().unwrap();
        let module = OutputGenerator::generate_workbox_module(&descriptor).unwrap();
        assert!(!module.contains("globIgnores"));
        assert!(module.contains("swDest: \"public/sw.js\""));
    }

    #[test]
    fn regex_literals_escape_slashes() {
        assert_eq!(js_regex("^a/b$").unwrap(), "/^a\\/b$/");
        assert_eq!(js_regex("^a\\/b$").unwrap(), "/^a\\/b$/");
        assert_eq!(js_regex("\\\\/").unwrap(), "/\\\\\\//");
        assert_eq!(js_regex("").unwrap(), "/(?:)/");
    }

    #[test]
    fn toml_output_keeps_field_order() {
        let descriptor = ConfigurationDescriptor::builtin().unwrap();
        let rendered = OutputGenerator::generate_toml(&descriptor).unwrap();
        let source = rendered.find("source_directory").unwrap();
        let include = rendered.find("include_patterns").unwrap();
        let ignored = rendered.find("ignored_query_parameter_patterns").unwrap();
        assert!(source < include && include < ignored);
    }

    #[test]
    fn regex_literals_escape_line_terminators() {
        assert_eq!(js_regex("a\rb").unwrap(), "/a\\rb/");
        assert_eq!(js_regex("a\nb").unwrap(), "/a\\nb/");
        assert_eq!(js_regex("a\u{2028}b\u{2029}").unwrap(), "/a\\u2028b\\u2029/");
    }

    #[test]
    fn rust_only_regex_syntax_is_rejected() {
        for pattern in ["(?i)^utm_", "(?P<n>utm)", "\\Autm", "\\p{L}", "[[:alpha:]]"] {
            assert!(js_regex(pattern).is_err(), "{pattern} should be rejected");
        }
        assert_eq!(js_regex("(?:a|b)").unwrap(), "/(?:a|b)/");
        assert_eq!(js_regex("(?<name>a)").unwrap(), "/(?<name>a)/");
        assert_eq!(js_regex("\\(?i\\)").unwrap(), "/\\(?i\\)/");
    }

    #[test]
    fn workbox_module_reports_unrenderable_pattern() {
        let descriptor = RawDescriptor {
            ignored_query_parameter_patterns: Some(vec!["(?i)^utm_".into()]),
            ..RawDescriptor::builtin_base()
        }
        .validate()
        .unwrap();
        let err = OutputGenerator::generate_workbox_module(&descriptor).unwrap_err();
        assert!(format!("{err:#}").contains("(?i)^utm_"));
    }
}
