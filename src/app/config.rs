use crate::app::cli::Cli;
use crate::app::models::{DescriptorOrigin, RawDescriptor, ResolvedConfig, DEFAULT_PROFILE};
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const PROJECT_DESCRIPTOR_FILES: [&str; 2] = ["precache.toml", "precache.json"];

/// A project descriptor: base fields at the top level plus named profiles.
#[derive(Deserialize, Debug)]
struct DescriptorFile {
    #[serde(flatten)]
    base: RawDescriptor,
    default_profile: Option<String>,
    #[serde(default)]
    profiles: BTreeMap<String, RawDescriptor>,
}

impl DescriptorFile {
    fn builtin() -> Self {
        Self {
            base: RawDescriptor::builtin_base(),
            default_profile: Some(DEFAULT_PROFILE.to_string()),
            // Built-in profiles are the last lookup tier, see `find_profile`.
            profiles: BTreeMap::new(),
        }
    }
}

/// User-wide profiles, one table per profile name.
#[derive(Deserialize, Debug)]
struct ProfilesFile {
    #[serde(flatten)]
    profiles: BTreeMap<String, RawDescriptor>,
}

fn user_profiles_path() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home
        .join(".config")
        .join("precache-config")
        .join("profiles.toml"))
}

fn load_user_profiles() -> Result<BTreeMap<String, RawDescriptor>> {
    let path = match user_profiles_path() {
        Ok(path) => path,
        Err(err) => {
            log::debug!("Skipping user profiles: {err:#}");
            return Ok(BTreeMap::new());
        }
    };

    if !path.exists() {
        return Ok(BTreeMap::new());
    }

    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read user profiles at {}", path.display()))?;
    let parsed: ProfilesFile = toml::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    log::debug!("Loaded {} user profile(s) from {}", parsed.profiles.len(), path.display());
    Ok(parsed.profiles)
}

fn parse_descriptor_file(path: &Path) -> Result<DescriptorFile> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read descriptor at {}", path.display()))?;

    match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display())),
        Some("json") => serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display())),
        _ => bail!(
            "Unsupported descriptor format for {} (expected .toml or .json)",
            path.display()
        ),
    }
}

/// Explicit path > project file in `cwd` > built-in descriptor.
fn load_descriptor_file(
    explicit: Option<&Path>,
    cwd: &Path,
) -> Result<(DescriptorOrigin, DescriptorFile)> {
    if let Some(path) = explicit {
        let path = cwd.join(path);
        let file = parse_descriptor_file(&path)?;
        return Ok((DescriptorOrigin::File(path), file));
    }

    for name in PROJECT_DESCRIPTOR_FILES {
        let candidate = cwd.join(name);
        if candidate.is_file() {
            let file = parse_descriptor_file(&candidate)?;
            return Ok((DescriptorOrigin::File(candidate), file));
        }
    }

    log::info!("No precache.toml or precache.json found; using the built-in descriptor");
    Ok((DescriptorOrigin::Builtin, DescriptorFile::builtin()))
}

/// Project profiles shadow user profiles, which shadow the built-in ones.
fn find_profile(
    name: &str,
    project: &BTreeMap<String, RawDescriptor>,
    user: &BTreeMap<String, RawDescriptor>,
) -> Option<RawDescriptor> {
    project
        .get(name)
        .or_else(|| user.get(name))
        .cloned()
        .or_else(|| RawDescriptor::builtin_profiles().remove(name))
}

pub fn resolve_config(cli: &Cli, cwd: &Path) -> Result<ResolvedConfig> {
    let user_profiles = load_user_profiles()?;
    resolve_with_profiles(cli, cwd, &user_profiles)
}

fn resolve_with_profiles(
    cli: &Cli,
    cwd: &Path,
    user_profiles: &BTreeMap<String, RawDescriptor>,
) -> Result<ResolvedConfig> {
    let (origin, file) = load_descriptor_file(cli.config.as_deref(), cwd)?;

    // Determine profile: CLI flag > file default > none
    let profile_name = cli.profile.clone().or(file.default_profile);
    let mut raw = file.base;

    if let Some(name) = &profile_name {
        let Some(profile) = find_profile(name, &file.profiles, user_profiles) else {
            bail!("Unknown profile `{}`", name);
        };
        log::debug!("Applying profile `{}`", name);
        raw = raw.merge(profile);
    }

    raw = raw.merge(cli.overrides());

    let descriptor = raw.validate().with_context(|| match &origin {
        DescriptorOrigin::File(path) => format!("Invalid descriptor in {}", path.display()),
        DescriptorOrigin::Builtin => "Invalid descriptor".to_string(),
    })?;

    Ok(ResolvedConfig {
        descriptor,
        origin,
        profile: profile_name,
    })
}
