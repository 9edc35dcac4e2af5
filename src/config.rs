use crate::font::FontEntry;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A font file on disk and the CSS family name it is embedded under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FontSource {
    pub family: String,
    pub path: PathBuf,
}

impl FontSource {
    pub fn new(family: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            family: family.into(),
            path: path.into(),
        }
    }

    pub fn load(&self) -> anyhow::Result<FontEntry> {
        let data = std::fs::read(&self.path).with_context(|| {
            format!(
                "failed to read font '{}' from {}",
                self.family,
                self.path.display()
            )
        })?;
        if data.is_empty() {
            log::warn!("font file {} is empty", self.path.display());
        }
        Ok(FontEntry::new(self.family.clone(), data))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub fonts: Vec<FontSource>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    fonts: Option<Vec<FontSource>>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let mut config = Config::default();
    let Some(path) = path else {
        return Ok(config);
    };

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let parsed: ConfigFile = serde_json::from_str(&contents)
        .with_context(|| format!("invalid config {}", path.display()))?;

    let base = path.parent().unwrap_or_else(|| Path::new("."));
    if let Some(fonts) = parsed.fonts {
        for font in fonts {
            let path = if font.path.is_relative() {
                base.join(&font.path)
            } else {
                font.path
            };
            config.fonts.push(FontSource {
                family: font.family,
                path,
            });
        }
    }
    log::debug!("loaded {} font source(s) from {}", config.fonts.len(), path.display());
    Ok(config)
}
