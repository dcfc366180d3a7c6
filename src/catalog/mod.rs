pub mod builtin;

use std::fs;
use std::path::Path;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Line or character count of a poetic form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Extent {
    Fixed(u32),
    Variable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatSpec {
    pub id: String,
    pub title: String,
    pub instruction: String,
    pub description: String,
    pub total_chars: String,
    pub line_count: Extent,
    pub chars_per_line: Extent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleSpec {
    pub id: String,
    pub title: String,
    pub instruction: String,
    pub description: String,
    pub keywords: Vec<String>,
    pub suitable_scenes: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    formats: Vec<FormatEntry>,
    #[serde(default)]
    styles: Vec<StyleEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct FormatEntry {
    id: String,
    #[serde(default)]
    title: Option<String>,
    instruction: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    total_chars: Option<String>,
    #[serde(default)]
    line_count: Option<Extent>,
    #[serde(default)]
    chars_per_line: Option<Extent>,
}

#[derive(Debug, Clone, Deserialize)]
struct StyleEntry {
    id: String,
    #[serde(default)]
    title: Option<String>,
    instruction: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    suitable_scenes: Vec<String>,
}

/// Read-only format and style tables, built once at startup and shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateCatalog {
    formats: Vec<FormatSpec>,
    styles: Vec<StyleSpec>,
}

impl TemplateCatalog {
    pub fn builtin() -> Self {
        TemplateCatalog {
            formats: builtin::formats(),
            styles: builtin::styles(),
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let parsed: CatalogFile = serde_json::from_str(raw)?;

        let mut formats = Vec::new();
        for entry in parsed.formats {
            let id = entry.id.trim();
            if id.is_empty() || entry.instruction.trim().is_empty() {
                continue;
            }
            formats.push(FormatSpec {
                id: id.to_string(),
                title: entry.title.unwrap_or_else(|| id.to_string()),
                instruction: entry.instruction.trim().to_string(),
                description: entry.description,
                total_chars: entry.total_chars.unwrap_or_default(),
                line_count: entry.line_count.unwrap_or(Extent::Variable),
                chars_per_line: entry.chars_per_line.unwrap_or(Extent::Variable),
            });
        }

        let mut styles = Vec::new();
        for entry in parsed.styles {
            let id = entry.id.trim();
            if id.is_empty() || entry.instruction.trim().is_empty() {
                continue;
            }
            styles.push(StyleSpec {
                id: id.to_string(),
                title: entry.title.unwrap_or_else(|| id.to_string()),
                instruction: entry.instruction.trim().to_string(),
                description: entry.description,
                keywords: entry.keywords,
                suitable_scenes: entry.suitable_scenes,
            });
        }

        if formats.is_empty() || styles.is_empty() {
            return Err(anyhow!(
                "catalog needs at least one format and one style (got {} and {})",
                formats.len(),
                styles.len()
            ));
        }

        Ok(TemplateCatalog { formats, styles })
    }

    /// Loads the override file when one is configured, otherwise the built-in tables.
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::builtin();
        };
        if !path.exists() {
            warn!("Catalog file not found at {}; using built-in catalog", path.display());
            return Self::builtin();
        }

        let raw = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                warn!("Failed to read catalog at {}: {}", path.display(), err);
                return Self::builtin();
            }
        };

        match Self::from_json_str(&raw) {
            Ok(catalog) => {
                info!(
                    "Loaded {} format(s) and {} style(s) from {}",
                    catalog.formats.len(),
                    catalog.styles.len(),
                    path.display()
                );
                catalog
            }
            Err(err) => {
                warn!("Failed to parse catalog at {}: {}", path.display(), err);
                Self::builtin()
            }
        }
    }

    pub fn format(&self, id: &str) -> Option<&FormatSpec> {
        self.formats.iter().find(|spec| spec.id == id)
    }

    pub fn style(&self, id: &str) -> Option<&StyleSpec> {
        self.styles.iter().find(|spec| spec.id == id)
    }

    /// Empty for unknown ids.
    pub fn format_instruction(&self, id: &str) -> &str {
        self.format(id).map(|spec| spec.instruction.as_str()).unwrap_or("")
    }

    /// Empty for unknown ids.
    pub fn style_instruction(&self, id: &str) -> &str {
        self.style(id).map(|spec| spec.instruction.as_str()).unwrap_or("")
    }

    pub fn formats(&self) -> &[FormatSpec] {
        &self.formats
    }

    pub fn styles(&self) -> &[StyleSpec] {
        &self.styles
    }

    pub fn format_ids(&self) -> Vec<&str> {
        self.formats.iter().map(|spec| spec.id.as_str()).collect()
    }

    pub fn style_ids(&self) -> Vec<&str> {
        self.styles.iter().map(|spec| spec.id.as_str()).collect()
    }

    /// Falls back to `default`, then to the first entry, for ids the catalog lacks.
    pub fn clamp_format<'a>(&'a self, id: &'a str, default: &'a str) -> &'a str {
        if self.format(id).is_some() {
            return id;
        }
        if self.format(default).is_some() {
            return default;
        }
        self.formats.first().map(|spec| spec.id.as_str()).unwrap_or(id)
    }

    pub fn clamp_style<'a>(&'a self, id: &'a str, default: &'a str) -> &'a str {
        if self.style(id).is_some() {
            return id;
        }
        if self.style(default).is_some() {
            return default;
        }
        self.styles.first().map(|spec| spec.id.as_str()).unwrap_or(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::profile::StyleHint;
    use std::io::Write;

    #[test]
    fn builtin_catalog_covers_every_style_hint() {
        let catalog = TemplateCatalog::builtin();
        for hint in [
            StyleHint::GentleLyrical,
            StyleHint::BoldGrandeur,
            StyleHint::PastoralSeclusion,
            StyleHint::ZenEthereal,
            StyleHint::FrontierDesolation,
        ] {
            let spec = catalog.style(hint.id()).expect("style present");
            assert_eq!(spec.title, hint.label());
        }
        assert_eq!(catalog.formats().len(), 5);
    }

    #[test]
    fn unknown_ids_yield_empty_instructions() {
        let catalog = TemplateCatalog::builtin();
        assert!(catalog.format("limerick").is_none());
        assert_eq!(catalog.format_instruction("limerick"), "");
        assert_eq!(catalog.style_instruction("baroque"), "");
        assert!(!catalog.format_instruction("five-character quatrain").is_empty());
    }

    #[test]
    fn format_metadata_distinguishes_fixed_and_variable() {
        let catalog = TemplateCatalog::builtin();
        let quatrain = catalog.format("seven-character quatrain").unwrap();
        assert_eq!(quatrain.line_count, Extent::Fixed(4));
        assert_eq!(quatrain.chars_per_line, Extent::Fixed(7));
        let ci = catalog.format("ci (matched tune pattern)").unwrap();
        assert_eq!(ci.line_count, Extent::Variable);
        assert_eq!(ci.total_chars, "44-100+");
    }

    #[test]
    fn clamping_prefers_requested_then_default() {
        let catalog = TemplateCatalog::builtin();
        assert_eq!(
            catalog.clamp_style("zen-ethereal", "gentle-lyrical"),
            "zen-ethereal"
        );
        assert_eq!(catalog.clamp_style("nope", "gentle-lyrical"), "gentle-lyrical");
        assert_eq!(catalog.clamp_format("nope", "also-nope"), "five-character quatrain");
    }

    #[test]
    fn json_catalog_skips_blank_entries() {
        let raw = r#"{
            "formats": [
                {"id": "haiku", "instruction": "三行短诗", "line_count": {"fixed": 3}},
                {"id": "  ", "instruction": "ignored"}
            ],
            "styles": [
                {"id": "misty", "title": "烟雨", "instruction": "朦胧", "keywords": ["雨"]},
                {"id": "empty", "instruction": "   "}
            ]
        }"#;
        let catalog = TemplateCatalog::from_json_str(raw).unwrap();
        assert_eq!(catalog.format_ids(), vec!["haiku"]);
        assert_eq!(catalog.style_ids(), vec!["misty"]);
        let haiku = catalog.format("haiku").unwrap();
        assert_eq!(haiku.title, "haiku");
        assert_eq!(haiku.line_count, Extent::Fixed(3));
        assert_eq!(haiku.chars_per_line, Extent::Variable);
    }

    #[test]
    fn json_catalog_without_styles_is_rejected() {
        let raw = r#"{"formats": [{"id": "haiku", "instruction": "三行"}]}"#;
        assert!(TemplateCatalog::from_json_str(raw).is_err());
    }

    #[test]
    fn load_falls_back_to_builtin_on_bad_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{{ not json").unwrap();
        let catalog = TemplateCatalog::load(Some(file.path()));
        assert_eq!(catalog, TemplateCatalog::builtin());

        let missing = TemplateCatalog::load(Some(Path::new("/definitely/missing.json")));
        assert_eq!(missing, TemplateCatalog::builtin());
    }

    #[test]
    fn load_reads_override_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"formats":[{{"id":"haiku","instruction":"三行"}}],"styles":[{{"id":"misty","instruction":"朦胧"}}]}}"#
        )
        .unwrap();
        let catalog = TemplateCatalog::load(Some(file.path()));
        assert_eq!(catalog.format_ids(), vec!["haiku"]);
    }
}
