use std::env;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_PATH: &str = ".wikibot/config.toml";
pub const FILE_NAMESPACES_ENV: &str = "WIKIBOT_FILE_NAMESPACES";
pub const NON_ARTICLE_NAMESPACES_ENV: &str = "WIKIBOT_NON_ARTICLE_NAMESPACES";

/// Namespace names whose links embed media. Captions of these links may hold
/// one level of nested `[[...]]`.
pub const DEFAULT_FILE_NAMESPACES: &[&str] =
    &["File", "Image", "Media", "Файл", "Изображение", "Медиа"];

pub const DEFAULT_NON_ARTICLE_NAMESPACES: &[&str] = &[
    "Talk",
    "User",
    "User talk",
    "Project",
    "Project talk",
    "Wikipedia",
    "Wikipedia talk",
    "File talk",
    "Template",
    "Template talk",
    "Category",
    "Category talk",
    "Help",
    "Portal",
    "Module",
    "MediaWiki",
    "Special",
    "Обсуждение",
    "Участник",
    "Участница",
    "Обсуждение участника",
    "Обсуждение участницы",
    "Википедия",
    "ВП",
    "Обсуждение Википедии",
    "Обсуждение файла",
    "Шаблон",
    "Обсуждение шаблона",
    "Категория",
    "Обсуждение категории",
    "Справка",
    "Портал",
    "Модуль",
    "Служебная",
];

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct EngineConfig {
    #[serde(default)]
    pub namespaces: NamespaceSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct NamespaceSection {
    pub file: Option<Vec<String>>,
    pub non_article: Option<Vec<String>>,
}

impl EngineConfig {
    /// File namespace aliases: env WIKIBOT_FILE_NAMESPACES > config > defaults.
    pub fn file_namespaces(&self) -> Vec<String> {
        resolve_list(
            FILE_NAMESPACES_ENV,
            self.namespaces.file.as_deref(),
            DEFAULT_FILE_NAMESPACES,
        )
    }

    /// Non-article namespace prefixes: env WIKIBOT_NON_ARTICLE_NAMESPACES > config > defaults.
    pub fn non_article_namespaces(&self) -> Vec<String> {
        resolve_list(
            NON_ARTICLE_NAMESPACES_ENV,
            self.namespaces.non_article.as_deref(),
            DEFAULT_NON_ARTICLE_NAMESPACES,
        )
    }

    pub fn namespace_table(&self) -> NamespaceTable {
        NamespaceTable::new(self.file_namespaces(), self.non_article_namespaces())
    }
}

fn resolve_list(env_key: &str, configured: Option<&[String]>, defaults: &[&str]) -> Vec<String> {
    if let Ok(value) = env::var(env_key) {
        let parsed = split_list(&value);
        if !parsed.is_empty() {
            return parsed;
        }
    }
    if let Some(configured) = configured {
        return configured.to_vec();
    }
    defaults.iter().map(|name| name.to_string()).collect()
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

/// Load and parse an EngineConfig from a TOML file. Returns default if file doesn't exist.
pub fn load_config(config_path: &Path) -> Result<EngineConfig> {
    if !config_path.exists() {
        return Ok(EngineConfig::default());
    }
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let parsed: EngineConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    Ok(parsed)
}

/// Locale-specific namespace lookups, built once and shared by reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceTable {
    file: Vec<String>,
    non_article: Vec<String>,
}

impl Default for NamespaceTable {
    fn default() -> Self {
        Self::new(
            DEFAULT_FILE_NAMESPACES.iter().map(|name| name.to_string()),
            DEFAULT_NON_ARTICLE_NAMESPACES
                .iter()
                .map(|name| name.to_string()),
        )
    }
}

impl NamespaceTable {
    pub fn new(
        file: impl IntoIterator<Item = String>,
        non_article: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            file: file.into_iter().map(|name| fold_name(&name)).collect(),
            non_article: non_article
                .into_iter()
                .map(|name| fold_name(&name))
                .collect(),
        }
    }

    pub fn is_file(&self, prefix: &str) -> bool {
        let folded = fold_name(prefix);
        self.file.iter().any(|name| *name == folded)
    }

    /// File namespaces count as non-article too.
    pub fn is_non_article(&self, prefix: &str) -> bool {
        let folded = fold_name(prefix);
        self.non_article.iter().any(|name| *name == folded) || self.file.contains(&folded)
    }
}

fn fold_name(name: &str) -> String {
    name.replace('_', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
