//! Loading and hot-reloading a locale directory.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::template::Template;
use super::{LocaleConfig, SortedBy};
use crate::error::{LoadError, LocaleError};

const MANIFEST_STEM: &str = "_meta";
const MANIFEST_FILES: [&str; 3] = ["_meta.json", "_meta.yaml", "_meta.yml"];

/// Templates of one key, by locale tag.
type Translations = HashMap<String, Template>;

#[derive(Debug, Deserialize)]
struct Manifest {
    locales: Vec<String>,
}

/// An immutable, validated view of a locale directory.
#[derive(Debug)]
pub struct LocaleIndex {
    locales: Vec<String>,
    categories: HashMap<String, HashMap<String, Translations>>,
    default_locale: String,
    fallback_locale: Option<String>,
    generation: u64,
}

impl LocaleIndex {
    /// Supported locale tags in manifest order.
    pub fn locales(&self) -> &[String] {
        &self.locales
    }

    /// Whether `tag` is a supported locale (exact match).
    pub fn supports(&self, tag: &str) -> bool {
        self.locales.iter().any(|l| l == tag)
    }

    /// The supported tag equal to `tag`, or failing that, equal ignoring ASCII case.
    pub fn match_tag(&self, tag: &str) -> Option<&str> {
        self.locales
            .iter()
            .find(|l| l.as_str() == tag)
            .or_else(|| self.locales.iter().find(|l| l.eq_ignore_ascii_case(tag)))
            .map(String::as_str)
    }

    /// The configured default locale.
    pub fn default_locale(&self) -> &str {
        &self.default_locale
    }

    /// The configured fallback locale.
    pub fn fallback_locale(&self) -> Option<&str> {
        self.fallback_locale.as_deref()
    }

    /// Category names, unordered.
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    /// Total number of keys across all categories.
    pub fn key_count(&self) -> usize {
        self.categories.values().map(HashMap::len).sum()
    }

    /// Whether `category/key` exists.
    pub fn contains(&self, path: &str) -> bool {
        self.translations(path).is_some()
    }

    /// Increases by one for every successful load of the owning store.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn translations(&self, path: &str) -> Option<&Translations> {
        let (category, key) = path.split_once('/')?;
        self.categories.get(category)?.get(key)
    }
}

/// A locale directory loaded into memory.
///
/// Readers take a [`snapshot`](Self::snapshot) and keep using it for as long
/// as they need; [`reload`](Self::reload) only replaces the index once the
/// new one is fully built and validated.
#[derive(Debug)]
pub struct LocaleStore {
    config: LocaleConfig,
    current: RwLock<Arc<LocaleIndex>>,
    generation: AtomicU64,
}

impl LocaleStore {
    /// Load and validate the directory named by `config`.
    ///
    /// # Errors
    ///
    /// `LocaleError::Load` describing the first problem found.
    pub async fn load(config: LocaleConfig) -> Result<Self, LocaleError> {
        let index = build_index(&config, 1).await?;
        info!(
            directory = %config.directory_path.display(),
            locales = ?index.locales,
            categories = index.categories.len(),
            keys = index.key_count(),
            "Loaded locale directory"
        );

        Ok(Self {
            config,
            current: RwLock::new(Arc::new(index)),
            generation: AtomicU64::new(1),
        })
    }

    /// Re-read the directory and swap in the new index.
    ///
    /// # Errors
    ///
    /// `LocaleError::Load` when the directory no longer validates; the
    /// previous index stays active.
    pub async fn reload(&self) -> Result<(), LocaleError> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let index = match build_index(&self.config, generation).await {
            Ok(index) => index,
            Err(e) => {
                warn!(
                    directory = %self.config.directory_path.display(),
                    error = %e,
                    "Locale reload failed, keeping previous strings"
                );
                return Err(e.into());
            }
        };

        let mut current = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // A slower, older reload must not replace a newer index.
        if index.generation > current.generation {
            info!(
                directory = %self.config.directory_path.display(),
                generation,
                keys = index.key_count(),
                "Reloaded locale directory"
            );
            *current = Arc::new(index);
        }
        Ok(())
    }

    /// The current index.
    pub fn snapshot(&self) -> Arc<LocaleIndex> {
        let current = self
            .current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&current)
    }

    /// The configuration this store was loaded with.
    pub fn config(&self) -> &LocaleConfig {
        &self.config
    }
}

async fn build_index(config: &LocaleConfig, generation: u64) -> Result<LocaleIndex, LoadError> {
    let directory = config.directory_path.as_path();
    let is_directory = tokio::fs::metadata(directory)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false);
    if !is_directory {
        return Err(LoadError::DirectoryNotFound {
            path: directory.to_path_buf(),
        });
    }

    let manifest = read_manifest(directory).await?;
    let files = list_data_files(directory).await?;

    let (locales, categories) = match config.sorted_by {
        SortedBy::Categories => {
            let Some(locales) = manifest else {
                return Err(LoadError::ManifestMissing {
                    path: directory.to_path_buf(),
                });
            };
            check_configured_locales(config, &locales)?;
            let categories = load_by_category(config, &locales, &files).await?;
            (locales, categories)
        }
        SortedBy::Locales => {
            let locales = manifest.unwrap_or_else(|| files.keys().cloned().collect());
            check_configured_locales(config, &locales)?;
            let categories = load_by_locale(config, &locales, &files).await?;
            (locales, categories)
        }
    };

    Ok(LocaleIndex {
        locales,
        categories,
        default_locale: config.default_locale.clone(),
        fallback_locale: config.fallback_locale.clone(),
        generation,
    })
}

async fn read_manifest(directory: &Path) -> Result<Option<Vec<String>>, LoadError> {
    for name in MANIFEST_FILES {
        let path = directory.join(name);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(source) => return Err(LoadError::Io { path, source }),
        };

        let manifest: Manifest = parse_file(&path, &bytes).map_err(|e| match e {
            LoadError::Parse { path, message } => LoadError::InvalidManifest { path, message },
            other => other,
        })?;
        validate_manifest(&path, &manifest.locales)?;
        debug!(path = %path.display(), locales = ?manifest.locales, "Read locale manifest");
        return Ok(Some(manifest.locales));
    }
    Ok(None)
}

fn validate_manifest(path: &Path, locales: &[String]) -> Result<(), LoadError> {
    let invalid = |message: String| LoadError::InvalidManifest {
        path: path.to_path_buf(),
        message,
    };

    if locales.is_empty() {
        return Err(invalid("'locales' must not be empty".to_string()));
    }
    for (i, tag) in locales.iter().enumerate() {
        if tag.trim().is_empty() {
            return Err(invalid(format!("locale #{i} is blank")));
        }
        if locales[..i].contains(tag) {
            return Err(invalid(format!("locale '{tag}' is listed twice")));
        }
    }
    Ok(())
}

/// Data files by stem, sorted. The manifest is excluded.
async fn list_data_files(directory: &Path) -> Result<BTreeMap<String, PathBuf>, LoadError> {
    let io_error = |source| LoadError::Io {
        path: directory.to_path_buf(),
        source,
    };

    let mut files: BTreeMap<String, PathBuf> = BTreeMap::new();
    let mut entries = tokio::fs::read_dir(directory).await.map_err(io_error)?;
    while let Some(entry) = entries.next_entry().await.map_err(io_error)? {
        let path = entry.path();
        let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
        if !is_file || !is_data_file(&path) {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
            continue;
        };
        if stem == MANIFEST_STEM {
            continue;
        }
        if let Some(existing) = files.get(&stem) {
            return Err(LoadError::Parse {
                path,
                message: format!("'{stem}' is already defined by {}", existing.display()),
            });
        }
        files.insert(stem, path);
    }
    Ok(files)
}

fn is_data_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("json" | "yaml" | "yml")
    )
}

async fn read_data<T: DeserializeOwned>(path: &Path) -> Result<T, LoadError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_file(path, &bytes)
}

fn parse_file<T: DeserializeOwned>(path: &Path, bytes: &[u8]) -> Result<T, LoadError> {
    let parse_error = |message: String| LoadError::Parse {
        path: path.to_path_buf(),
        message,
    };

    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml" | "yml") => serde_yaml::from_slice(bytes).map_err(|e| parse_error(e.to_string())),
        _ => serde_json::from_slice(bytes).map_err(|e| parse_error(e.to_string())),
    }
}

fn check_configured_locales(config: &LocaleConfig, locales: &[String]) -> Result<(), LoadError> {
    if !locales.contains(&config.default_locale) {
        return Err(LoadError::UndeclaredConfiguredLocale {
            role: "default",
            tag: config.default_locale.clone(),
        });
    }
    if let Some(fallback) = &config.fallback_locale {
        if !locales.contains(fallback) {
            return Err(LoadError::UndeclaredConfiguredLocale {
                role: "fallback",
                tag: fallback.clone(),
            });
        }
    }
    Ok(())
}

/// `{key: {locale: template}}` per category file.
async fn load_by_category(
    config: &LocaleConfig,
    locales: &[String],
    files: &BTreeMap<String, PathBuf>,
) -> Result<HashMap<String, HashMap<String, Translations>>, LoadError> {
    let mut categories = HashMap::with_capacity(files.len());

    for (category, path) in files {
        let raw: BTreeMap<String, BTreeMap<String, String>> = read_data(path).await?;

        let mut keys = HashMap::with_capacity(raw.len());
        for (key, by_locale) in raw {
            let full_key = format!("{category}/{key}");

            let unknown: Vec<String> = by_locale
                .keys()
                .filter(|tag| !locales.contains(tag))
                .cloned()
                .collect();
            if !unknown.is_empty() {
                return Err(LoadError::UnknownLocales {
                    path: path.clone(),
                    key: full_key,
                    tags: unknown,
                });
            }
            check_coverage(config, locales, path, &full_key, |tag| by_locale.contains_key(tag))?;

            let mut translations = HashMap::with_capacity(by_locale.len());
            for (locale, text) in by_locale {
                let template = parse_template(path, &full_key, &locale, &text)?;
                translations.insert(locale, template);
            }
            keys.insert(key, translations);
        }
        categories.insert(category.clone(), keys);
    }

    Ok(categories)
}

/// `{category: {key: template}}` per locale file.
async fn load_by_locale(
    config: &LocaleConfig,
    locales: &[String],
    files: &BTreeMap<String, PathBuf>,
) -> Result<HashMap<String, HashMap<String, Translations>>, LoadError> {
    let mut categories: HashMap<String, HashMap<String, Translations>> = HashMap::new();

    for (locale, path) in files {
        if !locales.contains(locale) {
            return Err(LoadError::UnknownLocales {
                path: path.clone(),
                key: "*".to_string(),
                tags: vec![locale.clone()],
            });
        }

        let raw: BTreeMap<String, BTreeMap<String, String>> = read_data(path).await?;
        for (category, keys) in raw {
            for (key, text) in keys {
                let template = parse_template(path, &format!("{category}/{key}"), locale, &text)?;
                categories
                    .entry(category.clone())
                    .or_default()
                    .entry(key)
                    .or_default()
                    .insert(locale.clone(), template);
            }
        }
    }

    let directory = config.directory_path.as_path();
    for (category, keys) in &categories {
        for (key, translations) in keys {
            let full_key = format!("{category}/{key}");
            check_coverage(config, locales, directory, &full_key, |tag| {
                translations.contains_key(tag)
            })?;
        }
    }

    Ok(categories)
}

/// A key must define every manifest locale, unless it defines the configured
/// fallback.
fn check_coverage(
    config: &LocaleConfig,
    locales: &[String],
    path: &Path,
    full_key: &str,
    defines: impl Fn(&str) -> bool,
) -> Result<(), LoadError> {
    let missing: Vec<String> = locales.iter().filter(|tag| !defines(tag)).cloned().collect();
    if missing.is_empty() {
        return Ok(());
    }

    match &config.fallback_locale {
        Some(fallback) if defines(fallback) => {
            debug!(key = %full_key, missing = ?missing, fallback = %fallback, "Key relies on fallback locale");
            Ok(())
        }
        _ => Err(LoadError::MissingLocales {
            path: path.to_path_buf(),
            key: full_key.to_string(),
            tags: missing,
        }),
    }
}

fn parse_template(path: &Path, key: &str, locale: &str, text: &str) -> Result<Template, LoadError> {
    Template::parse(text).map_err(|source| LoadError::MalformedTemplate {
        path: path.to_path_buf(),
        key: key.to_string(),
        locale: locale.to_string(),
        source,
    })
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
