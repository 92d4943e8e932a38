use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use confik::{Configuration, EnvSource};
use serde::{Deserialize, Serialize};

use self::yaml::YamlFileSource;

#[derive(Debug, Clone, Serialize, Deserialize, Configuration)]
pub struct ShikiConfig {
    pub theme: String,
    #[serde(default)]
    pub langs: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Configuration)]
pub struct MarkdownConfig {
    pub shiki_config: ShikiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Configuration)]
pub struct FeedConfig {
    #[serde(default)]
    pub language: Option<String>,
    /// Namespaces declared on the `<rss>` element, keyed by prefix.
    #[serde(default)]
    pub xmlns: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Configuration)]
pub struct PathsConfig {
    pub content_root: String,
    pub out_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Configuration)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Configuration)]
pub struct SiteConfig {
    /// Canonical origin of the deployed site, e.g. `https://chrlschn.dev`.
    pub site: String,
    pub site_title: String,
    pub site_description: String,
    /// Build-time integrations by name. Opaque here.
    #[serde(default)]
    pub integrations: Vec<String>,
    pub markdown: MarkdownConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    pub paths: PathsConfig,
    pub server: ServerConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            site: "https://chrlschn.dev".into(),
            site_title: "Astro Blog".into(),
            site_description: "Welcome to my website!".into(),
            integrations: vec![
                "mdx".into(),
                "sitemap".into(),
                "tailwind".into(),
                "prefetch".into(),
            ],
            markdown: MarkdownConfig {
                shiki_config: ShikiConfig {
                    theme: "monokai".into(),
                    langs: vec![],
                },
            },
            feed: FeedConfig::default(),
            paths: PathsConfig {
                content_root: "../content".into(),
                out_dir: "../dist".into(),
            },
            server: ServerConfig {
                host: "127.0.0.1".into(),
                port: 4321,
                cors_origins: vec!["*".into()],
            },
        }
    }
}

impl SiteConfig {
    /// Load configuration from `config.yml` (if present) and environment variables.
    /// A `.env` file in the working directory is read into the environment first.
    /// Falls back to the compiled-in defaults when parsing fails.
    pub fn load() -> Self {
        if let Ok(path) = dotenvy::dotenv() {
            log::debug!("loaded environment from {}", path.display());
        }

        let config_path = manifest_dir().join("config.yml");
        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &Path) -> Self {
        let mut builder = SiteConfig::builder();

        if config_path.exists() {
            builder.override_with(YamlFileSource::new(config_path));
        }

        builder.override_with(EnvSource::new());

        match builder.try_build() {
            Ok(cfg) => cfg,
            Err(err) => {
                log::warn!(
                    "Failed to load {} or env overrides: {err}. Using defaults.",
                    config_path.display()
                );
                SiteConfig::default()
            }
        }
    }

    pub fn content_root(&self) -> PathBuf {
        resolve_path(&manifest_dir(), &self.paths.content_root)
    }

    pub fn out_dir(&self) -> PathBuf {
        resolve_path(&manifest_dir(), &self.paths.out_dir)
    }
}

fn manifest_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

fn resolve_path(base: &Path, path: &str) -> PathBuf {
    let candidate = PathBuf::from(path);
    if candidate.is_absolute() {
        candidate
    } else {
        base.join(path)
    }
}

mod yaml {
    use std::error::Error;
    use std::path::PathBuf;

    use anyhow::Context;
    use confik::{ConfigurationBuilder, Source};
    use serde::de::DeserializeOwned;

    /// `config.yml` as a confik layer. Errors name the file they came from.
    #[derive(Debug)]
    pub struct YamlFileSource {
        path: PathBuf,
    }

    impl YamlFileSource {
        pub fn new(path: impl Into<PathBuf>) -> Self {
            Self { path: path.into() }
        }

        fn read<T: DeserializeOwned>(&self) -> anyhow::Result<T> {
            let contents = std::fs::read_to_string(&self.path)
                .with_context(|| format!("reading {}", self.path.display()))?;
            serde_yaml::from_str(&contents)
                .with_context(|| format!("parsing {}", self.path.display()))
        }
    }

    impl<T> Source<T> for YamlFileSource
    where
        T: DeserializeOwned + ConfigurationBuilder,
    {
        fn allows_secrets(&self) -> bool {
            false
        }

        fn provide(&self) -> Result<T, Box<dyn Error + Sync + Send>> {
            Ok(self.read()?)
        }
    }
}
