//! Configuration management for Los Libros Reader

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::chapter::{EmbeddingMode, StyleConfig, Theme};

#[derive(Debug, Clone)]
pub struct Config {
    pub cache: CacheConfig,
    pub bridge: BridgeConfig,
    pub database: DatabaseConfig,
    pub style: StyleConfig,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Root of the chapter cache; books live under `<root>/<book_id>`
    pub root: PathBuf,
    pub embedding: EmbeddingMode,
}

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub swipe_debounce: Duration,
    pub progress_debounce: Duration,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            cache: CacheConfig {
                root: env::temp_dir().join("libros-reader"),
                embedding: EmbeddingMode::SiblingFiles,
            },
            bridge: BridgeConfig {
                swipe_debounce: Duration::from_millis(500),
                progress_debounce: Duration::from_millis(500),
            },
            database: DatabaseConfig {
                url: "sqlite:./libros-reader.db".to_string(),
            },
            style: StyleConfig::default(),
        }
    }
}

impl Config {
    /// Build configuration from `LIBROS_*` environment variables.
    ///
    /// Every variable is optional. Values that fail to parse keep the default.
    pub fn from_env() -> Self {
        let defaults = Config::default();

        Config {
            cache: CacheConfig {
                root: env::var("LIBROS_CACHE_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.cache.root),
                embedding: parse_var("LIBROS_EMBEDDING", defaults.cache.embedding),
            },
            bridge: BridgeConfig {
                swipe_debounce: Duration::from_millis(parse_var(
                    "LIBROS_SWIPE_DEBOUNCE_MS",
                    defaults.bridge.swipe_debounce.as_millis() as u64,
                )),
                progress_debounce: Duration::from_millis(parse_var(
                    "LIBROS_PROGRESS_DEBOUNCE_MS",
                    defaults.bridge.progress_debounce.as_millis() as u64,
                )),
            },
            database: DatabaseConfig {
                url: env::var("LIBROS_DATABASE_URL").unwrap_or(defaults.database.url),
            },
            style: StyleConfig {
                theme: parse_var::<Theme>("LIBROS_THEME", defaults.style.theme),
                font_size: parse_var("LIBROS_FONT_SIZE", defaults.style.font_size),
                line_height: parse_var("LIBROS_LINE_HEIGHT", defaults.style.line_height),
                margin: parse_var("LIBROS_MARGIN", defaults.style.margin),
            },
        }
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(var = name, value = %raw, "Ignoring unparsable setting");
                default
            }
        },
        Err(_) => default,
    }
}
