//! Application-level configuration loading, including the target-sentence corpus.

use std::{env, fs, io::ErrorKind, path::PathBuf};

use rand::Rng;
use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "TYPERACE_BACK_CONFIG_PATH";

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    sentences: Vec<String>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to the baked-in corpus.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        count = app_config.sentences.len(),
                        "loaded sentence corpus from config"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Draw a uniformly random index into the sentence corpus.
    ///
    /// Races persist the index rather than the text, so the corpus itself stays
    /// out of the persistence layer.
    pub fn pick_sentence_index(&self) -> usize {
        rand::rng().random_range(0..self.sentences.len())
    }

    /// Resolve a stored corpus index back to its sentence.
    ///
    /// Returns `None` when the configured corpus no longer contains the index,
    /// which can happen if the config shrank between server runs.
    pub fn sentence(&self, index: usize) -> Option<&str> {
        self.sentences.get(index).map(String::as_str)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            sentences: default_sentences(),
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    sentences: Vec<String>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        if value.sentences.is_empty() {
            warn!("config contains an empty sentence corpus; using built-in defaults");
            return Self::default();
        }
        Self {
            sentences: value.sentences,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Built-in sentence corpus shipped with the binary.
fn default_sentences() -> Vec<String> {
    [
        "The quick brown fox jumps over the lazy dog while the farmer watches from the porch.",
        "Pack my box with five dozen liquor jugs before the delivery truck arrives at noon.",
        "A wizard's job is to vex chumps quickly in fog and vanish before anyone notices.",
        "Sphinx of black quartz, judge my vow as the caravan crosses the silent desert.",
        "How vexingly quick daft zebras jump when the thunderstorm rolls over the plains.",
        "Bright vixens jump while the dozy fowl quack in the reeds beside the old mill.",
        "The five boxing wizards jump quickly over the crumbling wall of the ancient keep.",
        "Jackdaws love my big sphinx of quartz, carved long ago by hands nobody remembers.",
        "Waltz, bad nymph, for quick jigs vex the crowd gathered under the paper lanterns.",
        "Glib jocks quiz nymph to vex dwarf while the orchestra tunes in the dim hall.",
        "Two driven jocks help fax my big quiz before the printers shut down for the night.",
        "Quick zephyrs blow, vexing daft Jim as he pedals his bicycle up the gravel road.",
    ]
    .into_iter()
    .map(str::to_owned)
    .collect()
}
