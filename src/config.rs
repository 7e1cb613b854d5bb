//! Application-level configuration loading, including the runtime prompt pools.

use std::{
    collections::HashMap,
    env, fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use rand::seq::IndexedRandom;
use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "IMAGINARENA_CONFIG_PATH";
/// Environment variable overriding the on-disk upload directory.
const UPLOADS_DIR_ENV: &str = "IMAGINARENA_UPLOADS_DIR";
/// Environment variable overriding the public URL prefix for uploads.
const UPLOADS_BASE_URL_ENV: &str = "IMAGINARENA_UPLOADS_BASE_URL";
/// Environment variable listing usernames that get admin rights, comma separated.
const ADMIN_USERNAMES_ENV: &str = "IMAGINARENA_ADMIN_USERNAMES";

/// Language used when a tournament requests a pool we do not ship.
pub const DEFAULT_LANGUAGE: &str = "en";

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    prompts: HashMap<String, Vec<String>>,
    uploads_dir: PathBuf,
    uploads_base_url: String,
    admin_usernames: Vec<String>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to the
    /// baked-in prompt pools.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let prompts = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    info!(
                        path = %path.display(),
                        languages = raw.prompts.len(),
                        "loaded prompt pools from config"
                    );
                    raw.prompts
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    default_prompts()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in prompt pools"
                );
                default_prompts()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                default_prompts()
            }
        };

        Self {
            prompts,
            uploads_dir: env_path(UPLOADS_DIR_ENV, "uploads"),
            uploads_base_url: env_string(UPLOADS_BASE_URL_ENV, "/uploads"),
            admin_usernames: env_list(ADMIN_USERNAMES_ENV),
        }
    }

    /// Whether a tournament can be created for this language.
    pub fn supports_language(&self, language: &str) -> bool {
        self.prompts.contains_key(language)
    }

    /// Draw a random prompt for `language` that is not already listed in `used`.
    ///
    /// When the pool is exhausted we fall back to drawing from the full pool,
    /// so callers always receive a value. Unknown languages use the
    /// [`DEFAULT_LANGUAGE`] pool.
    pub fn random_prompt(&self, language: &str, used: &[String]) -> String {
        let pool = self
            .prompts
            .get(language)
            .or_else(|| self.prompts.get(DEFAULT_LANGUAGE))
            .map(Vec::as_slice)
            .unwrap_or_default();

        let mut rng = rand::rng();
        let fresh: Vec<&String> = pool
            .iter()
            .filter(|candidate| !used.contains(candidate))
            .collect();

        fresh
            .choose(&mut rng)
            .map(|prompt| (*prompt).clone())
            .or_else(|| pool.choose(&mut rng).cloned())
            .unwrap_or_else(|| "Surprise me".to_owned())
    }

    /// Directory where submitted images are written.
    pub fn uploads_dir(&self) -> &Path {
        &self.uploads_dir
    }

    /// URL prefix under which the upload directory is served.
    pub fn uploads_base_url(&self) -> &str {
        &self.uploads_base_url
    }

    /// Whether a username is granted admin rights at profile creation.
    pub fn is_admin_username(&self, username: &str) -> bool {
        self.admin_usernames
            .iter()
            .any(|admin| admin.eq_ignore_ascii_case(username))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            prompts: default_prompts(),
            uploads_dir: PathBuf::from("uploads"),
            uploads_base_url: "/uploads".to_owned(),
            admin_usernames: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    /// Prompt pools keyed by BCP 47 language tag ("en", "fr", ...).
    prompts: HashMap<String, Vec<String>>,
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

fn env_path(var: &str, default: &str) -> PathBuf {
    env::var_os(var)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(default))
}

fn env_string(var: &str, default: &str) -> String {
    env::var(var)
        .ok()
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_owned())
}

fn env_list(var: &str) -> Vec<String> {
    env::var(var)
        .map(|value| {
            value
                .split(',')
                .map(str::trim)
                .filter(|entry| !entry.is_empty())
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

/// Built-in prompt pools shipped with the binary.
fn default_prompts() -> HashMap<String, Vec<String>> {
    let en = [
        "A medieval castle defended by house cats",
        "A city skyline made entirely of vegetables",
        "An octopus conducting a symphony orchestra",
        "A robot learning to paint watercolors",
        "A pirate ship sailing through the clouds",
        "A library inside a giant hollowed-out tree",
        "Dinosaurs attending a formal tea party",
        "A lighthouse at the edge of the galaxy",
        "A street market on the surface of Mars",
        "Penguins running a mountain rescue service",
        "A dragon working as a glassblower",
        "An underwater train station at rush hour",
        "A wizard's kitchen during breakfast chaos",
        "A garden where the flowers are tiny planets",
        "A snail racing championship photo finish",
        "A Viking longship crewed by raccoons",
    ];
    let fr = [
        "Un château médiéval défendu par des chats",
        "Une ville construite entièrement en légumes",
        "Une pieuvre qui dirige un orchestre symphonique",
        "Un robot qui apprend l'aquarelle",
        "Un bateau pirate naviguant dans les nuages",
        "Une bibliothèque dans un arbre géant",
        "Des dinosaures à un goûter très chic",
        "Un phare au bord de la galaxie",
        "Un marché de rue sur la planète Mars",
        "Des pingouins secouristes en montagne",
        "Un dragon souffleur de verre",
        "Une gare sous-marine à l'heure de pointe",
        "La cuisine d'un sorcier au petit-déjeuner",
        "Un jardin où les fleurs sont des planètes",
        "Une course d'escargots à la photo-finish",
        "Un drakkar viking mené par des ratons laveurs",
    ];

    HashMap::from([
        (
            "en".to_owned(),
            en.into_iter().map(str::to_owned).collect::<Vec<_>>(),
        ),
        (
            "fr".to_owned(),
            fr.into_iter().map(str::to_owned).collect::<Vec<_>>(),
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_prompt_avoids_used_entries() {
        let config = AppConfig::default();
        let pool = config.prompts.get("en").unwrap().clone();
        let used: Vec<String> = pool[1..].to_vec();

        for _ in 0..20 {
            assert_eq!(config.random_prompt("en", &used), pool[0]);
        }
    }

    #[test]
    fn exhausted_pool_still_yields_a_prompt() {
        let config = AppConfig::default();
        let used = config.prompts.get("en").unwrap().clone();
        let prompt = config.random_prompt("en", &used);
        assert!(used.contains(&prompt));
    }

    #[test]
    fn unknown_language_falls_back_to_english() {
        let config = AppConfig::default();
        let prompt = config.random_prompt("xx", &[]);
        assert!(config.prompts.get("en").unwrap().contains(&prompt));
    }

    #[test]
    fn admin_usernames_match_case_insensitively() {
        let config = AppConfig {
            admin_usernames: vec!["Referee".to_owned()],
            ..AppConfig::default()
        };
        assert!(config.is_admin_username("referee"));
        assert!(!config.is_admin_username("player"));
    }
}
