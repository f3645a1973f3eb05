//! Application-level configuration loading: registry limits, session timings
//! and the location of the question bank.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::state::{registry::RegistryOptions, session::SessionSettings};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "QUIZ_RELAY_CONFIG_PATH";

const DEFAULT_MAX_SESSIONS: usize = 16;
const DEFAULT_MAX_PLAYERS: usize = 2;
const DEFAULT_QUESTION_TIME_LIMIT_MS: u64 = 3_000;
const DEFAULT_GRACE_PERIOD_MS: u64 = 500;
const DEFAULT_LEAD_IN_MS: u64 = 3_000;
const DEFAULT_QUESTIONS_PATH: &str = "resources/questions.json";
const DEFAULT_INTAKE_CAPACITY: usize = 64;
const DEFAULT_CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    max_sessions: usize,
    max_players_per_session: usize,
    question_time_limit: Duration,
    grace_period: Duration,
    lead_in: Duration,
    questions_path: PathBuf,
    intake_capacity: usize,
    channel_capacity: usize,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        max_sessions = app_config.max_sessions,
                        max_players = app_config.max_players_per_session,
                        "loaded configuration"
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

    /// Where the question bank is read from.
    pub fn questions_path(&self) -> &PathBuf {
        &self.questions_path
    }

    /// Buffer size of each session broadcast channel.
    pub fn channel_capacity(&self) -> usize {
        self.channel_capacity
    }

    /// Settings applied to every session the registry creates.
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            max_players: self.max_players_per_session,
            question_time_limit: self.question_time_limit,
            grace_period: self.grace_period,
            lead_in: self.lead_in,
        }
    }

    /// Registry limits derived from this configuration.
    pub fn registry_options(&self) -> RegistryOptions {
        RegistryOptions {
            max_sessions: self.max_sessions,
            intake_capacity: self.intake_capacity,
            session: self.session_settings(),
        }
    }

    /// Override the session timings, keeping everything else.
    pub fn with_timings(
        mut self,
        question_time_limit: Duration,
        grace_period: Duration,
        lead_in: Duration,
    ) -> Self {
        self.question_time_limit = question_time_limit;
        self.grace_period = grace_period;
        self.lead_in = lead_in;
        self
    }

    /// Override the registry and roster limits, ignoring zero values.
    pub fn with_limits(mut self, max_sessions: usize, max_players_per_session: usize) -> Self {
        self.max_sessions = non_zero_or(Some(max_sessions), self.max_sessions, "maxSessions");
        self.max_players_per_session = non_zero_or(
            Some(max_players_per_session),
            self.max_players_per_session,
            "maxPlayersPerSession",
        );
        self
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_sessions: DEFAULT_MAX_SESSIONS,
            max_players_per_session: DEFAULT_MAX_PLAYERS,
            question_time_limit: Duration::from_millis(DEFAULT_QUESTION_TIME_LIMIT_MS),
            grace_period: Duration::from_millis(DEFAULT_GRACE_PERIOD_MS),
            lead_in: Duration::from_millis(DEFAULT_LEAD_IN_MS),
            questions_path: PathBuf::from(DEFAULT_QUESTIONS_PATH),
            intake_capacity: DEFAULT_INTAKE_CAPACITY,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    max_sessions: Option<usize>,
    max_players_per_session: Option<usize>,
    question_time_limit_ms: Option<u64>,
    grace_period_ms: Option<u64>,
    lead_in_ms: Option<u64>,
    questions_path: Option<PathBuf>,
    intake_capacity: Option<usize>,
    channel_capacity: Option<usize>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = AppConfig::default();
        Self {
            max_sessions: non_zero_or(value.max_sessions, defaults.max_sessions, "maxSessions"),
            max_players_per_session: non_zero_or(
                value.max_players_per_session,
                defaults.max_players_per_session,
                "maxPlayersPerSession",
            ),
            question_time_limit: value
                .question_time_limit_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.question_time_limit),
            grace_period: value
                .grace_period_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.grace_period),
            lead_in: value
                .lead_in_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.lead_in),
            questions_path: value.questions_path.unwrap_or(defaults.questions_path),
            intake_capacity: non_zero_or(
                value.intake_capacity,
                defaults.intake_capacity,
                "intakeCapacity",
            ),
            channel_capacity: non_zero_or(
                value.channel_capacity,
                defaults.channel_capacity,
                "channelCapacity",
            ),
        }
    }
}

/// Keep `value` unless it is zero, in which case warn and use `default`.
fn non_zero_or(value: Option<usize>, default: usize, key: &str) -> usize {
    match value {
        Some(0) => {
            warn!(key, default, "zero is not allowed; using default");
            default
        }
        Some(value) => value,
        None => default,
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
