use std::env;
use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;
use tracing::info;

use crate::error::ChorusError;

static RE_USERNAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("static regex"));

/// Which text-completion provider the decision engine talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    Anthropic,
    OpenAi,
}

impl LlmProvider {
    fn default_model(&self) -> &'static str {
        match self {
            LlmProvider::Anthropic => "claude-sonnet-4-20250514",
            LlmProvider::OpenAi => "gpt-4o",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CerebroConfig {
    pub base_url: String,
    pub api_key: String,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // X
    pub x_username: String,
    pub x_access_token: String,
    pub dry_run: bool,
    pub start_users_subscription: bool,
    pub allow_search_users_subscription: bool,
    pub target_users: Vec<String>,

    // Subscription loop
    /// Minutes between successful iterations.
    pub subscription_action_interval: u64,
    pub profiles_check_limit: usize,
    pub subscription_tweet_fetch_limit: u32,
    pub decision_max_attempts: u32,

    // Text completion
    pub llm_provider: LlmProvider,
    pub llm_model: String,
    pub llm_api_key: String,

    // Processed-item ledger
    pub database_url: String,

    // Persona
    pub character_path: PathBuf,

    // Analytics, present only when enabled
    pub cerebro: Option<CerebroConfig>,
}

/// Parse loose boolean text. `None` for anything unrecognised, including empty.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "1" | "on" | "enable" | "enabled" => Some(true),
        "false" | "no" | "n" | "0" | "off" | "disable" | "disabled" => Some(false),
        _ => None,
    }
}

/// Parse a positive integer, falling back to `default` when missing or
/// unparsable. Parsed values are clamped to at least 1.
pub fn parse_positive(value: Option<&str>, default: u64) -> u64 {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => default,
        Some(v) => v
            .parse::<i64>()
            .map(|n| n.max(1) as u64)
            .unwrap_or(default),
    }
}

/// Split a comma-separated list, dropping blanks.
pub fn parse_list(value: Option<&str>) -> Vec<String> {
    value
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Validate an X handle. `*` is accepted as a wildcard.
pub fn validate_username(username: &str) -> Result<(), String> {
    if username == "*" {
        return Ok(());
    }
    if username.is_empty() {
        return Err("An X username must be at least 1 character long".into());
    }
    if username.len() > 15 {
        return Err(format!("An X username cannot exceed 15 characters: {username}"));
    }
    if !RE_USERNAME.is_match(username) {
        return Err(format!(
            "An X username can only contain letters, numbers, and underscores: {username}"
        ));
    }
    Ok(())
}

fn redact(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 4 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{tail}")
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ChorusError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup. All validation
    /// failures are reported together.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ChorusError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut errors: Vec<String> = Vec::new();

        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let flag = |key: &str| get(key).and_then(|v| parse_bool(&v)).unwrap_or(false);
        let required = |errors: &mut Vec<String>, key: &str| match get(key) {
            Some(v) => v,
            None => {
                errors.push(format!("{key}: required"));
                String::new()
            }
        };

        let x_username = required(&mut errors, "X_USERNAME");
        let x_access_token = required(&mut errors, "X_ACCESS_TOKEN");
        let database_url = required(&mut errors, "DATABASE_URL");
        let character_path = PathBuf::from(required(&mut errors, "CHARACTER_PATH"));

        let llm_provider = match get("LLM_PROVIDER").as_deref().map(str::to_ascii_lowercase) {
            None => LlmProvider::Anthropic,
            Some(p) if p == "anthropic" => LlmProvider::Anthropic,
            Some(p) if p == "openai" => LlmProvider::OpenAi,
            Some(other) => {
                errors.push(format!("LLM_PROVIDER: unknown provider '{other}'"));
                LlmProvider::Anthropic
            }
        };
        let key_var = match llm_provider {
            LlmProvider::Anthropic => "ANTHROPIC_API_KEY",
            LlmProvider::OpenAi => "OPENAI_API_KEY",
        };
        let llm_api_key = required(&mut errors, key_var);

        let cerebro = if flag("CEREBRO_ENABLED") {
            Some(CerebroConfig {
                base_url: required(&mut errors, "CEREBRO_BASE_URL"),
                api_key: required(&mut errors, "CEREBRO_API_KEY"),
            })
        } else {
            None
        };

        if !x_username.is_empty() {
            if let Err(e) = validate_username(&x_username) {
                errors.push(format!("X_USERNAME: {e}"));
            }
        }

        let target_users = parse_list(get("X_TARGET_USERS").as_deref());
        for user in &target_users {
            if let Err(e) = validate_username(user) {
                errors.push(format!("X_TARGET_USERS: {e}"));
            }
        }

        if !errors.is_empty() {
            return Err(ChorusError::Config(format!(
                "configuration validation failed:\n{}",
                errors.join("\n")
            )));
        }

        Ok(Self {
            x_username,
            x_access_token,
            dry_run: flag("X_DRY_RUN"),
            start_users_subscription: flag("X_START_USERS_SUBSCRIPTION"),
            allow_search_users_subscription: flag("X_ALLOW_SEARCH_USERS_SUBSCRIPTION"),
            target_users,
            subscription_action_interval: parse_positive(
                get("SUBSCRIPTION_ACTION_INTERVAL").as_deref(),
                10,
            ),
            profiles_check_limit: usize::try_from(parse_positive(
                get("X_PROFILES_CHECK_LIMIT").as_deref(),
                22,
            ))
            .unwrap_or(usize::MAX),
            subscription_tweet_fetch_limit: u32::try_from(parse_positive(
                get("SUBSCRIPTION_TWEET_FETCH_LIMIT").as_deref(),
                20,
            ))
            .unwrap_or(u32::MAX),
            decision_max_attempts: u32::try_from(parse_positive(
                get("DECISION_MAX_ATTEMPTS").as_deref(),
                8,
            ))
            .unwrap_or(u32::MAX),
            llm_model: get("LLM_MODEL").unwrap_or_else(|| llm_provider.default_model().to_string()),
            llm_provider,
            llm_api_key,
            database_url,
            character_path,
            cerebro,
        })
    }

    /// Log the effective configuration with secrets masked.
    pub fn log_redacted(&self) {
        info!(
            x_username = %self.x_username,
            x_access_token = %redact(&self.x_access_token),
            dry_run = self.dry_run,
            start_users_subscription = self.start_users_subscription,
            allow_search_users_subscription = self.allow_search_users_subscription,
            action_interval_minutes = self.subscription_action_interval,
            profiles_check_limit = self.profiles_check_limit,
            tweet_fetch_limit = self.subscription_tweet_fetch_limit,
            decision_max_attempts = self.decision_max_attempts,
            llm_provider = ?self.llm_provider,
            llm_model = %self.llm_model,
            llm_api_key = %redact(&self.llm_api_key),
            character_path = %self.character_path.display(),
            cerebro_enabled = self.cerebro.is_some(),
            "Configuration loaded"
        );
    }
}
