use crate::error::ConfigError;
use std::env;

const DEFAULT_ENDPOINT: &str = "https://cloud.appwrite.io/v1";
const DEFAULT_STATS_SCAN_LIMIT: usize = 1000;
const DEFAULT_ROLE_CLAIM_TTL_SECONDS: i64 = 3600;

/// Runtime configuration, read once at startup and passed around explicitly.
#[derive(Debug, Clone)]
pub struct Config {
    pub endpoint: String,
    pub project_id: String,
    pub database_id: String,
    pub activities_collection_id: String,
    pub users_collection_id: String,
    /// Server key; needed only for deleting identities during register rollback
    pub api_key: Option<String>,
    pub signing_key: String,
    pub stats_scan_limit: usize,
    pub role_claim_ttl_seconds: i64,
    pub secure_cookies: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup. Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let stats_scan_limit = match get("STATS_SCAN_LIMIT") {
            Some(raw) => raw
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::Invalid { key: "STATS_SCAN_LIMIT", value: raw })?,
            None => DEFAULT_STATS_SCAN_LIMIT,
        };

        let role_claim_ttl_seconds = match get("ROLE_CLAIM_TTL_SECONDS") {
            Some(raw) => raw
                .parse::<i64>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::Invalid { key: "ROLE_CLAIM_TTL_SECONDS", value: raw })?,
            None => DEFAULT_ROLE_CLAIM_TTL_SECONDS,
        };

        let secure_cookies = match get("SECURE_COOKIES") {
            Some(raw) => match raw.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => return Err(ConfigError::Invalid { key: "SECURE_COOKIES", value: raw }),
            },
            None => true,
        };

        Ok(Self {
            endpoint: get("APPWRITE_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
                .trim_end_matches('/')
                .to_string(),
            project_id: required("APPWRITE_PROJECT_ID")?,
            database_id: required("APPWRITE_DATABASE_ID")?,
            activities_collection_id: required("APPWRITE_ACTIVITIES_COLLECTION_ID")?,
            users_collection_id: required("APPWRITE_USERS_COLLECTION_ID")?,
            api_key: get("APPWRITE_API_KEY"),
            signing_key: required("SESSION_SIGNING_KEY")?,
            stats_scan_limit,
            role_claim_ttl_seconds,
            secure_cookies,
        })
    }

    /// Name of the platform session cookie, `a_session_<projectId>`
    pub fn session_cookie_name(&self) -> String {
        format!("a_session_{}", self.project_id)
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        endpoint: DEFAULT_ENDPOINT.to_string(),
        project_id: "staj".to_string(),
        database_id: "main".to_string(),
        activities_collection_id: "activities".to_string(),
        users_collection_id: "users".to_string(),
        api_key: None,
        signing_key: "test-signing-key".to_string(),
        stats_scan_limit: DEFAULT_STATS_SCAN_LIMIT,
        role_claim_ttl_seconds: DEFAULT_ROLE_CLAIM_TTL_SECONDS,
        secure_cookies: false,
    }
}
