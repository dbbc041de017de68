use crate::gemini::DEMO_KEY;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-image-preview";

/// Runtime settings, read from the environment (after `.env` is loaded).
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub api_base: String,
    pub model: String,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            api_key: non_empty("GEMINI_API_KEY")
                .or_else(|| non_empty("API_KEY"))
                .unwrap_or_else(|| DEMO_KEY.into()),
            api_base: non_empty("GEMINI_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            model: non_empty("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            port: non_empty("PORT").and_then(|v| v.parse().ok()).unwrap_or(8080),
        }
    }

    pub fn demo() -> Self {
        Self::from_lookup(|_| None)
    }

    /// API key safe for log output.
    pub fn masked_key(&self) -> String {
        format!("{}...", self.api_key.chars().take(6).collect::<String>())
    }
}
