/// Environment-driven application settings.
#[derive(Clone, Debug, Default)]
pub struct AppConfig {
    pub cors_allowed_origins: Vec<String>,
}

impl AppConfig {
    pub fn load() -> Self {
        let raw = std::env::var("CORS_ALLOWED_ORIGINS").unwrap_or_default();
        Self {
            cors_allowed_origins: parse_origins(&raw),
        }
    }
}

/// Splits a comma-separated origin list, dropping blanks. An empty result
/// means the CORS layer falls back to allowing any origin.
fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .filter_map(|entry| {
            let trimmed = entry.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
        .collect()
}
