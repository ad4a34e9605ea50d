use serde::Deserialize;

/// Advice served when the text generator is unavailable.
pub const DEFAULT_ADVICE_FALLBACK: &str =
    "Lleve un registro sencillo de sus ingresos y gastos cada semana: saber en qué se va el dinero es el primer paso para ahorrar.";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub advice_cache_path: String,
    pub advice_fallback: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: std::env::var("DATABASE_URL")
                .or_else(|_| std::env::var("DB_URL"))
                .map_err(|_| {
                    anyhow::anyhow!("DATABASE_URL or DB_URL environment variable required")
                })
                .and_then(|url| {
                    if url.trim().is_empty() {
                        anyhow::bail!("DATABASE_URL cannot be empty");
                    }
                    if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                        anyhow::bail!("DATABASE_URL must start with postgresql:// or postgres://");
                    }
                    Ok(url)
                })?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            gemini_api_key: std::env::var("GEMINI_API_KEY")
                .or_else(|_| std::env::var("GOOGLE_API_KEY"))
                .map_err(|_| {
                    anyhow::anyhow!("GEMINI_API_KEY or GOOGLE_API_KEY environment variable required")
                })
                .and_then(|key| {
                    if key.trim().is_empty() {
                        anyhow::bail!("GEMINI_API_KEY cannot be empty");
                    }
                    Ok(key)
                })?,
            gemini_model: std::env::var("GEMINI_MODEL")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "gemini-1.5-flash".to_string()),
            gemini_base_url: std::env::var("GEMINI_BASE_URL")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(|url| {
                    if !url.starts_with("http://") && !url.starts_with("https://") {
                        anyhow::bail!("GEMINI_BASE_URL must start with http:// or https://");
                    }
                    Ok(url.trim_end_matches('/').to_string())
                })
                .transpose()?
                .unwrap_or_else(|| "https://generativelanguage.googleapis.com".to_string()),
            advice_cache_path: std::env::var("ADVICE_CACHE_PATH")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "consejo.json".to_string()),
            advice_fallback: std::env::var("ADVICE_FALLBACK")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_ADVICE_FALLBACK.to_string()),
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!(
            "Database URL: {}...",
            config.database_url.chars().take(20).collect::<String>()
        );
        tracing::debug!("Gemini model: {}", config.gemini_model);
        tracing::debug!("Gemini base URL: {}", config.gemini_base_url);
        tracing::debug!("Advice cache file: {}", config.advice_cache_path);
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }
}
