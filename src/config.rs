use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "babyvision", about = "Backend for the BabyVision baby-tracking app")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Path to data directory
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub cors: CorsConfig,
    pub email: EmailConfig,
    pub revenuecat: RevenueCatConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub cookie_name: String,
    pub session_hours: u64,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct CorsConfig {
    pub origins: Vec<String>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct EmailConfig {
    pub api_key: Option<String>,
    pub api_base_url: String,
    pub default_from: String,
    pub default_reply_to: String,
    /// Directory holding the HTML templates the startup hook installs.
    pub templates_dir: PathBuf,
    pub app_store_link: String,
    pub play_store_link: String,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct RevenueCatConfig {
    pub api_key: Option<String>,
    pub api_base_url: String,
    pub entitlement_identifier: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 1337,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cookie_name: "babyvision_session".to_string(),
            session_hours: 720,
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        let origins = [
            "http://localhost:3000",
            "http://localhost:3001",
            "http://localhost:8081",
            "http://127.0.0.1:3000",
            "https://babyvision.vn",
            "https://www.babyvision.vn",
            "https://app.babyvision.vn",
            "capacitor://localhost",
            "ionic://localhost",
            "http://localhost",
        ];
        Self {
            origins: origins.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base_url: "https://api.resend.com".to_string(),
            default_from: "onboarding@resend.dev".to_string(),
            default_reply_to: "onboarding@resend.dev".to_string(),
            templates_dir: PathBuf::from("email-templates"),
            app_store_link: "https://apps.apple.com/app/babyvision".to_string(),
            play_store_link: "https://play.google.com/store/apps/details?id=com.babyvision"
                .to_string(),
        }
    }
}

impl Default for RevenueCatConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base_url: "https://api.revenuecat.com/v1".to_string(),
            entitlement_identifier: "premium".to_string(),
        }
    }
}

impl Config {
    /// Load with overrides from the process environment.
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        Self::load_with_env(cli, |key| std::env::var(key).ok())
    }

    /// Defaults, then the TOML file, then `lookup`, then CLI flags.
    pub fn load_with_env<F>(cli: &Cli, lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_dir = Self::data_dir(cli);
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| data_dir.join("config.toml"));

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };

        config.apply_env(lookup)?;

        // CLI overrides
        if let Some(ref host) = cli.host {
            config.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            config.server.port = port;
        }

        // Resolve paths relative to data dir
        if config.database.path.is_none() {
            config.database.path = Some(data_dir.join("babyvision.db"));
        }

        Ok(config)
    }

    /// Environment overrides for secrets and deploy knobs. Takes a lookup
    /// function so tests don't have to mutate the process environment.
    pub fn apply_env<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(host) = non_empty("HOST") {
            self.server.host = host;
        }
        if let Some(port) = non_empty("PORT") {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid PORT {:?}: {}", port, e))?;
        }
        if let Some(origins) = non_empty("CORS_ORIGINS") {
            self.cors.origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(key) = non_empty("RESEND_API_KEY") {
            self.email.api_key = Some(key);
        }
        if let Some(from) = non_empty("EMAIL_DEFAULT_FROM") {
            self.email.default_from = from;
        }
        if let Some(reply_to) = non_empty("EMAIL_DEFAULT_REPLY_TO") {
            self.email.default_reply_to = reply_to;
        }
        if let Some(key) = non_empty("REVENUECAT_SECRET_API_KEY") {
            self.revenuecat.api_key = Some(key);
        }
        if let Some(id) = non_empty("REVENUECAT_ENTITLEMENT_IDENTIFIER") {
            self.revenuecat.entitlement_identifier = id;
        }
        Ok(())
    }

    pub fn data_dir(cli: &Cli) -> PathBuf {
        cli.data_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".babyvision")
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("babyvision.db"))
    }
}
