use std::{env, path::PathBuf};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_verification_secret: String,
    pub token_prefix: String,
    pub main_folder: String,
    pub asset_root: PathBuf,
    pub asset_base_url: String,
    pub upload_dir: PathBuf,
    pub public_url: String,
    pub coupon_sweep_seconds: u64,
    pub max_upload_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET is not set"))?;
        let jwt_verification_secret =
            env::var("JWT_VERIFICATION_SECRET").unwrap_or_else(|_| jwt_secret.clone());
        let public_url =
            env::var("PUBLIC_URL").unwrap_or_else(|_| format!("http://localhost:{port}"));

        Ok(Self {
            database_url,
            host,
            port,
            jwt_secret,
            jwt_verification_secret,
            token_prefix: env::var("TOKEN_PREFIX").unwrap_or_else(|_| "Bearer ".to_string()),
            main_folder: env::var("MAIN_FOLDER").unwrap_or_else(|_| "ecommerce".to_string()),
            asset_root: env::var("ASSET_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./assets")),
            asset_base_url: env::var("ASSET_BASE_URL")
                .unwrap_or_else(|_| format!("{public_url}/assets")),
            upload_dir: env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./uploads")),
            public_url,
            coupon_sweep_seconds: env::var("COUPON_SWEEP_SECONDS")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .filter(|s| *s > 0)
                .unwrap_or(60),
            max_upload_bytes: env::var("MAX_UPLOAD_BYTES")
                .ok()
                .and_then(|s| s.parse::<usize>().ok())
                .unwrap_or(10 * 1024 * 1024),
        })
    }

    /// Configuration with fixed local defaults, used by tests and tooling that
    /// must not depend on the process environment.
    pub fn local(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            host: "127.0.0.1".into(),
            port: 3000,
            jwt_secret: "local-login-secret".into(),
            jwt_verification_secret: "local-verification-secret".into(),
            token_prefix: "Bearer ".into(),
            main_folder: "ecommerce".into(),
            asset_root: PathBuf::from("./assets"),
            asset_base_url: "http://localhost:3000/assets".into(),
            upload_dir: PathBuf::from("./uploads"),
            public_url: "http://localhost:3000".into(),
            coupon_sweep_seconds: 60,
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}
