use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_plane_url: String,
    pub data_plane_service_key: String,
    pub jwt_secret: String,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            data_plane_url: env::var("DATA_PLANE_URL")
                .unwrap_or_else(|_| {
                    warn!("DATA_PLANE_URL not set, using empty value");
                    String::new()
                }),
            data_plane_service_key: env::var("DATA_PLANE_SERVICE_KEY")
                .unwrap_or_else(|_| {
                    warn!("DATA_PLANE_SERVICE_KEY not set, using empty value");
                    String::new()
                }),
            jwt_secret: env::var("APP_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("APP_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.data_plane_url.is_empty()
            && !self.data_plane_service_key.is_empty()
            && !self.jwt_secret.is_empty()
    }
}
