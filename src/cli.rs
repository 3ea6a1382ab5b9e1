//! CLI argument parsing, validation, and startup helpers.

use crate::ServerConfig;
use crate::jwt::TokenLifetimes;
use clap::Parser;
use std::num::NonZeroU32;
use tracing::error;
use url::Url;

const MIN_JWT_SECRET_LENGTH: usize = 32;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "tokenrelay",
    about = "Dual-token session server: short-lived access tokens, cookie-bound refresh tokens"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "8000", env = "PORT")]
    pub port: u16,

    /// Path to file containing JWT secret. Prefer using JWT_SECRET env var instead
    #[arg(long)]
    pub jwt_secret_file: Option<String>,

    /// Browser origin allowed to make credentialed requests (e.g., "http://localhost:3000")
    #[arg(long, default_value = "http://localhost:3000", value_parser = validate_origin)]
    pub frontend_origin: Url,

    /// Set the Secure flag on the refresh cookie (enable when serving over HTTPS)
    #[arg(long)]
    pub secure_cookies: bool,

    /// Access token lifetime in seconds
    #[arg(long, default_value_t = TokenLifetimes::default().access_secs)]
    pub access_token_ttl: u64,

    /// Refresh token lifetime in seconds
    #[arg(long, default_value_t = TokenLifetimes::default().refresh_secs)]
    pub refresh_token_ttl: u64,

    /// Subject identity issued on login
    #[arg(long, default_value = "1")]
    pub login_subject: String,

    /// Requests per second per client IP on session endpoints (0 disables)
    #[arg(long, default_value = "20")]
    pub session_rate_limit: u32,

    /// Take the client IP from X-Forwarded-For (only behind a trusted proxy)
    #[arg(long)]
    pub trust_forwarded_for: bool,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

fn validate_origin(s: &str) -> Result<Url, String> {
    let url = Url::parse(s).map_err(|e| format!("Invalid origin URL {}: {}", s, e))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("Origin must use http or https: {}", s));
    }

    if url.host_str().is_none() {
        return Err(format!("Origin must include a host: {}", s));
    }

    Ok(url)
}

fn validate_lifetimes(access_secs: u64, refresh_secs: u64) -> Result<TokenLifetimes, String> {
    if access_secs == 0 || refresh_secs == 0 {
        return Err("Token lifetimes must be greater than zero".to_string());
    }

    if access_secs >= refresh_secs {
        return Err(format!(
            "Access token lifetime ({}s) must be shorter than refresh token lifetime ({}s)",
            access_secs, refresh_secs
        ));
    }

    Ok(TokenLifetimes {
        access_secs,
        refresh_secs,
    })
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load JWT secret from environment variable or file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_jwt_secret(jwt_secret_file: Option<&str>) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var("JWT_SECRET") {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var("JWT_SECRET") };
        secret
    } else if let Some(path) = jwt_secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read JWT secret file");
                return None;
            }
        }
    } else {
        error!(
            "JWT secret is required. Set JWT_SECRET environment variable (recommended) or use --jwt-secret-file"
        );
        return None;
    };

    if secret.len() < MIN_JWT_SECRET_LENGTH {
        error!(
            "JWT secret is shorter than {} characters. Use a longer secret",
            MIN_JWT_SECRET_LENGTH
        );
        return None;
    }

    Some(secret)
}

/// Build ServerConfig from validated arguments.
/// Returns None and logs an error if the arguments are inconsistent.
pub fn build_config(args: &Args, jwt_secret: String) -> Option<ServerConfig> {
    let lifetimes = match validate_lifetimes(args.access_token_ttl, args.refresh_token_ttl) {
        Ok(lifetimes) => lifetimes,
        Err(e) => {
            error!("{}", e);
            return None;
        }
    };

    if args.login_subject.trim().is_empty() {
        error!("Login subject must not be empty");
        return None;
    }

    if args.secure_cookies && args.frontend_origin.scheme() != "https" {
        tracing::warn!(
            origin = %args.frontend_origin,
            "Secure cookies enabled but frontend origin is not HTTPS"
        );
    }

    Some(ServerConfig {
        jwt_secret: jwt_secret.into_bytes(),
        lifetimes,
        secure_cookies: args.secure_cookies,
        frontend_origin: Some(args.frontend_origin.clone()),
        login_subject: args.login_subject.clone(),
        session_rate_limit: NonZeroU32::new(args.session_rate_limit),
        trust_forwarded: args.trust_forwarded_for,
    })
}
