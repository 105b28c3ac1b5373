use dotenvy::dotenv;
use std::env;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub access_token_ttl: usize,
    pub refresh_token_ttl: usize,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_register_per_min: u32,
    pub rate_refresh_per_min: u32,
    pub rate_protected_per_min: u32,

    // Gating policy
    pub biometric_threshold: f64,
    pub external_timeout_secs: u64,

    // Shift lookup cache
    pub shift_cache_capacity: u64,
    pub shift_cache_ttl_secs: u64,

    pub api_prefix: String,
}

fn env_or<T: std::str::FromStr>(key: &str, default: &str) -> T
where
    T::Err: std::fmt::Debug,
{
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .unwrap_or_else(|e| panic!("{key} is not valid: {e:?}"))
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        Self {
            server_addr: env::var("SERVER_ADDR").expect("SERVER_ADDR must be set"),
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            jwt_secret: env::var("JWT_SECRET").expect("JWT_SECRET must be set"),
            access_token_ttl: env_or("ACCESS_TOKEN_TTL", "900"), // 15 min
            refresh_token_ttl: env_or("REFRESH_TOKEN_TTL", "604800"), // 7 days

            rate_login_per_min: env_or("RATE_LOGIN_PER_MIN", "60"),
            rate_register_per_min: env_or("RATE_REGISTER_PER_MIN", "30"),
            rate_refresh_per_min: env_or("RATE_REFRESH_PER_MIN", "30"),
            rate_protected_per_min: env_or("RATE_PROTECTED_PER_MIN", "1000"),

            biometric_threshold: env_or("BIOMETRIC_THRESHOLD", "0.8"),
            external_timeout_secs: env_or("EXTERNAL_TIMEOUT_SECS", "10"),

            shift_cache_capacity: env_or("SHIFT_CACHE_CAPACITY", "10000"),
            shift_cache_ttl_secs: env_or("SHIFT_CACHE_TTL_SECS", "300"),

            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api".to_string()),
        }
    }
}
