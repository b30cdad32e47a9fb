use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{AppError, AppResult};
use crate::models::Sphere;

pub const DEFAULT_BASE_URL: &str = "https://apidatalake.tesouro.gov.br/ords/siconfi/tt";

#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub output_dir: PathBuf,
    pub request_delay: Duration,
    pub directory_timeout: Duration,
    pub query_timeout: Duration,
    pub single_variant_spheres: Vec<Sphere>,
    pub environment: String,
    pub otel_enabled: bool,
    pub otel_service_name: String,
    pub otel_exporter_endpoint: String,
}

impl Config {
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let var = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        Ok(Self {
            base_url: var("SICONFI_BASE_URL", DEFAULT_BASE_URL),
            output_dir: PathBuf::from(var("SICONFI_OUTPUT_DIR", "output")),
            request_delay: Duration::from_millis(parse(
                "SICONFI_REQUEST_DELAY_MS",
                &var("SICONFI_REQUEST_DELAY_MS", "200"),
            )?),
            directory_timeout: Duration::from_secs(parse(
                "SICONFI_DIRECTORY_TIMEOUT_SECS",
                &var("SICONFI_DIRECTORY_TIMEOUT_SECS", "60"),
            )?),
            query_timeout: Duration::from_secs(parse(
                "SICONFI_QUERY_TIMEOUT_SECS",
                &var("SICONFI_QUERY_TIMEOUT_SECS", "60"),
            )?),
            single_variant_spheres: parse_spheres(
                "SICONFI_SINGLE_VARIANT_SPHERES",
                &var("SICONFI_SINGLE_VARIANT_SPHERES", "U,E,D"),
            )?,
            environment: var("ENVIRONMENT", "development"),
            otel_enabled: parse("OTEL_ENABLED", &var("OTEL_ENABLED", "false"))?,
            otel_service_name: var("OTEL_SERVICE_NAME", "siconfi-extractor"),
            otel_exporter_endpoint: var("OTEL_EXPORTER_OTLP_ENDPOINT", "http://localhost:4317"),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

fn parse<T: FromStr>(name: &str, raw: &str) -> AppResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::Config(format!("{name} has an invalid value: {raw:?}")))
}

fn parse_spheres(name: &str, raw: &str) -> AppResult<Vec<Sphere>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|code| {
            code.parse::<Sphere>()
                .map_err(|e| AppError::Config(format!("{name}: {e}")))
        })
        .collect()
}
