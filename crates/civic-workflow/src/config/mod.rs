use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crate::workflows::approvals::{ApplicationType, DocumentRequirements, DocumentType};

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub workflow: WorkflowConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                ansi: environment == AppEnvironment::Development,
            },
            workflow: WorkflowConfig::from_env()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub ansi: bool,
}

/// Per-ULB workflow settings.
#[derive(Debug, Clone, Default)]
pub struct WorkflowConfig {
    pub required_documents: DocumentRequirements,
}

impl WorkflowConfig {
    const OVERRIDES: [(&'static str, ApplicationType); 3] = [
        ("APP_REQUIRED_DOCS_PROPERTY", ApplicationType::Property),
        ("APP_REQUIRED_DOCS_WATER_CONNECTION", ApplicationType::WaterConnection),
        ("APP_REQUIRED_DOCS_SHOP_REGISTRATION", ApplicationType::ShopRegistration),
    ];

    /// Start from the standard document sets and apply any `APP_REQUIRED_DOCS_*` overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut required_documents = DocumentRequirements::default();
        for (variable, application_type) in Self::OVERRIDES {
            if let Ok(raw) = env::var(variable) {
                let documents = parse_document_list(variable, &raw)?;
                required_documents = required_documents.with(application_type, &documents);
            }
        }
        Ok(Self { required_documents })
    }
}

fn parse_document_list(variable: &'static str, raw: &str) -> Result<Vec<DocumentType>, ConfigError> {
    let mut documents = Vec::new();
    for value in raw.split(',').map(str::trim).filter(|value| !value.is_empty()) {
        let document = DocumentType::parse(value).ok_or_else(|| ConfigError::UnknownDocumentType {
            variable,
            value: value.to_string(),
        })?;
        if !documents.contains(&document) {
            documents.push(document);
        }
    }

    if documents.is_empty() {
        return Err(ConfigError::EmptyDocumentList { variable });
    }
    Ok(documents)
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    UnknownDocumentType { variable: &'static str, value: String },
    EmptyDocumentList { variable: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::UnknownDocumentType { variable, value } => {
                write!(f, "{variable} lists unknown document type '{value}'")
            }
            ConfigError::EmptyDocumentList { variable } => {
                write!(f, "{variable} must name at least one document type")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::UnknownDocumentType { .. }
            | ConfigError::EmptyDocumentList { .. } => None,
        }
    }
}
