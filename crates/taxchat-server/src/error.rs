use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {env_var}")]
    MissingEnvVar { env_var: String },
    #[error("Invalid server address {host}:{port}")]
    InvalidAddress { host: String, port: u16 },
    #[error("Configuration error: {0}")]
    Other(#[from] config::ConfigError),
}

// Helper function to format environment variable names
pub fn to_env_var(field_path: &str) -> String {
    // Nested fields are separated by double underscores
    format!("TAXCHAT_{}", field_path.replace('.', "__").to_uppercase())
}
