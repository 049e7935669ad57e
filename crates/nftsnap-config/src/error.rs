use std::fmt;

/// Fatal configuration problem. Never retried; the run stops with this message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required environment variable is unset or empty.
    MissingEnv { var: &'static str },
    UnknownChain { name: String },
    Io { path: String, message: String },
    /// Registry file is not valid JSON or has the wrong shape.
    Registry { path: String, message: String },
    UnknownProject { project: String, available: Vec<String> },
    BadAddress { project: String, raw: String },
    /// Settings YAML could not be parsed or merged.
    Yaml(String),
    InvalidSetting { pointer: String, message: String },
    /// A settings leaf looks like a literal secret. The value is never printed.
    SecretDetected { pointer: String },
    UnusedKeys { count: usize, preview: Vec<String> },
    /// The node behind the RPC URL serves a different chain.
    ChainIdMismatch { expected: u64, actual: u64 },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingEnv { var } => write!(f, "{var} is not set"),
            ConfigError::UnknownChain { name } => write!(
                f,
                "chain '{name}' not supported (expected Soneium, Sepolia or AstarZkEvm)"
            ),
            ConfigError::Io { path, message } => write!(f, "read '{path}': {message}"),
            ConfigError::Registry { path, message } => {
                write!(f, "project registry '{path}': {message}")
            }
            ConfigError::UnknownProject { project, available } => write!(
                f,
                "project '{project}' not found in registry (available: {})",
                available.join(", ")
            ),
            ConfigError::BadAddress { project, raw } => {
                write!(f, "project '{project}': invalid contract address '{raw}'")
            }
            ConfigError::Yaml(msg) => write!(f, "invalid settings yaml: {msg}"),
            ConfigError::InvalidSetting { pointer, message } => {
                write!(f, "invalid setting {pointer}: {message}")
            }
            ConfigError::SecretDetected { pointer } => {
                write!(f, "CONFIG_SECRET_DETECTED leaf={pointer} value=REDACTED")
            }
            ConfigError::UnusedKeys { count, preview } => write!(
                f,
                "CONFIG_UNUSED_KEYS: {count} unused settings key(s) detected. First few: {preview:?}"
            ),
            ConfigError::ChainIdMismatch { expected, actual } => write!(
                f,
                "rpc endpoint serves chain id {actual}, configured chain id is {expected}"
            ),
        }
    }
}

impl std::error::Error for ConfigError {}
