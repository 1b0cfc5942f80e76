use thiserror::Error;

/// Error taxonomy for the representation core (spec §7).
///
/// Every fallible boundary in this crate — config parsing, net/layer
/// construction, (de)serialization, contract checks on substrate
/// operations — returns one of these variants rather than panicking, so an
/// embedding host can decide how to react instead of the process aborting
/// under it.
#[derive(Error, Debug)]
pub enum XcsfError {
    #[error("missing required config key: {0}")]
    MissingConfigKey(String),
    #[error("invalid value for config key {key}: {value}")]
    InvalidConfigValue { key: String, value: String },
    #[error("invalid layer arguments: {0}")]
    InvalidLayerArgs(String),
    #[error("shape mismatch: expected length {expected}, found {found}")]
    ShapeMismatch { expected: usize, found: usize },
    #[error("net contract violation: {0}")]
    NetContractViolation(String),
    #[error("GP tree exceeded max length during growth after {attempts} attempts")]
    GpGrowthExhausted { attempts: usize },
    #[error("cover failed to match the input within {attempts} re-randomizations")]
    CoveringExhausted { attempts: usize },
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("short read: expected {expected} bytes, got {found}")]
    ShortRead { expected: usize, found: usize },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unknown substrate tag: {0}")]
    UnknownTag(String),
}

pub type XcsfResult<T> = Result<T, XcsfError>;
