use thiserror::Error;

/// Errors raised while loading or validating rate control configuration.
///
/// Internal invariant violations of the rate controller are not represented
/// here: they are logic bugs and abort with a panic.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("option {name} out of range, value: {value}, max: {max}")]
    OutOfRange {
        name: &'static str,
        value: u64,
        max: u64,
    },

    #[error("option {0} must be greater than zero")]
    Zero(&'static str),

    #[error("failed reading configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed parsing configuration: {0}")]
    Parse(#[from] toml::de::Error),
}
