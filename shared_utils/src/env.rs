use std::str::FromStr;

use thiserror::Error;

/// Errors raised while reading process environment variables.
#[derive(Debug, Error)]
pub enum EnvError {
    /// An environment variable required by the application is not set.
    #[error("Missing environment variable: {0}")]
    Missing(String),

    /// An environment variable is set but its value cannot be parsed.
    #[error("Invalid value for {name}: {value:?}")]
    Invalid { name: String, value: String },
}

/// Reads an environment variable, returning a structured error if it's missing.
///
/// This is a thin wrapper around `std::env::var` that provides a more
/// ergonomic and specific error type for missing variables.
///
/// # Arguments
/// * `name` - The name of the environment variable to read.
pub fn get_env_var(name: &str) -> Result<String, EnvError> {
    std::env::var(name).map_err(|_| EnvError::Missing(name.to_string()))
}

/// Reads an environment variable, substituting `default` when it is not set.
pub fn get_env_var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Reads an environment variable and parses it into `T`, substituting
/// `default` when the variable is not set.
///
/// A set-but-unparseable value is an [`EnvError::Invalid`] rather than a
/// silent fallback, so typos in numeric settings surface at startup.
pub fn get_env_parsed<T: FromStr>(name: &str, default: T) -> Result<T, EnvError> {
    match std::env::var(name) {
        Ok(raw) => raw.parse::<T>().map_err(|_| EnvError::Invalid {
            name: name.to_string(),
            value: raw,
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_var_is_structured_error() {
        let err = get_env_var("SHARED_UTILS_TEST_DOES_NOT_EXIST").unwrap_err();
        assert!(matches!(err, EnvError::Missing(_)));
        assert!(err.to_string().contains("SHARED_UTILS_TEST_DOES_NOT_EXIST"));
    }

    #[test]
    fn default_used_when_unset() {
        assert_eq!(
            get_env_var_or("SHARED_UTILS_TEST_DOES_NOT_EXIST", "fallback"),
            "fallback"
        );
    }

    #[test]
    fn parsed_default_when_unset() {
        let v: u32 = get_env_parsed("SHARED_UTILS_TEST_DOES_NOT_EXIST", 22).unwrap();
        assert_eq!(v, 22);
    }

    #[test]
    fn set_but_unparseable_is_invalid() {
        // SAFETY: test-local variable name, no other test reads it.
        unsafe { std::env::set_var("SHARED_UTILS_TEST_BAD_NUMBER", "not-a-number") };
        let err = get_env_parsed::<u32>("SHARED_UTILS_TEST_BAD_NUMBER", 0).unwrap_err();
        assert!(matches!(err, EnvError::Invalid { .. }));
        unsafe { std::env::remove_var("SHARED_UTILS_TEST_BAD_NUMBER") };
    }
}
