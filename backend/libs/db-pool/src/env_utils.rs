//! Environment variable parsing helpers with defaults.

use std::str::FromStr;

/// Parse an environment variable, falling back to `default` when it is
/// missing or does not parse.
///
/// ```ignore
/// let port: u16 = parse_env_with_default("PGPORT", 5432);
/// ```
pub fn parse_env_with_default<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read a string variable, treating empty values as unset.
pub fn env_string_or(key: &str, default: &str) -> String {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => v,
        _ => default.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[serial_test::serial]
    fn test_parse_env_with_default() {
        std::env::remove_var("DB_POOL_TEST_PORT");
        let result: u16 = parse_env_with_default("DB_POOL_TEST_PORT", 5432);
        assert_eq!(result, 5432);

        std::env::set_var("DB_POOL_TEST_PORT", "6543");
        let result: u16 = parse_env_with_default("DB_POOL_TEST_PORT", 5432);
        assert_eq!(result, 6543);

        std::env::set_var("DB_POOL_TEST_PORT", "not-a-port");
        let result: u16 = parse_env_with_default("DB_POOL_TEST_PORT", 5432);
        assert_eq!(result, 5432);
        std::env::remove_var("DB_POOL_TEST_PORT");
    }

    #[test]
    #[serial_test::serial]
    fn test_env_string_or_ignores_blank() {
        std::env::set_var("DB_POOL_TEST_HOST", "  ");
        assert_eq!(env_string_or("DB_POOL_TEST_HOST", "localhost"), "localhost");

        std::env::set_var("DB_POOL_TEST_HOST", "db.internal");
        assert_eq!(env_string_or("DB_POOL_TEST_HOST", "localhost"), "db.internal");
        std::env::remove_var("DB_POOL_TEST_HOST");
    }
}
