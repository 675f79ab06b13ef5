use std::{env, fmt::Display, str::FromStr};

use log::{info, warn};

/// Parse a boolean flag from a string value, or return the given default value otherwise.
pub fn parse_boolean_flag(value: Option<String>, default: bool) -> bool {
    let value = match value {
        Some(v) => v,
        None => return default,
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

/// Reads the environment variable `name` and parses it as a `T`. If the variable is missing, or cannot be parsed, the
/// default is returned and the substitution is logged.
pub fn env_parse<T>(name: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(name) {
        Ok(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            warn!("🪛️ {s} is not a valid value for {name}. {e}. Using the default, {default}, instead.");
            default
        }),
        Err(_) => {
            info!("🪛️ {name} is not set. Using the default, {default}.");
            default
        },
    }
}

/// Reads a boolean flag from the environment variable `name`. See [`parse_boolean_flag`] for the accepted values.
pub fn env_flag(name: &str, default: bool) -> bool {
    parse_boolean_flag(env::var(name).ok(), default)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn boolean_flags() {
        assert!(parse_boolean_flag(Some("true".into()), false));
        assert!(parse_boolean_flag(Some(" YES ".into()), false));
        assert!(!parse_boolean_flag(Some("0".into()), true));
        assert!(parse_boolean_flag(Some("maybe".into()), true));
        assert!(!parse_boolean_flag(None, false));
    }

    #[test]
    fn env_parse_falls_back_to_default() {
        env::set_var("RECON_COMMON_TEST_PARSE", "not-a-number");
        assert_eq!(env_parse::<u64>("RECON_COMMON_TEST_PARSE", 7), 7);
        env::set_var("RECON_COMMON_TEST_PARSE", " 42 ");
        assert_eq!(env_parse::<u64>("RECON_COMMON_TEST_PARSE", 7), 42);
        env::remove_var("RECON_COMMON_TEST_PARSE");
        assert_eq!(env_parse::<u64>("RECON_COMMON_TEST_PARSE", 7), 7);
    }
}
