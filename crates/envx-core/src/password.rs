//! Password source precedence: explicit value, then environment variable.

use secrecy::SecretString;

use crate::error::{EnvxError, EnvxResult};

/// Resolve the password for an encrypt/decrypt operation.
///
/// `explicit` wins; otherwise the environment variable `env_var` is read.
/// An explicitly supplied empty string is a valid password. An empty
/// environment variable is treated as unset.
pub fn resolve_password(explicit: Option<String>, env_var: &str) -> EnvxResult<SecretString> {
    resolve_password_from(explicit, env_var, std::env::var(env_var).ok())
}

/// Same as [`resolve_password`] with the environment value passed in.
pub fn resolve_password_from(
    explicit: Option<String>,
    env_var: &str,
    env_value: Option<String>,
) -> EnvxResult<SecretString> {
    if let Some(p) = explicit {
        return Ok(SecretString::from(p));
    }
    match env_value {
        Some(v) if !v.is_empty() => {
            tracing::debug!(env_var, "password taken from environment");
            Ok(SecretString::from(v))
        }
        _ => Err(EnvxError::PasswordRequired {
            env_var: env_var.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_explicit_wins_over_env() {
        let pw = resolve_password_from(Some("flag".into()), "ENVX_PASSWORD", Some("env".into()))
            .unwrap();
        assert_eq!(pw.expose_secret(), "flag");
    }

    #[test]
    fn test_env_fallback() {
        let pw = resolve_password_from(None, "ENVX_PASSWORD", Some("env".into())).unwrap();
        assert_eq!(pw.expose_secret(), "env");
    }

    #[test]
    fn test_missing_password() {
        let err = resolve_password_from(None, "ENVX_PASSWORD", None).unwrap_err();
        assert_eq!(err.kind(), "password_required");
        assert!(err.to_string().contains("ENVX_PASSWORD"));

        let err = resolve_password_from(None, "ENVX_PASSWORD", Some(String::new())).unwrap_err();
        assert_eq!(err.kind(), "password_required");
    }

    #[test]
    fn test_explicit_empty_is_allowed() {
        let pw = resolve_password_from(Some(String::new()), "ENVX_PASSWORD", None).unwrap();
        assert_eq!(pw.expose_secret(), "");
    }
}
