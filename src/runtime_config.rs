//! # Runtime Configuration Module
//!
//! Environment variable-based configuration for the router's dispatch policy.
//!
//! ## Environment Variables
//!
//! | Variable | Controls | Default |
//! |----------|----------|---------|
//! | `ROUTETREE_REDIRECT_TRAILING_SLASH` | redirect `/foo` <-> `/foo/` | `true` |
//! | `ROUTETREE_REDIRECT_FIXED_PATH` | redirect to the cleaned, correctly-cased path | `true` |
//! | `ROUTETREE_HANDLE_METHOD_NOT_ALLOWED` | answer 405 with `Allow` instead of 404 | `true` |
//! | `ROUTETREE_HANDLE_OPTIONS` | answer `OPTIONS` automatically | `true` |
//!
//! Accepted values are `1`, `true`, `yes`, `on` and `0`, `false`, `no`, `off`
//! (case-insensitive). Anything else keeps the default and logs a warning.
//!
//! ## Usage
//!
//! ```rust
//! use routetree::runtime_config::RouterConfig;
//! use routetree::Router;
//!
//! let router = Router::with_config(RouterConfig::from_env());
//! assert!(router.list().is_empty());
//! ```
//!
//! Applications that keep their settings in a file can deserialize
//! [`RouterConfig`] directly; missing keys take their defaults.

use std::env;

use serde::Deserialize;
use tracing::warn;

const REDIRECT_TRAILING_SLASH: &str = "ROUTETREE_REDIRECT_TRAILING_SLASH";
const REDIRECT_FIXED_PATH: &str = "ROUTETREE_REDIRECT_FIXED_PATH";
const HANDLE_METHOD_NOT_ALLOWED: &str = "ROUTETREE_HANDLE_METHOD_NOT_ALLOWED";
const HANDLE_OPTIONS: &str = "ROUTETREE_HANDLE_OPTIONS";

/// Dispatch policy switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Redirect when the path with (without) a trailing slash is registered.
    ///
    /// `GET` and `HEAD` get 301, every other method 307.
    pub redirect_trailing_slash: bool,
    /// Clean the path (`..`, `//`) and retry case-insensitively, redirecting
    /// to the canonical path on success.
    pub redirect_fixed_path: bool,
    /// Answer 405 with an `Allow` header when another method matches.
    pub handle_method_not_allowed: bool,
    /// Answer `OPTIONS` requests automatically with an `Allow` header.
    /// A registered `OPTIONS` handler always takes precedence.
    pub handle_options: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            redirect_trailing_slash: true,
            redirect_fixed_path: true,
            handle_method_not_allowed: true,
            handle_options: true,
        }
    }
}

impl RouterConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    #[must_use]
    pub fn from_vars<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let flag = |key: &str, default: bool| match lookup(key) {
            Some(raw) => parse_flag(&raw).unwrap_or_else(|| {
                warn!(
                    variable = key,
                    value = %raw,
                    default,
                    "Unrecognised boolean value, keeping default"
                );
                default
            }),
            None => default,
        };

        Self {
            redirect_trailing_slash: flag(REDIRECT_TRAILING_SLASH, defaults.redirect_trailing_slash),
            redirect_fixed_path: flag(REDIRECT_FIXED_PATH, defaults.redirect_fixed_path),
            handle_method_not_allowed: flag(
                HANDLE_METHOD_NOT_ALLOWED,
                defaults.handle_method_not_allowed,
            ),
            handle_options: flag(HANDLE_OPTIONS, defaults.handle_options),
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
