//! `Set-Cookie` values for the session cookie.

use std::{str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SameSite {
    Lax,
    Strict,
    None,
}

impl SameSite {
    fn as_attribute(self) -> &'static str {
        match self {
            SameSite::Lax => "Lax",
            SameSite::Strict => "Strict",
            SameSite::None => "None",
        }
    }
}

impl FromStr for SameSite {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lax" => Ok(SameSite::Lax),
            "strict" => Ok(SameSite::Strict),
            "none" => Ok(SameSite::None),
            other => Err(anyhow::anyhow!("Invalid SameSite value: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CookieOptions {
    pub secure: bool,
    pub same_site: SameSite,
}

/// The session cookie is valid for the whole site and never visible to scripts.
fn with_attributes(pair: String, max_age_secs: u64, options: CookieOptions) -> String {
    let secure = if options.secure { "; Secure" } else { "" };
    format!(
        "{}; Path=/; Max-Age={}; HttpOnly; SameSite={}{}",
        pair,
        max_age_secs,
        options.same_site.as_attribute(),
        secure
    )
}

pub fn build_session_cookie(
    name: &str,
    value: &str,
    max_age: Duration,
    options: CookieOptions,
) -> String {
    with_attributes(format!("{}={}", name, value), max_age.as_secs(), options)
}

/// Expires the cookie in the browser.
pub fn build_clear_cookie(name: &str, options: CookieOptions) -> String {
    with_attributes(format!("{}=", name), 0, options)
}

/// Value of cookie `name` in a `Cookie` request header.
pub fn extract_cookie_value(header: &str, name: &str) -> Option<String> {
    header
        .split(';')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim().to_string())
}
