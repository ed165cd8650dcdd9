//! `auth` option and `Authorization` header derivation.

use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;

/// A token wrapper as found under `jwt` and `oauth`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Token {
    pub token: Option<String>,
}

impl Token {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub jwt: Option<Token>,
    pub oauth: Option<Token>,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Either a raw Basic credential string or structured credentials.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Auth {
    Raw(String),
    Credentials(Credentials),
}

/// Derived `Authorization` value and whether it replaces an existing one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthHeader {
    pub value: String,
    pub overwrite: bool,
}

fn non_empty(s: &Option<String>) -> Option<&str> {
    s.as_deref().filter(|v| !v.is_empty())
}

fn token_of(t: &Option<Token>) -> Option<&str> {
    t.as_ref().and_then(|t| non_empty(&t.token))
}

/// `user:pass` with something on both sides of a colon.
fn is_user_pass(s: &str) -> bool {
    s.char_indices()
        .any(|(i, c)| c == ':' && i > 0 && i + 1 < s.len())
}

impl Auth {
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Auth::Credentials(Credentials {
            username: Some(username.into()),
            password: Some(password.into()),
            ..Default::default()
        })
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        Auth::Credentials(Credentials {
            oauth: Some(Token::new(token)),
            ..Default::default()
        })
    }

    pub fn jwt(token: impl Into<String>) -> Self {
        Auth::Credentials(Credentials {
            jwt: Some(Token::new(token)),
            ..Default::default()
        })
    }

    /// Compute the header, if these credentials produce one.
    pub fn header(&self) -> Option<AuthHeader> {
        match self {
            Auth::Raw(raw) => {
                let encoded = if is_user_pass(raw) {
                    general_purpose::STANDARD.encode(raw.as_bytes())
                } else {
                    raw.clone()
                };
                Some(AuthHeader {
                    value: format!("Basic {}", encoded),
                    overwrite: true,
                })
            }
            Auth::Credentials(c) => {
                if let Some(token) = token_of(&c.oauth).or_else(|| token_of(&c.jwt)) {
                    return Some(AuthHeader {
                        value: format!("Bearer {}", token),
                        overwrite: false,
                    });
                }
                let user = non_empty(&c.username)?;
                let pass = non_empty(&c.password)?;
                let encoded = general_purpose::STANDARD.encode(format!("{}:{}", user, pass));
                Some(AuthHeader {
                    value: format!("Basic {}", encoded),
                    overwrite: false,
                })
            }
        }
    }
}
