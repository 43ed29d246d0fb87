//! Rate limit key construction.
//!
//! Keys combine a limiter purpose with a client identity so that two
//! limiters can never collide on the same string, even if someone points
//! them at a shared store.

use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// The concern a limiter guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Purpose {
    /// Authenticated dashboard operations
    Dashboard,
    /// Public unauthenticated endpoints such as the review widget
    Public,
    /// AI reply and review generation
    AiGeneration,
    /// Review submission from the capture widget
    ReviewSubmission,
}

impl Purpose {
    /// Every purpose, in a stable order.
    pub const ALL: [Purpose; 4] = [
        Purpose::Dashboard,
        Purpose::Public,
        Purpose::AiGeneration,
        Purpose::ReviewSubmission,
    ];

    /// The key prefix for this purpose.
    pub fn as_str(&self) -> &'static str {
        match self {
            Purpose::Dashboard => "dashboard",
            Purpose::Public => "public",
            Purpose::AiGeneration => "ai-generation",
            Purpose::ReviewSubmission => "review-submission",
        }
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Purpose {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Purpose::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("unknown rate limit purpose: {}", s))
    }
}

/// Who is making the request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ClientIdentity {
    /// An authenticated user ID
    User(String),
    /// A client address
    Ip(IpAddr),
    /// No usable identifier; all such clients share one bucket
    Unknown,
}

impl ClientIdentity {
    /// Identify a client from proxy headers.
    ///
    /// Takes the first address in `x-forwarded-for`, then `x-real-ip`.
    /// Values that don't parse as IP addresses are ignored.
    pub fn from_headers<'a, I>(headers: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut forwarded = None;
        let mut real_ip = None;

        for (name, value) in headers {
            if name.eq_ignore_ascii_case("x-forwarded-for") && forwarded.is_none() {
                forwarded = value
                    .split(',')
                    .next()
                    .and_then(|first| first.trim().parse::<IpAddr>().ok());
            } else if name.eq_ignore_ascii_case("x-real-ip") && real_ip.is_none() {
                real_ip = value.trim().parse::<IpAddr>().ok();
            }
        }

        forwarded
            .or(real_ip)
            .map(ClientIdentity::Ip)
            .unwrap_or(ClientIdentity::Unknown)
    }

    /// Identify an authenticated user. Blank IDs are treated as unknown.
    pub fn user(id: impl Into<String>) -> Self {
        let id = id.into();
        if id.trim().is_empty() {
            ClientIdentity::Unknown
        } else {
            ClientIdentity::User(id)
        }
    }
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientIdentity::User(id) => write!(f, "user:{}", id),
            ClientIdentity::Ip(addr) => write!(f, "ip:{}", addr),
            ClientIdentity::Unknown => f.write_str("unknown"),
        }
    }
}

/// A fully qualified rate limit key: `{purpose}:{identity}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimitKey(String);

impl RateLimitKey {
    /// Build the key for `identity` under `purpose`.
    pub fn new(purpose: Purpose, identity: &ClientIdentity) -> Self {
        Self(format!("{}:{}", purpose, identity))
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RateLimitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RateLimitKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
