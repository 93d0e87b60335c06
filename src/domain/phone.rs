//! Verified external identity.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Phone number asserted by the identity provider.
///
/// The only structural requirement is that it contains at least one
/// digit; formatting is the provider's business.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Wraps `raw` if it looks like a phone number.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        raw.chars()
            .any(|c| c.is_ascii_digit())
            .then(|| Self(raw.to_string()))
    }

    /// Returns the number as given by the provider.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
