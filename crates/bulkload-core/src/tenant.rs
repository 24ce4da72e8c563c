//! Tenant names and the logical database each tenant owns.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{BulkloadError, Result};

/// Longest accepted tenant name.
pub const MAX_TENANT_NAME_LEN: usize = 48;

/// A validated tenant name.
///
/// Tenant names arrive from callers as untrusted strings and end up embedded in a database
/// name, so only ASCII letters, digits, `_` and `-` are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantName(String);

impl TenantName {
    /// Validate and wrap a tenant name.
    ///
    /// # Errors
    ///
    /// Returns `BulkloadError::InvalidTenantName` if the name is empty, too long, or contains
    /// characters outside `[A-Za-z0-9_-]`.
    pub fn parse(name: &str) -> Result<Self> {
        let reject = |reason| BulkloadError::InvalidTenantName {
            name: name.to_string(),
            reason,
        };

        if name.is_empty() {
            return Err(reject("must not be empty"));
        }
        if name.len() > MAX_TENANT_NAME_LEN {
            return Err(reject("longer than 48 characters"));
        }
        if !name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
        {
            return Err(reject("only ASCII letters, digits, '_' and '-' are allowed"));
        }

        Ok(Self(name.to_string()))
    }

    /// The tenant name as given.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the logical database owned by this tenant: `<prefix><tenant-name>`.
    #[must_use]
    pub fn database_name(&self, prefix: &str) -> String {
        format!("{prefix}{}", self.0)
    }
}

impl fmt::Display for TenantName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TenantName {
    type Error = BulkloadError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<TenantName> for String {
    fn from(name: TenantName) -> Self {
        name.0
    }
}
