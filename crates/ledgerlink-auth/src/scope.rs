//! Capability scopes requested during authorization.

use std::fmt;

/// A comma-separated list of capability names limiting what the exchanged
/// access token can be used for. An empty scope means full accounting
/// access for the direct flow.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Scope {
    capabilities: Vec<String>,
}

impl Scope {
    /// Full accounting access (empty capability list).
    #[must_use]
    pub fn accounting() -> Self {
        Self::default()
    }

    /// The payroll capability group. Only requested when the application
    /// needs payroll resources.
    #[must_use]
    pub fn payroll() -> Self {
        Self {
            capabilities: vec![
                "payroll.employees".to_string(),
                "payroll.payitems".to_string(),
                "payroll.timesheets".to_string(),
            ],
        }
    }

    /// Builds a scope from explicit capability names.
    pub fn from_capabilities<I, S>(capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            capabilities: capabilities.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns `true` if no capabilities are listed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.capabilities.join(","))
    }
}
