use serde::{Deserialize, Serialize};
use std::fmt;

/// A CDF RAW table, addressed by database and table name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawDestination {
    pub database: String,
    pub table: String,
}

impl RawDestination {
    pub fn new(database: impl Into<String>, table: impl Into<String>) -> Self {
        RawDestination {
            database: database.into(),
            table: table.into(),
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.database.trim().is_empty() && !self.table.trim().is_empty()
    }
}

impl fmt::Display for RawDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.database, self.table)
    }
}
