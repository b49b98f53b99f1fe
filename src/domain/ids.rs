//! Domain identifier types with validation
//!
//! Newtype wrappers keep team, export and run identifiers from being mixed up,
//! and [`TableName`] guarantees a destination table name is safe to splice into
//! DDL.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Owning team (tenant) identifier
///
/// # Examples
///
/// ```
/// use harbor::domain::ids::TeamId;
/// use std::str::FromStr;
///
/// let team = TeamId::from_str("42").unwrap();
/// assert_eq!(team.value(), 42);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TeamId(i64);

impl TeamId {
    /// Creates a new TeamId; team ids are positive
    pub fn new(id: i64) -> Result<Self, String> {
        if id <= 0 {
            return Err(format!("Team ID must be positive, got {id}"));
        }
        Ok(Self(id))
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TeamId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = s
            .trim()
            .parse::<i64>()
            .map_err(|e| format!("Invalid team ID '{s}': {e}"))?;
        Self::new(id)
    }
}

/// Batch export definition identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExportId(Uuid);

impl ExportId {
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for ExportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ExportId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| format!("Invalid export ID '{s}': {e}"))
    }
}

/// Run identifier
///
/// Generated by the workflow driver before the run record exists so that a
/// retried create targets the same row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    /// Generate a fresh random run id
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// First eight hex characters, used to name staged files
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RunId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| format!("Invalid run ID '{s}': {e}"))
    }
}

/// Destination table name, optionally schema-qualified (`schema.table`)
///
/// Each segment must be a plain identifier: ASCII letters, digits and
/// underscores, not starting with a digit, at most 63 bytes.
///
/// # Examples
///
/// ```
/// use harbor::domain::ids::TableName;
///
/// let table = TableName::new("analytics.events").unwrap();
/// assert_eq!(table.quoted(), "\"analytics\".\"events\"");
/// assert_eq!(table.table(), "events");
/// assert!(TableName::new("events; DROP TABLE x").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TableName(String);

impl TableName {
    pub fn new(name: impl Into<String>) -> Result<Self, String> {
        let name = name.into();
        let segments: Vec<&str> = name.split('.').collect();
        if segments.len() > 2 {
            return Err(format!(
                "Table name '{name}' may have at most one schema qualifier"
            ));
        }
        for segment in &segments {
            validate_identifier(segment).map_err(|e| format!("Invalid table name '{name}': {e}"))?;
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The unqualified table segment
    pub fn table(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }

    /// Double-quoted form for SQL
    pub fn quoted(&self) -> String {
        self.0
            .split('.')
            .map(|segment| format!("\"{segment}\""))
            .collect::<Vec<_>>()
            .join(".")
    }

    /// A sibling table name in the same schema
    pub fn with_suffix(&self, suffix: &str) -> Result<Self, String> {
        Self::new(format!("{}{}", self.0, suffix))
    }
}

fn validate_identifier(segment: &str) -> Result<(), String> {
    if segment.is_empty() {
        return Err("empty identifier".to_string());
    }
    if segment.len() > 63 {
        return Err(format!("identifier '{segment}' is longer than 63 bytes"));
    }
    if segment.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(format!("identifier '{segment}' starts with a digit"));
    }
    if !segment
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(format!(
            "identifier '{segment}' may only contain letters, digits and underscores"
        ));
    }
    Ok(())
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TableName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for TableName {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TableName> for String {
    fn from(value: TableName) -> Self {
        value.0
    }
}
