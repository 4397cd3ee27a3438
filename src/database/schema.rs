//! Schema data structures
//!
//! This module defines the reflected description of a database: tables,
//! their columns, primary keys and foreign keys.

use crate::error::{AgentError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A foreign key column and the table/column it points at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyRef {
    /// Local column
    pub column: String,
    /// Referenced table name
    pub references: String,
    /// Referenced column name
    pub referenced_column: String,
}

impl ForeignKeyRef {
    /// Build a reference from a local column and a qualified `table.column`
    /// target.
    ///
    /// The target must split into exactly two non-empty parts. Schema-qualified
    /// targets (`schema.table.column`) and bare names are rejected.
    pub fn from_qualified(column: impl Into<String>, target: &str) -> Result<Self> {
        let column = column.into();
        let parts: Vec<&str> = target.split('.').collect();

        match parts.as_slice() {
            [table, referenced] if !table.is_empty() && !referenced.is_empty() => Ok(Self {
                column,
                references: table.to_string(),
                referenced_column: referenced.to_string(),
            }),
            _ => Err(AgentError::Schema(format!(
                "foreign key on column '{}' has malformed target '{}' (expected table.column)",
                column, target
            ))),
        }
    }
}

impl fmt::Display for ForeignKeyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {}.{}",
            self.column, self.references, self.referenced_column
        )
    }
}

/// Reflected structure of one table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    /// Column names in introspection order
    pub columns: Vec<String>,
    /// Primary key columns in key order
    pub primary_key: Vec<String>,
    /// Foreign keys in introspection order
    pub foreign_keys: Vec<ForeignKeyRef>,
}

impl TableInfo {
    /// Create an empty table description
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a column
    pub fn add_column(&mut self, name: impl Into<String>) {
        self.columns.push(name.into());
    }

    /// Add a primary key column, ignoring repeats
    pub fn add_primary_key(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.primary_key.contains(&name) {
            self.primary_key.push(name);
        }
    }

    /// Check whether the table has a column
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }
}

/// Reflected schema: table name to table description
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaDescription {
    pub tables: BTreeMap<String, TableInfo>,
}

impl SchemaDescription {
    /// Create an empty description
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table. A table name may only be added once.
    pub fn add_table(&mut self, name: impl Into<String>, table: TableInfo) -> Result<()> {
        let name = name.into();
        if self.tables.contains_key(&name) {
            return Err(AgentError::Schema(format!(
                "table '{}' was reflected twice",
                name
            )));
        }
        self.tables.insert(name, table);
        Ok(())
    }

    /// Get a table by name
    pub fn get_table(&self, name: &str) -> Option<&TableInfo> {
        self.tables.get(name)
    }

    /// Get all table names
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.keys().map(|k| k.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Foreign keys whose target table or column is not part of this description.
    ///
    /// Returns `(table, foreign key)` pairs.
    pub fn dangling_foreign_keys(&self) -> Vec<(&str, &ForeignKeyRef)> {
        self.tables
            .iter()
            .flat_map(|(name, table)| table.foreign_keys.iter().map(move |fk| (name.as_str(), fk)))
            .filter(|(_, fk)| {
                !self
                    .get_table(&fk.references)
                    .is_some_and(|target| target.has_column(&fk.referenced_column))
            })
            .collect()
    }

    /// Render the schema for inclusion in a generation request
    pub fn render_for_prompt(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Display for SchemaDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, table) in &self.tables {
            writeln!(f, "Table: {}", name)?;
            writeln!(f, "  Columns: {}", table.columns.join(", "))?;
            if !table.primary_key.is_empty() {
                writeln!(f, "  Primary Key: {}", table.primary_key.join(", "))?;
            }
            for fk in &table.foreign_keys {
                writeln!(f, "  Foreign Key: {}", fk)?;
            }
        }
        Ok(())
    }
}
