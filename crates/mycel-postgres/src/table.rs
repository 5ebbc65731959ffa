// SPDX-License-Identifier: PMPL-1.0-or-later
//
// Typed table schema and statement builder.
//
// A `TableDefinition` declares its columns once and generates
// parameterized DDL/DML from that declaration. Every statement builder
// validates the requested column set against the declared one first and
// never emits partial SQL on error. Validation is against the declaration
// only, not a live catalog; drift between the declaration and the actual
// database is out of scope here.

use std::collections::HashSet;

use thiserror::Error;

use crate::column::{ColumnDefinition, IndexDefinition};

/// Schema or statement validation failure. These always surface to the
/// caller as hard errors; nothing in this module patches over an
/// inconsistent declaration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("table {table} declares column {column} more than once")]
    DuplicateColumn { table: String, column: String },

    #[error("table {table} lists primary key column {column} more than once")]
    DuplicatePrimaryKeyColumn { table: String, column: String },

    #[error("table {table} already has a primary key")]
    PrimaryKeyAlreadySet { table: String },

    #[error("table {table} already has a unique column set")]
    UniqueAlreadySet { table: String },

    #[error("table {table} does not declare columns: {}", columns.join(", "))]
    MissingColumns { table: String, columns: Vec<String> },

    #[error("table {table}: {clause} requires at least one column")]
    EmptyColumnList { table: String, clause: &'static str },
}

/// A named table: ordered columns, an optional primary key, an optional
/// table-level unique set, and secondary indexes.
///
/// # Example
///
/// ```rust
/// use mycel_postgres::{ColumnDefinition, PostgresDataType, TableDefinition};
///
/// let entries = TableDefinition::new("entries")
///     .column(ColumnDefinition::new("space", PostgresDataType::Text).not_null())
///     .column(ColumnDefinition::new("key", PostgresDataType::Bytea).not_null())
///     .column(ColumnDefinition::new("value", PostgresDataType::Bytea))
///     .primary_key(["space", "key"])
///     .unwrap();
///
/// assert_eq!(
///     entries.insert_sql(&[], None).unwrap(),
///     "INSERT INTO entries (space, key, value) VALUES (?, ?, ?)"
/// );
/// ```
#[derive(Debug, Clone)]
pub struct TableDefinition {
    name: String,
    columns: Vec<ColumnDefinition>,
    primary_key: Option<Vec<String>>,
    unique: Option<Vec<String>>,
    indexes: Vec<IndexDefinition>,
    if_not_exists: bool,
}

impl TableDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: None,
            unique: None,
            indexes: Vec::new(),
            if_not_exists: true,
        }
    }

    /// Append a column. Duplicate names are caught when a statement is
    /// built, not here.
    pub fn column(mut self, column: ColumnDefinition) -> Self {
        self.columns.push(column);
        self
    }

    /// Declare the primary key, at most once.
    pub fn primary_key<I, S>(mut self, columns: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if self.primary_key.is_some() {
            return Err(SchemaError::PrimaryKeyAlreadySet {
                table: self.name.clone(),
            });
        }
        self.primary_key = Some(columns.into_iter().map(Into::into).collect());
        Ok(self)
    }

    /// Declare the table-level unique column set, at most once.
    pub fn unique<I, S>(mut self, columns: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if self.unique.is_some() {
            return Err(SchemaError::UniqueAlreadySet {
                table: self.name.clone(),
            });
        }
        self.unique = Some(columns.into_iter().map(Into::into).collect());
        Ok(self)
    }

    pub fn index(mut self, index: IndexDefinition) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn if_not_exists(mut self, flag: bool) -> Self {
        self.if_not_exists = flag;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[ColumnDefinition] {
        &self.columns
    }

    /// `CREATE TABLE` for the full declaration. Duplicate column or
    /// primary-key names fail before any SQL is generated, and the primary
    /// key and unique set must reference declared columns.
    pub fn create_table_sql(&self) -> Result<String, SchemaError> {
        let mut seen = HashSet::new();
        for column in &self.columns {
            if !seen.insert(column.name()) {
                return Err(SchemaError::DuplicateColumn {
                    table: self.name.clone(),
                    column: column.name().to_string(),
                });
            }
        }
        if let Some(pk) = &self.primary_key {
            let mut seen = HashSet::new();
            for column in pk {
                if !seen.insert(column.as_str()) {
                    return Err(SchemaError::DuplicatePrimaryKeyColumn {
                        table: self.name.clone(),
                        column: column.clone(),
                    });
                }
            }
            self.require_declared(pk.iter().map(String::as_str))?;
        }
        if let Some(unique) = &self.unique {
            self.require_declared(unique.iter().map(String::as_str))?;
        }

        let mut clauses: Vec<String> = self.columns.iter().map(ColumnDefinition::sql).collect();
        if let Some(pk) = &self.primary_key {
            clauses.push(format!("PRIMARY KEY ({})", pk.join(", ")));
        }
        if let Some(unique) = &self.unique {
            clauses.push(format!("UNIQUE ({})", unique.join(", ")));
        }

        Ok(format!(
            "CREATE TABLE {}{} ({})",
            if self.if_not_exists { "IF NOT EXISTS " } else { "" },
            self.name,
            clauses.join(", ")
        ))
    }

    /// Positional-parameter insert. An empty `columns` slice means every
    /// declared column, in declaration order. `on_conflict` is appended
    /// verbatim when present.
    pub fn insert_sql(
        &self,
        columns: &[&str],
        on_conflict: Option<&str>,
    ) -> Result<String, SchemaError> {
        let names: Vec<&str> = if columns.is_empty() {
            self.columns.iter().map(ColumnDefinition::name).collect()
        } else {
            self.require_declared(columns.iter().copied())?;
            columns.to_vec()
        };

        let placeholders = vec!["?"; names.len()].join(", ");
        let mut stmt = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.name,
            names.join(", "),
            placeholders
        );
        if let Some(clause) = on_conflict {
            stmt.push(' ');
            stmt.push_str(clause);
        }
        Ok(stmt)
    }

    /// `UPDATE ... SET` over `set_columns`. Both column lists are
    /// validated, but only the SET clause is emitted; appending the WHERE
    /// clause with matching predicates is the caller's responsibility.
    pub fn update_sql(
        &self,
        where_columns: &[&str],
        set_columns: &[&str],
    ) -> Result<String, SchemaError> {
        self.require_non_empty(where_columns, "UPDATE ... WHERE")?;
        self.require_non_empty(set_columns, "UPDATE ... SET")?;
        self.require_declared(where_columns.iter().copied())?;
        self.require_declared(set_columns.iter().copied())?;

        let assignments: Vec<String> = set_columns
            .iter()
            .map(|column| format!("{column} = ?"))
            .collect();
        Ok(format!("UPDATE {} SET {}", self.name, assignments.join(", ")))
    }

    /// `DELETE` with an `AND`-joined parameterized WHERE clause.
    pub fn delete_sql(&self, where_columns: &[&str]) -> Result<String, SchemaError> {
        self.require_non_empty(where_columns, "DELETE ... WHERE")?;
        self.require_declared(where_columns.iter().copied())?;
        Ok(format!(
            "DELETE FROM {} WHERE {}",
            self.name,
            Self::predicates(where_columns)
        ))
    }

    /// `SELECT`. An empty select list means `*`; an empty where list means
    /// no WHERE clause.
    pub fn select_sql(
        &self,
        select_columns: &[&str],
        where_columns: &[&str],
    ) -> Result<String, SchemaError> {
        self.require_declared(select_columns.iter().copied())?;
        self.require_declared(where_columns.iter().copied())?;

        let projection = if select_columns.is_empty() {
            "*".to_string()
        } else {
            select_columns.join(", ")
        };
        let mut stmt = format!("SELECT {} FROM {}", projection, self.name);
        if !where_columns.is_empty() {
            stmt.push_str(" WHERE ");
            stmt.push_str(&Self::predicates(where_columns));
        }
        Ok(stmt)
    }

    /// One `CREATE INDEX` statement per declared index, validated against
    /// the declared columns.
    pub fn create_index_sql(&self) -> Result<Vec<String>, SchemaError> {
        for index in &self.indexes {
            self.require_declared(index.columns().iter().map(String::as_str))?;
        }
        Ok(self.indexes.iter().map(IndexDefinition::sql).collect())
    }

    fn predicates(columns: &[&str]) -> String {
        columns
            .iter()
            .map(|column| format!("{column} = ?"))
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    fn require_non_empty(
        &self,
        columns: &[&str],
        clause: &'static str,
    ) -> Result<(), SchemaError> {
        if columns.is_empty() {
            return Err(SchemaError::EmptyColumnList {
                table: self.name.clone(),
                clause,
            });
        }
        Ok(())
    }

    /// Every requested column must be declared; the error lists exactly
    /// the missing names, in request order.
    fn require_declared<'a>(
        &self,
        requested: impl Iterator<Item = &'a str>,
    ) -> Result<(), SchemaError> {
        let declared: HashSet<&str> = self.columns.iter().map(ColumnDefinition::name).collect();
        let missing: Vec<String> = requested
            .filter(|column| !declared.contains(column))
            .map(str::to_string)
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(SchemaError::MissingColumns {
                table: self.name.clone(),
                columns: missing,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::{IndexMethod, PostgresDataType};

    fn entries() -> TableDefinition {
        TableDefinition::new("entries")
            .column(ColumnDefinition::new("space", PostgresDataType::Text).not_null())
            .column(ColumnDefinition::new("key", PostgresDataType::Bytea).not_null())
            .column(ColumnDefinition::new("value", PostgresDataType::Bytea))
            .column(ColumnDefinition::new("version", PostgresDataType::Bigint))
    }

    #[test]
    fn create_table_with_primary_key_and_unique() {
        let table = entries()
            .primary_key(["space", "key"])
            .unwrap()
            .unique(["version"])
            .unwrap();
        assert_eq!(
            table.create_table_sql().unwrap(),
            "CREATE TABLE IF NOT EXISTS entries (space text NOT NULL, key bytea NOT NULL, \
             value bytea, version bigint, PRIMARY KEY (space, key), UNIQUE (version))"
        );
    }

    #[test]
    fn create_table_without_if_not_exists() {
        let table = TableDefinition::new("t")
            .column(ColumnDefinition::new("a", PostgresDataType::Integer))
            .if_not_exists(false);
        assert_eq!(table.create_table_sql().unwrap(), "CREATE TABLE t (a integer)");
    }

    #[test]
    fn duplicate_column_fails_before_sql() {
        let table = TableDefinition::new("t")
            .column(ColumnDefinition::new("a", PostgresDataType::Integer))
            .column(ColumnDefinition::new("a", PostgresDataType::Text));
        assert_eq!(
            table.create_table_sql().unwrap_err(),
            SchemaError::DuplicateColumn {
                table: "t".to_string(),
                column: "a".to_string(),
            }
        );
    }

    #[test]
    fn duplicate_primary_key_column_fails() {
        let table = entries().primary_key(["space", "space"]).unwrap();
        assert_eq!(
            table.create_table_sql().unwrap_err(),
            SchemaError::DuplicatePrimaryKeyColumn {
                table: "entries".to_string(),
                column: "space".to_string(),
            }
        );
    }

    #[test]
    fn primary_key_and_unique_are_set_once() {
        let err = entries()
            .primary_key(["space"])
            .unwrap()
            .primary_key(["key"])
            .unwrap_err();
        assert_eq!(
            err,
            SchemaError::PrimaryKeyAlreadySet {
                table: "entries".to_string()
            }
        );

        let err = entries()
            .unique(["version"])
            .unwrap()
            .unique(["key"])
            .unwrap_err();
        assert_eq!(
            err,
            SchemaError::UniqueAlreadySet {
                table: "entries".to_string()
            }
        );
    }

    #[test]
    fn insert_defaults_to_all_columns_in_order() {
        assert_eq!(
            entries().insert_sql(&[], None).unwrap(),
            "INSERT INTO entries (space, key, value, version) VALUES (?, ?, ?, ?)"
        );
    }

    #[test]
    fn insert_subset_with_on_conflict() {
        assert_eq!(
            entries()
                .insert_sql(
                    &["space", "key", "value"],
                    Some("ON CONFLICT (space, key) DO UPDATE SET value = EXCLUDED.value"),
                )
                .unwrap(),
            "INSERT INTO entries (space, key, value) VALUES (?, ?, ?) \
             ON CONFLICT (space, key) DO UPDATE SET value = EXCLUDED.value"
        );
    }

    #[test]
    fn insert_with_unknown_column_lists_exactly_the_missing_names() {
        let err = entries()
            .insert_sql(&["space", "nope", "key", "also_nope"], None)
            .unwrap_err();
        assert_eq!(
            err,
            SchemaError::MissingColumns {
                table: "entries".to_string(),
                columns: vec!["nope".to_string(), "also_nope".to_string()],
            }
        );
        assert!(err.to_string().contains("nope, also_nope"));
    }

    #[test]
    fn update_emits_set_clause_only() {
        assert_eq!(
            entries()
                .update_sql(&["space", "key"], &["value", "version"])
                .unwrap(),
            "UPDATE entries SET value = ?, version = ?"
        );
    }

    #[test]
    fn update_validates_both_column_lists() {
        assert!(matches!(
            entries().update_sql(&[], &["value"]).unwrap_err(),
            SchemaError::EmptyColumnList { .. }
        ));
        assert!(matches!(
            entries().update_sql(&["space"], &[]).unwrap_err(),
            SchemaError::EmptyColumnList { .. }
        ));
        assert!(matches!(
            entries().update_sql(&["ghost"], &["value"]).unwrap_err(),
            SchemaError::MissingColumns { .. }
        ));
    }

    #[test]
    fn delete_joins_predicates_with_and() {
        assert_eq!(
            entries().delete_sql(&["space", "key"]).unwrap(),
            "DELETE FROM entries WHERE space = ? AND key = ?"
        );
    }

    #[test]
    fn select_star_when_no_projection_given() {
        assert_eq!(
            entries().select_sql(&[], &["space", "key"]).unwrap(),
            "SELECT * FROM entries WHERE space = ? AND key = ?"
        );
        assert_eq!(
            entries().select_sql(&["value"], &[]).unwrap(),
            "SELECT value FROM entries"
        );
    }

    proptest::proptest! {
        // Placeholder count always matches the projected column count,
        // whatever the declared names are.
        #[test]
        fn insert_placeholders_match_column_count(
            names in proptest::collection::hash_set("[a-z][a-z0-9_]{0,11}", 1..8)
        ) {
            let mut table = TableDefinition::new("t");
            for name in &names {
                table = table.column(ColumnDefinition::new(name.clone(), PostgresDataType::Text));
            }
            let sql = table.insert_sql(&[], None).unwrap();
            proptest::prop_assert_eq!(sql.matches('?').count(), names.len());
        }
    }

    #[test]
    fn index_statements_validate_columns() {
        let table = entries()
            .index(IndexDefinition::new("entries_space_idx", "entries").column("space"))
            .index(
                IndexDefinition::new("entries_value_idx", "entries")
                    .column("value")
                    .method(IndexMethod::Gin),
            );
        let statements = table.create_index_sql().unwrap();
        assert_eq!(statements.len(), 2);
        assert_eq!(
            statements[0],
            "CREATE INDEX IF NOT EXISTS entries_space_idx ON entries USING btree (space)"
        );

        let broken = entries()
            .index(IndexDefinition::new("bad_idx", "entries").column("ghost"));
        assert!(matches!(
            broken.create_index_sql().unwrap_err(),
            SchemaError::MissingColumns { .. }
        ));
    }
}
