// SPDX-License-Identifier: PMPL-1.0-or-later
//
// Column and index definitions.
//
// Declarative building blocks for `TableDefinition`: a closed set of
// Postgres data types and builders for column and index clauses. All SQL
// text is emitted with unquoted identifiers; callers declare names that
// are already SQL-safe.

use std::fmt;

/// Postgres column types the schema layer knows how to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostgresDataType {
    Text,
    Uuid,
    Smallint,
    Integer,
    Bigint,
    Double,
    Boolean,
    Jsonb,
    Timestamptz,
    Bytea,
}

impl PostgresDataType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Uuid => "uuid",
            Self::Smallint => "smallint",
            Self::Integer => "integer",
            Self::Bigint => "bigint",
            Self::Double => "double precision",
            Self::Boolean => "boolean",
            Self::Jsonb => "jsonb",
            Self::Timestamptz => "timestamptz",
            Self::Bytea => "bytea",
        }
    }
}

impl fmt::Display for PostgresDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// One column of a table: name, type, and the column-level constraints
/// that belong in its clause of a `CREATE TABLE` statement.
///
/// # Example
///
/// ```rust
/// use mycel_postgres::{ColumnDefinition, PostgresDataType};
///
/// let col = ColumnDefinition::new("acl_key", PostgresDataType::Uuid)
///     .not_null()
///     .default_value("gen_random_uuid()");
/// assert_eq!(col.sql(), "acl_key uuid NOT NULL DEFAULT gen_random_uuid()");
/// ```
#[derive(Debug, Clone)]
pub struct ColumnDefinition {
    name: String,
    data_type: PostgresDataType,
    not_null: bool,
    unique: bool,
    default_value: Option<String>,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, data_type: PostgresDataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            not_null: false,
            unique: false,
            default_value: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Default expression, appended verbatim after `DEFAULT`.
    pub fn default_value(mut self, expr: impl Into<String>) -> Self {
        self.default_value = Some(expr.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> PostgresDataType {
        self.data_type
    }

    /// The column clause as it appears inside `CREATE TABLE (...)`.
    pub fn sql(&self) -> String {
        let mut clause = format!("{} {}", self.name, self.data_type.as_sql());
        if self.not_null {
            clause.push_str(" NOT NULL");
        }
        if self.unique {
            clause.push_str(" UNIQUE");
        }
        if let Some(expr) = &self.default_value {
            clause.push_str(" DEFAULT ");
            clause.push_str(expr);
        }
        clause
    }
}

/// Index access method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexMethod {
    BTree,
    Gin,
}

impl IndexMethod {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::BTree => "btree",
            Self::Gin => "gin",
        }
    }
}

/// A secondary index on a table.
#[derive(Debug, Clone)]
pub struct IndexDefinition {
    name: String,
    table: String,
    columns: Vec<String>,
    method: IndexMethod,
    unique: bool,
    if_not_exists: bool,
}

impl IndexDefinition {
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            columns: Vec::new(),
            method: IndexMethod::BTree,
            unique: false,
            if_not_exists: true,
        }
    }

    pub fn column(mut self, name: impl Into<String>) -> Self {
        self.columns.push(name.into());
        self
    }

    pub fn method(mut self, method: IndexMethod) -> Self {
        self.method = method;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn if_not_exists(mut self, flag: bool) -> Self {
        self.if_not_exists = flag;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn sql(&self) -> String {
        let mut stmt = String::from("CREATE ");
        if self.unique {
            stmt.push_str("UNIQUE ");
        }
        stmt.push_str("INDEX ");
        if self.if_not_exists {
            stmt.push_str("IF NOT EXISTS ");
        }
        stmt.push_str(&format!(
            "{} ON {} USING {} ({})",
            self.name,
            self.table,
            self.method.as_sql(),
            self.columns.join(", ")
        ));
        stmt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_column_clause() {
        let col = ColumnDefinition::new("name", PostgresDataType::Text);
        assert_eq!(col.sql(), "name text");
    }

    #[test]
    fn constrained_column_clause() {
        let col = ColumnDefinition::new("id", PostgresDataType::Bigint)
            .not_null()
            .unique();
        assert_eq!(col.sql(), "id bigint NOT NULL UNIQUE");
    }

    #[test]
    fn default_expression_is_verbatim() {
        let col = ColumnDefinition::new("created_at", PostgresDataType::Timestamptz)
            .not_null()
            .default_value("now()");
        assert_eq!(col.sql(), "created_at timestamptz NOT NULL DEFAULT now()");
    }

    #[test]
    fn btree_index_statement() {
        let idx = IndexDefinition::new("entries_space_idx", "entries").column("space");
        assert_eq!(
            idx.sql(),
            "CREATE INDEX IF NOT EXISTS entries_space_idx ON entries USING btree (space)"
        );
    }

    #[test]
    fn unique_gin_index_statement() {
        let idx = IndexDefinition::new("entries_tags_idx", "entries")
            .column("tags")
            .method(IndexMethod::Gin)
            .unique()
            .if_not_exists(false);
        assert_eq!(
            idx.sql(),
            "CREATE UNIQUE INDEX entries_tags_idx ON entries USING gin (tags)"
        );
    }
}
