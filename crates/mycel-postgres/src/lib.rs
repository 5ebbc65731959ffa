// SPDX-License-Identifier: PMPL-1.0-or-later
//
// mycel relational schema crate
//
// The relational path of the backing-store layer: a typed table
// declaration that generates parameterized DDL/DML, and a scoped holder
// that releases a connection/statement/result-set chain safely after a
// query. Statement builders validate every requested column against the
// declared schema and never emit partial SQL.
//
// # Modules
//
// - [`column`] -- `PostgresDataType`, `ColumnDefinition`, `IndexDefinition`.
// - [`table`] -- `TableDefinition` statement builders and `SchemaError`.
// - [`holder`] -- `StatementHolder`, `ScopedResource`, and cleanup errors.
//
// # Example
//
// ```rust
// use mycel_postgres::{ColumnDefinition, PostgresDataType, TableDefinition};
//
// let acls = TableDefinition::new("acls")
//     .column(ColumnDefinition::new("principal", PostgresDataType::Uuid).not_null())
//     .column(ColumnDefinition::new("permissions", PostgresDataType::Jsonb))
//     .primary_key(["principal"])
//     .unwrap();
//
// let sql = acls.select_sql(&[], &["principal"]).unwrap();
// assert_eq!(sql, "SELECT * FROM acls WHERE principal = ?");
// ```

pub mod column;
pub mod holder;
pub mod table;

pub use column::{ColumnDefinition, IndexDefinition, IndexMethod, PostgresDataType};
pub use holder::{
    CleanupError, CloseFailure, ResourceError, ScopedResource, StatementHolder,
    DEFAULT_SLOW_QUERY_LIMIT,
};
pub use table::{SchemaError, TableDefinition};
