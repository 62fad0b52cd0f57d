// ABOUTME: Sqlite tenant backend: statement execution, row decoding, catalog introspection
// ABOUTME: Uses sqlite_master and table pragmas to build deterministic schema snapshots
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Querybase Contributors

use std::collections::HashSet;

use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, SqlitePool, TypeInfo, ValueRef};

use super::quote_ident;
use crate::errors::{AppError, AppResult};
use crate::models::{ForeignKeyRef, QueryType, SchemaColumn, SchemaTable};

pub(super) async fn ping(pool: &SqlitePool) -> AppResult<()> {
    sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .map_err(|e| AppError::connection(format!("liveness probe failed: {e}")))?;
    Ok(())
}

pub(super) async fn run_statement(
    pool: &SqlitePool,
    sql: &str,
    query_type: QueryType,
) -> AppResult<(Vec<serde_json::Value>, u64)> {
    match query_type {
        // Row-returning paths: SELECT/WITH plus anything unclassified
        // (PRAGMA, EXPLAIN) that may still produce rows.
        QueryType::Select | QueryType::Other => {
            let rows = sqlx::query(sql)
                .fetch_all(pool)
                .await
                .map_err(|e| AppError::query_execution(e.to_string()))?;
            let row_count = rows.len() as u64;
            let rows = rows
                .iter()
                .map(row_to_json)
                .collect::<AppResult<Vec<_>>>()?;
            Ok((rows, row_count))
        }
        QueryType::Insert | QueryType::Update | QueryType::Delete | QueryType::Ddl => {
            let result = sqlx::query(sql)
                .execute(pool)
                .await
                .map_err(|e| AppError::query_execution(e.to_string()))?;
            Ok((Vec::new(), result.rows_affected()))
        }
    }
}

/// Decode one result row into a JSON object, keyed by column name.
/// Sqlite values carry their storage class at runtime, so decoding follows
/// the value's type rather than any declared column type.
fn row_to_json(row: &SqliteRow) -> AppResult<serde_json::Value> {
    let mut object = serde_json::Map::with_capacity(row.columns().len());
    for column in row.columns() {
        let index = column.ordinal();
        let raw = row
            .try_get_raw(index)
            .map_err(|e| AppError::query_execution(format!("failed to read column: {e}")))?;
        let value = if raw.is_null() {
            serde_json::Value::Null
        } else {
            let type_name = raw.type_info().name().to_owned();
            decode_column(row, index, &type_name)?
        };
        object.insert(column.name().to_owned(), value);
    }
    Ok(serde_json::Value::Object(object))
}

fn decode_column(row: &SqliteRow, index: usize, type_name: &str) -> AppResult<serde_json::Value> {
    let decode_err =
        |e: sqlx::Error| AppError::query_execution(format!("failed to decode column: {e}"));
    let value = match type_name {
        "INTEGER" | "INT4" | "INT8" | "BIGINT" => {
            serde_json::Value::from(row.try_get::<i64, _>(index).map_err(decode_err)?)
        }
        "REAL" => serde_json::Value::from(row.try_get::<f64, _>(index).map_err(decode_err)?),
        "BOOLEAN" => serde_json::Value::from(row.try_get::<bool, _>(index).map_err(decode_err)?),
        "BLOB" => {
            let bytes = row.try_get::<Vec<u8>, _>(index).map_err(decode_err)?;
            serde_json::Value::String(hex::encode(bytes))
        }
        _ => serde_json::Value::String(row.try_get::<String, _>(index).map_err(decode_err)?),
    };
    Ok(value)
}

pub(super) async fn introspect(pool: &SqlitePool) -> AppResult<Vec<SchemaTable>> {
    let intro_err = |e: sqlx::Error| AppError::schema_introspection(e.to_string());

    let table_rows = sqlx::query(
        "SELECT name FROM sqlite_master \
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%' \
         ORDER BY name",
    )
    .fetch_all(pool)
    .await
    .map_err(intro_err)?;

    let mut tables = Vec::with_capacity(table_rows.len());
    for table_row in table_rows {
        let table_name: String = table_row.try_get("name").map_err(intro_err)?;
        let quoted = quote_ident(&table_name);

        let unique_columns = single_column_unique_indexes(pool, &quoted).await?;

        // table_info returns columns in declaration order (cid ascending)
        let column_rows = sqlx::query(&format!("PRAGMA table_info({quoted})"))
            .fetch_all(pool)
            .await
            .map_err(intro_err)?;
        let mut columns = Vec::with_capacity(column_rows.len());
        for row in column_rows {
            let name: String = row.try_get("name").map_err(intro_err)?;
            let data_type: String = row.try_get("type").map_err(intro_err)?;
            let not_null: i64 = row.try_get("notnull").map_err(intro_err)?;
            let pk: i64 = row.try_get("pk").map_err(intro_err)?;
            let constraint = if pk > 0 {
                Some("PRIMARY KEY".to_owned())
            } else if unique_columns.contains(&name) {
                Some("UNIQUE".to_owned())
            } else {
                None
            };
            columns.push(SchemaColumn {
                name,
                data_type,
                nullable: not_null == 0,
                constraint,
            });
        }

        let fk_rows = sqlx::query(&format!("PRAGMA foreign_key_list({quoted})"))
            .fetch_all(pool)
            .await
            .map_err(intro_err)?;
        let mut foreign_keys = Vec::with_capacity(fk_rows.len());
        for row in fk_rows {
            let foreign_column: Option<String> = row.try_get("to").map_err(intro_err)?;
            foreign_keys.push(ForeignKeyRef {
                column: row.try_get("from").map_err(intro_err)?,
                foreign_table: row.try_get("table").map_err(intro_err)?,
                // An implicit REFERENCES t reports NULL for the target column
                foreign_column: foreign_column.unwrap_or_default(),
            });
        }
        foreign_keys.sort_by(|a, b| a.column.cmp(&b.column));

        tables.push(SchemaTable {
            name: table_name,
            columns,
            foreign_keys,
        });
    }

    Ok(tables)
}

/// Columns covered by a single-column unique index, reported as UNIQUE
/// constraints in the snapshot. Multi-column uniques are not surfaced
/// per-column.
async fn single_column_unique_indexes(
    pool: &SqlitePool,
    quoted_table: &str,
) -> AppResult<HashSet<String>> {
    let intro_err = |e: sqlx::Error| AppError::schema_introspection(e.to_string());

    let mut unique_columns = HashSet::new();
    let index_rows = sqlx::query(&format!("PRAGMA index_list({quoted_table})"))
        .fetch_all(pool)
        .await
        .map_err(intro_err)?;
    for row in index_rows {
        let is_unique: i64 = row.try_get("unique").map_err(intro_err)?;
        let origin: String = row.try_get("origin").map_err(intro_err)?;
        if is_unique != 1 || origin != "u" {
            continue;
        }
        let index_name: String = row.try_get("name").map_err(intro_err)?;
        let column_rows = sqlx::query(&format!("PRAGMA index_info({})", quote_ident(&index_name)))
            .fetch_all(pool)
            .await
            .map_err(intro_err)?;
        if let [only] = column_rows.as_slice() {
            unique_columns.insert(only.try_get("name").map_err(intro_err)?);
        }
    }
    Ok(unique_columns)
}
