// ABOUTME: Postgres tenant backend: statement execution, row decoding, catalog introspection
// ABOUTME: Uses information_schema to build deterministic schema snapshots
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Querybase Contributors

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{Column, PgPool, Row, TypeInfo, ValueRef};
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::{ForeignKeyRef, QueryType, SchemaColumn, SchemaTable};

pub(super) async fn ping(pool: &PgPool) -> AppResult<()> {
    sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .map_err(|e| AppError::connection(format!("liveness probe failed: {e}")))?;
    Ok(())
}

pub(super) async fn run_statement(
    pool: &PgPool,
    sql: &str,
    query_type: QueryType,
) -> AppResult<(Vec<serde_json::Value>, u64)> {
    match query_type {
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

fn row_to_json(row: &PgRow) -> AppResult<serde_json::Value> {
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
            decode_column(row, index, &type_name)
        };
        object.insert(column.name().to_owned(), value);
    }
    Ok(serde_json::Value::Object(object))
}

fn decode_column(row: &PgRow, index: usize, type_name: &str) -> serde_json::Value {
    match type_name {
        "BOOL" => row
            .try_get::<bool, _>(index)
            .map_or(serde_json::Value::Null, serde_json::Value::from),
        "INT2" => row
            .try_get::<i16, _>(index)
            .map_or(serde_json::Value::Null, serde_json::Value::from),
        "INT4" => row
            .try_get::<i32, _>(index)
            .map_or(serde_json::Value::Null, serde_json::Value::from),
        "INT8" => row
            .try_get::<i64, _>(index)
            .map_or(serde_json::Value::Null, serde_json::Value::from),
        "FLOAT4" => row
            .try_get::<f32, _>(index)
            .map_or(serde_json::Value::Null, serde_json::Value::from),
        "FLOAT8" => row
            .try_get::<f64, _>(index)
            .map_or(serde_json::Value::Null, serde_json::Value::from),
        "UUID" => row.try_get::<Uuid, _>(index).map_or(
            serde_json::Value::Null,
            |v| serde_json::Value::String(v.to_string()),
        ),
        "JSON" | "JSONB" => row
            .try_get::<serde_json::Value, _>(index)
            .unwrap_or(serde_json::Value::Null),
        "TIMESTAMPTZ" => row.try_get::<DateTime<Utc>, _>(index).map_or(
            serde_json::Value::Null,
            |v| serde_json::Value::String(v.to_rfc3339()),
        ),
        "TIMESTAMP" => row.try_get::<NaiveDateTime, _>(index).map_or(
            serde_json::Value::Null,
            |v| serde_json::Value::String(v.to_string()),
        ),
        "DATE" => row.try_get::<NaiveDate, _>(index).map_or(
            serde_json::Value::Null,
            |v| serde_json::Value::String(v.to_string()),
        ),
        "BYTEA" => row.try_get::<Vec<u8>, _>(index).map_or(
            serde_json::Value::Null,
            |v| serde_json::Value::String(hex::encode(v)),
        ),
        // TEXT, VARCHAR, NAME, NUMERIC-as-text fallback and anything else
        _ => row.try_get::<String, _>(index).map_or(
            serde_json::Value::Null,
            serde_json::Value::String,
        ),
    }
}

pub(super) async fn introspect(pool: &PgPool) -> AppResult<Vec<SchemaTable>> {
    let intro_err = |e: sqlx::Error| AppError::schema_introspection(e.to_string());

    let table_rows = sqlx::query(
        "SELECT table_name FROM information_schema.tables \
         WHERE table_schema = 'public' AND table_type = 'BASE TABLE' \
         ORDER BY table_name",
    )
    .fetch_all(pool)
    .await
    .map_err(intro_err)?;

    let constraints = column_constraints(pool).await?;
    let foreign_keys = foreign_key_refs(pool).await?;

    let mut tables = Vec::with_capacity(table_rows.len());
    for table_row in table_rows {
        let table_name: String = table_row.try_get("table_name").map_err(intro_err)?;

        let column_rows = sqlx::query(
            "SELECT column_name, data_type, is_nullable \
             FROM information_schema.columns \
             WHERE table_schema = 'public' AND table_name = $1 \
             ORDER BY ordinal_position",
        )
        .bind(&table_name)
        .fetch_all(pool)
        .await
        .map_err(intro_err)?;

        let mut columns = Vec::with_capacity(column_rows.len());
        for row in column_rows {
            let name: String = row.try_get("column_name").map_err(intro_err)?;
            let is_nullable: String = row.try_get("is_nullable").map_err(intro_err)?;
            columns.push(SchemaColumn {
                constraint: constraints.get(&(table_name.clone(), name.clone())).cloned(),
                data_type: row.try_get("data_type").map_err(intro_err)?,
                nullable: is_nullable == "YES",
                name,
            });
        }

        let mut table_fks: Vec<ForeignKeyRef> = foreign_keys
            .get(&table_name)
            .cloned()
            .unwrap_or_default();
        table_fks.sort_by(|a, b| a.column.cmp(&b.column));

        tables.push(SchemaTable {
            name: table_name,
            columns,
            foreign_keys: table_fks,
        });
    }

    Ok(tables)
}

/// Primary-key and unique markers keyed by `(table, column)`
async fn column_constraints(pool: &PgPool) -> AppResult<HashMap<(String, String), String>> {
    let rows = sqlx::query(
        "SELECT kcu.table_name, kcu.column_name, tc.constraint_type \
         FROM information_schema.table_constraints tc \
         JOIN information_schema.key_column_usage kcu \
           ON tc.constraint_name = kcu.constraint_name \
          AND tc.table_schema = kcu.table_schema \
         WHERE tc.table_schema = 'public' \
           AND tc.constraint_type IN ('PRIMARY KEY', 'UNIQUE') \
         ORDER BY tc.constraint_type",
    )
    .fetch_all(pool)
    .await
    .map_err(|e| AppError::schema_introspection(e.to_string()))?;

    let mut constraints = HashMap::new();
    for row in rows {
        let table: String = row
            .try_get("table_name")
            .map_err(|e| AppError::schema_introspection(e.to_string()))?;
        let column: String = row
            .try_get("column_name")
            .map_err(|e| AppError::schema_introspection(e.to_string()))?;
        let kind: String = row
            .try_get("constraint_type")
            .map_err(|e| AppError::schema_introspection(e.to_string()))?;
        // PRIMARY KEY wins over UNIQUE when a column carries both
        constraints.entry((table, column)).or_insert(kind);
    }
    Ok(constraints)
}

/// Outgoing foreign-key references grouped by referencing table
async fn foreign_key_refs(pool: &PgPool) -> AppResult<HashMap<String, Vec<ForeignKeyRef>>> {
    let rows = sqlx::query(
        "SELECT kcu.table_name, kcu.column_name, \
                ccu.table_name AS foreign_table, ccu.column_name AS foreign_column \
         FROM information_schema.table_constraints tc \
         JOIN information_schema.key_column_usage kcu \
           ON tc.constraint_name = kcu.constraint_name \
          AND tc.table_schema = kcu.table_schema \
         JOIN information_schema.constraint_column_usage ccu \
           ON tc.constraint_name = ccu.constraint_name \
          AND tc.table_schema = ccu.table_schema \
         WHERE tc.table_schema = 'public' AND tc.constraint_type = 'FOREIGN KEY'",
    )
    .fetch_all(pool)
    .await
    .map_err(|e| AppError::schema_introspection(e.to_string()))?;

    let mut refs: HashMap<String, Vec<ForeignKeyRef>> = HashMap::new();
    for row in rows {
        let table: String = row
            .try_get("table_name")
            .map_err(|e| AppError::schema_introspection(e.to_string()))?;
        refs.entry(table).or_default().push(ForeignKeyRef {
            column: row
                .try_get("column_name")
                .map_err(|e| AppError::schema_introspection(e.to_string()))?,
            foreign_table: row
                .try_get("foreign_table")
                .map_err(|e| AppError::schema_introspection(e.to_string()))?,
            foreign_column: row
                .try_get("foreign_column")
                .map_err(|e| AppError::schema_introspection(e.to_string()))?,
        });
    }
    Ok(refs)
}
