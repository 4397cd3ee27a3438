//! Schema Reflector
//!
//! Each backend has its own reflection function that queries the system
//! catalogs and builds a [`SchemaDescription`]. Foreign key targets are read
//! as qualified `table.column` identifiers and split by
//! [`ForeignKeyRef::from_qualified`], so a target that cannot be split fails
//! the whole reflection.

use crate::database::connection::DatabasePool;
use crate::database::schema::{ForeignKeyRef, SchemaDescription, TableInfo};
use crate::error::{AgentError, Result};
use sqlx::{mysql::MySqlPool, postgres::PgPool, sqlite::SqlitePool, Row};
use tracing::{debug, warn};

/// Reflect the schema visible through `pool`
pub async fn reflect(pool: &DatabasePool) -> Result<SchemaDescription> {
    let schema = match pool {
        DatabasePool::MySql(pool) => reflect_mysql(pool).await?,
        DatabasePool::Postgres(pool) => reflect_postgresql(pool).await?,
        DatabasePool::Sqlite(pool) => reflect_sqlite(pool).await?,
    };

    for (table, fk) in schema.dangling_foreign_keys() {
        warn!(table, foreign_key = %fk, "foreign key target is not part of the reflected schema");
    }
    debug!(tables = schema.len(), backend = %pool.backend(), "schema reflected");

    Ok(schema)
}

/// Reflect a MySQL database schema
pub async fn reflect_mysql(pool: &MySqlPool) -> Result<SchemaDescription> {
    let mut schema = SchemaDescription::new();

    // information_schema columns come back as binary strings on MySQL 8
    let tables_query = r#"
        SELECT CAST(TABLE_NAME AS CHAR) AS table_name
        FROM information_schema.TABLES
        WHERE TABLE_SCHEMA = DATABASE()
            AND TABLE_TYPE = 'BASE TABLE'
        ORDER BY TABLE_NAME
    "#;

    let table_names: Vec<String> = sqlx::query_scalar(tables_query)
        .fetch_all(pool)
        .await
        .map_err(|e| AgentError::schema_query(tables_query, e))?;

    for table_name in table_names {
        let mut table = TableInfo::new();

        let columns_query = r#"
            SELECT CAST(COLUMN_NAME AS CHAR) AS column_name
            FROM information_schema.COLUMNS
            WHERE TABLE_SCHEMA = DATABASE()
                AND TABLE_NAME = ?
            ORDER BY ORDINAL_POSITION
        "#;

        let columns: Vec<String> = sqlx::query_scalar(columns_query)
            .bind(&table_name)
            .fetch_all(pool)
            .await
            .map_err(|e| AgentError::schema_query(columns_query, e))?;
        columns.into_iter().for_each(|c| table.add_column(c));

        let pk_query = r#"
            SELECT CAST(COLUMN_NAME AS CHAR) AS column_name
            FROM information_schema.KEY_COLUMN_USAGE
            WHERE TABLE_SCHEMA = DATABASE()
                AND TABLE_NAME = ?
                AND CONSTRAINT_NAME = 'PRIMARY'
            ORDER BY ORDINAL_POSITION
        "#;

        let pk_columns: Vec<String> = sqlx::query_scalar(pk_query)
            .bind(&table_name)
            .fetch_all(pool)
            .await
            .map_err(|e| AgentError::schema_query(pk_query, e))?;
        pk_columns.into_iter().for_each(|c| table.add_primary_key(c));

        // Targets in another database keep their schema prefix
        let fk_query = r#"
            SELECT
                CAST(COLUMN_NAME AS CHAR) AS column_name,
                CAST(CONCAT_WS('.',
                    IF(REFERENCED_TABLE_SCHEMA = DATABASE(), NULL, REFERENCED_TABLE_SCHEMA),
                    REFERENCED_TABLE_NAME,
                    REFERENCED_COLUMN_NAME) AS CHAR) AS target
            FROM information_schema.KEY_COLUMN_USAGE
            WHERE TABLE_SCHEMA = DATABASE()
                AND TABLE_NAME = ?
                AND REFERENCED_TABLE_NAME IS NOT NULL
            ORDER BY CONSTRAINT_NAME, ORDINAL_POSITION
        "#;

        let fk_rows = sqlx::query(fk_query)
            .bind(&table_name)
            .fetch_all(pool)
            .await
            .map_err(|e| AgentError::schema_query(fk_query, e))?;

        for fk_row in fk_rows {
            let column: String = fk_row
                .try_get("column_name")
                .map_err(|e| AgentError::schema_query(fk_query, e))?;
            let target: Option<String> = fk_row
                .try_get("target")
                .map_err(|e| AgentError::schema_query(fk_query, e))?;
            table.foreign_keys.push(resolve_foreign_key(&table_name, column, target)?);
        }

        schema.add_table(table_name, table)?;
    }

    Ok(schema)
}

/// Reflect a PostgreSQL database schema (the connection's current schema)
pub async fn reflect_postgresql(pool: &PgPool) -> Result<SchemaDescription> {
    let mut schema = SchemaDescription::new();

    let tables_query = r#"
        SELECT table_name::text
        FROM information_schema.tables
        WHERE table_schema = current_schema()
            AND table_type = 'BASE TABLE'
        ORDER BY table_name
    "#;

    let table_names: Vec<String> = sqlx::query_scalar(tables_query)
        .fetch_all(pool)
        .await
        .map_err(|e| AgentError::schema_query(tables_query, e))?;

    for table_name in table_names {
        let mut table = TableInfo::new();

        let columns_query = r#"
            SELECT column_name::text
            FROM information_schema.columns
            WHERE table_schema = current_schema()
                AND table_name = $1
            ORDER BY ordinal_position
        "#;

        let columns: Vec<String> = sqlx::query_scalar(columns_query)
            .bind(&table_name)
            .fetch_all(pool)
            .await
            .map_err(|e| AgentError::schema_query(columns_query, e))?;
        columns.into_iter().for_each(|c| table.add_column(c));

        let pk_query = r#"
            SELECT kcu.column_name::text
            FROM information_schema.table_constraints AS tc
            JOIN information_schema.key_column_usage AS kcu
                ON tc.constraint_name = kcu.constraint_name
                AND tc.table_schema = kcu.table_schema
                AND tc.table_name = kcu.table_name
            WHERE tc.constraint_type = 'PRIMARY KEY'
                AND tc.table_schema = current_schema()
                AND tc.table_name = $1
            ORDER BY kcu.ordinal_position
        "#;

        let pk_columns: Vec<String> = sqlx::query_scalar(pk_query)
            .bind(&table_name)
            .fetch_all(pool)
            .await
            .map_err(|e| AgentError::schema_query(pk_query, e))?;
        pk_columns.into_iter().for_each(|c| table.add_primary_key(c));

        // unnest pairs each local column with its referenced column by position
        let fk_query = r#"
            SELECT
                a.attname::text AS column_name,
                (CASE WHEN fn.nspname = current_schema() THEN ''
                      ELSE fn.nspname::text || '.' END
                 || ft.relname::text || '.' || fa.attname::text)::text AS target
            FROM pg_constraint AS c
            JOIN pg_class AS t ON t.oid = c.conrelid
            JOIN pg_namespace AS n ON n.oid = t.relnamespace
            JOIN pg_class AS ft ON ft.oid = c.confrelid
            JOIN pg_namespace AS fn ON fn.oid = ft.relnamespace
            CROSS JOIN LATERAL unnest(c.conkey, c.confkey)
                WITH ORDINALITY AS k(attnum, fattnum, position)
            JOIN pg_attribute AS a ON a.attrelid = c.conrelid AND a.attnum = k.attnum
            JOIN pg_attribute AS fa ON fa.attrelid = c.confrelid AND fa.attnum = k.fattnum
            WHERE c.contype = 'f'
                AND n.nspname = current_schema()
                AND t.relname::text = $1
            ORDER BY c.conname, k.position
        "#;

        let fk_rows = sqlx::query(fk_query)
            .bind(&table_name)
            .fetch_all(pool)
            .await
            .map_err(|e| AgentError::schema_query(fk_query, e))?;

        for fk_row in fk_rows {
            let column: String = fk_row
                .try_get("column_name")
                .map_err(|e| AgentError::schema_query(fk_query, e))?;
            let target: Option<String> = fk_row
                .try_get("target")
                .map_err(|e| AgentError::schema_query(fk_query, e))?;
            table.foreign_keys.push(resolve_foreign_key(&table_name, column, target)?);
        }

        schema.add_table(table_name, table)?;
    }

    Ok(schema)
}

/// Reflect a SQLite database schema
pub async fn reflect_sqlite(pool: &SqlitePool) -> Result<SchemaDescription> {
    let mut schema = SchemaDescription::new();

    let tables_query = r#"
        SELECT name
        FROM sqlite_master
        WHERE type = 'table'
            AND name NOT LIKE 'sqlite_%'
        ORDER BY name
    "#;

    let table_names: Vec<String> = sqlx::query_scalar(tables_query)
        .fetch_all(pool)
        .await
        .map_err(|e| AgentError::schema_query(tables_query, e))?;

    for table_name in table_names {
        let mut table = TableInfo::new();

        let columns_query = "SELECT name, pk FROM pragma_table_info(?) ORDER BY cid";

        let column_rows = sqlx::query(columns_query)
            .bind(&table_name)
            .fetch_all(pool)
            .await
            .map_err(|e| AgentError::schema_query(columns_query, e))?;

        let mut pk_columns: Vec<(i64, String)> = Vec::new();
        for col_row in column_rows {
            let name: String = col_row
                .try_get("name")
                .map_err(|e| AgentError::schema_query(columns_query, e))?;
            let pk: i64 = col_row
                .try_get("pk")
                .map_err(|e| AgentError::schema_query(columns_query, e))?;
            if pk > 0 {
                pk_columns.push((pk, name.clone()));
            }
            table.add_column(name);
        }
        pk_columns.sort_by_key(|(position, _)| *position);
        pk_columns.into_iter().for_each(|(_, c)| table.add_primary_key(c));

        // A reference without a column list points at the target's primary key
        let fk_query = r#"
            SELECT
                fk."from" AS column_name,
                fk."table" || '.' || COALESCE(
                    fk."to",
                    (SELECT ti.name FROM pragma_table_info(fk."table") AS ti
                     WHERE ti.pk = fk.seq + 1)
                ) AS target
            FROM pragma_foreign_key_list(?) AS fk
            ORDER BY fk.id, fk.seq
        "#;

        let fk_rows = sqlx::query(fk_query)
            .bind(&table_name)
            .fetch_all(pool)
            .await
            .map_err(|e| AgentError::schema_query(fk_query, e))?;

        for fk_row in fk_rows {
            let column: String = fk_row
                .try_get("column_name")
                .map_err(|e| AgentError::schema_query(fk_query, e))?;
            let target: Option<String> = fk_row
                .try_get("target")
                .map_err(|e| AgentError::schema_query(fk_query, e))?;
            table.foreign_keys.push(resolve_foreign_key(&table_name, column, target)?);
        }

        schema.add_table(table_name, table)?;
    }

    Ok(schema)
}

fn resolve_foreign_key(table: &str, column: String, target: Option<String>) -> Result<ForeignKeyRef> {
    match target {
        Some(target) => ForeignKeyRef::from_qualified(column, &target),
        None => Err(AgentError::Schema(format!(
            "foreign key on {}.{} has no resolvable target",
            table, column
        ))),
    }
}
