//! Central tenant directory: `_sys_tenants` DDL and persistence. The table lives in a schema
//! named from `TENANT_DIRECTORY_SCHEMA` env (default `pos`).

use crate::error::AppError;
use crate::tenant::TenantConfig;
use sqlx::PgPool;

/// Schema name for the directory table. Must be a valid PostgreSQL identifier.
pub fn directory_schema() -> String {
    std::env::var("TENANT_DIRECTORY_SCHEMA").unwrap_or_else(|_| "pos".into())
}

/// Returns schema-qualified table name (e.g. "pos._sys_tenants").
pub fn qualified_sys_table(table: &str) -> String {
    format!("{}.{}", directory_schema(), table)
}

const TENANTS_TABLE: &str = "_sys_tenants";

/// Create the directory schema and `_sys_tenants` if missing.
pub async fn ensure_tenant_table(pool: &PgPool) -> Result<(), AppError> {
    sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", directory_schema()))
        .execute(pool)
        .await?;
    let q_table = qualified_sys_table(TENANTS_TABLE);
    let ddl = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
            subdomain TEXT PRIMARY KEY,
            connection_uri TEXT NOT NULL,
            display_name TEXT NOT NULL DEFAULT '',
            is_active BOOLEAN NOT NULL DEFAULT TRUE,
            schema_name TEXT,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
        q_table
    );
    sqlx::query(&ddl).execute(pool).await?;
    Ok(())
}

/// Load all tenants ordered by subdomain. Rows with an empty connection uri are skipped.
pub async fn load_tenants(pool: &PgPool) -> Result<Vec<TenantConfig>, AppError> {
    let sql = format!(
        "SELECT subdomain, connection_uri, display_name, is_active, schema_name FROM {} ORDER BY subdomain",
        qualified_sys_table(TENANTS_TABLE)
    );
    let rows = sqlx::query_as::<_, (String, String, String, bool, Option<String>)>(&sql)
        .fetch_all(pool)
        .await?;

    let mut tenants = Vec::with_capacity(rows.len());
    for (subdomain, connection_uri, display_name, is_active, schema) in rows {
        if connection_uri.trim().is_empty() {
            tracing::warn!("tenant {}: empty connection_uri in directory, skipping", subdomain);
            continue;
        }
        tenants.push(TenantConfig {
            subdomain,
            connection_uri,
            display_name,
            is_active,
            schema: schema.filter(|s| !s.is_empty()),
        });
    }
    Ok(tenants)
}

/// Insert or replace one directory row.
pub async fn upsert_tenant(pool: &PgPool, config: &TenantConfig) -> Result<(), AppError> {
    let sql = format!(
        r#"
        INSERT INTO {} (subdomain, connection_uri, display_name, is_active, schema_name, updated_at)
        VALUES ($1, $2, $3, $4, $5, NOW())
        ON CONFLICT (subdomain)
        DO UPDATE SET connection_uri = $2, display_name = $3, is_active = $4, schema_name = $5, updated_at = NOW()
        "#,
        qualified_sys_table(TENANTS_TABLE)
    );
    sqlx::query(&sql)
        .bind(&config.subdomain)
        .bind(&config.connection_uri)
        .bind(&config.display_name)
        .bind(config.is_active)
        .bind(config.schema.as_deref())
        .execute(pool)
        .await?;
    Ok(())
}

/// Delete one directory row. Returns whether a row existed.
pub async fn delete_tenant(pool: &PgPool, subdomain: &str) -> Result<bool, AppError> {
    let sql = format!("DELETE FROM {} WHERE subdomain = $1", qualified_sys_table(TENANTS_TABLE));
    let result = sqlx::query(&sql).bind(subdomain).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}

/// Last directory write time for a tenant, if it has a row.
pub async fn tenant_updated_at(
    pool: &PgPool,
    subdomain: &str,
) -> Result<Option<chrono::DateTime<chrono::Utc>>, AppError> {
    let sql = format!(
        "SELECT updated_at FROM {} WHERE subdomain = $1",
        qualified_sys_table(TENANTS_TABLE)
    );
    let row: Option<(chrono::DateTime<chrono::Utc>,)> = sqlx::query_as(&sql)
        .bind(subdomain)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|r| r.0))
}
