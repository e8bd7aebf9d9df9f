//! Relational store backend over [`sqlx::Any`].
//!
//! Supports both PostgreSQL and SQLite through a single implementation; the
//! backend is detected from a pooled connection at construction time and the
//! few statements whose syntax differs (view rebinding, catalog queries) are
//! selected per dialect.

use crate::SqlStoreError;
use aergo_index_store::{
    Document, Family, IntegerRange, QueryParams, Scroll, Store, StoreError, StoreResult,
};
use serde_json::{Map, Value};
use sqlx::{any::AnyRow, AnyPool, Column, Row};

/// Bind-parameter budget per statement, below both engines' limits
/// (PostgreSQL 65535, SQLite 32766).
const MAX_BIND_PARAMS: usize = 30_000;

/// SQL dialect behind the [`AnyPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SqlKind {
    Sqlite,
    Postgres,
}

/// Relational store backend.
///
/// # Example
///
/// ```no_run
/// # async fn example() {
/// use aergo_index_store_sql::SqlStore;
///
/// // SQLite (in-memory)
/// let store = SqlStore::connect("sqlite::memory:").await.unwrap();
///
/// // PostgreSQL
/// let store = SqlStore::connect("postgres://localhost/aergo").await.unwrap();
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SqlStore {
    pool: AnyPool,
    kind: SqlKind,
}

impl SqlStore {
    /// Create a backend from an existing [`AnyPool`].
    ///
    /// Detects the database dialect from a pooled connection. Callers must
    /// ensure [`sqlx::any::install_default_drivers`] has been called before
    /// constructing the pool.
    pub async fn new(pool: AnyPool) -> Result<Self, SqlStoreError> {
        let conn = pool.acquire().await?;
        let backend = conn.backend_name().to_owned();
        drop(conn);

        let kind = match backend.as_str() {
            "SQLite" => SqlKind::Sqlite,
            "PostgreSQL" => SqlKind::Postgres,
            other => return Err(SqlStoreError::UnsupportedBackend(other.to_owned())),
        };
        Ok(Self { pool, kind })
    }

    /// Connect to a database URL and create the backend.
    ///
    /// Installs the default sqlx drivers on the first call. In-memory SQLite
    /// pools are limited to one connection so every operation shares the
    /// same database.
    pub async fn connect(url: &str) -> Result<Self, SqlStoreError> {
        sqlx::any::install_default_drivers();
        let max = if url.contains(":memory:") { 1 } else { 5 };
        let pool: AnyPool =
            sqlx::pool::PoolOptions::new().max_connections(max).connect(url).await?;
        Self::new(pool).await
    }

    fn ddl_template(family: Family) -> &'static str {
        match family {
            Family::Block => include_str!("../schemas/block.sql"),
            Family::Tx => include_str!("../schemas/tx.sql"),
            Family::Name => include_str!("../schemas/name.sql"),
        }
    }

    async fn fetch_page(
        &self,
        params: &QueryParams,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Value>, SqlStoreError> {
        let mut sql = format!(
            "SELECT {} FROM {}",
            select_list(params.select_fields.as_deref()),
            quote_ident(&params.index)
        );
        if let Some(range) = params.range {
            sql.push_str(&format!(" WHERE {} >= $1 AND {} <= $2", quote_ident(range.field), quote_ident(range.field)));
        }
        sql.push_str(&format!(
            " ORDER BY {} {} LIMIT {limit} OFFSET {offset}",
            quote_ident(params.sort_field),
            sort_order(params.sort_asc),
        ));

        let mut query = sqlx::query(&sql);
        if let Some(range) = params.range {
            query = query.bind(range.min as i64).bind(range.max as i64);
        }
        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_value).collect())
    }
}

fn sort_order(asc: bool) -> &'static str {
    if asc { "ASC" } else { "DESC" }
}

/// Quote an identifier, doubling any embedded quote characters.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn select_list(fields: Option<&[&'static str]>) -> String {
    match fields {
        Some(fields) => {
            fields.iter().map(|f| quote_ident(f)).collect::<Vec<_>>().join(", ")
        }
        None => "*".to_owned(),
    }
}

/// Build a multi-row insert for `rows` documents of `family`.
fn insert_sql(family: Family, index: &str, rows: usize, upsert: bool) -> String {
    let columns = family.columns();
    let column_list =
        columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ");

    let mut placeholders = Vec::with_capacity(rows);
    let mut n = 0;
    for _ in 0..rows {
        let row: Vec<String> = columns
            .iter()
            .map(|_| {
                n += 1;
                format!("${n}")
            })
            .collect();
        placeholders.push(format!("({})", row.join(", ")));
    }

    let conflict = if upsert {
        let updates = columns[1..]
            .iter()
            .map(|c| format!("{0} = excluded.{0}", quote_ident(c)))
            .collect::<Vec<_>>()
            .join(", ");
        format!("ON CONFLICT (\"id\") DO UPDATE SET {updates}")
    } else {
        "ON CONFLICT (\"id\") DO NOTHING".to_owned()
    };

    format!(
        "INSERT INTO {} ({column_list}) VALUES {} {conflict}",
        quote_ident(index),
        placeholders.join(", "),
    )
}

/// Extract the source table name from a view definition.
///
/// Handles quoting and schema qualification; the definitions this backend
/// creates are always `SELECT * FROM <table>`.
fn view_source_table(definition: &str) -> Option<String> {
    let lower = definition.to_lowercase();
    let pos = lower.rfind(" from ")?;
    let rest = definition[pos + 6..].trim_start();
    let token: &str = rest
        .split(|c: char| c.is_whitespace() || c == ';')
        .next()
        .filter(|t| !t.is_empty())?;
    // Strip a schema qualifier, honoring quoted segments.
    let unqualified = match token.rfind("\".\"") {
        Some(dot) => &token[dot + 2..],
        None if !token.contains('"') => token.rsplit('.').next().unwrap_or(token),
        None => token,
    };
    let table = unqualified.trim_matches('"').replace("\"\"", "\"");
    (!table.is_empty()).then_some(table)
}

/// Decode a row into a JSON document using the result-set metadata.
fn row_to_value(row: &AnyRow) -> Value {
    let mut doc = Map::new();
    for column in row.columns() {
        let idx = column.ordinal();
        let value = if let Ok(n) = row.try_get::<i64, _>(idx) {
            Value::from(n)
        } else if let Ok(s) = row.try_get::<String, _>(idx) {
            Value::from(s)
        } else if let Ok(f) = row.try_get::<f64, _>(idx) {
            Value::from(f)
        } else {
            Value::Null
        };
        doc.insert(column.name().to_owned(), value);
    }
    Value::Object(doc)
}

impl Store for SqlStore {
    type Scroll = SqlScroll;

    async fn create_index(&self, index: &str, family: Family) -> StoreResult<()> {
        let ddl = Self::ddl_template(family).replace("%indexName%", index);
        sqlx::raw_sql(&ddl)
            .execute(&self.pool)
            .await
            .map_err(SqlStoreError::from)?;
        Ok(())
    }

    async fn update_alias(&self, alias: &str, index: &str) -> StoreResult<()> {
        match self.kind {
            SqlKind::Postgres => {
                let sql = format!(
                    "CREATE OR REPLACE VIEW {} AS SELECT * FROM {}",
                    quote_ident(alias),
                    quote_ident(index)
                );
                sqlx::raw_sql(&sql).execute(&self.pool).await.map_err(SqlStoreError::from)?;
            }
            SqlKind::Sqlite => {
                // No CREATE OR REPLACE VIEW on SQLite; drop and recreate in
                // one transaction so the alias is never observed unbound.
                let mut tx = self.pool.begin().await.map_err(SqlStoreError::from)?;
                sqlx::query(&format!("DROP VIEW IF EXISTS {}", quote_ident(alias)))
                    .execute(&mut *tx)
                    .await
                    .map_err(SqlStoreError::from)?;
                sqlx::query(&format!(
                    "CREATE VIEW {} AS SELECT * FROM {}",
                    quote_ident(alias),
                    quote_ident(index)
                ))
                .execute(&mut *tx)
                .await
                .map_err(SqlStoreError::from)?;
                tx.commit().await.map_err(SqlStoreError::from)?;
            }
        }
        Ok(())
    }

    async fn existing_index_prefix(
        &self,
        alias: &str,
        family: Family,
    ) -> StoreResult<Option<String>> {
        let sql = match self.kind {
            SqlKind::Postgres => {
                "SELECT view_definition AS def FROM information_schema.views WHERE table_name = $1"
            }
            SqlKind::Sqlite => {
                "SELECT sql AS def FROM sqlite_master WHERE type = 'view' AND name = $1"
            }
        };
        let row = sqlx::query(sql)
            .bind(alias)
            .fetch_optional(&self.pool)
            .await
            .map_err(SqlStoreError::from)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let definition: String = row.get("def");
        let table = view_source_table(&definition)
            .ok_or_else(|| SqlStoreError::ViewParse(definition.clone()))
            .map_err(StoreError::from)?;
        Ok(table.strip_suffix(family.name()).map(str::to_owned))
    }

    async fn insert<D: Document>(&self, doc: &D, index: &str, upsert: bool) -> StoreResult<u64> {
        self.insert_batch(std::slice::from_ref(doc), index, upsert).await
    }

    async fn insert_batch<D: Document>(
        &self,
        docs: &[D],
        index: &str,
        upsert: bool,
    ) -> StoreResult<u64> {
        // Both engines cap bind parameters well below the largest pipeline
        // batch (10k txs x 7 columns), so one logical batch may become
        // several statements.
        let rows_per_stmt = (MAX_BIND_PARAMS / D::FAMILY.columns().len()).max(1);
        let mut affected = 0;
        for part in docs.chunks(rows_per_stmt) {
            let sql = insert_sql(D::FAMILY, index, part.len(), upsert);
            let mut query = sqlx::query(&sql);
            for doc in part {
                for param in doc.sql_row() {
                    query = match param {
                        aergo_index_store::SqlParam::Text(s) => query.bind(s),
                        aergo_index_store::SqlParam::BigInt(n) => query.bind(n),
                    };
                }
            }
            let result = query.execute(&self.pool).await.map_err(SqlStoreError::from)?;
            affected += result.rows_affected();
        }
        Ok(affected)
    }

    async fn count(&self, params: &QueryParams) -> StoreResult<u64> {
        let mut sql = format!("SELECT COUNT(*) AS cnt FROM {}", quote_ident(&params.index));
        let mut query;
        if let Some(range) = params.range {
            sql.push_str(&format!(
                " WHERE {} >= $1 AND {} <= $2",
                quote_ident(range.field),
                quote_ident(range.field)
            ));
            query = sqlx::query(&sql);
            query = query.bind(range.min as i64).bind(range.max as i64);
        } else {
            query = sqlx::query(&sql);
        }
        let row = query.fetch_one(&self.pool).await.map_err(SqlStoreError::from)?;
        Ok(row.get::<i64, _>("cnt").max(0) as u64)
    }

    async fn select_one(&self, params: &QueryParams) -> StoreResult<Option<Value>> {
        let page = self.fetch_page(params, 1, 0).await.map_err(StoreError::from)?;
        Ok(page.into_iter().next())
    }

    async fn scroll(&self, params: QueryParams) -> StoreResult<Self::Scroll> {
        Ok(SqlScroll {
            store: self.clone(),
            params,
            offset: 0,
            buffer: Vec::new(),
            done: false,
        })
    }

    async fn delete_range(&self, index: &str, range: IntegerRange) -> StoreResult<u64> {
        let sql = format!(
            "DELETE FROM {} WHERE {} >= $1 AND {} <= $2",
            quote_ident(index),
            quote_ident(range.field),
            quote_ident(range.field)
        );
        let result = sqlx::query(&sql)
            .bind(range.min as i64)
            .bind(range.max as i64)
            .execute(&self.pool)
            .await
            .map_err(SqlStoreError::from)?;
        Ok(result.rows_affected())
    }
}

/// Paged scan over a table or view.
///
/// Pages with `LIMIT`/`OFFSET` in the requested sort order; each `next`
/// drains the current page before fetching the next one.
#[derive(Debug)]
pub struct SqlScroll {
    store: SqlStore,
    params: QueryParams,
    offset: usize,
    buffer: Vec<Value>,
    done: bool,
}

impl Scroll for SqlScroll {
    async fn next(&mut self) -> StoreResult<Option<Value>> {
        if self.buffer.is_empty() && !self.done {
            let page = self
                .store
                .fetch_page(&self.params, self.params.page_size, self.offset)
                .await
                .map_err(StoreError::from)?;
            self.offset += page.len();
            if page.len() < self.params.page_size {
                self.done = true;
            }
            self.buffer = page;
            self.buffer.reverse();
        }
        Ok(self.buffer.pop())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_sql_shape() {
        let sql = insert_sql(Family::Block, "chain_x_block", 2, false);
        assert!(sql.starts_with("INSERT INTO \"chain_x_block\""));
        assert!(sql.contains("($1, $2, $3, $4, $5), ($6, $7, $8, $9, $10)"));
        assert!(sql.ends_with("ON CONFLICT (\"id\") DO NOTHING"));

        let upsert = insert_sql(Family::Name, "chain_x_name", 1, true);
        assert!(upsert.contains("DO UPDATE SET"));
        assert!(upsert.contains("\"address\" = excluded.\"address\""));
    }

    #[test]
    fn view_parsing() {
        assert_eq!(
            view_source_table("CREATE VIEW \"chain_block\" AS SELECT * FROM \"chain_p0_block\""),
            Some("chain_p0_block".to_owned())
        );
        assert_eq!(
            view_source_table(" SELECT id, no FROM public.\"chain_p0_block\";"),
            Some("chain_p0_block".to_owned())
        );
        assert_eq!(
            view_source_table("SELECT \"id\", \"from\" FROM chain_p0_tx;"),
            Some("chain_p0_tx".to_owned())
        );
        assert_eq!(view_source_table("no source here"), None);
    }

    #[test]
    fn ident_quoting() {
        assert_eq!(quote_ident("chain_2024-01-01_00-00-00_block"), "\"chain_2024-01-01_00-00-00_block\"");
        assert_eq!(quote_ident("odd\"name"), "\"odd\"\"name\"");
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod conformance_tests {
    use super::*;
    use aergo_index_store::conformance::conformance;

    #[tokio::test]
    async fn sqlite_conformance() {
        let store = SqlStore::connect("sqlite::memory:").await.unwrap();
        conformance(&store).await.unwrap();
    }

    #[tokio::test]
    async fn pg_conformance() {
        let Ok(url) = std::env::var("DATABASE_URL") else {
            eprintln!("skipping pg conformance: DATABASE_URL not set");
            return;
        };
        let store = SqlStore::connect(&url).await.unwrap();
        conformance(&store).await.unwrap();
    }
}
