/// SQLite entity storage
///
/// Each entry is kept as a JSON document next to its key columns. Conditions
/// and sorting are evaluated with `json_extract`, so any camelCase property of
/// the entry (including nested metadata) can be filtered on.
use crate::{
    blob_store::BlobStorageEntry,
    entity_store::{
        clamp_page_size, parse_cursor, validate_conditions, validate_property, Comparison,
        Condition, EntityPage, EntityStorageConnector, SortBy,
    },
    error::{BlobError, BlobResult},
};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

pub struct SqliteEntityStorage {
    db: SqlitePool,
}

impl SqliteEntityStorage {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Create the entry table if it doesn't exist
    pub async fn bootstrap(&self) -> BlobResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS blob_storage_entry (
                id TEXT NOT NULL,
                user_identity TEXT NOT NULL DEFAULT '',
                node_identity TEXT NOT NULL DEFAULT '',
                date_created TEXT NOT NULL,
                document TEXT NOT NULL,
                PRIMARY KEY (id, user_identity, node_identity)
            )
            "#,
        )
        .execute(&self.db)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_blob_storage_entry_created \
             ON blob_storage_entry(date_created)",
        )
        .execute(&self.db)
        .await?;

        tracing::info!("blob_storage_entry table ready");
        Ok(())
    }
}

/// JSON path for a validated property name
fn json_path(property: &str) -> String {
    format!("$.{}", property)
}

fn push_value(qb: &mut QueryBuilder<'_, Sqlite>, value: &Value) {
    match value {
        Value::Null => {
            qb.push("NULL");
        }
        Value::Bool(b) => {
            qb.push_bind(*b);
        }
        Value::Number(n) => match n.as_i64() {
            Some(i) => {
                qb.push_bind(i);
            }
            None => {
                qb.push_bind(n.as_f64().unwrap_or_default());
            }
        },
        Value::String(s) => {
            qb.push_bind(s.clone());
        }
        other => {
            qb.push("json(");
            qb.push_bind(other.to_string());
            qb.push(")");
        }
    }
}

fn push_extract(qb: &mut QueryBuilder<'_, Sqlite>, property: &str) {
    qb.push("json_extract(document, ");
    qb.push_bind(json_path(property));
    qb.push(")");
}

/// Append ` AND <condition>` for every condition
fn push_conditions(qb: &mut QueryBuilder<'_, Sqlite>, conditions: &[Condition]) {
    for condition in conditions {
        qb.push(" AND ");
        match condition.comparison {
            Comparison::Equals => {
                push_extract(qb, &condition.property);
                qb.push(" IS ");
                push_value(qb, &condition.value);
            }
            Comparison::NotEquals => {
                push_extract(qb, &condition.property);
                qb.push(" IS NOT ");
                push_value(qb, &condition.value);
            }
            Comparison::GreaterThan => {
                push_extract(qb, &condition.property);
                qb.push(" > ");
                push_value(qb, &condition.value);
            }
            Comparison::LessThan => {
                push_extract(qb, &condition.property);
                qb.push(" < ");
                push_value(qb, &condition.value);
            }
            Comparison::Includes => {
                qb.push("(CASE json_type(document, ");
                qb.push_bind(json_path(&condition.property));
                qb.push(") WHEN 'array' THEN EXISTS (SELECT 1 FROM json_each(document, ");
                qb.push_bind(json_path(&condition.property));
                qb.push(") WHERE json_each.value = ");
                push_value(qb, &condition.value);
                qb.push(") WHEN 'text' THEN instr(");
                push_extract(qb, &condition.property);
                qb.push(", ");
                push_value(qb, &condition.value);
                qb.push(") > 0 ELSE 0 END)");
            }
        }
    }
}

fn decode(row: &sqlx::sqlite::SqliteRow) -> BlobResult<BlobStorageEntry> {
    let document: String = row.try_get("document")?;
    serde_json::from_str(&document).map_err(BlobError::from)
}

#[async_trait]
impl EntityStorageConnector for SqliteEntityStorage {
    async fn get(
        &self,
        id: &str,
        conditions: &[Condition],
    ) -> BlobResult<Option<BlobStorageEntry>> {
        validate_conditions(conditions)?;

        let mut qb =
            QueryBuilder::<Sqlite>::new("SELECT document FROM blob_storage_entry WHERE id = ");
        qb.push_bind(id.to_string());
        push_conditions(&mut qb, conditions);
        qb.push(" LIMIT 1");

        let row = qb.build().fetch_optional(&self.db).await?;
        row.as_ref().map(decode).transpose()
    }

    async fn set(&self, entry: BlobStorageEntry) -> BlobResult<()> {
        let document = serde_json::to_string(&entry)?;

        sqlx::query(
            r#"
            INSERT INTO blob_storage_entry
                (id, user_identity, node_identity, date_created, document)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id, user_identity, node_identity) DO UPDATE SET
                date_created = excluded.date_created,
                document = excluded.document
            "#,
        )
        .bind(&entry.id)
        .bind(entry.user_identity.as_deref().unwrap_or_default())
        .bind(entry.node_identity.as_deref().unwrap_or_default())
        .bind(&entry.date_created)
        .bind(document)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn remove(&self, id: &str, conditions: &[Condition]) -> BlobResult<bool> {
        validate_conditions(conditions)?;

        let mut qb = QueryBuilder::<Sqlite>::new(
            "DELETE FROM blob_storage_entry WHERE rowid IN \
             (SELECT rowid FROM blob_storage_entry WHERE id = ",
        );
        qb.push_bind(id.to_string());
        push_conditions(&mut qb, conditions);
        qb.push(" LIMIT 1)");

        let result = qb.build().execute(&self.db).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn query(
        &self,
        conditions: &[Condition],
        sort: Option<SortBy>,
        cursor: Option<String>,
        page_size: Option<usize>,
    ) -> BlobResult<EntityPage> {
        validate_conditions(conditions)?;
        if let Some(sort) = &sort {
            validate_property(&sort.property)?;
        }
        let offset = parse_cursor(cursor.as_deref())?;
        let bound_offset = i64::try_from(offset)
            .map_err(|_| BlobError::Validation(format!("Cursor out of range: {}", offset)))?;
        let page_size = clamp_page_size(page_size);

        let mut qb =
            QueryBuilder::<Sqlite>::new("SELECT document FROM blob_storage_entry WHERE 1 = 1");
        push_conditions(&mut qb, conditions);

        match &sort {
            Some(sort) => {
                qb.push(" ORDER BY ");
                push_extract(&mut qb, &sort.property);
                qb.push(" ");
                qb.push(sort.direction.as_sql());
                qb.push(", rowid ");
                qb.push(sort.direction.as_sql());
            }
            None => {
                qb.push(" ORDER BY rowid ASC");
            }
        }

        // One extra row tells us whether another page exists
        qb.push(" LIMIT ");
        qb.push_bind((page_size + 1) as i64);
        qb.push(" OFFSET ");
        qb.push_bind(bound_offset);

        let rows = qb.build().fetch_all(&self.db).await?;
        let has_more = rows.len() > page_size;

        let entries = rows
            .iter()
            .take(page_size)
            .map(decode)
            .collect::<BlobResult<Vec<_>>>()?;

        let next = offset.saturating_add(entries.len());
        Ok(EntityPage {
            entries,
            cursor: has_more.then(|| next.to_string()),
        })
    }

    async fn count(&self, id: &str) -> BlobResult<usize> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM blob_storage_entry WHERE id = ?1")
            .bind(id)
            .fetch_one(&self.db)
            .await?;
        let total: i64 = row.try_get("total")?;
        Ok(total as usize)
    }
}
