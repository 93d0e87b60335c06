//! PostgreSQL implementation of the document store.
//!
//! All collections share one `documents` table (see
//! `migrations/0001_documents.sql`): record metadata in typed columns,
//! entity fields in a JSONB `data` column. An `AFTER INSERT OR UPDATE`
//! trigger publishes `{collection, id}` on the `document_changes` channel;
//! change subscriptions follow it through a dedicated [`PgListener`].

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::{StreamExt, stream};
use serde::Deserialize;
use sqlx::postgres::{PgListener, PgNotification, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{ChangeStream, DocumentStore, Order, Query, StoreError};
use crate::config::GatewayConfig;
use crate::domain::{Collection, Document, Record, RecordId, Stored};

/// Notification channel written by the `documents` trigger.
pub const CHANGE_CHANNEL: &str = "document_changes";

const SELECT_COLUMNS: &str = "SELECT id, data, created_at, created_by, updated_at, updated_by, \
                              deleted_at, deleted_by FROM documents";

type DocumentRow = (
    Uuid,
    serde_json::Value,
    DateTime<Utc>,
    Uuid,
    DateTime<Utc>,
    Uuid,
    Option<DateTime<Utc>>,
    Option<Uuid>,
);

#[derive(Debug, Deserialize)]
struct ChangeNotice {
    collection: String,
    id: Uuid,
}

/// PostgreSQL-backed [`DocumentStore`] using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a store over an existing connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects using the pool settings in `config` and runs migrations.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if `DATABASE_URL` is unset, the database is
    /// unreachable, or a migration fails.
    pub async fn connect(config: &GatewayConfig) -> Result<Self, StoreError> {
        let Some(url) = config.database_url.as_deref() else {
            return Err(StoreError::Database(sqlx::Error::Configuration(
                "DATABASE_URL is not set".into(),
            )));
        };
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(url)
            .await?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Database(e.into()))?;
        tracing::info!(
            max_connections = config.database_max_connections,
            "connected to postgres, migrations complete"
        );
        Ok(Self::new(pool))
    }

    async fn fetch(&self, collection: Collection, id: Uuid) -> Result<Option<Document>, StoreError> {
        let row = sqlx::query_as::<_, DocumentRow>(&format!(
            "{SELECT_COLUMNS} WHERE collection = $1 AND id = $2"
        ))
        .bind(collection.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(document_from_row).transpose()
    }
}

fn document_from_row(row: DocumentRow) -> Result<Document, StoreError> {
    let (id, data, created_at, created_by, updated_at, updated_by, deleted_at, deleted_by) = row;
    let fields = match data {
        serde_json::Value::Object(fields) => fields,
        other => {
            return Err(StoreError::Serialization(<serde_json::Error as serde::de::Error>::custom(
                format!("document {id} has non-object data: {other}"),
            )));
        }
    };
    Ok(Stored {
        record: Record {
            id: RecordId::from_uuid(id),
            created_at,
            created_by: created_by.into(),
            updated_at,
            updated_by: updated_by.into(),
            deleted_at,
            deleted_by: deleted_by.map(RecordId::from_uuid),
        },
        fields,
    })
}

#[async_trait]
impl DocumentStore for PostgresStore {
    async fn get(&self, collection: Collection, id: RecordId) -> Result<Option<Document>, StoreError> {
        self.fetch(collection, id.into()).await
    }

    async fn put(&self, collection: Collection, document: Document) -> Result<(), StoreError> {
        let record = &document.record;
        sqlx::query(
            "INSERT INTO documents \
             (collection, id, data, created_at, created_by, updated_at, updated_by, deleted_at, deleted_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (collection, id) DO UPDATE SET \
             data = EXCLUDED.data, updated_at = EXCLUDED.updated_at, \
             updated_by = EXCLUDED.updated_by, deleted_at = EXCLUDED.deleted_at, \
             deleted_by = EXCLUDED.deleted_by",
        )
        .bind(collection.as_str())
        .bind(Uuid::from(record.id))
        .bind(Json(&document.fields))
        .bind(record.created_at)
        .bind(Uuid::from(record.created_by))
        .bind(record.updated_at)
        .bind(Uuid::from(record.updated_by))
        .bind(record.deleted_at)
        .bind(record.deleted_by.map(Uuid::from))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn query(&self, collection: Collection, query: &Query) -> Result<Vec<Document>, StoreError> {
        let mut builder = QueryBuilder::<Postgres>::new(SELECT_COLUMNS);
        builder.push(" WHERE collection = ");
        builder.push_bind(collection.as_str());
        for (field, value) in &query.filters {
            builder.push(" AND data -> ");
            builder.push_bind(field.clone());
            builder.push("::text = ");
            builder.push_bind(Json(value.clone()));
        }
        if let Some(bound) = query.created_before {
            builder.push(" AND created_at < ");
            builder.push_bind(bound);
        }
        match &query.order {
            Some(Order::CreatedDesc) => {
                builder.push(" ORDER BY created_at DESC");
            }
            Some(Order::FieldDesc(field)) => {
                builder.push(" ORDER BY data -> ");
                builder.push_bind(field.clone());
                builder.push("::text DESC NULLS LAST");
            }
            None => {}
        }
        if let Some(limit) = query.limit {
            builder.push(" LIMIT ");
            builder.push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        let rows = builder
            .build_query_as::<DocumentRow>()
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(document_from_row).collect()
    }

    async fn subscribe_changes(
        &self,
        collection: Collection,
        since: DateTime<Utc>,
    ) -> Result<ChangeStream, StoreError> {
        // Listen before reading the backlog so nothing written in between
        // is lost. A document may then show up twice; that is harmless.
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(CHANGE_CHANNEL).await?;

        let backlog = sqlx::query_as::<_, DocumentRow>(&format!(
            "{SELECT_COLUMNS} WHERE collection = $1 AND updated_at >= $2 ORDER BY updated_at ASC"
        ))
        .bind(collection.as_str())
        .bind(since)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(document_from_row)
        .collect::<Vec<_>>();

        let store = self.clone();
        let live = listener.into_stream().filter_map(move |notification| {
            let store = store.clone();
            async move { store.resolve(collection, since, notification).await }
        });

        Ok(stream::iter(backlog).chain(live).boxed())
    }
}

impl PostgresStore {
    async fn resolve(
        &self,
        collection: Collection,
        since: DateTime<Utc>,
        notification: Result<PgNotification, sqlx::Error>,
    ) -> Option<Result<Document, StoreError>> {
        let notification = match notification {
            Ok(n) => n,
            Err(e) => return Some(Err(e.into())),
        };
        let notice: ChangeNotice = match serde_json::from_str(notification.payload()) {
            Ok(notice) => notice,
            Err(e) => {
                tracing::warn!(payload = notification.payload(), error = %e, "ignoring malformed change notice");
                return None;
            }
        };
        if Collection::from_name(&notice.collection) != Some(collection) {
            return None;
        }
        match self.fetch(collection, notice.id).await {
            Ok(Some(doc)) if doc.record.updated_at >= since => Some(Ok(doc)),
            Ok(_) => None,
            Err(e) => Some(Err(e)),
        }
    }
}
