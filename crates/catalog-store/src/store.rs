//! Pooled Postgres access for the album catalog.
//!
//! Every query opens a client span from the caller's request context, so
//! database work shows up in the same trace as the handler that issued it.

use std::str::FromStr;
use std::sync::Arc;

use futures::TryStreamExt;
use opentelemetry::global::BoxedTracer;
use opentelemetry::trace::SpanKind;
use opentelemetry::{Context, KeyValue};
use sqlx::FromRow;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use tracing::warn;

use crate::error::{Result, StoreError};
use crate::models::Album;
use crate::trace::start_span;

const ALBUMS_TABLE: &str = "\
    CREATE TABLE ALBUMS(\
        ID VARCHAR(10) PRIMARY KEY,\
        TITLE text not null,\
        ARTIST text not null,\
        PRICE float not null\
    )";

const INSERT_ALBUM: &str =
    "INSERT INTO ALBUMS (ID, TITLE, ARTIST, PRICE) VALUES ($1, $2, $3, $4)";

const SELECT_ALBUMS: &str = "SELECT * FROM ALBUMS";

const SELECT_ALBUM_BY_ID: &str = "SELECT * FROM ALBUMS WHERE ID = $1";

/// Rows inserted at startup so a fresh database is never empty.
fn seed_albums() -> Vec<Album> {
    vec![
        Album {
            id: "1".to_string(),
            title: "Tubthumper".to_string(),
            artist: "Chumbawumba".to_string(),
            price: 56.99,
        },
        Album {
            id: "2".to_string(),
            title: "Jeru".to_string(),
            artist: "Gerry Mulligan".to_string(),
            price: 17.99,
        },
        Album {
            id: "3".to_string(),
            title: "Sarah Vaughan and Clifford Brown".to_string(),
            artist: "Sarah Vaughan".to_string(),
            price: 39.99,
        },
    ]
}

#[derive(Clone)]
pub struct CatalogStore {
    pool: sqlx::PgPool,
    tracer: Arc<BoxedTracer>,
}

impl CatalogStore {
    /// Parses the connection URL and builds a lazy pool; query spans are
    /// opened from the tracer handed in here. No I/O happens in this
    /// call; the first connection is established by
    /// [`CatalogStore::init`]. A URL that does not parse is a
    /// startup-fatal configuration error.
    pub fn connect(database_url: &str, tracer: Arc<BoxedTracer>) -> Result<Self> {
        let options = PgConnectOptions::from_str(database_url).map_err(StoreError::Config)?;
        let pool = PgPoolOptions::new().connect_lazy_with(options);

        Ok(Self { pool, tracer })
    }

    /// Creates the ALBUMS table and inserts the seed rows.
    ///
    /// A transport-level failure on table creation is returned to the
    /// caller and aborts startup; there is deliberately no retry loop.
    /// Any other creation failure (typically "table already exists") is
    /// logged as a warning and startup continues. Per-row seed failures
    /// likewise warn and move on to the next row.
    pub async fn init(&self) -> Result<()> {
        if let Err(err) = sqlx::query(ALBUMS_TABLE).execute(&self.pool).await {
            let err = StoreError::Database(err);
            if err.is_network() {
                return Err(err);
            }
            warn!(error = %err, "unable to create table");
        }

        for album in seed_albums() {
            if let Err(err) = self.insert(&Context::new(), &album).await {
                warn!(album_id = %album.id, error = %err, "unable to insert rows into table");
            }
        }

        Ok(())
    }

    /// Parameterized insert. The underlying error is returned unchanged;
    /// the HTTP layer maps it to a 500.
    pub async fn insert(&self, cx: &Context, album: &Album) -> Result<()> {
        let scope = start_span(&self.tracer, cx, "INSERT ALBUMS", SpanKind::Client);
        scope.span().set_attribute(KeyValue::new("db.system", "postgresql"));
        scope.span().set_attribute(KeyValue::new("db.statement", INSERT_ALBUM));

        sqlx::query(INSERT_ALBUM)
            .bind(&album.id)
            .bind(&album.title)
            .bind(&album.artist)
            .bind(album.price)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Unconditional `SELECT *` over the albums table, in store-defined
    /// order (no ORDER BY, not guaranteed stable across calls).
    ///
    /// A row that fails to decode stops further consumption without
    /// failing the rows already collected; an error from the row stream
    /// itself is surfaced so the caller can answer 500.
    pub async fn list_all(&self, cx: &Context) -> Result<Vec<Album>> {
        let scope = start_span(&self.tracer, cx, "SELECT ALBUMS", SpanKind::Client);
        scope.span().set_attribute(KeyValue::new("db.system", "postgresql"));
        scope.span().set_attribute(KeyValue::new("db.statement", SELECT_ALBUMS));

        let mut rows = sqlx::query(SELECT_ALBUMS).fetch(&self.pool);
        let mut albums = Vec::new();
        let mut first = true;
        loop {
            match rows.try_next().await {
                Ok(Some(row)) => {
                    first = false;
                    match Album::from_row(&row) {
                        Ok(album) => albums.push(album),
                        Err(_) => break,
                    }
                }
                Ok(None) => break,
                // Query rejected outright vs. stream dying mid-iteration;
                // the handler answers with different bodies for the two.
                Err(err) if first => return Err(StoreError::Database(err)),
                Err(err) => return Err(StoreError::RowIteration(err)),
            }
        }

        Ok(albums)
    }

    /// Single-row lookup by primary key. Absence is reported as `None`,
    /// never as an error; empty ids are rejected by the HTTP layer before
    /// they reach the store.
    pub async fn get_by_id(&self, cx: &Context, id: &str) -> Result<Option<Album>> {
        let scope = start_span(&self.tracer, cx, "SELECT ALBUMS BY ID", SpanKind::Client);
        scope.span().set_attribute(KeyValue::new("db.system", "postgresql"));
        scope.span().set_attribute(KeyValue::new("db.statement", SELECT_ALBUM_BY_ID));

        let album = sqlx::query_as::<_, Album>(SELECT_ALBUM_BY_ID)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(album)
    }
}
