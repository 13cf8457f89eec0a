use super::*;
use anyhow::Context;
use ::postgres::{Config, NoTls};
use tracing::info;

type PostgresPool = r2d2::Pool<r2d2_postgres::PostgresConnectionManager<NoTls>>;

const SCHEMA_SQL: &str = "CREATE TABLE IF NOT EXISTS ads (id TEXT PRIMARY KEY, ad TEXT NOT NULL)";
const GET_AD_SQL: &str = "SELECT ad FROM ads WHERE id = $1";
const UPSERT_AD_SQL: &str =
    "INSERT INTO ads (id, ad) VALUES ($1, $2) ON CONFLICT (id) DO UPDATE SET ad = EXCLUDED.ad";
const DELETE_AD_SQL: &str = "DELETE FROM ads WHERE id = $1 RETURNING ad";
const ALL_ADS_SQL: &str = "SELECT ad FROM ads ORDER BY id";

/// Ads kept in a single `ads` table, one serialized record per row
///
/// Every statement runs in its own implicit transaction, so a write is
/// committed by the time the call returns.
#[derive(Debug, Clone)]
pub struct PostgresAdStore {
    pool: PostgresPool,
}

impl PostgresAdStore {
    pub fn connect(database_url: &str) -> Result<Self> {
        let config: Config = database_url
            .parse()
            .context("invalid postgres connection string")?;
        let pool = r2d2::Pool::new(r2d2_postgres::PostgresConnectionManager::new(
            config, NoTls,
        ))
        .context("failed to connect to postgres")?;

        let store = Self { pool };
        store.ensure_schema()?;
        info!("postgres ad store ready");
        Ok(store)
    }

    pub fn connect_shared(database_url: &str) -> Result<SharedAdStore> {
        Ok(Arc::new(Self::connect(database_url)?))
    }

    fn ensure_schema(&self) -> Result<()> {
        self.pool
            .get()?
            .batch_execute(SCHEMA_SQL)
            .context("failed to create ads table")
    }

    fn decode(raw: &str) -> Result<Ad> {
        serde_json::from_str(raw).context("malformed ad record in postgres")
    }
}

impl AdStore for PostgresAdStore {
    fn get(&self, id: AdIdRef) -> Result<Option<Ad>> {
        self.pool
            .get()?
            .query_opt(GET_AD_SQL, &[&id])?
            .map(|row| Self::decode(&row.get::<_, String>(0)))
            .transpose()
    }

    fn insert(&self, id: AdIdRef, ad: Ad) -> Result<()> {
        let raw = serde_json::to_string(&ad)?;
        self.pool.get()?.execute(UPSERT_AD_SQL, &[&id, &raw])?;
        Ok(())
    }

    fn remove(&self, id: AdIdRef) -> Result<Option<Ad>> {
        self.pool
            .get()?
            .query_opt(DELETE_AD_SQL, &[&id])?
            .map(|row| Self::decode(&row.get::<_, String>(0)))
            .transpose()
    }

    fn values(&self) -> Result<Vec<Ad>> {
        self.pool
            .get()?
            .query(ALL_ADS_SQL, &[])?
            .iter()
            .map(|row| Self::decode(&row.get::<_, String>(0)))
            .collect()
    }
}
