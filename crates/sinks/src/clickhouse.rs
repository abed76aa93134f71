//! ClickHouseSink - bulk INSERT into the analytics table

use clickhouse::{insert::Insert, Client, Row};
use contracts::{ClickHouseSinkConfig, ContractError, EventRecord, RecordSink};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::error::SinkError;

/// Row layout of the analytics table
///
/// ```sql
/// CREATE TABLE analytics (
///     client_time DateTime,
///     device_id String,
///     device_os String,
///     session String,
///     sequence Int64,
///     event String,
///     param_int Int64,
///     param_str String,
///     ip String,
///     server_time DateTime
/// ) ENGINE = MergeTree() ORDER BY server_time;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Row, Serialize)]
pub struct AnalyticsRow {
    /// Client time, seconds since epoch
    pub client_time: u32,
    pub device_id: String,
    pub device_os: String,
    pub session: String,
    pub sequence: i64,
    pub event: String,
    pub param_int: i64,
    pub param_str: String,
    pub ip: String,
    /// Server receipt time, seconds since epoch
    pub server_time: u32,
}

impl From<&EventRecord> for AnalyticsRow {
    fn from(record: &EventRecord) -> Self {
        Self {
            client_time: datetime_secs(record.client_time.and_utc().timestamp()),
            device_id: record.device_id.clone(),
            device_os: record.device_os.clone(),
            session: record.session.clone(),
            sequence: record.sequence,
            event: record.event.clone(),
            param_int: record.param_int,
            param_str: record.param_str.clone(),
            ip: record.ip.clone(),
            server_time: datetime_secs(record.server_time.timestamp()),
        }
    }
}

/// Clamp a unix timestamp into the `DateTime` column range
fn datetime_secs(ts: i64) -> u32 {
    u32::try_from(ts.max(0)).unwrap_or(u32::MAX)
}

/// Sink writing batches to ClickHouse over HTTP
pub struct ClickHouseSink {
    name: String,
    config: ClickHouseSinkConfig,
    client: Client,
}

impl ClickHouseSink {
    /// Create a new ClickHouseSink
    pub fn new(name: impl Into<String>, config: ClickHouseSinkConfig) -> Self {
        let client = build_client(&config);
        Self {
            name: name.into(),
            config,
            client,
        }
    }

    /// Get configuration
    pub fn config(&self) -> &ClickHouseSinkConfig {
        &self.config
    }

    /// Create the target table if it does not exist
    ///
    /// Must run once before the first `save`.
    #[instrument(name = "clickhouse_sink_initialize", skip(self), fields(table = %self.config.table))]
    pub async fn initialize(&self) -> Result<(), SinkError> {
        self.ping()
            .await
            .map_err(|e| SinkError::sink_creation(&self.name, e.to_string()))?;
        self.client.query(&create_table_sql(&self.config.table)).execute().await?;
        info!(
            sink = %self.name,
            database = %self.config.database,
            table = %self.config.table,
            "ClickHouse table ready"
        );
        Ok(())
    }

    /// Check connectivity
    pub async fn ping(&self) -> Result<(), ContractError> {
        self.client
            .query("SELECT 1")
            .execute()
            .await
            .map_err(|e| ContractError::sink_connection(&self.name, e.to_string()))
    }

    async fn insert_batch(&self, records: &[EventRecord]) -> Result<(), clickhouse::error::Error> {
        let mut insert: Insert<AnalyticsRow> = self.client.insert(&self.config.table).await?;
        for record in records {
            insert.write(&AnalyticsRow::from(record)).await?;
        }
        insert.end().await
    }
}

impl RecordSink for ClickHouseSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "clickhouse_sink_save",
        skip(self, records),
        fields(sink = %self.name, batch_len = records.len())
    )]
    async fn save(&self, records: &[EventRecord]) -> Result<(), ContractError> {
        if records.is_empty() {
            return Ok(());
        }

        debug!(batch_len = records.len(), "Attempt to save batch");

        self.insert_batch(records)
            .await
            .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))
    }
}

fn build_client(config: &ClickHouseSinkConfig) -> Client {
    let mut client = Client::default()
        .with_url(&config.url)
        .with_database(&config.database);

    if let Some(ref user) = config.user {
        client = client.with_user(user);
    }

    if let Some(ref password) = config.password {
        client = client.with_password(password);
    }

    client
}

fn create_table_sql(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            client_time DateTime,
            device_id String,
            device_os String,
            session String,
            sequence Int64,
            event String,
            param_int Int64,
            param_str String,
            ip String,
            server_time DateTime
        ) ENGINE = MergeTree() ORDER BY server_time"
    )
}
