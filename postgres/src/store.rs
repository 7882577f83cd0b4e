//! `PostgreSQL` implementation of [`RecordStore`].
//!
//! One aggregate is one transaction: the root row goes in first, its children
//! after, and nothing is visible until the commit. The unique constraint on
//! `usage_records.record_identity` decides duplicate identities, so two
//! concurrent commits of the same identity resolve first-writer-wins without
//! an application-level lock.

use crate::SetupError;
use crate::config::PostgresConfig;
use chrono::{DateTime, Utc};
use gridacct_core::assembler::stamp;
use gridacct_core::model::{DEFAULT_METRIC, OrderedRate};
use gridacct_core::{
    Clock, DifferentiatedProperty, KeyInfo, KeyInfoOwner, NumericProperty, OtherProperty, OtherValue,
    ProcessId, PropertyKind, RecordStore, ResourceKind, ResourceType, StoreError, StoreResult,
    SystemClock, UsageRecord, UserIdentity,
};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::collections::HashMap;

const RECORD_COLUMNS: &str = r"
    id, record_identity, record_create_time, global_job_identity, local_job_identity,
    job_name, job_name_description, charge, charge_description, charge_unit, charge_formula,
    status, status_description, wall_duration, wall_duration_description,
    end_time, end_time_description, start_time, start_time_description,
    machine_name, machine_name_description, host, host_description, primary_host,
    submit_host, submit_host_description, queue, queue_description,
    project_name, project_name_description, created_at
";

/// `PostgreSQL`-backed usage record store.
///
/// # Example
///
/// ```no_run
/// use gridacct_postgres::{PostgresConfig, PostgresRecordStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = PostgresRecordStore::connect(&PostgresConfig::from_env()).await?;
/// store.migrate().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct PostgresRecordStore<C = SystemClock> {
    pool: PgPool,
    clock: C,
}

impl PostgresRecordStore<SystemClock> {
    /// Connect using `config`.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::Connect`] if the pool cannot be opened.
    pub async fn connect(config: &PostgresConfig) -> Result<Self, SetupError> {
        let pool = config.connect().await.map_err(SetupError::Connect)?;
        Ok(Self::from_pool(pool))
    }

    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            clock: SystemClock,
        }
    }
}

impl<C: Clock> PostgresRecordStore<C> {
    /// Stamp `created_at` with `clock` instead of the wall clock.
    #[must_use]
    pub fn with_clock<D: Clock>(self, clock: D) -> PostgresRecordStore<D> {
        PostgresRecordStore { pool: self.pool, clock }
    }

    /// Get a reference to the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run the embedded schema migrations.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::Migrate`] if a migration fails to apply.
    pub async fn migrate(&self) -> Result<(), SetupError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!("usage record migrations applied");
        Ok(())
    }

    async fn load_children(&self, id: i64, record: &mut UsageRecord) -> StoreResult<()> {
        record.process_ids = sqlx::query("SELECT value FROM process_ids WHERE usage_record_id = $1 ORDER BY id")
            .bind(id)
            .fetch_all(&self.pool)
            .await
            .map_err(database)?
            .iter()
            .map(|row| -> StoreResult<ProcessId> { Ok(ProcessId { value: get(row, "value")? }) })
            .collect::<StoreResult<_>>()?;

        let users = sqlx::query(
            r"
            SELECT id, local_user_identity, global_user_name
            FROM user_identities
            WHERE usage_record_id = $1
            ORDER BY id
            ",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(database)?;
        let user_ids: Vec<i64> = users.iter().map(|row| get(row, "id")).collect::<StoreResult<_>>()?;

        let mut keys = self.load_key_infos(id, &user_ids).await?;
        record.key_info = keys.remove(&(KeyInfoOwner::UsageRecord.as_str(), id));
        record.user_identities = users
            .iter()
            .zip(&user_ids)
            .map(|(row, user_id)| -> StoreResult<UserIdentity> {
                Ok(UserIdentity {
                    local_user_identity: get(row, "local_user_identity")?,
                    global_user_name: get(row, "global_user_name")?,
                    key_info: keys.remove(&(KeyInfoOwner::UserIdentity.as_str(), *user_id)),
                })
            })
            .collect::<StoreResult<_>>()?;

        record.differentiated_properties = sqlx::query(
            r"
            SELECT kind, value, description, metric, storage_unit, phase_unit, property_type,
                   consumption_rate, time_duration, time_instant, service_level
            FROM differentiated_properties
            WHERE usage_record_id = $1
            ORDER BY id
            ",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(database)?
        .iter()
        .map(property_from_row)
        .collect::<StoreResult<_>>()?;

        record.resource_types = sqlx::query(
            r"
            SELECT kind, string_value, float_value, description, units
            FROM resource_types
            WHERE usage_record_id = $1
            ORDER BY id
            ",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(database)?
        .iter()
        .map(resource_from_row)
        .collect::<StoreResult<_>>()?;

        Ok(())
    }

    /// Key infos of one record and its user identities, keyed by owner.
    async fn load_key_infos(
        &self,
        record_id: i64,
        user_ids: &[i64],
    ) -> StoreResult<HashMap<(&'static str, i64), KeyInfo>> {
        let rows = sqlx::query(
            r"
            SELECT signable_type, signable_id, issuer_serial, subject_name, ski, certificate
            FROM key_infos
            WHERE (signable_type = 'UsageRecord' AND signable_id = $1)
               OR (signable_type = 'UserIdentity' AND signable_id = ANY($2))
            ",
        )
        .bind(record_id)
        .bind(user_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(database)?;

        rows.iter()
            .map(|row| -> StoreResult<_> {
                let signable_type: String = get(row, "signable_type")?;
                let owner = KeyInfoOwner::parse(&signable_type)
                    .ok_or_else(|| StoreError::Database(format!("Invalid key info owner: {signable_type}")))?;
                let key = KeyInfo {
                    issuer_serial: get(row, "issuer_serial")?,
                    subject_name: get(row, "subject_name")?,
                    ski: get(row, "ski")?,
                    certificate: get(row, "certificate")?,
                };
                Ok(((owner.as_str(), get(row, "signable_id")?), key))
            })
            .collect()
    }
}

impl<C: Clock> RecordStore for PostgresRecordStore<C> {
    #[tracing::instrument(skip_all, fields(record_identity = %record.record_identity))]
    async fn insert(&self, record: UsageRecord) -> StoreResult<UsageRecord> {
        let record = stamp(record, &self.clock);
        let mut tx = self.pool.begin().await.map_err(database)?;

        let id = insert_root(&mut tx, &record).await?;
        if let Some(key) = &record.key_info {
            insert_key_info(&mut tx, KeyInfoOwner::UsageRecord, id, key).await?;
        }
        for process_id in &record.process_ids {
            sqlx::query("INSERT INTO process_ids (usage_record_id, value) VALUES ($1, $2)")
                .bind(id)
                .bind(process_id.value)
                .execute(&mut *tx)
                .await
                .map_err(database)?;
        }
        for user in &record.user_identities {
            insert_user_identity(&mut tx, id, user).await?;
        }
        for property in &record.differentiated_properties {
            insert_property(&mut tx, id, property).await?;
        }
        for resource in &record.resource_types {
            insert_resource(&mut tx, id, resource).await?;
        }

        tx.commit().await.map_err(database)?;

        tracing::debug!(id, children = record.child_count(), "usage record inserted");
        metrics::counter!("usage_record_store_inserted_total").increment(1);

        Ok(record)
    }

    async fn find(&self, record_identity: &str) -> StoreResult<Option<UsageRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM usage_records WHERE record_identity = $1"
        ))
        .bind(record_identity)
        .fetch_optional(&self.pool)
        .await
        .map_err(database)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let id: i64 = get(&row, "id")?;
        let mut record = record_from_row(&row)?;
        self.load_children(id, &mut record).await?;
        Ok(Some(record))
    }

    async fn count(&self) -> StoreResult<u64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM usage_records")
            .fetch_one(&self.pool)
            .await
            .map_err(database)?;
        Ok(u64::try_from(count).unwrap_or_default())
    }
}

#[allow(clippy::needless_pass_by_value)] // Used as a map_err adapter
fn database(error: sqlx::Error) -> StoreError {
    StoreError::Database(error.to_string())
}

fn get<'r, T>(row: &'r PgRow, column: &str) -> StoreResult<T>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(column).map_err(database)
}

async fn insert_root(tx: &mut Transaction<'_, Postgres>, record: &UsageRecord) -> StoreResult<i64> {
    let (id,): (i64,) = sqlx::query_as(
        r"
        INSERT INTO usage_records (
            record_identity, record_create_time, global_job_identity, local_job_identity,
            job_name, job_name_description, charge, charge_description, charge_unit, charge_formula,
            status, status_description, wall_duration, wall_duration_description,
            end_time, end_time_description, start_time, start_time_description,
            machine_name, machine_name_description, host, host_description, primary_host,
            submit_host, submit_host_description, queue, queue_description,
            project_name, project_name_description, created_at
        ) VALUES (
            $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
            $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28, $29,
            COALESCE($30, NOW())
        )
        RETURNING id
        ",
    )
    .bind(&record.record_identity)
    .bind(record.record_create_time)
    .bind(record.global_job_identity.as_deref())
    .bind(record.local_job_identity.as_deref())
    .bind(record.job_name.as_deref())
    .bind(record.job_name_description.as_deref())
    .bind(record.charge)
    .bind(record.charge_description.as_deref())
    .bind(record.charge_unit.as_deref())
    .bind(record.charge_formula.as_deref())
    .bind(&record.status)
    .bind(record.status_description.as_deref())
    .bind(record.wall_duration.as_deref())
    .bind(record.wall_duration_description.as_deref())
    .bind(record.end_time)
    .bind(record.end_time_description.as_deref())
    .bind(record.start_time)
    .bind(record.start_time_description.as_deref())
    .bind(record.machine_name.as_deref())
    .bind(record.machine_name_description.as_deref())
    .bind(record.host.as_deref())
    .bind(record.host_description.as_deref())
    .bind(record.primary_host)
    .bind(record.submit_host.as_deref())
    .bind(record.submit_host_description.as_deref())
    .bind(record.queue.as_deref())
    .bind(record.queue_description.as_deref())
    .bind(record.project_name.as_deref())
    .bind(record.project_name_description.as_deref())
    .bind(record.created_at)
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| root_error(e, &record.record_identity))?;
    Ok(id)
}

/// A unique violation on the root can only be the identity constraint.
fn root_error(error: sqlx::Error, record_identity: &str) -> StoreError {
    if let sqlx::Error::Database(db_err) = &error {
        if db_err.is_unique_violation() {
            return StoreError::DuplicateIdentity(record_identity.to_string());
        }
    }
    database(error)
}

async fn insert_key_info(
    tx: &mut Transaction<'_, Postgres>,
    owner: KeyInfoOwner,
    owner_id: i64,
    key: &KeyInfo,
) -> StoreResult<()> {
    sqlx::query(
        r"
        INSERT INTO key_infos (signable_type, signable_id, issuer_serial, subject_name, ski, certificate)
        VALUES ($1, $2, $3, $4, $5, $6)
        ",
    )
    .bind(owner.as_str())
    .bind(owner_id)
    .bind(key.issuer_serial.as_deref())
    .bind(key.subject_name.as_deref())
    .bind(key.ski.as_deref())
    .bind(key.certificate.as_deref())
    .execute(&mut **tx)
    .await
    .map_err(database)?;
    Ok(())
}

async fn insert_user_identity(
    tx: &mut Transaction<'_, Postgres>,
    record_id: i64,
    user: &UserIdentity,
) -> StoreResult<()> {
    let (id,): (i64,) = sqlx::query_as(
        r"
        INSERT INTO user_identities (usage_record_id, local_user_identity, global_user_name)
        VALUES ($1, $2, $3)
        RETURNING id
        ",
    )
    .bind(record_id)
    .bind(user.local_user_identity.as_deref())
    .bind(user.global_user_name.as_deref())
    .fetch_one(&mut **tx)
    .await
    .map_err(database)?;

    if let Some(key) = &user.key_info {
        insert_key_info(tx, KeyInfoOwner::UserIdentity, id, key).await?;
    }
    Ok(())
}

/// Column values of one `differentiated_properties` row.
#[derive(Default)]
struct PropertyColumns<'a> {
    value: Option<i64>,
    description: Option<&'a str>,
    metric: Option<&'a str>,
    storage_unit: Option<&'a str>,
    phase_unit: Option<&'a str>,
    property_type: Option<&'a str>,
    consumption_rate: Option<f64>,
    time_duration: Option<&'a str>,
    time_instant: Option<DateTime<Utc>>,
    service_level: Option<&'a str>,
}

impl<'a> From<&'a DifferentiatedProperty> for PropertyColumns<'a> {
    fn from(property: &'a DifferentiatedProperty) -> Self {
        if let Some(numeric) = property.as_numeric() {
            return Self {
                value: Some(numeric.value),
                description: numeric.description.as_deref(),
                metric: Some(&numeric.metric),
                storage_unit: numeric.storage_unit.as_deref(),
                phase_unit: numeric.phase_unit.as_deref(),
                property_type: numeric.property_type.as_deref(),
                consumption_rate: numeric.consumption_rate.map(|rate| rate.0),
                ..Self::default()
            };
        }
        let Some(other) = property.as_other() else {
            return Self::default();
        };
        let mut columns = Self {
            description: other.description.as_deref(),
            property_type: Some(&other.property_type),
            ..Self::default()
        };
        match &other.value {
            OtherValue::Duration(duration) => columns.time_duration = Some(duration),
            OtherValue::Instant(instant) => columns.time_instant = Some(*instant),
            OtherValue::Level(level) => columns.service_level = Some(level),
        }
        columns
    }
}

async fn insert_property(
    tx: &mut Transaction<'_, Postgres>,
    record_id: i64,
    property: &DifferentiatedProperty,
) -> StoreResult<()> {
    let columns = PropertyColumns::from(property);
    sqlx::query(
        r"
        INSERT INTO differentiated_properties (
            usage_record_id, kind, value, description, metric, storage_unit, phase_unit,
            property_type, consumption_rate, time_duration, time_instant, service_level
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        ",
    )
    .bind(record_id)
    .bind(property.kind().tag())
    .bind(columns.value)
    .bind(columns.description)
    .bind(columns.metric)
    .bind(columns.storage_unit)
    .bind(columns.phase_unit)
    .bind(columns.property_type)
    .bind(columns.consumption_rate)
    .bind(columns.time_duration)
    .bind(columns.time_instant)
    .bind(columns.service_level)
    .execute(&mut **tx)
    .await
    .map_err(database)?;
    Ok(())
}

async fn insert_resource(
    tx: &mut Transaction<'_, Postgres>,
    record_id: i64,
    resource: &ResourceType,
) -> StoreResult<()> {
    let (string_value, float_value, description, units) = match resource {
        ResourceType::Text { value, description } => (Some(value.as_str()), None, description, &None),
        ResourceType::Consumable {
            value,
            description,
            units,
        } => (None, Some(*value), description, units),
    };
    sqlx::query(
        r"
        INSERT INTO resource_types (usage_record_id, kind, string_value, float_value, description, units)
        VALUES ($1, $2, $3, $4, $5, $6)
        ",
    )
    .bind(record_id)
    .bind(resource.kind().tag())
    .bind(string_value)
    .bind(float_value)
    .bind(description.as_deref())
    .bind(units.as_deref())
    .execute(&mut **tx)
    .await
    .map_err(database)?;
    Ok(())
}

fn record_from_row(row: &PgRow) -> StoreResult<UsageRecord> {
    Ok(UsageRecord {
        record_identity: get(row, "record_identity")?,
        record_create_time: get(row, "record_create_time")?,
        global_job_identity: get(row, "global_job_identity")?,
        local_job_identity: get(row, "local_job_identity")?,
        job_name: get(row, "job_name")?,
        job_name_description: get(row, "job_name_description")?,
        charge: get(row, "charge")?,
        charge_description: get(row, "charge_description")?,
        charge_unit: get(row, "charge_unit")?,
        charge_formula: get(row, "charge_formula")?,
        status: get(row, "status")?,
        status_description: get(row, "status_description")?,
        wall_duration: get(row, "wall_duration")?,
        wall_duration_description: get(row, "wall_duration_description")?,
        end_time: get(row, "end_time")?,
        end_time_description: get(row, "end_time_description")?,
        start_time: get(row, "start_time")?,
        start_time_description: get(row, "start_time_description")?,
        machine_name: get(row, "machine_name")?,
        machine_name_description: get(row, "machine_name_description")?,
        host: get(row, "host")?,
        host_description: get(row, "host_description")?,
        primary_host: get(row, "primary_host")?,
        submit_host: get(row, "submit_host")?,
        submit_host_description: get(row, "submit_host_description")?,
        queue: get(row, "queue")?,
        queue_description: get(row, "queue_description")?,
        project_name: get(row, "project_name")?,
        project_name_description: get(row, "project_name_description")?,
        created_at: Some(get(row, "created_at")?),
        ..UsageRecord::default()
    })
}

fn property_from_row(row: &PgRow) -> StoreResult<DifferentiatedProperty> {
    let tag: String = get(row, "kind")?;
    let kind = PropertyKind::from_tag(&tag)
        .ok_or_else(|| StoreError::Database(format!("Invalid property kind: {tag}")))?;
    let description: Option<String> = get(row, "description")?;

    let property = if kind.is_numeric() {
        let value: Option<i64> = get(row, "value")?;
        let metric: Option<String> = get(row, "metric")?;
        let rate: Option<f64> = get(row, "consumption_rate")?;
        DifferentiatedProperty::from_numeric(
            kind,
            NumericProperty {
                value: value.unwrap_or_default(),
                description,
                metric: metric.unwrap_or_else(|| DEFAULT_METRIC.to_string()),
                storage_unit: get(row, "storage_unit")?,
                phase_unit: get(row, "phase_unit")?,
                property_type: get(row, "property_type")?,
                consumption_rate: rate.map(OrderedRate),
            },
        )
    } else {
        let value = match kind {
            PropertyKind::TimeInstant => {
                let instant: Option<DateTime<Utc>> = get(row, "time_instant")?;
                OtherValue::Instant(
                    instant.ok_or_else(|| StoreError::Database("Time instant without a value".to_string()))?,
                )
            }
            PropertyKind::ServiceLevel => {
                OtherValue::Level(get::<Option<String>>(row, "service_level")?.unwrap_or_default())
            }
            _ => OtherValue::Duration(get::<Option<String>>(row, "time_duration")?.unwrap_or_default()),
        };
        let property_type: Option<String> = get(row, "property_type")?;
        DifferentiatedProperty::from_other(
            kind,
            OtherProperty {
                property_type: property_type.unwrap_or_default(),
                description,
                value,
            },
        )
    };
    property.ok_or_else(|| StoreError::Database(format!("Invalid property kind: {tag}")))
}

fn resource_from_row(row: &PgRow) -> StoreResult<ResourceType> {
    let tag: String = get(row, "kind")?;
    let description = get(row, "description")?;
    match ResourceKind::from_tag(&tag) {
        Some(ResourceKind::Text) => Ok(ResourceType::Text {
            value: get::<Option<String>>(row, "string_value")?.unwrap_or_default(),
            description,
        }),
        Some(ResourceKind::Consumable) => Ok(ResourceType::Consumable {
            value: get::<Option<f64>>(row, "float_value")?.unwrap_or_default(),
            description,
            units: get(row, "units")?,
        }),
        None => Err(StoreError::Database(format!("Invalid resource kind: {tag}"))),
    }
}
