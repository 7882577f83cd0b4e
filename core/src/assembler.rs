//! Record assembly and persistence.
//!
//! [`RecordAssembler`] turns one [`RecordDraft`] into a validated
//! [`UsageRecord`] and commits it through a [`RecordStore`]. Validation stops
//! at the first broken invariant; nothing reaches the store unless the whole
//! aggregate is valid.

use crate::draft::RecordDraft;
use crate::environment::Clock;
use crate::error::{RecordError, Violation};
use crate::identity::IdentityAllocator;
use crate::model::{DifferentiatedProperty, KeyInfo, ProcessId, ResourceType, UsageRecord, UserIdentity};
use crate::store::RecordStore;
use crate::values;
use crate::vocabulary::CommonField;
use chrono::{DateTime, Utc};

/// A validated aggregate ready to commit.
#[derive(Debug, Clone, PartialEq)]
pub struct Assembled {
    /// The aggregate.
    pub record: UsageRecord,
    /// `true` when the identity came from the allocator.
    pub freshly_allocated: bool,
}

/// Outcome of a successful commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persisted {
    /// Identity the record was committed under.
    pub record_identity: String,
    /// `true` when the identity came from the allocator.
    pub freshly_allocated: bool,
}

/// Builds aggregates from drafts and commits them.
#[derive(Debug, Clone)]
pub struct RecordAssembler<S, A> {
    store: S,
    allocator: A,
}

impl<S, A> RecordAssembler<S, A>
where
    S: RecordStore,
    A: IdentityAllocator,
{
    /// Assembler committing to `store` and allocating through `allocator`.
    #[must_use]
    pub const fn new(store: S, allocator: A) -> Self {
        Self { store, allocator }
    }

    /// The backing store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Build and validate the aggregate for one record.
    ///
    /// The root is validated before any child. A blank identity is replaced
    /// by an allocated one.
    ///
    /// Create, start and end times and the primary-host flag are typed here.
    /// Text that [`values::timestamp`] or [`values::boolean`] does not accept
    /// fails the whole record instead of being stored as absent.
    ///
    /// # Errors
    ///
    /// The first [`Violation`] found.
    pub fn assemble(&self, mut draft: RecordDraft) -> Result<Assembled, Violation> {
        let mut record = root(&mut draft)?;
        let freshly_allocated = record.record_identity.is_empty();
        if freshly_allocated {
            record.record_identity = self.allocator.allocate();
        }

        record.key_info = draft.key_info.and_then(KeyInfo::from_draft);
        record.process_ids = draft
            .process_ids
            .iter()
            .map(|text| ProcessId::parse(text))
            .collect::<Result<_, _>>()?;
        record.user_identities = draft
            .user_identities
            .into_iter()
            .filter_map(UserIdentity::from_draft)
            .collect();
        for (kind, bucket) in &draft.properties {
            for property in bucket {
                record
                    .differentiated_properties
                    .push(DifferentiatedProperty::build(*kind, property)?);
            }
        }
        for (kind, bucket) in &draft.resources {
            for resource in bucket {
                record.resource_types.push(ResourceType::build(*kind, resource)?);
            }
        }

        Ok(Assembled {
            record,
            freshly_allocated,
        })
    }

    /// Assemble one record and commit it atomically.
    ///
    /// # Errors
    ///
    /// - [`RecordError::Invalid`] for a broken invariant, including an
    ///   identity that is already taken
    /// - [`RecordError::Store`] when the backend fails
    pub async fn persist(&self, draft: RecordDraft) -> Result<Persisted, RecordError> {
        let Assembled {
            record,
            freshly_allocated,
        } = self.assemble(draft)?;
        let stored = self.store.insert(record).await?;
        Ok(Persisted {
            record_identity: stored.record_identity,
            freshly_allocated,
        })
    }
}

fn text(draft: &mut RecordDraft, field: CommonField) -> Option<String> {
    values::present(draft.take_common(field))
}

fn time(draft: &mut RecordDraft, field: CommonField) -> Result<Option<DateTime<Utc>>, Violation> {
    text(draft, field)
        .map(|value| values::timestamp(&value, field.label()))
        .transpose()
}

/// Common fields of the record itself. Status first.
fn root(draft: &mut RecordDraft) -> Result<UsageRecord, Violation> {
    let status = values::required(draft.take_common(CommonField::Status), CommonField::Status.label())?;
    Ok(UsageRecord {
        record_identity: text(draft, CommonField::RecordIdentity).unwrap_or_default(),
        status: values::capitalize(&status),
        record_create_time: time(draft, CommonField::RecordCreateTime)?,
        charge: text(draft, CommonField::Charge)
            .map(|value| values::float(&value, CommonField::Charge.label()))
            .transpose()?,
        start_time: time(draft, CommonField::StartTime)?,
        end_time: time(draft, CommonField::EndTime)?,
        primary_host: text(draft, CommonField::PrimaryHost)
            .map(|value| values::boolean(&value, CommonField::PrimaryHost.label()))
            .transpose()?,
        global_job_identity: text(draft, CommonField::GlobalJobIdentity),
        local_job_identity: text(draft, CommonField::LocalJobIdentity),
        job_name: text(draft, CommonField::JobName),
        job_name_description: text(draft, CommonField::JobNameDescription),
        charge_description: text(draft, CommonField::ChargeDescription),
        charge_unit: text(draft, CommonField::ChargeUnit),
        charge_formula: text(draft, CommonField::ChargeFormula),
        status_description: text(draft, CommonField::StatusDescription),
        wall_duration: text(draft, CommonField::WallDuration),
        wall_duration_description: text(draft, CommonField::WallDurationDescription),
        end_time_description: text(draft, CommonField::EndTimeDescription),
        start_time_description: text(draft, CommonField::StartTimeDescription),
        machine_name: text(draft, CommonField::MachineName),
        machine_name_description: text(draft, CommonField::MachineNameDescription),
        host: text(draft, CommonField::Host),
        host_description: text(draft, CommonField::HostDescription),
        submit_host: text(draft, CommonField::SubmitHost),
        submit_host_description: text(draft, CommonField::SubmitHostDescription),
        queue: text(draft, CommonField::Queue),
        queue_description: text(draft, CommonField::QueueDescription),
        project_name: text(draft, CommonField::ProjectName),
        project_name_description: text(draft, CommonField::ProjectNameDescription),
        ..UsageRecord::default()
    })
}

/// Stamp `created_at` on a record about to be committed.
///
/// Shared by store implementations.
#[must_use]
pub fn stamp(mut record: UsageRecord, clock: &impl Clock) -> UsageRecord {
    record.created_at = Some(clock.now());
    record
}
