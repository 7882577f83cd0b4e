//! The usage record aggregate and its children.
//!
//! A [`UsageRecord`] owns every child outright; there are no back-references.
//! Ownership of a [`KeyInfo`] is structural (it sits either on the record or
//! on a [`UserIdentity`]), and [`KeyInfoOwner`] names the two places for
//! stores that flatten the tree into rows.
//!
//! Child constructors here take raw drafts and apply every field-level
//! invariant. The assembler composes them.

use crate::draft::{KeyDraft, PropertyDraft, UserDraft};
use crate::error::Violation;
use crate::values;
use crate::vocabulary::{PropertyField, PropertyKind, ResourceKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default `metric` of numeric differentiated properties.
pub const DEFAULT_METRIC: &str = "total";

/// One accounting entry for a completed job.
///
/// Immutable once committed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct UsageRecord {
    pub record_identity: String,
    pub record_create_time: Option<DateTime<Utc>>,
    pub global_job_identity: Option<String>,
    pub local_job_identity: Option<String>,
    pub job_name: Option<String>,
    pub job_name_description: Option<String>,
    pub charge: Option<f64>,
    pub charge_description: Option<String>,
    pub charge_unit: Option<String>,
    pub charge_formula: Option<String>,
    pub status: String,
    pub status_description: Option<String>,
    pub wall_duration: Option<String>,
    pub wall_duration_description: Option<String>,
    pub end_time: Option<DateTime<Utc>>,
    pub end_time_description: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub start_time_description: Option<String>,
    pub machine_name: Option<String>,
    pub machine_name_description: Option<String>,
    pub host: Option<String>,
    pub host_description: Option<String>,
    pub primary_host: Option<bool>,
    pub submit_host: Option<String>,
    pub submit_host_description: Option<String>,
    pub queue: Option<String>,
    pub queue_description: Option<String>,
    pub project_name: Option<String>,
    pub project_name_description: Option<String>,
    /// Stamped by the store at commit.
    pub created_at: Option<DateTime<Utc>>,
    /// Key info from the record-identity section.
    pub key_info: Option<KeyInfo>,
    pub process_ids: Vec<ProcessId>,
    pub user_identities: Vec<UserIdentity>,
    pub differentiated_properties: Vec<DifferentiatedProperty>,
    pub resource_types: Vec<ResourceType>,
}

impl UsageRecord {
    /// Number of child rows the aggregate commits alongside the root.
    #[must_use]
    pub fn child_count(&self) -> usize {
        usize::from(self.key_info.is_some())
            + self.process_ids.len()
            + self
                .user_identities
                .iter()
                .map(|user| 1 + usize::from(user.key_info.is_some()))
                .sum::<usize>()
            + self.differentiated_properties.len()
            + self.resource_types.len()
    }
}

/// An operating-system process id of the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessId {
    /// Always `>= 0`.
    pub value: i64,
}

impl ProcessId {
    /// Parse process-id text.
    ///
    /// # Errors
    ///
    /// `"Process id ..."` when the text is not a non-negative integer.
    pub fn parse(text: &str) -> Result<Self, Violation> {
        values::non_negative_integer(text, "Process id").map(|value| Self { value })
    }
}

/// Which entity a [`KeyInfo`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyInfoOwner {
    /// Found in the record-identity section.
    UsageRecord,
    /// Found inside a user-identity entry.
    UserIdentity,
}

impl KeyInfoOwner {
    /// Persisted discriminant.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UsageRecord => "UsageRecord",
            Self::UserIdentity => "UserIdentity",
        }
    }

    /// Parse a persisted discriminant.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "UsageRecord" => Some(Self::UsageRecord),
            "UserIdentity" => Some(Self::UserIdentity),
            _ => None,
        }
    }
}

/// X.509 key details.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct KeyInfo {
    pub issuer_serial: Option<String>,
    pub subject_name: Option<String>,
    pub ski: Option<String>,
    pub certificate: Option<String>,
}

impl KeyInfo {
    /// Typed key info, or `None` when no field carried text.
    #[must_use]
    pub fn from_draft(draft: KeyDraft) -> Option<Self> {
        let key_info = Self {
            issuer_serial: values::non_empty(draft.issuer_serial),
            subject_name: values::non_empty(draft.subject_name),
            ski: values::non_empty(draft.ski),
            certificate: values::non_empty(draft.certificate),
        };
        (key_info != Self::default()).then_some(key_info)
    }
}

/// The user a job ran as.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct UserIdentity {
    pub local_user_identity: Option<String>,
    pub global_user_name: Option<String>,
    pub key_info: Option<KeyInfo>,
}

impl UserIdentity {
    /// Typed entry, or `None` unless a local identity, a global name or a key
    /// info is present.
    #[must_use]
    pub fn from_draft(draft: UserDraft) -> Option<Self> {
        let identity = Self {
            local_user_identity: values::non_empty(draft.local_user_identity),
            global_user_name: values::non_empty(draft.global_user_name),
            key_info: draft.key_info.and_then(KeyInfo::from_draft),
        };
        (identity != Self::default()).then_some(identity)
    }
}

/// Fields shared by the six integer-valued, metered kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumericProperty {
    /// Measured amount, `>= 0`.
    pub value: i64,
    /// Free text.
    pub description: Option<String>,
    /// `total` unless the document says otherwise.
    pub metric: String,
    /// e.g. `MB`. Required for memory.
    pub storage_unit: Option<String>,
    /// Duration the value was measured over.
    pub phase_unit: Option<String>,
    /// Disk, memory and swap type.
    pub property_type: Option<String>,
    /// Processors only.
    pub consumption_rate: Option<OrderedRate>,
}

/// A consumption rate. Wraps `f64` so [`NumericProperty`] stays `Eq`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderedRate(pub f64);

impl Eq for OrderedRate {}

/// Value of the four non-numeric kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtherValue {
    /// Cpu and time durations, kept as written (e.g. `PT1H`).
    Duration(String),
    /// A point in time.
    Instant(DateTime<Utc>),
    /// Service level text.
    Level(String),
}

/// Fields shared by the four non-numeric kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtherProperty {
    /// Non-blank. For cpu durations this is the usage type.
    pub property_type: String,
    /// Cpu durations only.
    pub description: Option<String>,
    /// The element text.
    pub value: OtherValue,
}

/// A typed sub-measurement of a record. One variant per kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "property")]
#[allow(missing_docs)]
pub enum DifferentiatedProperty {
    Network(NumericProperty),
    Disk(NumericProperty),
    Memory(NumericProperty),
    Swap(NumericProperty),
    NodeCount(NumericProperty),
    Processors(NumericProperty),
    CpuDuration(OtherProperty),
    TimeDuration(OtherProperty),
    TimeInstant(OtherProperty),
    ServiceLevel(OtherProperty),
}

type Wrap<T> = fn(T) -> DifferentiatedProperty;

/// Variant constructor for numeric kinds.
const fn numeric_variant(kind: PropertyKind) -> Option<Wrap<NumericProperty>> {
    match kind {
        PropertyKind::Network => Some(DifferentiatedProperty::Network),
        PropertyKind::Disk => Some(DifferentiatedProperty::Disk),
        PropertyKind::Memory => Some(DifferentiatedProperty::Memory),
        PropertyKind::Swap => Some(DifferentiatedProperty::Swap),
        PropertyKind::NodeCount => Some(DifferentiatedProperty::NodeCount),
        PropertyKind::Processors => Some(DifferentiatedProperty::Processors),
        _ => None,
    }
}

/// Variant constructor for the other kinds.
const fn other_variant(kind: PropertyKind) -> Option<Wrap<OtherProperty>> {
    match kind {
        PropertyKind::CpuDuration => Some(DifferentiatedProperty::CpuDuration),
        PropertyKind::TimeDuration => Some(DifferentiatedProperty::TimeDuration),
        PropertyKind::TimeInstant => Some(DifferentiatedProperty::TimeInstant),
        PropertyKind::ServiceLevel => Some(DifferentiatedProperty::ServiceLevel),
        _ => None,
    }
}

fn field(draft: &PropertyDraft, field: PropertyField) -> Option<String> {
    values::present(draft.field(field).map(str::to_string))
}

impl DifferentiatedProperty {
    /// Build and validate the variant for `kind` from a draft.
    ///
    /// # Errors
    ///
    /// The first broken invariant of the kind: a negative or non-integer
    /// numeric value, a memory without storage unit, a negative processors
    /// consumption rate, a blank property type on the other kinds, or a time
    /// instant that is not a timestamp.
    pub fn build(kind: PropertyKind, draft: &PropertyDraft) -> Result<Self, Violation> {
        if let Some(wrap) = numeric_variant(kind) {
            return NumericProperty::build(kind, draft).map(wrap);
        }
        if let Some(wrap) = other_variant(kind) {
            return OtherProperty::build(kind, draft).map(wrap);
        }
        Err(Violation::blank(kind.label()))
    }

    /// The variant's kind.
    #[must_use]
    pub const fn kind(&self) -> PropertyKind {
        match self {
            Self::Network(_) => PropertyKind::Network,
            Self::Disk(_) => PropertyKind::Disk,
            Self::Memory(_) => PropertyKind::Memory,
            Self::Swap(_) => PropertyKind::Swap,
            Self::NodeCount(_) => PropertyKind::NodeCount,
            Self::Processors(_) => PropertyKind::Processors,
            Self::CpuDuration(_) => PropertyKind::CpuDuration,
            Self::TimeDuration(_) => PropertyKind::TimeDuration,
            Self::TimeInstant(_) => PropertyKind::TimeInstant,
            Self::ServiceLevel(_) => PropertyKind::ServiceLevel,
        }
    }

    /// Rebuild a variant from already validated parts.
    #[must_use]
    pub fn from_numeric(kind: PropertyKind, property: NumericProperty) -> Option<Self> {
        numeric_variant(kind).map(|wrap| wrap(property))
    }

    /// Rebuild a variant from already validated parts.
    #[must_use]
    pub fn from_other(kind: PropertyKind, property: OtherProperty) -> Option<Self> {
        other_variant(kind).map(|wrap| wrap(property))
    }

    /// Shared numeric fields, for the six numeric kinds.
    #[must_use]
    pub const fn as_numeric(&self) -> Option<&NumericProperty> {
        match self {
            Self::Network(p)
            | Self::Disk(p)
            | Self::Memory(p)
            | Self::Swap(p)
            | Self::NodeCount(p)
            | Self::Processors(p) => Some(p),
            _ => None,
        }
    }

    /// Shared fields of the other four kinds.
    #[must_use]
    pub const fn as_other(&self) -> Option<&OtherProperty> {
        match self {
            Self::CpuDuration(p) | Self::TimeDuration(p) | Self::TimeInstant(p) | Self::ServiceLevel(p) => Some(p),
            _ => None,
        }
    }
}

impl NumericProperty {
    fn build(kind: PropertyKind, draft: &PropertyDraft) -> Result<Self, Violation> {
        let label = kind.label();
        let value = values::non_negative_integer(&draft.value, &format!("{label} value"))?;
        let storage_unit = field(draft, PropertyField::StorageUnit);
        if kind == PropertyKind::Memory && storage_unit.is_none() {
            return Err(Violation::blank(format!("{label} storage unit")));
        }
        let consumption_rate = match field(draft, PropertyField::ConsumptionRate) {
            Some(rate) if kind == PropertyKind::Processors => Some(OrderedRate(
                values::non_negative_float(&rate, &format!("{label} consumption rate"))?,
            )),
            _ => None,
        };
        Ok(Self {
            value,
            description: field(draft, PropertyField::Description),
            metric: field(draft, PropertyField::Metric).unwrap_or_else(|| DEFAULT_METRIC.to_string()),
            storage_unit,
            phase_unit: field(draft, PropertyField::PhaseUnit),
            property_type: field(draft, PropertyField::PropertyType),
            consumption_rate,
        })
    }
}

impl OtherProperty {
    fn build(kind: PropertyKind, draft: &PropertyDraft) -> Result<Self, Violation> {
        let label = kind.label();
        let property_type = values::required(
            draft.field(PropertyField::PropertyType).map(str::to_string),
            &format!("{label} property type"),
        )?;
        let text = draft.value.trim().to_string();
        let value = match kind {
            PropertyKind::TimeInstant => OtherValue::Instant(values::timestamp(&text, &format!("{label} value"))?),
            PropertyKind::ServiceLevel => OtherValue::Level(text),
            _ => OtherValue::Duration(text),
        };
        Ok(Self {
            property_type,
            description: field(draft, PropertyField::Description),
            value,
        })
    }
}

/// A generic resource entry outside the fixed property kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceType {
    /// `ResourceType`, `Resource`, `Resources`
    Text {
        /// Element text.
        value: String,
        /// Free text.
        description: Option<String>,
    },
    /// `ConsumableResourceType`, `ConsumableResource`, `ConsumableResources`
    Consumable {
        /// Amount consumed.
        value: f64,
        /// Free text.
        description: Option<String>,
        /// Unit of `value`.
        units: Option<String>,
    },
}

impl ResourceType {
    /// Build and validate the variant for `kind` from a draft.
    ///
    /// # Errors
    ///
    /// `"Consumable resource type float value is not a number"` when a
    /// consumable value does not parse.
    pub fn build(kind: ResourceKind, draft: &PropertyDraft) -> Result<Self, Violation> {
        let description = field(draft, PropertyField::Description);
        match kind {
            ResourceKind::Text => Ok(Self::Text {
                value: draft.value.clone(),
                description,
            }),
            ResourceKind::Consumable => Ok(Self::Consumable {
                value: values::float(&draft.value, &format!("{} float value", kind.label()))?,
                description,
                units: field(draft, PropertyField::Units),
            }),
        }
    }

    /// The variant's kind.
    #[must_use]
    pub const fn kind(&self) -> ResourceKind {
        match self {
            Self::Text { .. } => ResourceKind::Text,
            Self::Consumable { .. } => ResourceKind::Consumable,
        }
    }
}
