//! The fixed tag vocabulary of a usage record document.
//!
//! Every tag the accumulator reacts to is listed here once, in a static
//! table, together with the attributes it contributes. Dispatch elsewhere
//! goes through [`Element::classify`] rather than comparing tag strings.

use serde::{Deserialize, Serialize};

/// A scalar slot of the record's common-properties map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[allow(missing_docs)]
pub enum CommonField {
    RecordIdentity,
    RecordCreateTime,
    GlobalJobIdentity,
    LocalJobIdentity,
    JobName,
    JobNameDescription,
    Charge,
    ChargeDescription,
    ChargeUnit,
    ChargeFormula,
    Status,
    StatusDescription,
    WallDuration,
    WallDurationDescription,
    EndTime,
    EndTimeDescription,
    StartTime,
    StartTimeDescription,
    MachineName,
    MachineNameDescription,
    Host,
    HostDescription,
    PrimaryHost,
    SubmitHost,
    SubmitHostDescription,
    Queue,
    QueueDescription,
    ProjectName,
    ProjectNameDescription,
}

impl CommonField {
    /// Field name as used in validation messages.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::RecordIdentity => "Record identity",
            Self::RecordCreateTime => "Record create time",
            Self::GlobalJobIdentity => "Global job identity",
            Self::LocalJobIdentity => "Local job identity",
            Self::JobName => "Job name",
            Self::JobNameDescription => "Job name description",
            Self::Charge => "Charge",
            Self::ChargeDescription => "Charge description",
            Self::ChargeUnit => "Charge unit",
            Self::ChargeFormula => "Charge formula",
            Self::Status => "Status",
            Self::StatusDescription => "Status description",
            Self::WallDuration => "Wall duration",
            Self::WallDurationDescription => "Wall duration description",
            Self::EndTime => "End time",
            Self::EndTimeDescription => "End time description",
            Self::StartTime => "Start time",
            Self::StartTimeDescription => "Start time description",
            Self::MachineName => "Machine name",
            Self::MachineNameDescription => "Machine name description",
            Self::Host => "Host",
            Self::HostDescription => "Host description",
            Self::PrimaryHost => "Primary host",
            Self::SubmitHost => "Submit host",
            Self::SubmitHostDescription => "Submit host description",
            Self::Queue => "Queue",
            Self::QueueDescription => "Queue description",
            Self::ProjectName => "Project name",
            Self::ProjectNameDescription => "Project name description",
        }
    }
}

/// A common-property element: its text slot plus the attributes it carries.
#[derive(Debug)]
pub struct CommonElement {
    /// Local tag name.
    pub tag: &'static str,
    /// Slot receiving the element's text.
    pub text: CommonField,
    /// `(attribute, slot)` pairs captured when the element opens.
    pub attributes: &'static [(&'static str, CommonField)],
}

const DESCRIBED: &str = "description";

/// Common-property elements, in schema order.
pub static COMMON_ELEMENTS: &[CommonElement] = &[
    CommonElement {
        tag: "GlobalJobId",
        text: CommonField::GlobalJobIdentity,
        attributes: &[],
    },
    CommonElement {
        tag: "LocalJobId",
        text: CommonField::LocalJobIdentity,
        attributes: &[],
    },
    CommonElement {
        tag: "JobName",
        text: CommonField::JobName,
        attributes: &[(DESCRIBED, CommonField::JobNameDescription)],
    },
    CommonElement {
        tag: "Charge",
        text: CommonField::Charge,
        attributes: &[
            (DESCRIBED, CommonField::ChargeDescription),
            ("unit", CommonField::ChargeUnit),
            ("formula", CommonField::ChargeFormula),
        ],
    },
    CommonElement {
        tag: "Status",
        text: CommonField::Status,
        attributes: &[(DESCRIBED, CommonField::StatusDescription)],
    },
    CommonElement {
        tag: "WallDuration",
        text: CommonField::WallDuration,
        attributes: &[(DESCRIBED, CommonField::WallDurationDescription)],
    },
    CommonElement {
        tag: "EndTime",
        text: CommonField::EndTime,
        attributes: &[(DESCRIBED, CommonField::EndTimeDescription)],
    },
    CommonElement {
        tag: "StartTime",
        text: CommonField::StartTime,
        attributes: &[(DESCRIBED, CommonField::StartTimeDescription)],
    },
    CommonElement {
        tag: "MachineName",
        text: CommonField::MachineName,
        attributes: &[(DESCRIBED, CommonField::MachineNameDescription)],
    },
    CommonElement {
        tag: "Host",
        text: CommonField::Host,
        attributes: &[
            (DESCRIBED, CommonField::HostDescription),
            ("primary", CommonField::PrimaryHost),
        ],
    },
    CommonElement {
        tag: "SubmitHost",
        text: CommonField::SubmitHost,
        attributes: &[(DESCRIBED, CommonField::SubmitHostDescription)],
    },
    CommonElement {
        tag: "Queue",
        text: CommonField::Queue,
        attributes: &[(DESCRIBED, CommonField::QueueDescription)],
    },
    CommonElement {
        tag: "ProjectName",
        text: CommonField::ProjectName,
        attributes: &[(DESCRIBED, CommonField::ProjectNameDescription)],
    },
];

/// Attributes of the record-identity element.
pub static RECORD_IDENTITY_ATTRIBUTES: &[(&str, CommonField)] = &[
    ("recordId", CommonField::RecordIdentity),
    ("createTime", CommonField::RecordCreateTime),
];

/// Text slot of a user-identity entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserField {
    /// `LocalUserId`
    LocalUserIdentity,
    /// `GlobalUserName`
    GlobalUserName,
}

/// Text slot of a key-info block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyField {
    /// `X509SubjectName`
    SubjectName,
    /// `X509IssuerSerial`
    IssuerSerial,
    /// `X509Ski`
    Ski,
    /// `X509Certificate`
    Certificate,
}

/// Attribute-backed slot of a property scratch map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum PropertyField {
    Description,
    Metric,
    StorageUnit,
    PhaseUnit,
    PropertyType,
    ConsumptionRate,
    Units,
}

/// The ten differentiated-property kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum PropertyKind {
    Network,
    Disk,
    Memory,
    Swap,
    NodeCount,
    Processors,
    CpuDuration,
    TimeDuration,
    TimeInstant,
    ServiceLevel,
}

const INTERVALLIC_VOLUME: &[(&str, PropertyField)] = &[
    (DESCRIBED, PropertyField::Description),
    ("phaseUnit", PropertyField::PhaseUnit),
    ("storageUnit", PropertyField::StorageUnit),
    ("metric", PropertyField::Metric),
];

const TYPED_VOLUME: &[(&str, PropertyField)] = &[
    (DESCRIBED, PropertyField::Description),
    ("phaseUnit", PropertyField::PhaseUnit),
    ("storageUnit", PropertyField::StorageUnit),
    ("metric", PropertyField::Metric),
    ("type", PropertyField::PropertyType),
];

const TYPE_ONLY: &[(&str, PropertyField)] = &[("type", PropertyField::PropertyType)];

static PROPERTY_TAGS: [(&str, PropertyKind); 10] = [
    ("Network", PropertyKind::Network),
    ("Disk", PropertyKind::Disk),
    ("Memory", PropertyKind::Memory),
    ("Swap", PropertyKind::Swap),
    ("NodeCount", PropertyKind::NodeCount),
    ("Processors", PropertyKind::Processors),
    ("CpuDuration", PropertyKind::CpuDuration),
    ("TimeDuration", PropertyKind::TimeDuration),
    ("TimeInstant", PropertyKind::TimeInstant),
    ("ServiceLevel", PropertyKind::ServiceLevel),
];

impl PropertyKind {
    /// All kinds, in schema order.
    pub const ALL: [Self; 10] = [
        Self::Network,
        Self::Disk,
        Self::Memory,
        Self::Swap,
        Self::NodeCount,
        Self::Processors,
        Self::CpuDuration,
        Self::TimeDuration,
        Self::TimeInstant,
        Self::ServiceLevel,
    ];

    /// Kind for a local tag name.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        PROPERTY_TAGS
            .iter()
            .find(|(name, _)| *name == tag)
            .map(|(_, kind)| *kind)
    }

    /// Schema tag name (also the persisted discriminant).
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Network => "Network",
            Self::Disk => "Disk",
            Self::Memory => "Memory",
            Self::Swap => "Swap",
            Self::NodeCount => "NodeCount",
            Self::Processors => "Processors",
            Self::CpuDuration => "CpuDuration",
            Self::TimeDuration => "TimeDuration",
            Self::TimeInstant => "TimeInstant",
            Self::ServiceLevel => "ServiceLevel",
        }
    }

    /// Name used in validation messages.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Network => "Network",
            Self::Disk => "Disk",
            Self::Memory => "Memory",
            Self::Swap => "Swap",
            Self::NodeCount => "Node count",
            Self::Processors => "Processors",
            Self::CpuDuration => "Cpu duration",
            Self::TimeDuration => "Time duration",
            Self::TimeInstant => "Time instant",
            Self::ServiceLevel => "Service level",
        }
    }

    /// Integer-valued, metered kinds.
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(
            self,
            Self::Network
                | Self::Disk
                | Self::Memory
                | Self::Swap
                | Self::NodeCount
                | Self::Processors
        )
    }

    /// Attributes captured when an element of this kind opens.
    #[must_use]
    pub const fn attributes(self) -> &'static [(&'static str, PropertyField)] {
        match self {
            Self::Network => INTERVALLIC_VOLUME,
            Self::Disk | Self::Memory | Self::Swap => TYPED_VOLUME,
            Self::NodeCount => &[
                (DESCRIBED, PropertyField::Description),
                ("metric", PropertyField::Metric),
            ],
            Self::Processors => &[
                (DESCRIBED, PropertyField::Description),
                ("metric", PropertyField::Metric),
                ("consumptionRate", PropertyField::ConsumptionRate),
            ],
            Self::CpuDuration => &[
                (DESCRIBED, PropertyField::Description),
                ("usageType", PropertyField::PropertyType),
            ],
            Self::TimeDuration | Self::TimeInstant | Self::ServiceLevel => TYPE_ONLY,
        }
    }
}

/// The two resource-type (extension property) kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    /// String valued: `ResourceType`, `Resource`, `Resources`.
    Text,
    /// Float valued: `ConsumableResourceType`, `ConsumableResource`, `ConsumableResources`.
    Consumable,
}

static RESOURCE_TAGS: [(&str, ResourceKind); 6] = [
    ("ResourceType", ResourceKind::Text),
    ("Resource", ResourceKind::Text),
    ("Resources", ResourceKind::Text),
    ("ConsumableResourceType", ResourceKind::Consumable),
    ("ConsumableResource", ResourceKind::Consumable),
    ("ConsumableResources", ResourceKind::Consumable),
];

impl ResourceKind {
    /// Kind for a local tag name, accepting every schema synonym.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        RESOURCE_TAGS
            .iter()
            .find(|(name, _)| *name == tag)
            .map(|(_, kind)| *kind)
    }

    /// Canonical tag name (also the persisted discriminant).
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Text => "ResourceType",
            Self::Consumable => "ConsumableResourceType",
        }
    }

    /// Name used in validation messages.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Text => "Resource type",
            Self::Consumable => "Consumable resource type",
        }
    }

    /// Attributes captured when an element of this kind opens.
    #[must_use]
    pub const fn attributes(self) -> &'static [(&'static str, PropertyField)] {
        match self {
            Self::Text => &[(DESCRIBED, PropertyField::Description)],
            Self::Consumable => &[
                (DESCRIBED, PropertyField::Description),
                ("units", PropertyField::Units),
            ],
        }
    }
}

/// Any property-bearing tag: differentiated or extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyTag {
    /// One of the ten differentiated-property kinds.
    Differentiated(PropertyKind),
    /// One of the two resource-type kinds.
    Resource(ResourceKind),
}

impl PropertyTag {
    /// Attributes captured when the element opens.
    #[must_use]
    pub const fn attributes(self) -> &'static [(&'static str, PropertyField)] {
        match self {
            Self::Differentiated(kind) => kind.attributes(),
            Self::Resource(kind) => kind.attributes(),
        }
    }
}

/// What a tag means to the accumulator.
#[derive(Debug, Clone, Copy)]
pub enum Element {
    /// One of the configured record-root spellings.
    RecordRoot,
    /// `RecordIdentity`
    RecordIdentity,
    /// `UserIdentity`
    UserIdentity,
    /// `KeyInfo`, any prefix.
    KeyInfo,
    /// `ProcessId`
    ProcessId,
    /// A common-property element.
    Common(&'static CommonElement),
    /// A field inside a user-identity entry.
    User(UserField),
    /// A field inside a key-info block.
    Key(KeyField),
    /// A differentiated or extension property.
    Property(PropertyTag),
    /// Anything else: containers like `JobIdentity`, `X509Data` or wrappers.
    Unrecognized,
}

impl Element {
    /// Classify a local tag name.
    #[must_use]
    pub fn classify(tag: &str, root_tags: &[String]) -> Self {
        if root_tags.iter().any(|root| root == tag) {
            return Self::RecordRoot;
        }
        match tag {
            "RecordIdentity" => Self::RecordIdentity,
            "UserIdentity" => Self::UserIdentity,
            "KeyInfo" => Self::KeyInfo,
            "ProcessId" => Self::ProcessId,
            "LocalUserId" => Self::User(UserField::LocalUserIdentity),
            "GlobalUserName" => Self::User(UserField::GlobalUserName),
            "X509SubjectName" => Self::Key(KeyField::SubjectName),
            "X509IssuerSerial" => Self::Key(KeyField::IssuerSerial),
            "X509Ski" => Self::Key(KeyField::Ski),
            "X509Certificate" => Self::Key(KeyField::Certificate),
            _ => Self::classify_property(tag),
        }
    }

    fn classify_property(tag: &str) -> Self {
        if let Some(common) = COMMON_ELEMENTS.iter().find(|element| element.tag == tag) {
            return Self::Common(common);
        }
        if let Some(kind) = PropertyKind::from_tag(tag) {
            return Self::Property(PropertyTag::Differentiated(kind));
        }
        if let Some(kind) = ResourceKind::from_tag(tag) {
            return Self::Property(PropertyTag::Resource(kind));
        }
        Self::Unrecognized
    }
}
