//! End-to-end ingestion tests against the in-memory store.

#![allow(clippy::unwrap_used)] // Tests can unwrap
#![allow(clippy::expect_used)] // Tests can expect

use chrono::{TimeZone, Utc};
use gridacct_core::{
    DifferentiatedProperty, IngestReport, OtherValue, ParserConfig, RecordStore, ResourceType,
    UsageRecord, UsageRecordParser,
};
use gridacct_testing::fixtures::{
    element, key_info, numeric, record_identity_with_key, record_with, record_without_status, wrap,
};
use gridacct_testing::{FailingRecordStore, InMemoryRecordStore, SequentialIdentityAllocator};

type Parser = UsageRecordParser<InMemoryRecordStore, SequentialIdentityAllocator>;

fn parser() -> Parser {
    gridacct_testing::helpers::init_tracing();
    UsageRecordParser::with_allocator(InMemoryRecordStore::new(), SequentialIdentityAllocator::new())
}

async fn ingest(document: &str) -> (IngestReport, InMemoryRecordStore) {
    let parser = parser();
    let report = parser.parse(document).await.expect("well-formed document");
    (report, parser.store().clone())
}

async fn single(fragment: &str) -> UsageRecord {
    let (report, store) = ingest(&record_with(fragment, Some("1234"))).await;
    assert!(report.is_clean(), "unexpected errors: {:?}", report.errors);
    store.get("1234").expect("record committed")
}

#[tokio::test]
async fn simple_record_commits_silently() {
    let (report, store) = ingest(
        r#"<JobUsageRecord><RecordIdentity recordId="abcd"/><Status>completed</Status></JobUsageRecord>"#,
    )
    .await;

    assert!(report.messages.is_empty());
    assert!(report.errors.is_empty());
    let record = store.get("abcd").unwrap();
    assert_eq!(record.status, "Completed");
    assert!(record.created_at.is_some());
}

#[tokio::test]
async fn two_records_with_different_identities_both_commit() {
    let document = wrap(&[record_with("", Some("abcd")), record_with("", Some("efgh"))]);
    let (report, store) = ingest(&document).await;

    assert_eq!(report.total(), 0);
    assert_eq!(store.count().await.unwrap(), 2);
}

#[tokio::test]
async fn missing_status_is_one_error_and_no_rows() {
    let (report, store) = ingest(&record_without_status("", Some("abcd"))).await;

    assert!(report.messages.is_empty());
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[&1].reason, "Validation failed: Status can't be blank");
    assert_eq!(report.errors[&1].requested_identity.as_deref(), Some("abcd"));
    assert!(store.is_empty());
}

#[tokio::test]
async fn two_records_without_status_values_both_fail() {
    let (report, store) = ingest(
        "<Wrapper><JobUsageRecord><Status></Status></JobUsageRecord>\
         <JobUsageRecord><Status></Status></JobUsageRecord></Wrapper>",
    )
    .await;

    assert!(report.messages.is_empty());
    assert_eq!(report.errors.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
    assert!(store.is_empty());
}

#[tokio::test]
async fn duplicate_identity_first_writer_wins() {
    let good = record_with("<Queue>first</Queue>", Some("abcd"));
    let again = record_with("<Queue>second</Queue>", Some("abcd"));
    let (report, store) = ingest(&wrap(&[good, again])).await;

    assert!(report.messages.get(&1).is_none());
    assert_eq!(
        report.errors[&2].reason,
        "Validation failed: Record identity has already been taken"
    );
    assert_eq!(store.len(), 1);
    assert_eq!(store.get("abcd").unwrap().queue.as_deref(), Some("first"));
}

#[tokio::test]
async fn duplicates_across_documents_are_rejected_too() {
    let parser = parser();
    parser.parse(&record_with("", Some("abcd"))).await.unwrap();
    let report = parser.parse(&record_with("", Some("abcd"))).await.unwrap();

    assert_eq!(report.errors.len(), 1);
    assert_eq!(parser.store().len(), 1);
}

#[tokio::test]
async fn missing_identity_is_allocated_and_announced() {
    for document in [record_with("", Some("")), record_with("", None)] {
        let (report, store) = ingest(&document).await;

        let notice = &report.messages[&1];
        assert!(notice.message.starts_with("The record was assigned the identity "));
        assert_eq!(notice.assigned_identity, "generated-1");
        assert!(store.get("generated-1").is_some());
    }
}

#[tokio::test]
async fn empty_requested_identity_is_reported_as_given() {
    let (report, _) = ingest(&record_with("", Some(""))).await;
    assert_eq!(report.messages[&1].requested_identity.as_deref(), Some(""));

    let (report, _) = ingest(&record_with("", None)).await;
    assert_eq!(report.messages[&1].requested_identity, None);
}

#[tokio::test]
async fn failures_do_not_block_later_records() {
    let document = wrap(&[
        record_with("", Some("a")),
        record_without_status("", Some("b")),
        record_with("", None),
        record_with("<ProcessId>-1</ProcessId>", Some("c")),
        record_with("", Some("d")),
    ]);
    let (report, store) = ingest(&document).await;

    assert_eq!(report.errors.keys().copied().collect::<Vec<_>>(), vec![2, 4]);
    assert_eq!(report.messages.keys().copied().collect::<Vec<_>>(), vec![3]);
    assert_eq!(store.identities(), vec!["a", "generated-1", "d"]);
}

#[tokio::test]
async fn store_failures_are_reported_per_record() {
    let parser = UsageRecordParser::new(FailingRecordStore::failing(["b"]));
    let document = wrap(&[
        record_with("", Some("a")),
        record_with("", Some("b")),
        record_with("", Some("c")),
    ]);
    let report = parser.parse(&document).await.unwrap();

    assert_eq!(report.errors[&2].reason, "Database error: connection reset by peer");
    assert_eq!(parser.store().count().await.unwrap(), 2);
}

#[tokio::test]
async fn malformed_document_keeps_earlier_commits() {
    let parser = parser();
    let document = format!(
        "<JobUsageRecords>{}<JobUsageRecord><Status>x</Queue></JobUsageRecord></JobUsageRecords>",
        record_with("", Some("early"))
    );

    let result = parser.parse(&document).await;

    assert!(result.is_err());
    assert!(parser.store().get("early").is_some());
    assert_eq!(parser.store().len(), 1);
}

#[tokio::test]
async fn malformed_document_still_reports_earlier_outcomes() {
    let parser = parser();
    let document = format!(
        "<JobUsageRecords>{}{}<JobUsageRecord><Status>x</Queue></JobUsageRecord></JobUsageRecords>",
        record_with("", None),
        record_without_status("", Some("late"))
    );

    let abandoned = parser.parse(&document).await.unwrap_err();

    assert!(abandoned.error.position > 0);
    assert!(abandoned.to_string().starts_with("Malformed document at byte "));
    assert_eq!(abandoned.report.messages.len(), 1);
    assert_eq!(abandoned.report.messages[&1].assigned_identity, "generated-1");
    assert_eq!(
        abandoned.report.errors[&2].reason,
        "Validation failed: Status can't be blank"
    );
    assert_eq!(parser.store().identities(), vec!["generated-1".to_string()]);
}

#[tokio::test]
async fn whitespace_values_are_validated_not_dropped() {
    let (report, store) = ingest(&wrap(&[
        record_with(&numeric("Network", " "), Some("network")),
        record_with("<ProcessId> </ProcessId>", Some("pid")),
        record_with(&element("Resource", " ", &[]), Some("resource")),
        record_with("<UserIdentity><LocalUserId> </LocalUserId></UserIdentity>", Some("user")),
    ]))
    .await;

    assert_eq!(
        report.errors[&1].reason,
        "Validation failed: Network value is not a number"
    );
    assert_eq!(
        report.errors[&2].reason,
        "Validation failed: Process id is not a number"
    );
    assert_eq!(report.errors.len(), 2);
    assert!(store.get("network").is_none());
    assert!(store.get("pid").is_none());

    let resource = store.get("resource").expect("record committed");
    assert_eq!(
        resource.resource_types,
        vec![ResourceType::Text {
            value: " ".to_string(),
            description: None,
        }]
    );
    let user = store.get("user").expect("record committed");
    assert_eq!(user.user_identities.len(), 1);
    assert_eq!(user.user_identities[0].local_user_identity.as_deref(), Some(" "));
}

#[tokio::test]
async fn common_properties_and_descriptions() {
    let record = single(&[
        element("JobName", "test job name", &[("description", "test description")]),
        element(
            "Charge",
            "1.01",
            &[("description", "test description"), ("unit", "test unit"), ("formula", "test formula")],
        ),
        element("WallDuration", "PT1H", &[("description", "wall")]),
        element("StartTime", "2008-01-01T10:01:01Z", &[("description", "start")]),
        element("EndTime", "2008-01-02T10:01:01Z", &[]),
        element("MachineName", "test machine name", &[]),
        element("Host", "test host", &[("description", "head"), ("primary", "true")]),
        element("SubmitHost", "test submit host", &[]),
        element("Queue", "test queue", &[("description", "q")]),
        element("ProjectName", "test project name", &[]),
        "<JobIdentity><GlobalJobId>g-1</GlobalJobId><LocalJobId>l-1</LocalJobId></JobIdentity>".to_string(),
    ]
    .concat())
    .await;

    assert_eq!(record.job_name.as_deref(), Some("test job name"));
    assert_eq!(record.job_name_description.as_deref(), Some("test description"));
    assert_eq!(record.charge, Some(1.01));
    assert_eq!(record.charge_unit.as_deref(), Some("test unit"));
    assert_eq!(record.charge_formula.as_deref(), Some("test formula"));
    assert_eq!(record.wall_duration.as_deref(), Some("PT1H"));
    assert_eq!(
        record.start_time,
        Some(Utc.with_ymd_and_hms(2008, 1, 1, 10, 1, 1).unwrap())
    );
    assert_eq!(
        record.end_time,
        Some(Utc.with_ymd_and_hms(2008, 1, 2, 10, 1, 1).unwrap())
    );
    assert_eq!(record.host.as_deref(), Some("test host"));
    assert_eq!(record.primary_host, Some(true));
    assert_eq!(record.queue_description.as_deref(), Some("q"));
    assert_eq!(record.global_job_identity.as_deref(), Some("g-1"));
    assert_eq!(record.local_job_identity.as_deref(), Some("l-1"));
}

#[tokio::test]
async fn unparsable_charge_fails_the_record() {
    let (report, store) = ingest(&record_with(&element("Charge", "cheap", &[]), Some("x"))).await;
    assert_eq!(report.errors[&1].reason, "Validation failed: Charge is not a number");
    assert!(store.is_empty());
}

#[tokio::test]
async fn namespaced_tags_are_recognized() {
    let document = "<urwg:UsageRecord xmlns:urwg='http://schema.ogf.org/urf/2003/09/urf'>\
        <urwg:RecordIdentity urwg:recordId='ns-1'/>\
        <urwg:Status>Aborted</urwg:Status>\
        <urwg:Queue>long</urwg:Queue>\
        </urwg:UsageRecord>";
    let (report, store) = ingest(document).await;

    assert!(report.is_clean());
    let record = store.get("ns-1").unwrap();
    assert_eq!(record.status, "Aborted");
    assert_eq!(record.queue.as_deref(), Some("long"));
}

#[tokio::test]
async fn process_ids_are_committed_in_order() {
    let record = single("<ProcessId>12</ProcessId><ProcessId></ProcessId><ProcessId>34</ProcessId>").await;
    let values: Vec<i64> = record.process_ids.iter().map(|pid| pid.value).collect();
    assert_eq!(values, vec![12, 34]);
}

#[tokio::test]
async fn record_key_info_is_attached_to_the_record() {
    let key = key_info(&[("X509SubjectName", "CN=host"), ("X509Ski", "a1b2")]);
    let document = format!(
        "<JobUsageRecord>{}<Status>completed</Status></JobUsageRecord>",
        record_identity_with_key("keyed", &key)
    );
    let (report, store) = ingest(&document).await;

    assert!(report.is_clean());
    let key_info = store.get("keyed").unwrap().key_info.unwrap();
    assert_eq!(key_info.subject_name.as_deref(), Some("CN=host"));
    assert_eq!(key_info.ski.as_deref(), Some("a1b2"));
    assert_eq!(key_info.certificate, None);
}

#[tokio::test]
async fn user_identities_carry_their_own_key_info() {
    let key = key_info(&[("X509Certificate", "MIIB")]);
    let record = single(&format!(
        "<UserIdentity><LocalUserId>alice</LocalUserId>{key}</UserIdentity>\
         <UserIdentity></UserIdentity>\
         <UserIdentity><GlobalUserName>/C=UK/CN=bob</GlobalUserName></UserIdentity>"
    ))
    .await;

    assert_eq!(record.key_info, None);
    assert_eq!(record.user_identities.len(), 2);
    let alice = &record.user_identities[0];
    assert_eq!(alice.local_user_identity.as_deref(), Some("alice"));
    assert_eq!(
        alice.key_info.as_ref().and_then(|k| k.certificate.as_deref()),
        Some("MIIB")
    );
    assert_eq!(
        record.user_identities[1].global_user_name.as_deref(),
        Some("/C=UK/CN=bob")
    );
}

#[tokio::test]
async fn numeric_properties_default_metric_and_skip_empty_values() {
    let record = single(
        &[
            element("Network", "2048", &[("storageUnit", "MB")]),
            numeric("Disk", ""),
            element("Memory", "", &[("storageUnit", "MB")]),
            numeric("Swap", "512"),
        ]
        .concat(),
    )
    .await;

    let kinds: Vec<_> = record
        .differentiated_properties
        .iter()
        .map(DifferentiatedProperty::kind)
        .collect();
    assert_eq!(kinds.len(), 2);
    let network = record.differentiated_properties[0].as_numeric().unwrap();
    assert_eq!(network.value, 2048);
    assert_eq!(network.metric, "total");
}

#[tokio::test]
async fn every_numeric_kind_is_persisted() {
    let fragment: String = ["Network", "Disk", "Memory", "Swap", "NodeCount", "Processors"]
        .into_iter()
        .map(|tag| numeric(tag, "1024"))
        .collect();
    let record = single(&fragment).await;
    assert_eq!(record.differentiated_properties.len(), 6);
    assert!(record.differentiated_properties.iter().all(|p| p.as_numeric().is_some()));
}

#[tokio::test]
async fn memory_without_storage_unit_fails() {
    let (report, store) = ingest(&record_with(&element("Memory", "10", &[]), Some("m"))).await;
    assert_eq!(
        report.errors[&1].reason,
        "Validation failed: Memory storage unit can't be blank"
    );
    assert!(store.is_empty());
}

#[tokio::test]
async fn negative_numeric_value_fails() {
    let (report, _) = ingest(&record_with(&numeric("Disk", "-10"), Some("d"))).await;
    assert_eq!(
        report.errors[&1].reason,
        "Validation failed: Disk value must be greater than or equal to 0"
    );
}

#[tokio::test]
async fn processors_consumption_rate() {
    let record = single(&element(
        "Processors",
        "4",
        &[("metric", "max"), ("consumptionRate", "1.5")],
    ))
    .await;
    let processors = record.differentiated_properties[0].as_numeric().unwrap();
    assert_eq!(processors.metric, "max");
    assert_eq!(processors.consumption_rate.map(|rate| rate.0), Some(1.5));
}

#[tokio::test]
async fn other_properties() {
    let record = single(
        &[
            element("CpuDuration", "PT10M", &[("usageType", "user")]),
            element("TimeDuration", "PT1H", &[("type", "connect")]),
            element("TimeInstant", "2008-01-01T00:00:00Z", &[("type", "start")]),
            element("ServiceLevel", "gold", &[("type", "QoS")]),
        ]
        .concat(),
    )
    .await;

    assert_eq!(record.differentiated_properties.len(), 4);
    let values: Vec<_> = record
        .differentiated_properties
        .iter()
        .filter_map(|p| p.as_other().map(|o| (o.property_type.clone(), o.value.clone())))
        .collect();
    assert!(values.contains(&("user".to_string(), OtherValue::Duration("PT10M".to_string()))));
    assert!(values.contains(&("QoS".to_string(), OtherValue::Level("gold".to_string()))));
    assert!(values.contains(&(
        "start".to_string(),
        OtherValue::Instant(Utc.with_ymd_and_hms(2008, 1, 1, 0, 0, 0).unwrap())
    )));
}

#[tokio::test]
async fn other_property_without_type_fails() {
    let (report, _) = ingest(&record_with(&element("TimeDuration", "PT1H", &[]), Some("t"))).await;
    assert_eq!(
        report.errors[&1].reason,
        "Validation failed: Time duration property type can't be blank"
    );
}

#[tokio::test]
async fn resource_type_synonyms() {
    let record = single(
        &[
            element("ResourceType", "gpu", &[("description", "accelerator")]),
            element("Resource", "fpga", &[]),
            element("Resources", "", &[]),
            element("ConsumableResourceType", "2.5", &[("units", "hours")]),
            element("ConsumableResource", "1", &[]),
            element("ConsumableResources", "3", &[]),
        ]
        .concat(),
    )
    .await;

    assert_eq!(record.resource_types.len(), 5);
    assert!(record.resource_types.contains(&ResourceType::Text {
        value: "gpu".to_string(),
        description: Some("accelerator".to_string()),
    }));
    assert!(record.resource_types.contains(&ResourceType::Consumable {
        value: 2.5,
        description: None,
        units: Some("hours".to_string()),
    }));
}

#[tokio::test]
async fn consumable_resource_must_be_a_float() {
    let (report, _) = ingest(&record_with(&element("ConsumableResource", "many", &[]), Some("r"))).await;
    assert_eq!(
        report.errors[&1].reason,
        "Validation failed: Consumable resource type float value is not a number"
    );
}

#[tokio::test]
async fn custom_root_tags() {
    let parser = parser().with_config(ParserConfig::default().with_root_tags(["Job"]));
    let report = parser
        .parse("<Jobs><Job><Status>done</Status></Job><JobUsageRecord><Status>x</Status></JobUsageRecord></Jobs>")
        .await
        .unwrap();

    assert_eq!(report.messages.len(), 1);
    assert_eq!(parser.store().get("generated-1").unwrap().status, "Done");
    assert_eq!(parser.store().len(), 1);
}
