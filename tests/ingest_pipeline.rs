mod common;

use clinic_ingest::config::ClassifierMode;
use clinic_ingest::ingest::Ingestor;
use clinic_ingest::message::{EmailAttachment, InboundEmail, OutcomeStatus, ResultStatus};
use clinic_ingest::normalize::Field;
use clinic_ingest::sheet::{Cell, decode_attachment};

use common::{MemoryStore, encode_attachment_bytes, fixture_bytes, payload_json};

fn parse_email(to: &str, attachments: &[(&str, &str)]) -> InboundEmail {
    serde_json::from_str(&payload_json(to, attachments)).expect("payload parses")
}

#[test]
fn well_formed_report_lands_in_the_clinic_table() {
    let email = parse_email(
        "developers.mxd+SuperTest@gmail.com",
        &[(
            "Appointment Report 281025_1151PM.csv",
            "Appointment ID,Date,Client,Client ID,Practitioner\n\
             101,2025-10-28 09:00:00,Ada Lovelace,C-1,Dr Byron\n\
             102,2025-10-28 10:00:00,Grace Hopper,C-2,Dr Byron\n",
        )],
    );
    let mut ingestor = Ingestor::new(MemoryStore::default(), ClassifierMode::Strict);
    let result = ingestor.ingest(&email);

    assert_eq!(result.status, ResultStatus::Success);
    assert_eq!(result.tenant.as_deref(), Some("supertest"));
    let outcomes = result.results.unwrap();
    assert_eq!(outcomes[0].status, OutcomeStatus::Success);
    assert_eq!(outcomes[0].rows_processed, Some(2));

    let store = ingestor.into_store();
    let table = store.table("supertest", "appointments").unwrap();
    assert_eq!(table.len(), 2);
    let row = &table["101"];
    assert_eq!(row["client"], Field::Text("Ada Lovelace".to_string()));
    assert!(matches!(row["appointment_date"], Field::Timestamp(_)));
}

#[test]
fn excel_workbook_attachment_decodes_native_dates() {
    let bytes = fixture_bytes("appointment_report.xlsx");
    let size = bytes.len() as u64;
    let data = encode_attachment_bytes(&bytes);

    let sheet = decode_attachment("Appointment Report.xlsx", &data).unwrap();
    assert_eq!(sheet.headers, ["Appointment ID", "Date", "Client", "Client ID"]);
    // 45958.375 in the 1900 date system.
    let expected = chrono::NaiveDate::from_ymd_opt(2025, 10, 28)
        .unwrap()
        .and_hms_opt(9, 0, 0)
        .unwrap();
    assert_eq!(sheet.rows[0][1], Cell::DateTime(expected));
    assert_eq!(sheet.rows[0][0], Cell::Number(501.0));

    // And end to end: the workbook lands like any csv export would.
    let mut email = parse_email("inbox+northside@example.com", &[]);
    email.attachments.push(EmailAttachment {
        name: "Appointment Report.xlsx".to_string(),
        size,
        data,
    });
    let mut ingestor = Ingestor::new(MemoryStore::default(), ClassifierMode::Strict);
    let result = ingestor.ingest(&email);
    assert_eq!(result.results.unwrap()[0].status, OutcomeStatus::Success);

    let store = ingestor.into_store();
    let row = &store.table("northside", "appointments").unwrap()["501"];
    assert_eq!(row["appointment_date"], Field::Timestamp(expected));
    assert_eq!(row["client"], Field::Text("Ada Lovelace".to_string()));
}

#[test]
fn reingesting_the_same_report_is_idempotent() {
    let email = parse_email(
        "inbox+northside@example.com",
        &[(
            "Appointment Report.csv",
            "Appointment ID,Client\n101,Ada\n102,Grace\n",
        )],
    );
    let mut ingestor = Ingestor::new(MemoryStore::default(), ClassifierMode::Strict);

    let first = ingestor.ingest(&email);
    let second = ingestor.ingest(&email);

    let first_outcomes = first.results.unwrap();
    assert_eq!(first_outcomes[0].rows_affected, Some(2));
    let second_outcomes = second.results.unwrap();
    assert_eq!(second_outcomes[0].rows_processed, Some(2));
    assert_eq!(second_outcomes[0].rows_affected, Some(0));

    let store = ingestor.into_store();
    assert_eq!(store.table("northside", "appointments").unwrap().len(), 2);
}

#[test]
fn duplicate_natural_keys_keep_the_last_row() {
    let email = parse_email(
        "inbox+northside@example.com",
        &[(
            "Appointment Report.csv",
            "Appointment ID,Client\n101,stale\n101,fresh\n",
        )],
    );
    let mut ingestor = Ingestor::new(MemoryStore::default(), ClassifierMode::Strict);
    let result = ingestor.ingest(&email);
    assert_eq!(result.results.unwrap()[0].rows_processed, Some(1));

    let store = ingestor.into_store();
    let table = store.table("northside", "appointments").unwrap();
    assert_eq!(table["101"]["client"], Field::Text("fresh".to_string()));
}

#[test]
fn corrected_reexport_overwrites_in_place() {
    let original = parse_email(
        "inbox+westend@example.com",
        &[("Client List Report.csv", "Client ID,First Name\nC-1,Ava\n")],
    );
    let corrected = parse_email(
        "inbox+westend@example.com",
        &[("Client List Report.csv", "Client ID,First Name\nC-1,Ada\n")],
    );
    let mut ingestor = Ingestor::new(MemoryStore::default(), ClassifierMode::Strict);
    ingestor.ingest(&original);
    let result = ingestor.ingest(&corrected);
    assert_eq!(result.results.unwrap()[0].rows_affected, Some(1));

    let store = ingestor.into_store();
    let table = store.table("westend", "clients").unwrap();
    assert_eq!(table.len(), 1);
    assert_eq!(table["C-1"]["first_name"], Field::Text("Ada".to_string()));
}

#[test]
fn blank_nan_and_nat_cells_store_as_null() {
    let email = parse_email(
        "inbox+northside@example.com",
        &[(
            "Client List Report.csv",
            "Client ID,First Name,Date of Birth\nC-1,NaN,NaT\nC-2,,1987-03-14\n",
        )],
    );
    let mut ingestor = Ingestor::new(MemoryStore::default(), ClassifierMode::Strict);
    ingestor.ingest(&email);

    let store = ingestor.into_store();
    let table = store.table("northside", "clients").unwrap();
    assert_eq!(table["C-1"]["first_name"], Field::Null);
    assert_eq!(table["C-1"]["date_of_birth"], Field::Null);
    assert_eq!(table["C-2"]["first_name"], Field::Null);
    assert!(matches!(table["C-2"]["date_of_birth"], Field::Timestamp(_)));
}

#[test]
fn partial_failure_keeps_the_good_attachment() {
    let mut email = parse_email(
        "inbox+mixed@example.com",
        &[(
            "Appointment Report.csv",
            "Appointment ID,Client\n7,Kept\n",
        )],
    );
    email.attachments.push(clinic_ingest::message::EmailAttachment {
        name: "Client List Report.csv".to_string(),
        size: 4,
        data: "%%%not-base64%%%".to_string(),
    });

    let mut ingestor = Ingestor::new(MemoryStore::default(), ClassifierMode::Strict);
    let result = ingestor.ingest(&email);
    let outcomes = result.results.unwrap();
    assert_eq!(outcomes[0].status, OutcomeStatus::Success);
    assert_eq!(outcomes[1].status, OutcomeStatus::Error);

    let store = ingestor.into_store();
    assert!(store.table("mixed", "appointments").unwrap().contains_key("7"));
}
