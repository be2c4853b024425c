//! Report classification and the per-report-type storage descriptors.
//!
//! Each report type is described declaratively: source-header to storage
//! column renames, the natural key used for conflict detection, which
//! columns hold timestamps, and which get supporting indexes. The mapper,
//! provisioner, and upsert engine all consume the same descriptor, so
//! adding a report type means adding one prefix rule and one descriptor.

use crate::config::ClassifierMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Appointments,
    Clients,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Timestamp,
}

/// One mapped column: the header the export tool writes, the storage
/// column it lands in, and how its values are coerced.
#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub source: &'static str,
    pub name: &'static str,
    pub kind: ColumnKind,
}

const fn text(source: &'static str, name: &'static str) -> Column {
    Column {
        source,
        name,
        kind: ColumnKind::Text,
    }
}

const fn timestamp(source: &'static str, name: &'static str) -> Column {
    Column {
        source,
        name,
        kind: ColumnKind::Timestamp,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ReportDescriptor {
    pub kind: ReportKind,
    pub table: &'static str,
    /// Storage column carrying the business identifier; unique and not
    /// null, the conflict target of every upsert.
    pub natural_key: &'static str,
    /// Mapped columns in storage order. The natural key appears here too.
    pub columns: &'static [Column],
    /// Non-key columns that get a plain supporting index.
    pub indexes: &'static [&'static str],
}

impl ReportDescriptor {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Mapped columns other than the natural key, in storage order.
    pub fn value_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.name != self.natural_key)
    }
}

pub const APPOINTMENTS: ReportDescriptor = ReportDescriptor {
    kind: ReportKind::Appointments,
    table: "appointments",
    natural_key: "appointment_id",
    columns: &[
        text("Appointment ID", "appointment_id"),
        timestamp("Date", "appointment_date"),
        text("Client", "client"),
        text("Client ID", "client_id"),
        text("Practitioner", "practitioner"),
        text("Appointment Type", "appointment_type"),
        text("Appointment Status", "appointment_status"),
        text("Client Duration", "client_duration"),
        text("Business", "business"),
        text("Clinical Note", "clinical_note"),
        text("Arrived", "arrived"),
        text("Cancelled", "cancelled"),
        text("Cancellation Reason", "cancellation_reason"),
        text("Did Not Arrive", "did_not_arrive"),
        text("Appointment Notes", "appointment_notes"),
        text("Invoice Number", "invoice_number"),
        text("Invoice Status", "invoice_status"),
        text("Amount", "amount"),
        text("Payment Status", "payment_status"),
        text("Referral Source", "referral_source"),
        text("Online Booking", "online_booking"),
        text("Created By", "created_by"),
    ],
    indexes: &["appointment_date", "client_id"],
};

pub const CLIENTS: ReportDescriptor = ReportDescriptor {
    kind: ReportKind::Clients,
    table: "clients",
    natural_key: "client_id",
    columns: &[
        text("Client ID", "client_id"),
        text("First Name", "first_name"),
        text("Last Name", "last_name"),
        text("Preferred Name", "preferred_name"),
        timestamp("Date of Birth", "date_of_birth"),
        text("Email", "email"),
        text("Phone", "phone"),
        text("Mobile", "mobile"),
        text("Address Line 1", "address_line_1"),
        text("Address Line 2", "address_line_2"),
        text("City", "city"),
        text("State", "state"),
        text("Post Code", "post_code"),
        text("Country", "country"),
        text("Gender", "gender"),
        text("Occupation", "occupation"),
        text("Referral Source", "referral_source"),
        text("Emergency Contact", "emergency_contact"),
        text("Health Fund", "health_fund"),
        text("Medicare Number", "medicare_number"),
        timestamp("First Appointment", "first_appointment"),
        timestamp("Last Appointment", "last_appointment"),
        text("Client Notes", "client_notes"),
    ],
    indexes: &["last_name", "last_appointment"],
};

/// Ordered filename-prefix dispatch table. Prefix matching tolerates the
/// timestamp suffixes the export tool appends, e.g.
/// `Appointment Report 281025_1151PM.xlsx`.
const PREFIX_RULES: &[(&str, &ReportDescriptor)] = &[
    ("appointment", &APPOINTMENTS),
    ("client list", &CLIENTS),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Known(&'static ReportDescriptor),
    /// No known report type. Under [`ClassifierMode::Guess`] the first
    /// word of the filename is pluralized into the table name the legacy
    /// pipeline would have targeted; it is surfaced in the skip reason
    /// only, never ingested against.
    Unsupported { guessed: Option<String> },
}

impl PartialEq for ReportDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl Eq for ReportDescriptor {}

pub fn classify(filename: &str, mode: ClassifierMode) -> Classification {
    let lowered = filename.trim().to_lowercase();
    for (prefix, descriptor) in PREFIX_RULES {
        if lowered.starts_with(prefix) {
            return Classification::Known(descriptor);
        }
    }
    let guessed = match mode {
        ClassifierMode::Strict => None,
        ClassifierMode::Guess => lowered.split_whitespace().next().map(|word| {
            if word.ends_with('s') {
                word.to_string()
            } else {
                format!("{word}s")
            }
        }),
    };
    Classification::Unsupported { guessed }
}
