//! Core data types for portal credentials, extracted values and snapshots.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Owner credentials for the portal login form.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// One of the values read from the portal on every refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Occupants,
    Total,
    Sold,
    InvoiceDate,
    DueDate,
    WaterConsumption,
    PaymentUrl,
}

impl Field {
    /// Every field, in display order.
    pub const ALL: [Field; 7] = [
        Field::Occupants,
        Field::Total,
        Field::Sold,
        Field::InvoiceDate,
        Field::DueDate,
        Field::WaterConsumption,
        Field::PaymentUrl,
    ];

    /// Snapshot key, as the portal integration has always named it.
    pub fn key(self) -> &'static str {
        match self {
            Field::Occupants => "nrpersoane",
            Field::Total => "total",
            Field::Sold => "sold",
            Field::InvoiceDate => "datafactura",
            Field::DueDate => "datascadenta",
            Field::WaterConsumption => "consumaparece",
            Field::PaymentUrl => "payment_url",
        }
    }

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            Field::Occupants => "Număr persoane",
            Field::Total => "Total",
            Field::Sold => "Sold",
            Field::InvoiceDate => "Dată emitere factură",
            Field::DueDate => "Dată scadentă factură",
            Field::WaterConsumption => "Consum Apă Rece",
            Field::PaymentUrl => "Plătește acum",
        }
    }

    pub fn unit(self) -> Option<&'static str> {
        match self {
            Field::Total | Field::Sold => Some("Lei"),
            Field::WaterConsumption => Some("m³"),
            _ => None,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A typed value extracted for one [`Field`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Count(u32),
    Amount(f64),
    Volume(f64),
    Date(String),
    Url(String),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Count(n) => write!(f, "{n}"),
            FieldValue::Amount(v) => write!(f, "{v:.2}"),
            FieldValue::Volume(v) => write!(f, "{v}"),
            FieldValue::Date(s) | FieldValue::Url(s) => f.write_str(s),
        }
    }
}

/// Values read during one refresh cycle. Any field may be missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(rename = "nrpersoane")]
    pub occupants: Option<u32>,
    pub total: Option<f64>,
    pub sold: Option<f64>,
    #[serde(rename = "datafactura")]
    pub invoice_date: Option<String>,
    #[serde(rename = "datascadenta")]
    pub due_date: Option<String>,
    #[serde(rename = "consumaparece")]
    pub water_consumption: Option<f64>,
    pub payment_url: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

impl Snapshot {
    /// An empty snapshot stamped with the current time.
    pub fn empty() -> Self {
        Self {
            occupants: None,
            total: None,
            sold: None,
            invoice_date: None,
            due_date: None,
            water_consumption: None,
            payment_url: None,
            fetched_at: Utc::now(),
        }
    }

    /// Read one field.
    pub fn get(&self, field: Field) -> Option<FieldValue> {
        match field {
            Field::Occupants => self.occupants.map(FieldValue::Count),
            Field::Total => self.total.map(FieldValue::Amount),
            Field::Sold => self.sold.map(FieldValue::Amount),
            Field::InvoiceDate => self.invoice_date.clone().map(FieldValue::Date),
            Field::DueDate => self.due_date.clone().map(FieldValue::Date),
            Field::WaterConsumption => self.water_consumption.map(FieldValue::Volume),
            Field::PaymentUrl => self.payment_url.clone().map(FieldValue::Url),
        }
    }

    /// All fields with their values, in display order.
    pub fn iter(&self) -> impl Iterator<Item = (Field, Option<FieldValue>)> + '_ {
        Field::ALL.into_iter().map(|f| (f, self.get(f)))
    }

    /// Fields that came back empty this cycle.
    pub fn missing(&self) -> Vec<Field> {
        self.iter()
            .filter(|(_, v)| v.is_none())
            .map(|(f, _)| f)
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }
}

/// Errors raised by the portal client.
#[derive(thiserror::Error, Debug)]
pub enum ScometError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("HTTP {status} fetching {url}")]
    Fetch { status: u16, url: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Could not extract {field}: {reason}")]
    Extraction { field: Field, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ScometError {
    pub(crate) fn extraction(field: Field, reason: impl Into<String>) -> Self {
        ScometError::Extraction {
            field,
            reason: reason.into(),
        }
    }

    /// Whether the portal rejected the session cookie for this request.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ScometError::Fetch { status: 401 | 403, .. })
    }
}

/// Convenience result type.
pub type ScometResult<T> = Result<T, ScometError>;
