//! Records kept in the mirror store and the views rendered from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::Geometry;

/// One stroop is 10^-7 of the chain's native unit.
pub const STROOPS_PER_UNIT: i64 = 10_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PropertyType {
    Residential,
    Commercial,
    Industrial,
    Agricultural,
    Forest,
    Other,
}

impl PropertyType {
    pub const ALL: [PropertyType; 6] = [
        PropertyType::Residential,
        PropertyType::Commercial,
        PropertyType::Industrial,
        PropertyType::Agricultural,
        PropertyType::Forest,
        PropertyType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyType::Residential => "RESIDENTIAL",
            PropertyType::Commercial => "COMMERCIAL",
            PropertyType::Industrial => "INDUSTRIAL",
            PropertyType::Agricultural => "AGRICULTURAL",
            PropertyType::Forest => "FOREST",
            PropertyType::Other => "OTHER",
        }
    }

    pub fn display(&self) -> &'static str {
        match self {
            PropertyType::Residential => "Residential",
            PropertyType::Commercial => "Commercial",
            PropertyType::Industrial => "Industrial",
            PropertyType::Agricultural => "Agricultural",
            PropertyType::Forest => "Forest",
            PropertyType::Other => "Other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PropertyStatus {
    Active,
    Disputed,
    Frozen,
    Transferred,
}

impl PropertyStatus {
    pub const ALL: [PropertyStatus; 4] = [
        PropertyStatus::Active,
        PropertyStatus::Disputed,
        PropertyStatus::Frozen,
        PropertyStatus::Transferred,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyStatus::Active => "ACTIVE",
            PropertyStatus::Disputed => "DISPUTED",
            PropertyStatus::Frozen => "FROZEN",
            PropertyStatus::Transferred => "TRANSFERRED",
        }
    }

    pub fn display(&self) -> &'static str {
        match self {
            PropertyStatus::Active => "Active",
            PropertyStatus::Disputed => "Disputed",
            PropertyStatus::Frozen => "Frozen",
            PropertyStatus::Transferred => "Transferred",
        }
    }
}

/// Mirrored copy of an on-chain parcel. `token_id` is the chain identity,
/// `id` the row identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyRecord {
    pub id: Uuid,
    pub token_id: u64,
    pub owner_address: String,
    pub location: String,
    pub coordinates: Option<Geometry>,
    pub area: f64,
    pub value: i64,
    pub property_type: PropertyType,
    pub status: PropertyStatus,
    pub registration_date: DateTime<Utc>,
    pub last_transfer_date: Option<DateTime<Utc>>,
    pub document_hash: Option<String>,
    pub registrar_address: Option<String>,
    pub is_verified: bool,
    pub verified_by: Option<String>,
    pub verification_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PropertyRecord {
    pub fn area_formatted(&self) -> String {
        format_area(self.area)
    }

    pub fn value_formatted(&self) -> String {
        format_value(self.value)
    }

    pub fn into_view(self) -> PropertyView {
        PropertyView {
            area_formatted: self.area_formatted(),
            value_formatted: self.value_formatted(),
            type_display: self.property_type.display(),
            status_display: self.status.display(),
            record: self,
        }
    }

    pub fn to_feature(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "Feature",
            "id": self.token_id,
            "properties": {
                "token_id": self.token_id,
                "location": self.location,
                "area": self.area,
                "value": self.value,
                "property_type": self.property_type,
                "status": self.status,
                "is_verified": self.is_verified,
                "owner_address": self.owner_address,
            },
            "geometry": self.coordinates,
        })
    }
}

/// API rendering of a property with display helpers.
#[derive(Debug, Serialize)]
pub struct PropertyView {
    #[serde(flatten)]
    pub record: PropertyRecord,
    pub area_formatted: String,
    pub value_formatted: String,
    pub type_display: &'static str,
    pub status_display: &'static str,
}

/// Square metres, switching to hectares from 1 ha upward.
pub fn format_area(area: f64) -> String {
    if area >= 10_000.0 {
        format!("{:.2} ha", area / 10_000.0)
    } else {
        format!("{} m²", area)
    }
}

pub fn format_value(stroops: i64) -> String {
    let sign = if stroops < 0 { "-" } else { "" };
    let abs = stroops.unsigned_abs();
    let unit = STROOPS_PER_UNIT as u64;
    let whole = abs / unit;
    let cents = (abs % unit) / (unit / 100);
    format!("{sign}{}.{cents:02} XLM", group_thousands(whole))
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Citizen,
    Notary,
    Surveyor,
    TaxAuthority,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub wallet_address: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    pub fn citizen(wallet_address: String) -> Self {
        Self {
            wallet_address,
            first_name: None,
            last_name: None,
            email: None,
            phone: None,
            role: Role::Citizen,
            is_active: true,
            created_at: Utc::now(),
            updated_at: None,
            last_login: None,
        }
    }

    pub fn full_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => format!("{first} {last}"),
            _ => {
                let short: String = self.wallet_address.chars().take(10).collect();
                format!("{short}...")
            }
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        let mut v = serde_json::to_value(self).unwrap_or_default();
        if let Some(obj) = v.as_object_mut() {
            obj.insert("full_name".into(), self.full_name().into());
        }
        v
    }
}

/// Outstanding sign-in challenge for a wallet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
    pub nonce: String,
    pub message: String,
    pub issued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentType {
    TitleDeed,
    SurveyReport,
    Valuation,
    LegalDocument,
    Photo,
    Map,
    Contract,
    Other,
}

impl DocumentType {
    pub const ALL: [DocumentType; 8] = [
        DocumentType::TitleDeed,
        DocumentType::SurveyReport,
        DocumentType::Valuation,
        DocumentType::LegalDocument,
        DocumentType::Photo,
        DocumentType::Map,
        DocumentType::Contract,
        DocumentType::Other,
    ];

    pub fn display(&self) -> &'static str {
        match self {
            DocumentType::TitleDeed => "Title deed",
            DocumentType::SurveyReport => "Survey report",
            DocumentType::Valuation => "Valuation",
            DocumentType::LegalDocument => "Legal document",
            DocumentType::Photo => "Photo",
            DocumentType::Map => "Map",
            DocumentType::Contract => "Sale contract",
            DocumentType::Other => "Other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub property_token_id: u64,
    pub filename: String,
    pub mime_type: String,
    pub size: u64,
    pub sha256: String,
    pub ipfs_hash: String,
    pub document_type: DocumentType,
    pub uploaded_by: String,
    pub uploaded_at: DateTime<Utc>,
    pub verified: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryKind {
    Registered,
    Transferred,
    Verified,
    ValueUpdated,
    StatusChanged,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub event_type: HistoryKind,
    pub from_address: Option<String>,
    pub to_address: Option<String>,
    pub value: Option<i64>,
    pub transaction_hash: Option<String>,
    pub details: Option<serde_json::Value>,
}

impl HistoryEntry {
    pub fn new(event_type: HistoryKind, transaction_hash: Option<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            event_type,
            from_address: None,
            to_address: None,
            value: None,
            transaction_hash,
            details: None,
        }
    }
}
