//! Applies ledger events to the local store.
//!
//! Every write to a property goes through [`Mirror::apply`] or
//! [`Mirror::amend`], which enforce the same invariants the contract does,
//! so a replayed event stream and the REST write path converge on one
//! state.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::geo::{Coordinates, Geometry};
use crate::model::{HistoryEntry, HistoryKind, PropertyRecord, PropertyStatus, PropertyType};
use crate::store::{Store, StoreError};

#[derive(Error, Debug)]
pub enum MirrorError {
    #[error("property {0} not found")]
    NotFound(u64),

    #[error("property {0} is already registered")]
    TokenExists(u64),

    #[error("location {0:?} is already registered")]
    LocationTaken(String),

    #[error("new owner is the current owner")]
    SelfTransfer,

    #[error("property is {} and cannot be transferred", .0.display())]
    NotActive(PropertyStatus),

    #[error("TRANSFERRED cannot be set directly")]
    InvalidStatus,

    #[error("{0}")]
    Invalid(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Registry state changes, one per contract event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEvent {
    Registered {
        token_id: u64,
        owner: String,
        registrar: Option<String>,
        location: String,
        coordinates: Option<Coordinates>,
        area: f64,
        value: i64,
        property_type: PropertyType,
        document_hash: Option<String>,
    },
    Transferred {
        token_id: u64,
        from: Option<String>,
        to: String,
        value: Option<i64>,
    },
    Verified {
        token_id: u64,
        surveyor: String,
        verified: bool,
    },
    ValueUpdated {
        token_id: u64,
        value: i64,
    },
    StatusChanged {
        token_id: u64,
        status: PropertyStatus,
    },
}

impl LedgerEvent {
    pub fn token_id(&self) -> u64 {
        match self {
            LedgerEvent::Registered { token_id, .. }
            | LedgerEvent::Transferred { token_id, .. }
            | LedgerEvent::Verified { token_id, .. }
            | LedgerEvent::ValueUpdated { token_id, .. }
            | LedgerEvent::StatusChanged { token_id, .. } => *token_id,
        }
    }
}

/// A ledger event as delivered by an indexer.
#[derive(Debug, Clone, Deserialize)]
pub struct EventEnvelope {
    pub tx_hash: Option<String>,
    pub ledger: Option<u32>,
    pub event: LedgerEvent,
}

#[derive(Clone)]
pub struct Mirror {
    store: Store,
}

impl Mirror {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn apply(
        &self,
        event: LedgerEvent,
        tx_hash: Option<String>,
    ) -> Result<PropertyRecord, MirrorError> {
        let token_id = event.token_id();
        debug!(token_id, ?tx_hash, "applying ledger event");
        match event {
            LedgerEvent::Registered {
                token_id,
                owner,
                registrar,
                location,
                coordinates,
                area,
                value,
                property_type,
                document_hash,
            } => {
                // Uniqueness is on the exact chain string.
                if location.is_empty() {
                    return Err(MirrorError::Invalid("location must not be empty".into()));
                }
                if !(area > 0.0) {
                    return Err(MirrorError::Invalid("area must be positive".into()));
                }
                if value < 0 {
                    return Err(MirrorError::Invalid("value must not be negative".into()));
                }
                let coordinates = match coordinates {
                    Some(c) => c.resolve().map_err(MirrorError::Invalid)?,
                    None => None,
                };

                let now = Utc::now();
                let record = PropertyRecord {
                    id: Uuid::new_v4(),
                    token_id,
                    owner_address: owner.clone(),
                    location,
                    coordinates,
                    area,
                    value,
                    property_type,
                    status: PropertyStatus::Active,
                    registration_date: now,
                    last_transfer_date: None,
                    document_hash,
                    registrar_address: registrar.clone(),
                    is_verified: false,
                    verified_by: None,
                    verification_date: None,
                    created_at: now,
                    updated_at: now,
                };
                let mut entry = HistoryEntry::new(HistoryKind::Registered, tx_hash);
                entry.from_address = registrar;
                entry.to_address = Some(owner);
                entry.value = Some(value);

                self.store
                    .insert_property(&record, &entry, |existing, holder| {
                        if existing.is_some() {
                            return Err(MirrorError::TokenExists(token_id));
                        }
                        if holder.is_some() {
                            return Err(MirrorError::LocationTaken(record.location.clone()));
                        }
                        Ok(())
                    })?;
                info!(token_id, owner = %record.owner_address, "property registered");
                Ok(record)
            }

            LedgerEvent::Transferred { token_id, from, to, value } => {
                if matches!(value, Some(v) if v < 0) {
                    return Err(MirrorError::Invalid("value must not be negative".into()));
                }
                let record = self.update(token_id, |rec| {
                    if rec.status != PropertyStatus::Active {
                        return Err(MirrorError::NotActive(rec.status));
                    }
                    if rec.owner_address == to {
                        return Err(MirrorError::SelfTransfer);
                    }
                    if let Some(from) = &from {
                        if *from != rec.owner_address {
                            return Err(MirrorError::Invalid(format!(
                                "{from} does not own property {token_id}"
                            )));
                        }
                    }
                    let now = Utc::now();
                    let mut entry = HistoryEntry::new(HistoryKind::Transferred, tx_hash);
                    entry.from_address = Some(std::mem::replace(&mut rec.owner_address, to));
                    entry.to_address = Some(rec.owner_address.clone());
                    if let Some(v) = value {
                        rec.value = v;
                    }
                    entry.value = Some(rec.value);
                    rec.last_transfer_date = Some(now);
                    rec.updated_at = now;
                    Ok(vec![entry])
                })?;
                info!(token_id, owner = %record.owner_address, "property transferred");
                Ok(record)
            }

            LedgerEvent::Verified { token_id, surveyor, verified } => {
                self.update(token_id, |rec| {
                    if rec.is_verified == verified {
                        return Ok(Vec::new());
                    }
                    let now = Utc::now();
                    rec.is_verified = verified;
                    rec.verified_by = verified.then(|| surveyor.clone());
                    rec.verification_date = verified.then_some(now);
                    rec.updated_at = now;
                    let mut entry = HistoryEntry::new(HistoryKind::Verified, tx_hash);
                    entry.from_address = Some(surveyor);
                    entry.details = Some(serde_json::json!({ "verified": verified }));
                    Ok(vec![entry])
                })
            }

            LedgerEvent::ValueUpdated { token_id, value } => {
                check_value(value)?;
                self.update(token_id, |rec| Ok(vec![revalue(rec, value, tx_hash)]))
            }

            LedgerEvent::StatusChanged { token_id, status } => {
                check_status(status)?;
                self.update(token_id, |rec| Ok(vec![restatus(rec, status, tx_hash)]))
            }
        }
    }

    /// Apply a PATCH in one store transaction: either every field lands,
    /// with its history entries, or none does. Coordinates are off-chain
    /// data and leave no history.
    pub fn amend(
        &self,
        token_id: u64,
        amendment: Amendment,
        tx_hash: Option<String>,
    ) -> Result<PropertyRecord, MirrorError> {
        let Amendment { coordinates, value, status } = amendment;
        if let Some(g) = &coordinates {
            g.validate().map_err(MirrorError::Invalid)?;
        }
        if let Some(v) = value {
            check_value(v)?;
        }
        if let Some(s) = status {
            check_status(s)?;
        }
        self.update(token_id, |rec| {
            let mut entries = Vec::new();
            if let Some(g) = coordinates {
                rec.coordinates = Some(g);
                rec.updated_at = Utc::now();
            }
            if let Some(v) = value {
                entries.push(revalue(rec, v, tx_hash.clone()));
            }
            if let Some(s) = status {
                entries.push(restatus(rec, s, tx_hash));
            }
            Ok(entries)
        })
    }

    fn update<F>(&self, token_id: u64, f: F) -> Result<PropertyRecord, MirrorError>
    where
        F: FnOnce(&mut PropertyRecord) -> Result<Vec<HistoryEntry>, MirrorError>,
    {
        self.store
            .update_property(token_id, f)?
            .ok_or(MirrorError::NotFound(token_id))
    }
}

/// Fields a PATCH may change together.
#[derive(Debug, Default)]
pub struct Amendment {
    pub coordinates: Option<Geometry>,
    pub value: Option<i64>,
    pub status: Option<PropertyStatus>,
}

fn check_value(value: i64) -> Result<(), MirrorError> {
    if value < 0 {
        return Err(MirrorError::Invalid("value must not be negative".into()));
    }
    Ok(())
}

fn check_status(status: PropertyStatus) -> Result<(), MirrorError> {
    if status == PropertyStatus::Transferred {
        return Err(MirrorError::InvalidStatus);
    }
    Ok(())
}

fn revalue(rec: &mut PropertyRecord, value: i64, tx_hash: Option<String>) -> HistoryEntry {
    let old = std::mem::replace(&mut rec.value, value);
    rec.updated_at = Utc::now();
    let mut entry = HistoryEntry::new(HistoryKind::ValueUpdated, tx_hash);
    entry.value = Some(value);
    entry.details = Some(serde_json::json!({ "old_value": old }));
    entry
}

fn restatus(rec: &mut PropertyRecord, status: PropertyStatus, tx_hash: Option<String>) -> HistoryEntry {
    let old = std::mem::replace(&mut rec.status, status);
    rec.updated_at = Utc::now();
    let mut entry = HistoryEntry::new(HistoryKind::StatusChanged, tx_hash);
    entry.details = Some(serde_json::json!({ "old": old, "new": status }));
    entry
}
