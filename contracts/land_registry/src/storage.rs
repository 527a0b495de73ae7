use soroban_sdk::{contracttype, symbol_short, Env, String, Symbol};
use crate::types::Property;

// Ownership, roles and the pause flag live in the OpenZeppelin modules.
// This file only keeps the parcel records and the location index.

// ~30 days at 5s ledgers
const DAY_IN_LEDGERS: u32 = 17_280;
pub const BUMP_AMOUNT: u32 = 30 * DAY_IN_LEDGERS;
pub const BUMP_THRESHOLD: u32 = BUMP_AMOUNT - DAY_IN_LEDGERS;

pub fn k_next() -> Symbol { symbol_short!("next") }

#[contracttype]
#[derive(Clone)]
pub enum DataKey {
    Property(u32),
    Location(String),       // token id holding this location
}

pub fn bump_instance(e: &Env) {
    e.storage().instance().extend_ttl(BUMP_THRESHOLD, BUMP_AMOUNT);
}

/// Last issued token id; 0 before the first mint.
pub fn last_id(e: &Env) -> u32 {
    e.storage().instance().get(&k_next()).unwrap_or(0)
}

pub fn next_id(e: &Env) -> u32 {
    let n = last_id(e) + 1;
    e.storage().instance().set(&k_next(), &n);
    n
}

pub fn get_property(e: &Env, id: u32) -> Option<Property> {
    let key = DataKey::Property(id);
    let p = e.storage().persistent().get(&key);
    if p.is_some() {
        e.storage().persistent().extend_ttl(&key, BUMP_THRESHOLD, BUMP_AMOUNT);
    }
    p
}

pub fn put_property(e: &Env, p: &Property) {
    let key = DataKey::Property(p.id);
    e.storage().persistent().set(&key, p);
    e.storage().persistent().extend_ttl(&key, BUMP_THRESHOLD, BUMP_AMOUNT);
}

pub fn location_owner(e: &Env, location: &String) -> Option<u32> {
    e.storage().persistent().get(&DataKey::Location(location.clone()))
}

pub fn claim_location(e: &Env, location: &String, id: u32) {
    let key = DataKey::Location(location.clone());
    e.storage().persistent().set(&key, &id);
    e.storage().persistent().extend_ttl(&key, BUMP_THRESHOLD, BUMP_AMOUNT);
}
