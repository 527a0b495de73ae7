use soroban_sdk::{Address, Env, String, Symbol};
use crate::types::PropertyStatus;

// Topic layout: (event name, token id) so indexers can filter by id.
// Role, pause and NFT mint events come from the OpenZeppelin modules.

pub fn property_registered(e: &Env, id: u32, owner: &Address, location: &String) {
    e.events().publish(
        (Symbol::new(e, "PropertyRegistered"), id),
        (owner.clone(), location.clone()),
    );
}

pub fn property_transferred(e: &Env, id: u32, from: &Address, to: &Address, value: i128) {
    e.events().publish(
        (Symbol::new(e, "PropertyTransferred"), id),
        (from.clone(), to.clone(), value),
    );
}

pub fn property_verified(e: &Env, id: u32, surveyor: &Address, verified: bool) {
    e.events().publish(
        (Symbol::new(e, "PropertyVerified"), id),
        (surveyor.clone(), verified),
    );
}

pub fn property_value_updated(e: &Env, id: u32, old_value: i128, new_value: i128) {
    e.events().publish(
        (Symbol::new(e, "PropertyValueUpdated"), id),
        (old_value, new_value),
    );
}

pub fn property_status_changed(e: &Env, id: u32, old: PropertyStatus, new: PropertyStatus) {
    e.events().publish(
        (Symbol::new(e, "PropertyStatusChanged"), id),
        (old, new),
    );
}
