#![no_std]
use soroban_sdk::{contract, contractimpl, log, Address, Env, String, Vec};
use stellar_access::access_control;
use stellar_contract_utils::pausable;
use stellar_macros::{only_role, when_not_paused};
use stellar_tokens::non_fungible::{enumerable::Enumerable, Base};

mod events;
mod storage;
mod types;

pub use types::{Error, Property, PropertyStatus, PropertyType, Role};

#[contract]
pub struct LandRegistry;

#[contractimpl]
impl LandRegistry {
    /// One-time initializer. `admin` becomes the access-control admin and
    /// holds the Admin role.
    pub fn initialize(e: &Env, admin: Address, name: String, symbol: String) -> Result<(), Error> {
        if access_control::get_admin(e).is_some() {
            return Err(Error::AlreadyInitialized);
        }
        admin.require_auth();

        access_control::set_admin(e, &admin);
        access_control::grant_role_no_auth(e, &admin, &admin, &types::ADMIN);
        Base::set_metadata(e, String::from_str(e, "ipfs://"), name, symbol);
        storage::bump_instance(e);
        Ok(())
    }

    // ---- roles ----

    #[only_role(admin, "admin")]
    pub fn grant_role(e: &Env, admin: Address, account: Address, role: Role) {
        access_control::grant_role_no_auth(e, &admin, &account, &role.symbol());
    }

    /// Admins cannot drop their own Admin role, so at least one admin
    /// always remains.
    #[only_role(admin, "admin")]
    pub fn revoke_role(e: &Env, admin: Address, account: Address, role: Role) -> Result<(), Error> {
        if role == Role::Admin && admin == account {
            return Err(Error::AdminSelfRevoke);
        }
        access_control::revoke_role_no_auth(e, &admin, &account, &role.symbol());
        Ok(())
    }

    pub fn has_role(e: &Env, account: Address, role: Role) -> bool {
        access_control::has_role(e, &account, &role.symbol()).is_some()
    }

    // ---- emergency stop ----

    #[only_role(admin, "admin")]
    pub fn pause(e: &Env, admin: Address) {
        pausable::pause(e);
        log!(e, "registry paused by", admin);
    }

    #[only_role(admin, "admin")]
    pub fn unpause(e: &Env, admin: Address) {
        pausable::unpause(e);
    }

    pub fn paused(e: &Env) -> bool {
        pausable::paused(e)
    }

    // ---- property mutations ----

    /// Mint a new parcel token to `owner`. Notary only.
    #[allow(clippy::too_many_arguments)]
    #[only_role(notary, "notary")]
    #[when_not_paused]
    pub fn register_property(
        e: &Env,
        notary: Address,
        owner: Address,
        location: String,
        coordinates: String,
        area: u64,
        value: i128,
        property_type: PropertyType,
        document_hash: String,
    ) -> Result<u32, Error> {
        if location.len() == 0 { return Err(Error::EmptyLocation); }
        if area == 0 { return Err(Error::ZeroArea); }
        if value < 0 { return Err(Error::InvalidValue); }
        if storage::location_owner(e, &location).is_some() {
            return Err(Error::LocationTaken);
        }

        let id = storage::next_id(e);
        let now = e.ledger().timestamp();
        let property = Property {
            id,
            owner: owner.clone(),
            location: location.clone(),
            coordinates,
            area,
            value,
            property_type,
            status: PropertyStatus::Active,
            registration_ts: now,
            last_transfer_ts: now,
            document_hash,
            registrar: notary,
            verified: false,
        };
        Enumerable::non_sequential_mint(e, &owner, id);
        storage::put_property(e, &property);
        storage::claim_location(e, &location, id);
        storage::bump_instance(e);

        log!(e, "property minted", id);
        events::property_registered(e, id, &owner, &location);
        Ok(id)
    }

    /// Move a parcel to `new_owner` at `new_value`. Notary only; the
    /// parcel must be Active. The owner does not sign.
    #[only_role(notary, "notary")]
    #[when_not_paused]
    pub fn transfer_property(
        e: &Env,
        notary: Address,
        id: u32,
        new_owner: Address,
        new_value: i128,
    ) -> Result<(), Error> {
        let mut p = storage::get_property(e, id).ok_or(Error::PropertyNotFound)?;
        if p.status != PropertyStatus::Active { return Err(Error::PropertyNotActive); }
        if p.owner == new_owner { return Err(Error::SelfTransfer); }
        if new_value < 0 { return Err(Error::InvalidValue); }

        // Same sequence as Enumerable::transfer, minus the owner's auth.
        let from = p.owner.clone();
        Base::update(e, Some(&from), Some(&new_owner), id);
        Enumerable::remove_from_owner_enumeration(e, &from, id);
        Enumerable::add_to_owner_enumeration(e, &new_owner, id);

        p.status = PropertyStatus::Transferred;
        p.owner = new_owner.clone();
        p.value = new_value;
        p.last_transfer_ts = e.ledger().timestamp();
        storage::put_property(e, &p);
        log!(e, "property transferred by", notary);
        events::property_transferred(e, id, &from, &new_owner, new_value);

        // Transferred never outlives the invocation.
        p.status = PropertyStatus::Active;
        storage::put_property(e, &p);
        Ok(())
    }

    /// Set the surveyor verification flag. Repeating a value is a no-op
    /// that still succeeds.
    #[only_role(surveyor, "surveyor")]
    #[when_not_paused]
    pub fn verify_property(e: &Env, surveyor: Address, id: u32, verified: bool) -> Result<(), Error> {
        let mut p = storage::get_property(e, id).ok_or(Error::PropertyNotFound)?;
        if p.verified != verified {
            p.verified = verified;
            storage::put_property(e, &p);
        }

        events::property_verified(e, id, &surveyor, verified);
        Ok(())
    }

    #[only_role(tax_authority, "tax_auth")]
    #[when_not_paused]
    pub fn update_property_value(
        e: &Env,
        tax_authority: Address,
        id: u32,
        value: i128,
    ) -> Result<(), Error> {
        if value < 0 { return Err(Error::InvalidValue); }

        let mut p = storage::get_property(e, id).ok_or(Error::PropertyNotFound)?;
        let old = p.value;
        p.value = value;
        storage::put_property(e, &p);

        events::property_value_updated(e, id, old, value);
        Ok(())
    }

    /// Admin status change. Transferred is transitional and cannot be set
    /// directly.
    #[only_role(admin, "admin")]
    #[when_not_paused]
    pub fn change_property_status(
        e: &Env,
        admin: Address,
        id: u32,
        status: PropertyStatus,
    ) -> Result<(), Error> {
        if status == PropertyStatus::Transferred { return Err(Error::InvalidStatus); }

        let mut p = storage::get_property(e, id).ok_or(Error::PropertyNotFound)?;
        let old = p.status;
        p.status = status;
        storage::put_property(e, &p);

        events::property_status_changed(e, id, old, status);
        Ok(())
    }

    // ---- reads ----

    pub fn get_property(e: &Env, id: u32) -> Result<Property, Error> {
        storage::get_property(e, id).ok_or(Error::PropertyNotFound)
    }

    pub fn owner_of(e: &Env, id: u32) -> Result<Address, Error> {
        if storage::get_property(e, id).is_none() {
            return Err(Error::PropertyNotFound);
        }
        Ok(Base::owner_of(e, id))
    }

    pub fn properties_of(e: &Env, owner: Address) -> Vec<u32> {
        let mut ids = Vec::new(e);
        for i in 0..Base::balance(e, &owner) {
            ids.push_back(Enumerable::get_owner_token_id(e, &owner, i));
        }
        ids
    }

    pub fn balance_of(e: &Env, owner: Address) -> u32 {
        Base::balance(e, &owner)
    }

    pub fn total_properties(e: &Env) -> u32 {
        Enumerable::total_supply(e)
    }

    pub fn location_taken(e: &Env, location: String) -> bool {
        storage::location_owner(e, &location).is_some()
    }

    pub fn name(e: &Env) -> String {
        Base::name(e)
    }

    pub fn symbol(e: &Env) -> String {
        Base::symbol(e)
    }
}
