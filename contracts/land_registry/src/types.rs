use soroban_sdk::{contracterror, contracttype, symbol_short, Address, String, Symbol};

#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PropertyType {
    Residential,
    Commercial,
    Industrial,
    Agricultural,
    Forest,
    Other,
}

#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PropertyStatus {
    Active,
    Disputed,
    Frozen,
    Transferred,
}

/// Fixed permission groups. Admin also manages the other three.
#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Role {
    Admin,
    Notary,
    Surveyor,
    TaxAuthority,
}

// Role names as stored by the access-control module. They must match the
// literals in the `#[only_role]` guards in lib.rs.
pub const ADMIN: Symbol = symbol_short!("admin");
pub const NOTARY: Symbol = symbol_short!("notary");
pub const SURVEYOR: Symbol = symbol_short!("surveyor");
pub const TAX_AUTHORITY: Symbol = symbol_short!("tax_auth");

impl Role {
    pub fn symbol(self) -> Symbol {
        match self {
            Role::Admin => ADMIN,
            Role::Notary => NOTARY,
            Role::Surveyor => SURVEYOR,
            Role::TaxAuthority => TAX_AUTHORITY,
        }
    }
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Property {
    pub id: u32,
    pub owner: Address,
    pub location: String,
    pub coordinates: String,     // GPS pair or GeoJSON text
    pub area: u64,               // square metres
    pub value: i128,             // stroops
    pub property_type: PropertyType,
    pub status: PropertyStatus,
    pub registration_ts: u64,    // unix seconds
    pub last_transfer_ts: u64,
    pub document_hash: String,   // IPFS content address
    pub registrar: Address,
    pub verified: bool,
}

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum Error {
    AlreadyInitialized = 1,
    PropertyNotFound = 2,
    EmptyLocation = 3,
    ZeroArea = 4,
    InvalidValue = 5,
    LocationTaken = 6,
    SelfTransfer = 7,
    PropertyNotActive = 8,
    InvalidStatus = 9,
    AdminSelfRevoke = 10,
}
