//! Names of the uniqueness and exclusion constraints the store enforces.
//!
//! The Postgres schema declares constraints with exactly these names and the
//! in-memory store reports violations with the same values, so callers can
//! branch on them regardless of backend.

pub const ACCOUNTS_PHONE: &str = "accounts_phone_key";
pub const RESERVATIONS_NO_OVERLAP: &str = "reservations_no_overlap";
pub const PAYMENTS_RESERVATION: &str = "payments_reservation_id_key";
pub const REFERRAL_PROFILES_ACCOUNT: &str = "referral_profiles_account_id_key";
pub const REFERRAL_PROFILES_CODE: &str = "referral_profiles_code_key";
pub const REFERRALS_INVITEE: &str = "referrals_invitee_id_key";
pub const COWORKER_INVITES_CODE: &str = "coworker_invites_code_key";
pub const STAFF_LINKS_PAIR: &str = "staff_links_manager_id_coworker_id_key";
pub const PRIMARY_KEY: &str = "pkey";

/// Every named uniqueness constraint, used to map database errors.
pub const UNIQUE: &[&str] = &[
    ACCOUNTS_PHONE,
    PAYMENTS_RESERVATION,
    REFERRAL_PROFILES_ACCOUNT,
    REFERRAL_PROFILES_CODE,
    REFERRALS_INVITEE,
    COWORKER_INVITES_CODE,
    STAFF_LINKS_PAIR,
];

/// Maps a constraint name reported by the database to its constant.
pub fn lookup(name: &str) -> Option<&'static str> {
    if name.ends_with("_pkey") {
        return Some(PRIMARY_KEY);
    }
    UNIQUE.iter().copied().find(|known| *known == name)
}
