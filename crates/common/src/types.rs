use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! typed_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

typed_id!(
    /// Identifier of an account in the identity store.
    ///
    /// Every other record refers to its owner through this opaque value; the
    /// phone number is never used as a foreign key.
    AccountId
);

typed_id!(
    /// Identifier of a reservation.
    ReservationId
);

typed_id!(
    /// Identifier of a payment row.
    PaymentId
);

typed_id!(
    /// Identifier of a discount.
    DiscountId
);

typed_id!(
    /// Identifier of a referral profile.
    ReferralProfileId
);

typed_id!(
    /// Identifier of a recorded inviter → invitee edge.
    ReferralId
);

typed_id!(
    /// Identifier of a stored one-time code.
    OtpCodeId
);

typed_id!(
    /// Identifier of a coworker invitation issued by a manager.
    InviteId
);

typed_id!(
    /// Identifier of a manager → coworker edge.
    StaffLinkId
);
