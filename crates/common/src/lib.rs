//! Shared building blocks for the salon booking core.

pub mod clock;
pub mod money;
pub mod types;
pub mod version;

pub use clock::{Clock, ManualClock, SystemClock};
pub use money::Money;
pub use types::{
    AccountId, DiscountId, InviteId, OtpCodeId, PaymentId, ReferralId, ReferralProfileId,
    ReservationId, StaffLinkId,
};
pub use version::Version;
