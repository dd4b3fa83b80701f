use std::str::FromStr;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use common::{
    AccountId, DiscountId, InviteId, Money, OtpCodeId, PaymentId, ReferralId, ReferralProfileId,
    ReservationId, StaffLinkId, Version,
};
use domain::{
    Account, CoworkerInvite, Discount, DiscountValue, DomainError, OtpCode, Payment, PhoneNumber,
    Referral, ReferralCode, ReferralProfile, Reservation, StaffLink, TimeSlot,
};
use sqlx::postgres::{PgQueryResult, PgRow};
use sqlx::{PgConnection, PgPool, Row};
use uuid::Uuid;

use crate::constraints;
use crate::store::{BookingStore, Change, Record, UnitOfWork};
use crate::{Result, StoreError};

const ACCOUNT_COLUMNS: &str =
    "id, phone, first_name, last_name, role, active, created_at, version";
const RESERVATION_COLUMNS: &str = "id, account_id, coworker_id, service_type, day, start_time, \
     end_time, status, billing_status, note, created_at, updated_at, version";
const PAYMENT_COLUMNS: &str =
    "id, account_id, reservation_id, amount, kind, status, created_at, version";
const DISCOUNT_COLUMNS: &str =
    "id, account_id, kind, percentage, fixed_amount, used, expires_at, created_at, version";
const PROFILE_COLUMNS: &str =
    "id, account_id, code, invited_count, rewards_issued, created_at, version";
const REFERRAL_COLUMNS: &str = "id, inviter_id, invitee_id, code, created_at";
const OTP_COLUMNS: &str = "id, phone, code, expires_at, consumed, created_at, version";
const INVITE_COLUMNS: &str =
    "id, manager_id, code, accepted_by, created_at, accepted_at, version";
const STAFF_LINK_COLUMNS: &str = "id, manager_id, coworker_id, invite_id, created_at";

/// PostgreSQL-backed booking store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn fetch_one_opt<T>(
        &self,
        sql: String,
        id: Uuid,
        map: fn(PgRow) -> Result<T>,
    ) -> Result<Option<T>> {
        sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(map)
            .transpose()
    }

    async fn fetch_all_by<T>(
        &self,
        sql: String,
        id: Uuid,
        map: fn(PgRow) -> Result<T>,
    ) -> Result<Vec<T>> {
        sqlx::query(&sql)
            .bind(id)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(map)
            .collect()
    }
}

fn decode<T, E: std::fmt::Display>(
    table: &'static str,
    value: std::result::Result<T, E>,
) -> Result<T> {
    value.map_err(|e| StoreError::Decode {
        table,
        reason: e.to_string(),
    })
}

fn parse_enum<T>(table: &'static str, row: &PgRow, column: &str) -> Result<T>
where
    T: FromStr<Err = DomainError>,
{
    let raw: String = row.try_get(column)?;
    decode(table, raw.parse())
}

fn count(table: &'static str, value: i32) -> Result<u32> {
    decode(table, u32::try_from(value))
}

fn count_column(table: &'static str, value: u32) -> Result<i32> {
    decode(table, i32::try_from(value))
}

fn row_to_account(row: PgRow) -> Result<Account> {
    let phone: String = row.try_get("phone")?;
    Ok(Account {
        id: AccountId::from_uuid(row.try_get("id")?),
        phone: decode("accounts", PhoneNumber::parse(&phone))?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        role: parse_enum("accounts", &row, "role")?,
        active: row.try_get("active")?,
        created_at: row.try_get("created_at")?,
        version: Version::new(row.try_get("version")?),
    })
}

fn row_to_reservation(row: PgRow) -> Result<Reservation> {
    let start: NaiveTime = row.try_get("start_time")?;
    let end: NaiveTime = row.try_get("end_time")?;
    let coworker: Option<Uuid> = row.try_get("coworker_id")?;
    Ok(Reservation {
        id: ReservationId::from_uuid(row.try_get("id")?),
        account_id: AccountId::from_uuid(row.try_get("account_id")?),
        coworker_id: coworker.map(AccountId::from_uuid),
        service_type: row.try_get("service_type")?,
        date: row.try_get("day")?,
        slot: decode("reservations", TimeSlot::new(start, end))?,
        status: parse_enum("reservations", &row, "status")?,
        billing_status: parse_enum("reservations", &row, "billing_status")?,
        note: row.try_get("note")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        version: Version::new(row.try_get("version")?),
    })
}

fn row_to_payment(row: PgRow) -> Result<Payment> {
    Ok(Payment {
        id: PaymentId::from_uuid(row.try_get("id")?),
        account_id: AccountId::from_uuid(row.try_get("account_id")?),
        reservation_id: ReservationId::from_uuid(row.try_get("reservation_id")?),
        amount: Money::from_minor(row.try_get("amount")?),
        kind: parse_enum("payments", &row, "kind")?,
        status: parse_enum("payments", &row, "status")?,
        created_at: row.try_get("created_at")?,
        version: Version::new(row.try_get("version")?),
    })
}

fn row_to_discount(row: PgRow) -> Result<Discount> {
    let percentage: Option<i16> = row.try_get("percentage")?;
    let fixed: Option<i64> = row.try_get("fixed_amount")?;
    let value = match (percentage, fixed) {
        (Some(p), None) => DiscountValue::Percentage(decode("discounts", u8::try_from(p))?),
        (None, Some(amount)) => DiscountValue::Fixed(Money::from_minor(amount)),
        _ => {
            return Err(StoreError::Decode {
                table: "discounts",
                reason: "exactly one of percentage and fixed_amount must be set".to_string(),
            });
        }
    };
    Ok(Discount {
        id: DiscountId::from_uuid(row.try_get("id")?),
        account_id: AccountId::from_uuid(row.try_get("account_id")?),
        kind: parse_enum("discounts", &row, "kind")?,
        value,
        used: row.try_get("used")?,
        expires_at: row.try_get("expires_at")?,
        created_at: row.try_get("created_at")?,
        version: Version::new(row.try_get("version")?),
    })
}

fn row_to_profile(row: PgRow) -> Result<ReferralProfile> {
    let code: String = row.try_get("code")?;
    Ok(ReferralProfile {
        id: ReferralProfileId::from_uuid(row.try_get("id")?),
        account_id: AccountId::from_uuid(row.try_get("account_id")?),
        code: decode("referral_profiles", ReferralCode::parse(&code))?,
        invited_count: count("referral_profiles", row.try_get("invited_count")?)?,
        rewards_issued: count("referral_profiles", row.try_get("rewards_issued")?)?,
        created_at: row.try_get("created_at")?,
        version: Version::new(row.try_get("version")?),
    })
}

fn row_to_referral(row: PgRow) -> Result<Referral> {
    let code: String = row.try_get("code")?;
    Ok(Referral {
        id: ReferralId::from_uuid(row.try_get("id")?),
        inviter_id: AccountId::from_uuid(row.try_get("inviter_id")?),
        invitee_id: AccountId::from_uuid(row.try_get("invitee_id")?),
        code: decode("referrals", ReferralCode::parse(&code))?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_otp(row: PgRow) -> Result<OtpCode> {
    let phone: String = row.try_get("phone")?;
    Ok(OtpCode {
        id: OtpCodeId::from_uuid(row.try_get("id")?),
        phone: decode("otp_codes", PhoneNumber::parse(&phone))?,
        code: row.try_get("code")?,
        expires_at: row.try_get("expires_at")?,
        consumed: row.try_get("consumed")?,
        created_at: row.try_get("created_at")?,
        version: Version::new(row.try_get("version")?),
    })
}

fn row_to_invite(row: PgRow) -> Result<CoworkerInvite> {
    let accepted_by: Option<Uuid> = row.try_get("accepted_by")?;
    Ok(CoworkerInvite {
        id: InviteId::from_uuid(row.try_get("id")?),
        manager_id: AccountId::from_uuid(row.try_get("manager_id")?),
        code: row.try_get("code")?,
        accepted_by: accepted_by.map(AccountId::from_uuid),
        created_at: row.try_get("created_at")?,
        accepted_at: row.try_get("accepted_at")?,
        version: Version::new(row.try_get("version")?),
    })
}

fn row_to_staff_link(row: PgRow) -> Result<StaffLink> {
    Ok(StaffLink {
        id: StaffLinkId::from_uuid(row.try_get("id")?),
        manager_id: AccountId::from_uuid(row.try_get("manager_id")?),
        coworker_id: AccountId::from_uuid(row.try_get("coworker_id")?),
        invite_id: InviteId::from_uuid(row.try_get("invite_id")?),
        created_at: row.try_get("created_at")?,
    })
}

/// Maps constraint violations to their typed store errors.
fn write_error(error: sqlx::Error, reservation: Option<&Reservation>) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = error
        && let Some(name) = db_err.constraint()
    {
        if name == constraints::RESERVATIONS_NO_OVERLAP
            && let Some(reservation) = reservation
        {
            return StoreError::SlotTaken {
                date: reservation.date,
                slot: reservation.slot,
            };
        }
        if let Some(known) = constraints::lookup(name) {
            return StoreError::UniqueViolation(known);
        }
    }
    StoreError::Database(error)
}

/// Turns a zero-row update into a version conflict.
fn expect_updated<R: Record>(result: PgQueryResult, record: &R) -> Result<()> {
    if result.rows_affected() == 0 {
        return Err(StoreError::VersionConflict {
            entity: R::ENTITY,
            id: record.key().to_string(),
            expected: record.version(),
        });
    }
    Ok(())
}

fn discount_columns(value: &DiscountValue) -> (Option<i16>, Option<i64>) {
    match value {
        DiscountValue::Percentage(p) => (Some(i16::from(*p)), None),
        DiscountValue::Fixed(amount) => (None, Some(amount.minor())),
    }
}

async fn apply(conn: &mut PgConnection, change: Change) -> Result<()> {
    let first = Version::first().as_i64();

    match change {
        Change::InsertAccount(a) => {
            sqlx::query(
                r#"
                INSERT INTO accounts (id, phone, first_name, last_name, role, active, created_at, version)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(a.id.as_uuid())
            .bind(a.phone.as_str())
            .bind(&a.first_name)
            .bind(&a.last_name)
            .bind(a.role.as_str())
            .bind(a.active)
            .bind(a.created_at)
            .bind(first)
            .execute(&mut *conn)
            .await
            .map_err(|e| write_error(e, None))?;
        }
        Change::UpdateAccount(a) => {
            let result = sqlx::query(
                r#"
                UPDATE accounts
                SET phone = $3, first_name = $4, last_name = $5, role = $6, active = $7,
                    version = version + 1
                WHERE id = $1 AND version = $2
                "#,
            )
            .bind(a.id.as_uuid())
            .bind(a.version.as_i64())
            .bind(a.phone.as_str())
            .bind(&a.first_name)
            .bind(&a.last_name)
            .bind(a.role.as_str())
            .bind(a.active)
            .execute(&mut *conn)
            .await
            .map_err(|e| write_error(e, None))?;
            expect_updated(result, &a)?;
        }
        Change::InsertReservation(r) => {
            sqlx::query(
                r#"
                INSERT INTO reservations (id, account_id, coworker_id, service_type, day, start_time,
                    end_time, status, billing_status, note, created_at, updated_at, version)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
                "#,
            )
            .bind(r.id.as_uuid())
            .bind(r.account_id.as_uuid())
            .bind(r.coworker_id.map(|id| id.as_uuid()))
            .bind(&r.service_type)
            .bind(r.date)
            .bind(r.slot.start())
            .bind(r.slot.end())
            .bind(r.status.as_str())
            .bind(r.billing_status.as_str())
            .bind(&r.note)
            .bind(r.created_at)
            .bind(r.updated_at)
            .bind(first)
            .execute(&mut *conn)
            .await
            .map_err(|e| write_error(e, Some(&r)))?;
        }
        Change::UpdateReservation(r) => {
            let result = sqlx::query(
                r#"
                UPDATE reservations
                SET coworker_id = $3, service_type = $4, day = $5, start_time = $6, end_time = $7,
                    status = $8, billing_status = $9, note = $10, updated_at = $11,
                    version = version + 1
                WHERE id = $1 AND version = $2
                "#,
            )
            .bind(r.id.as_uuid())
            .bind(r.version.as_i64())
            .bind(r.coworker_id.map(|id| id.as_uuid()))
            .bind(&r.service_type)
            .bind(r.date)
            .bind(r.slot.start())
            .bind(r.slot.end())
            .bind(r.status.as_str())
            .bind(r.billing_status.as_str())
            .bind(&r.note)
            .bind(r.updated_at)
            .execute(&mut *conn)
            .await
            .map_err(|e| write_error(e, Some(&r)))?;
            expect_updated(result, &r)?;
        }
        Change::InsertPayment(p) => {
            sqlx::query(
                r#"
                INSERT INTO payments (id, account_id, reservation_id, amount, kind, status, created_at, version)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(p.id.as_uuid())
            .bind(p.account_id.as_uuid())
            .bind(p.reservation_id.as_uuid())
            .bind(p.amount.minor())
            .bind(p.kind.as_str())
            .bind(p.status.as_str())
            .bind(p.created_at)
            .bind(first)
            .execute(&mut *conn)
            .await
            .map_err(|e| write_error(e, None))?;
        }
        Change::UpdatePayment(p) => {
            let result = sqlx::query(
                r#"
                UPDATE payments
                SET amount = $3, kind = $4, status = $5, version = version + 1
                WHERE id = $1 AND version = $2
                "#,
            )
            .bind(p.id.as_uuid())
            .bind(p.version.as_i64())
            .bind(p.amount.minor())
            .bind(p.kind.as_str())
            .bind(p.status.as_str())
            .execute(&mut *conn)
            .await
            .map_err(|e| write_error(e, None))?;
            expect_updated(result, &p)?;
        }
        Change::InsertDiscount(d) => {
            let (percentage, fixed) = discount_columns(&d.value);
            sqlx::query(
                r#"
                INSERT INTO discounts (id, account_id, kind, percentage, fixed_amount, used, expires_at,
                    created_at, version)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(d.id.as_uuid())
            .bind(d.account_id.as_uuid())
            .bind(d.kind.as_str())
            .bind(percentage)
            .bind(fixed)
            .bind(d.used)
            .bind(d.expires_at)
            .bind(d.created_at)
            .bind(first)
            .execute(&mut *conn)
            .await
            .map_err(|e| write_error(e, None))?;
        }
        Change::UpdateDiscount(d) => {
            let result = sqlx::query(
                r#"
                UPDATE discounts
                SET used = $3, expires_at = $4, version = version + 1
                WHERE id = $1 AND version = $2
                "#,
            )
            .bind(d.id.as_uuid())
            .bind(d.version.as_i64())
            .bind(d.used)
            .bind(d.expires_at)
            .execute(&mut *conn)
            .await
            .map_err(|e| write_error(e, None))?;
            expect_updated(result, &d)?;
        }
        Change::InsertReferralProfile(p) => {
            let invited_count = count_column("referral_profiles", p.invited_count)?;
            let rewards_issued = count_column("referral_profiles", p.rewards_issued)?;
            sqlx::query(
                r#"
                INSERT INTO referral_profiles (id, account_id, code, invited_count, rewards_issued,
                    created_at, version)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(p.id.as_uuid())
            .bind(p.account_id.as_uuid())
            .bind(p.code.as_str())
            .bind(invited_count)
            .bind(rewards_issued)
            .bind(p.created_at)
            .bind(first)
            .execute(&mut *conn)
            .await
            .map_err(|e| write_error(e, None))?;
        }
        Change::UpdateReferralProfile(p) => {
            let invited_count = count_column("referral_profiles", p.invited_count)?;
            let rewards_issued = count_column("referral_profiles", p.rewards_issued)?;
            let result = sqlx::query(
                r#"
                UPDATE referral_profiles
                SET code = $3, invited_count = $4, rewards_issued = $5, version = version + 1
                WHERE id = $1 AND version = $2
                "#,
            )
            .bind(p.id.as_uuid())
            .bind(p.version.as_i64())
            .bind(p.code.as_str())
            .bind(invited_count)
            .bind(rewards_issued)
            .execute(&mut *conn)
            .await
            .map_err(|e| write_error(e, None))?;
            expect_updated(result, &p)?;
        }
        Change::InsertReferral(r) => {
            sqlx::query(
                r#"
                INSERT INTO referrals (id, inviter_id, invitee_id, code, created_at)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(r.id.as_uuid())
            .bind(r.inviter_id.as_uuid())
            .bind(r.invitee_id.as_uuid())
            .bind(r.code.as_str())
            .bind(r.created_at)
            .execute(&mut *conn)
            .await
            .map_err(|e| write_error(e, None))?;
        }
        Change::InsertOtp(o) => {
            sqlx::query(
                r#"
                INSERT INTO otp_codes (id, phone, code, expires_at, consumed, created_at, version)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(o.id.as_uuid())
            .bind(o.phone.as_str())
            .bind(&o.code)
            .bind(o.expires_at)
            .bind(o.consumed)
            .bind(o.created_at)
            .bind(first)
            .execute(&mut *conn)
            .await
            .map_err(|e| write_error(e, None))?;
        }
        Change::UpdateOtp(o) => {
            let result = sqlx::query(
                r#"
                UPDATE otp_codes
                SET consumed = $3, version = version + 1
                WHERE id = $1 AND version = $2
                "#,
            )
            .bind(o.id.as_uuid())
            .bind(o.version.as_i64())
            .bind(o.consumed)
            .execute(&mut *conn)
            .await
            .map_err(|e| write_error(e, None))?;
            expect_updated(result, &o)?;
        }
        Change::InsertInvite(i) => {
            sqlx::query(
                r#"
                INSERT INTO coworker_invites (id, manager_id, code, accepted_by, created_at,
                    accepted_at, version)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(i.id.as_uuid())
            .bind(i.manager_id.as_uuid())
            .bind(&i.code)
            .bind(i.accepted_by.map(|id| id.as_uuid()))
            .bind(i.created_at)
            .bind(i.accepted_at)
            .bind(first)
            .execute(&mut *conn)
            .await
            .map_err(|e| write_error(e, None))?;
        }
        Change::UpdateInvite(i) => {
            let result = sqlx::query(
                r#"
                UPDATE coworker_invites
                SET accepted_by = $3, accepted_at = $4, version = version + 1
                WHERE id = $1 AND version = $2
                "#,
            )
            .bind(i.id.as_uuid())
            .bind(i.version.as_i64())
            .bind(i.accepted_by.map(|id| id.as_uuid()))
            .bind(i.accepted_at)
            .execute(&mut *conn)
            .await
            .map_err(|e| write_error(e, None))?;
            expect_updated(result, &i)?;
        }
        Change::InsertStaffLink(l) => {
            sqlx::query(
                r#"
                INSERT INTO staff_links (id, manager_id, coworker_id, invite_id, created_at)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(l.id.as_uuid())
            .bind(l.manager_id.as_uuid())
            .bind(l.coworker_id.as_uuid())
            .bind(l.invite_id.as_uuid())
            .bind(l.created_at)
            .execute(&mut *conn)
            .await
            .map_err(|e| write_error(e, None))?;
        }
    }

    Ok(())
}

#[async_trait]
impl BookingStore for PostgresStore {
    async fn account(&self, id: AccountId) -> Result<Option<Account>> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1");
        self.fetch_one_opt(sql, id.as_uuid(), row_to_account).await
    }

    async fn account_by_phone(&self, phone: &PhoneNumber) -> Result<Option<Account>> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE phone = $1");
        sqlx::query(&sql)
            .bind(phone.as_str())
            .fetch_optional(&self.pool)
            .await?
            .map(row_to_account)
            .transpose()
    }

    async fn accounts(&self) -> Result<Vec<Account>> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts ORDER BY created_at ASC");
        sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(row_to_account)
            .collect()
    }

    async fn reservation(&self, id: ReservationId) -> Result<Option<Reservation>> {
        let sql = format!("SELECT {RESERVATION_COLUMNS} FROM reservations WHERE id = $1");
        self.fetch_one_opt(sql, id.as_uuid(), row_to_reservation)
            .await
    }

    async fn reservations_on(&self, date: NaiveDate) -> Result<Vec<Reservation>> {
        let sql = format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations WHERE day = $1 ORDER BY start_time ASC"
        );
        sqlx::query(&sql)
            .bind(date)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(row_to_reservation)
            .collect()
    }

    async fn reservations_for_account(&self, account: AccountId) -> Result<Vec<Reservation>> {
        let sql = format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations WHERE account_id = $1 \
             ORDER BY day ASC, start_time ASC"
        );
        self.fetch_all_by(sql, account.as_uuid(), row_to_reservation)
            .await
    }

    async fn reservations_for_coworker(&self, coworker: AccountId) -> Result<Vec<Reservation>> {
        let sql = format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations WHERE coworker_id = $1 \
             ORDER BY day ASC, start_time ASC"
        );
        self.fetch_all_by(sql, coworker.as_uuid(), row_to_reservation)
            .await
    }

    async fn all_reservations(&self) -> Result<Vec<Reservation>> {
        let sql = format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations ORDER BY day ASC, start_time ASC"
        );
        sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(row_to_reservation)
            .collect()
    }

    async fn payment(&self, id: PaymentId) -> Result<Option<Payment>> {
        let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1");
        self.fetch_one_opt(sql, id.as_uuid(), row_to_payment).await
    }

    async fn payment_for_reservation(
        &self,
        reservation: ReservationId,
    ) -> Result<Option<Payment>> {
        let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE reservation_id = $1");
        self.fetch_one_opt(sql, reservation.as_uuid(), row_to_payment)
            .await
    }

    async fn payments_for_account(&self, account: AccountId) -> Result<Vec<Payment>> {
        let sql = format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE account_id = $1 ORDER BY created_at DESC"
        );
        self.fetch_all_by(sql, account.as_uuid(), row_to_payment)
            .await
    }

    async fn discount(&self, id: DiscountId) -> Result<Option<Discount>> {
        let sql = format!("SELECT {DISCOUNT_COLUMNS} FROM discounts WHERE id = $1");
        self.fetch_one_opt(sql, id.as_uuid(), row_to_discount).await
    }

    async fn discounts_for_account(&self, account: AccountId) -> Result<Vec<Discount>> {
        let sql = format!(
            "SELECT {DISCOUNT_COLUMNS} FROM discounts WHERE account_id = $1 ORDER BY created_at DESC"
        );
        self.fetch_all_by(sql, account.as_uuid(), row_to_discount)
            .await
    }

    async fn referral_profile_for_account(
        &self,
        account: AccountId,
    ) -> Result<Option<ReferralProfile>> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM referral_profiles WHERE account_id = $1");
        self.fetch_one_opt(sql, account.as_uuid(), row_to_profile)
            .await
    }

    async fn referral_profile_by_code(
        &self,
        code: &ReferralCode,
    ) -> Result<Option<ReferralProfile>> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM referral_profiles WHERE code = $1");
        sqlx::query(&sql)
            .bind(code.as_str())
            .fetch_optional(&self.pool)
            .await?
            .map(row_to_profile)
            .transpose()
    }

    async fn referral_for_invitee(&self, invitee: AccountId) -> Result<Option<Referral>> {
        let sql = format!("SELECT {REFERRAL_COLUMNS} FROM referrals WHERE invitee_id = $1");
        self.fetch_one_opt(sql, invitee.as_uuid(), row_to_referral)
            .await
    }

    async fn referrals_by_inviter(&self, inviter: AccountId) -> Result<Vec<Referral>> {
        let sql = format!(
            "SELECT {REFERRAL_COLUMNS} FROM referrals WHERE inviter_id = $1 ORDER BY seq DESC"
        );
        self.fetch_all_by(sql, inviter.as_uuid(), row_to_referral)
            .await
    }

    async fn latest_otp(&self, phone: &PhoneNumber) -> Result<Option<OtpCode>> {
        let sql = format!(
            "SELECT {OTP_COLUMNS} FROM otp_codes WHERE phone = $1 \
             ORDER BY created_at DESC, seq DESC LIMIT 1"
        );
        sqlx::query(&sql)
            .bind(phone.as_str())
            .fetch_optional(&self.pool)
            .await?
            .map(row_to_otp)
            .transpose()
    }

    async fn invite_by_code(&self, code: &str) -> Result<Option<CoworkerInvite>> {
        let sql = format!("SELECT {INVITE_COLUMNS} FROM coworker_invites WHERE code = $1");
        sqlx::query(&sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await?
            .map(row_to_invite)
            .transpose()
    }

    async fn staff_links_for_manager(&self, manager: AccountId) -> Result<Vec<StaffLink>> {
        let sql = format!(
            "SELECT {STAFF_LINK_COLUMNS} FROM staff_links WHERE manager_id = $1 ORDER BY seq ASC"
        );
        self.fetch_all_by(sql, manager.as_uuid(), row_to_staff_link)
            .await
    }

    async fn commit(&self, work: UnitOfWork) -> Result<()> {
        if work.is_empty() {
            return Ok(());
        }

        // Start a transaction; dropping it on error rolls everything back.
        let mut tx = self.pool.begin().await?;

        for change in work.into_changes() {
            let label = change.label();
            apply(&mut *tx, change).await.inspect_err(|e| {
                tracing::debug!(change = label, error = %e, "Unit of work rejected");
            })?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_outside_the_column_range_are_rejected() {
        assert_eq!(count_column("referral_profiles", 5).unwrap(), 5);
        assert!(matches!(
            count_column("referral_profiles", u32::MAX),
            Err(StoreError::Decode {
                table: "referral_profiles",
                ..
            })
        ));
        assert!(count("referral_profiles", -1).is_err());
    }
}
