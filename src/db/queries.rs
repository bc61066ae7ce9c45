use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection};
use serde::Serialize;

use crate::models::{
    AvailabilityRecord, Booking, BookingStatus, LedgerStatus, Payment, PaymentMethod,
    PaymentStatus, PaymentType, Role, TimeSlot, User,
};

pub const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const DATE_FORMAT: &str = "%Y-%m-%d";

fn ts(dt: &NaiveDateTime) -> String {
    dt.format(TS_FORMAT).to_string()
}

fn day(d: &NaiveDate) -> String {
    d.format(DATE_FORMAT).to_string()
}

fn parse_ts(s: &str) -> anyhow::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TS_FORMAT).with_context(|| format!("bad timestamp: {s}"))
}

fn parse_day(s: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).with_context(|| format!("bad date: {s}"))
}

// ── Users ──

pub fn create_user(conn: &Connection, user: &User) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO users (id, name, email, phone, password_hash, role, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            user.id,
            user.name,
            user.email,
            user.phone,
            user.password_hash,
            user.role.as_str(),
            ts(&user.created_at),
        ],
    )?;
    Ok(())
}

const USER_COLUMNS: &str = "id, name, email, phone, password_hash, role, created_at";

pub fn get_user(conn: &Connection, id: &str) -> anyhow::Result<Option<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
    let result = conn.query_row(&sql, params![id], |row| Ok(parse_user_row(row)));

    match result {
        Ok(user) => Ok(Some(user?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_user_by_email(conn: &Connection, email: &str) -> anyhow::Result<Option<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1");
    let result = conn.query_row(&sql, params![email], |row| Ok(parse_user_row(row)));

    match result {
        Ok(user) => Ok(Some(user?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn parse_user_row(row: &rusqlite::Row) -> anyhow::Result<User> {
    let role_str: String = row.get(5)?;
    let created_at_str: String = row.get(6)?;

    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        password_hash: row.get(4)?,
        role: Role::parse(&role_str)
            .ok_or_else(|| anyhow::anyhow!("unknown role: {role_str}"))?,
        created_at: parse_ts(&created_at_str)?,
    })
}

pub fn count_users_by_role(conn: &Connection, role: Role) -> anyhow::Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE role = ?1",
        params![role.as_str()],
        |row| row.get(0),
    )?;
    Ok(count)
}

// ── Bookings ──

const BOOKING_COLUMNS: &str = "id, user_id, date, start_time, end_time, event_type, guest_count, \
     total_amount, advance_paid, status, payment_status, special_requirements, created_at, updated_at";

pub fn insert_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO bookings (id, user_id, date, start_time, end_time, event_type, guest_count,
             total_amount, advance_paid, status, payment_status, special_requirements, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            booking.id,
            booking.user_id,
            day(&booking.date),
            booking.start_time,
            booking.end_time,
            booking.event_type,
            booking.guest_count,
            booking.total_amount,
            booking.advance_paid,
            booking.status.as_str(),
            booking.payment_status.as_str(),
            booking.special_requirements,
            ts(&booking.created_at),
            ts(&booking.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_booking(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1");
    let result = conn.query_row(&sql, params![id], |row| Ok(parse_booking_row(row)));

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_bookings_for_user(conn: &Connection, user_id: &str) -> anyhow::Result<Vec<Booking>> {
    let sql = format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings WHERE user_id = ?1 ORDER BY created_at DESC, rowid DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![user_id], |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

#[derive(Debug, Default, Clone)]
pub struct BookingFilter {
    pub status: Option<BookingStatus>,
    pub date: Option<NaiveDate>,
    pub limit: Option<i64>,
    pub offset: i64,
}

impl BookingFilter {
    fn where_clause(&self) -> (String, Vec<String>) {
        let mut clauses = vec![];
        let mut values = vec![];
        if let Some(status) = self.status {
            values.push(status.as_str().to_string());
            clauses.push(format!("status = ?{}", values.len()));
        }
        if let Some(date) = self.date {
            values.push(day(&date));
            clauses.push(format!("date = ?{}", values.len()));
        }
        if clauses.is_empty() {
            (String::new(), values)
        } else {
            (format!("WHERE {}", clauses.join(" AND ")), values)
        }
    }
}

pub fn get_bookings(conn: &Connection, filter: &BookingFilter) -> anyhow::Result<Vec<Booking>> {
    let (where_sql, values) = filter.where_clause();
    let limit = filter.limit.unwrap_or(-1);
    let sql = format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings {where_sql} \
         ORDER BY created_at DESC, rowid DESC LIMIT {limit} OFFSET {}",
        filter.offset.max(0)
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(values.iter()), |row| {
        Ok(parse_booking_row(row))
    })?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn count_bookings(conn: &Connection, filter: &BookingFilter) -> anyhow::Result<i64> {
    let (where_sql, values) = filter.where_clause();
    let sql = format!("SELECT COUNT(*) FROM bookings {where_sql}");
    let count = conn.query_row(&sql, rusqlite::params_from_iter(values.iter()), |row| {
        row.get(0)
    })?;
    Ok(count)
}

/// Id of the confirmed booking holding `date`, if any.
pub fn confirmed_booking_on(conn: &Connection, date: &NaiveDate) -> anyhow::Result<Option<String>> {
    let result = conn.query_row(
        "SELECT id FROM bookings WHERE date = ?1 AND status = 'confirmed'",
        params![day(date)],
        |row| row.get::<_, String>(0),
    );

    match result {
        Ok(id) => Ok(Some(id)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_booked_dates(conn: &Connection) -> anyhow::Result<Vec<NaiveDate>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT date FROM bookings WHERE status = 'confirmed' ORDER BY date ASC",
    )?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

    let mut dates = vec![];
    for row in rows {
        dates.push(parse_day(&row?)?);
    }
    Ok(dates)
}

pub fn update_booking_status(
    conn: &Connection,
    id: &str,
    status: BookingStatus,
    payment_status: PaymentStatus,
    now: &NaiveDateTime,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET status = ?1, payment_status = ?2, updated_at = ?3 WHERE id = ?4",
        params![status.as_str(), payment_status.as_str(), ts(now), id],
    )?;
    Ok(count > 0)
}

/// Adds `amount` to `advance_paid` only while the total stays within the package price.
/// Returns false when the bound would be exceeded.
pub fn increment_advance_paid(
    conn: &Connection,
    id: &str,
    amount: i64,
    now: &NaiveDateTime,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET advance_paid = advance_paid + ?1, updated_at = ?2
         WHERE id = ?3 AND ?1 > 0 AND advance_paid + ?1 <= total_amount",
        params![amount, ts(now), id],
    )?;
    Ok(count > 0)
}

pub fn get_upcoming_confirmed(
    conn: &Connection,
    from: &NaiveDate,
    to: &NaiveDate,
    limit: i64,
) -> anyhow::Result<Vec<Booking>> {
    let sql = format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings
         WHERE status = 'confirmed' AND date >= ?1 AND date <= ?2
         ORDER BY date ASC LIMIT ?3"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![day(from), day(to), limit], |row| {
        Ok(parse_booking_row(row))
    })?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn count_bookings_by_status(conn: &Connection) -> anyhow::Result<Vec<(BookingStatus, i64)>> {
    let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM bookings GROUP BY status")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;

    let mut counts = vec![];
    for row in rows {
        let (status_str, count) = row?;
        let status = BookingStatus::parse(&status_str)
            .ok_or_else(|| anyhow::anyhow!("unknown booking status: {status_str}"))?;
        counts.push((status, count));
    }
    Ok(counts)
}

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let date_str: String = row.get(2)?;
    let status_str: String = row.get(9)?;
    let payment_status_str: String = row.get(10)?;
    let created_at_str: String = row.get(12)?;
    let updated_at_str: String = row.get(13)?;

    Ok(Booking {
        id: row.get(0)?,
        user_id: row.get(1)?,
        date: parse_day(&date_str)?,
        start_time: row.get(3)?,
        end_time: row.get(4)?,
        event_type: row.get(5)?,
        guest_count: row.get(6)?,
        total_amount: row.get(7)?,
        advance_paid: row.get(8)?,
        status: BookingStatus::parse(&status_str)
            .ok_or_else(|| anyhow::anyhow!("unknown booking status: {status_str}"))?,
        payment_status: PaymentStatus::parse(&payment_status_str)
            .ok_or_else(|| anyhow::anyhow!("unknown payment status: {payment_status_str}"))?,
        special_requirements: row.get(11)?,
        created_at: parse_ts(&created_at_str)?,
        updated_at: parse_ts(&updated_at_str)?,
    })
}

// ── Availability ──

pub fn get_availability(
    conn: &Connection,
    date: &NaiveDate,
) -> anyhow::Result<Option<AvailabilityRecord>> {
    let result = conn.query_row(
        "SELECT date, is_blocked, block_reason, slots FROM availability WHERE date = ?1",
        params![day(date)],
        |row| Ok(parse_availability_row(row)),
    );

    match result {
        Ok(record) => Ok(Some(record?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn save_availability(conn: &Connection, record: &AvailabilityRecord) -> anyhow::Result<()> {
    let slots_json = serde_json::to_string(&record.slots)?;
    conn.execute(
        "INSERT INTO availability (date, is_blocked, block_reason, slots)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(date) DO UPDATE SET
           is_blocked = excluded.is_blocked,
           block_reason = excluded.block_reason,
           slots = excluded.slots,
           updated_at = datetime('now')",
        params![
            day(&record.date),
            record.is_blocked as i32,
            record.block_reason,
            slots_json,
        ],
    )?;
    Ok(())
}

pub fn list_blocked_dates(conn: &Connection) -> anyhow::Result<Vec<AvailabilityRecord>> {
    let mut stmt = conn.prepare(
        "SELECT date, is_blocked, block_reason, slots FROM availability
         WHERE is_blocked = 1 ORDER BY date ASC",
    )?;
    let rows = stmt.query_map([], |row| Ok(parse_availability_row(row)))?;

    let mut records = vec![];
    for row in rows {
        records.push(row??);
    }
    Ok(records)
}

fn parse_availability_row(row: &rusqlite::Row) -> anyhow::Result<AvailabilityRecord> {
    let date_str: String = row.get(0)?;
    let slots_json: String = row.get(3)?;
    let slots: Vec<TimeSlot> =
        serde_json::from_str(&slots_json).context("failed to parse availability slots")?;

    Ok(AvailabilityRecord {
        date: parse_day(&date_str)?,
        is_blocked: row.get::<_, i32>(1)? != 0,
        block_reason: row.get(2)?,
        slots,
    })
}

// ── Payments ──

const PAYMENT_COLUMNS: &str = "id, booking_id, user_id, amount, payment_type, payment_method, \
     transaction_id, status, provider_intent_id, created_at";

pub fn insert_payment(conn: &Connection, payment: &Payment) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO payments (id, booking_id, user_id, amount, payment_type, payment_method,
             transaction_id, status, provider_intent_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            payment.id,
            payment.booking_id,
            payment.user_id,
            payment.amount,
            payment.payment_type.as_str(),
            payment.payment_method.as_str(),
            payment.transaction_id,
            payment.status.as_str(),
            payment.provider_intent_id,
            ts(&payment.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_payment_by_transaction(
    conn: &Connection,
    transaction_id: &str,
) -> anyhow::Result<Option<Payment>> {
    let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE transaction_id = ?1");
    let result = conn.query_row(&sql, params![transaction_id], |row| {
        Ok(parse_payment_row(row))
    });

    match result {
        Ok(payment) => Ok(Some(payment?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_payments(conn: &Connection, limit: Option<i64>) -> anyhow::Result<Vec<Payment>> {
    let sql = format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments ORDER BY created_at DESC, rowid DESC LIMIT ?1"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![limit.unwrap_or(-1)], |row| {
        Ok(parse_payment_row(row))
    })?;

    let mut payments = vec![];
    for row in rows {
        payments.push(row??);
    }
    Ok(payments)
}

pub fn get_payments_for_booking(conn: &Connection, booking_id: &str) -> anyhow::Result<Vec<Payment>> {
    let sql = format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments WHERE booking_id = ?1 ORDER BY created_at ASC, rowid ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![booking_id], |row| Ok(parse_payment_row(row)))?;

    let mut payments = vec![];
    for row in rows {
        payments.push(row??);
    }
    Ok(payments)
}

pub fn sum_completed_for_booking(conn: &Connection, booking_id: &str) -> anyhow::Result<i64> {
    let total = conn.query_row(
        "SELECT COALESCE(SUM(amount), 0) FROM payments WHERE booking_id = ?1 AND status = 'completed'",
        params![booking_id],
        |row| row.get(0),
    )?;
    Ok(total)
}

fn parse_payment_row(row: &rusqlite::Row) -> anyhow::Result<Payment> {
    let type_str: String = row.get(4)?;
    let method_str: String = row.get(5)?;
    let status_str: String = row.get(7)?;
    let created_at_str: String = row.get(9)?;

    Ok(Payment {
        id: row.get(0)?,
        booking_id: row.get(1)?,
        user_id: row.get(2)?,
        amount: row.get(3)?,
        payment_type: PaymentType::parse(&type_str)
            .ok_or_else(|| anyhow::anyhow!("unknown payment type: {type_str}"))?,
        payment_method: PaymentMethod::parse(&method_str)
            .ok_or_else(|| anyhow::anyhow!("unknown payment method: {method_str}"))?,
        transaction_id: row.get(6)?,
        status: LedgerStatus::parse(&status_str)
            .ok_or_else(|| anyhow::anyhow!("unknown ledger status: {status_str}"))?,
        provider_intent_id: row.get(8)?,
        created_at: parse_ts(&created_at_str)?,
    })
}

// ── Revenue ──

/// (all-time total, total since `since`) over completed payments.
pub fn get_revenue_totals(conn: &Connection, since: &NaiveDateTime) -> anyhow::Result<(i64, i64)> {
    let totals = conn.query_row(
        "SELECT COALESCE(SUM(amount), 0),
                COALESCE(SUM(CASE WHEN created_at >= ?1 THEN amount ELSE 0 END), 0)
         FROM payments WHERE status = 'completed'",
        params![ts(since)],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok(totals)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyRevenue {
    pub month: u32,
    pub revenue: i64,
    pub bookings: i64,
}

pub fn get_monthly_revenue(conn: &Connection, year: i32) -> anyhow::Result<Vec<MonthlyRevenue>> {
    let mut stmt = conn.prepare(
        "SELECT CAST(strftime('%m', created_at) AS INTEGER) AS month,
                SUM(amount), COUNT(DISTINCT booking_id)
         FROM payments
         WHERE status = 'completed' AND strftime('%Y', created_at) = ?1
         GROUP BY month ORDER BY month ASC",
    )?;
    let rows = stmt.query_map(params![format!("{year:04}")], |row| {
        Ok(MonthlyRevenue {
            month: row.get(0)?,
            revenue: row.get(1)?,
            bookings: row.get(2)?,
        })
    })?;

    let mut months = vec![];
    for row in rows {
        months.push(row?);
    }
    Ok(months)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueBucket {
    pub period: String,
    pub total_revenue: i64,
    pub transaction_count: i64,
    pub average_transaction: f64,
}

/// Groups completed payments of `year` by `strftime(bucket_format, created_at)`.
pub fn get_revenue_buckets(
    conn: &Connection,
    bucket_format: &str,
    year: i32,
) -> anyhow::Result<Vec<RevenueBucket>> {
    let mut stmt = conn.prepare(
        "SELECT strftime(?1, created_at) AS bucket, SUM(amount), COUNT(*), AVG(amount)
         FROM payments
         WHERE status = 'completed' AND strftime('%Y', created_at) = ?2
         GROUP BY bucket ORDER BY bucket ASC",
    )?;
    let rows = stmt.query_map(params![bucket_format, format!("{year:04}")], |row| {
        Ok(RevenueBucket {
            period: row.get(0)?,
            total_revenue: row.get(1)?,
            transaction_count: row.get(2)?,
            average_transaction: row.get(3)?,
        })
    })?;

    let mut buckets = vec![];
    for row in rows {
        buckets.push(row?);
    }
    Ok(buckets)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodTotal {
    pub method: String,
    pub total: i64,
    pub count: i64,
}

pub fn get_revenue_by_method(conn: &Connection, year: i32) -> anyhow::Result<Vec<MethodTotal>> {
    let mut stmt = conn.prepare(
        "SELECT payment_method, SUM(amount), COUNT(*)
         FROM payments
         WHERE status = 'completed' AND strftime('%Y', created_at) = ?1
         GROUP BY payment_method ORDER BY payment_method ASC",
    )?;
    let rows = stmt.query_map(params![format!("{year:04}")], |row| {
        Ok(MethodTotal {
            method: row.get(0)?,
            total: row.get(1)?,
            count: row.get(2)?,
        })
    })?;

    let mut totals = vec![];
    for row in rows {
        totals.push(row?);
    }
    Ok(totals)
}
