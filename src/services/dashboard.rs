use chrono::{Datelike, Duration, NaiveDateTime, NaiveTime};
use rusqlite::Connection;
use serde::Serialize;

use crate::db::queries::{self, BookingFilter, MethodTotal, MonthlyRevenue, RevenueBucket};
use crate::errors::AppResult;
use crate::models::{Booking, BookingStatus, Role};

const UPCOMING_DAYS: i64 = 7;
const UPCOMING_LIMIT: i64 = 5;
const ACTIVITY_LIMIT: usize = 10;

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_bookings: i64,
    pub pending_bookings: i64,
    pub confirmed_bookings: i64,
    pub cancelled_bookings: i64,
    pub completed_bookings: i64,
    pub total_customers: i64,
    pub total_revenue: i64,
    pub today_revenue: i64,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Booking,
    Payment,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub kind: ActivityKind,
    pub booking_id: String,
    pub description: String,
    pub amount: Option<i64>,
    pub at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub stats: DashboardStats,
    pub upcoming_bookings: Vec<Booking>,
    pub monthly_revenue: Vec<MonthlyRevenue>,
    pub recent_activity: Vec<Activity>,
}

pub fn dashboard(conn: &Connection, now: NaiveDateTime) -> AppResult<Dashboard> {
    let mut stats = DashboardStats::default();
    for (status, count) in queries::count_bookings_by_status(conn)? {
        stats.total_bookings += count;
        match status {
            BookingStatus::Pending => stats.pending_bookings = count,
            BookingStatus::Confirmed => stats.confirmed_bookings = count,
            BookingStatus::Cancelled => stats.cancelled_bookings = count,
            BookingStatus::Completed => stats.completed_bookings = count,
        }
    }
    stats.total_customers = queries::count_users_by_role(conn, Role::Customer)?;

    let midnight = now.date().and_time(NaiveTime::MIN);
    (stats.total_revenue, stats.today_revenue) = queries::get_revenue_totals(conn, &midnight)?;

    let today = now.date();
    let upcoming_bookings = queries::get_upcoming_confirmed(
        conn,
        &today,
        &(today + Duration::days(UPCOMING_DAYS)),
        UPCOMING_LIMIT,
    )?;

    let monthly_revenue = queries::get_monthly_revenue(conn, now.year())?;

    Ok(Dashboard {
        stats,
        upcoming_bookings,
        monthly_revenue,
        recent_activity: recent_activity(conn)?,
    })
}

fn recent_activity(conn: &Connection) -> AppResult<Vec<Activity>> {
    let recent = BookingFilter {
        limit: Some(ACTIVITY_LIMIT as i64),
        ..Default::default()
    };

    let mut feed: Vec<Activity> = queries::get_bookings(conn, &recent)?
        .into_iter()
        .map(|b| Activity {
            kind: ActivityKind::Booking,
            description: format!("{} booking for {} ({})", b.event_type, b.date, b.status),
            booking_id: b.id,
            amount: None,
            at: b.created_at,
        })
        .collect();

    feed.extend(
        queries::get_payments(conn, Some(ACTIVITY_LIMIT as i64))?
            .into_iter()
            .map(|p| Activity {
                kind: ActivityKind::Payment,
                description: format!(
                    "{} payment via {}",
                    p.payment_type.as_str(),
                    p.payment_method.as_str()
                ),
                booking_id: p.booking_id,
                amount: Some(p.amount),
                at: p.created_at,
            }),
    );

    feed.sort_by(|a, b| b.at.cmp(&a.at));
    feed.truncate(ACTIVITY_LIMIT);
    Ok(feed)
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RevenuePeriod {
    Daily,
    Weekly,
    #[default]
    Monthly,
}

impl RevenuePeriod {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "daily" => Some(RevenuePeriod::Daily),
            "weekly" => Some(RevenuePeriod::Weekly),
            "monthly" => Some(RevenuePeriod::Monthly),
            _ => None,
        }
    }

    /// SQLite `strftime` pattern used as the grouping key.
    fn bucket_format(&self) -> &'static str {
        match self {
            RevenuePeriod::Daily => "%Y-%m-%d",
            RevenuePeriod::Weekly => "%Y-W%W",
            RevenuePeriod::Monthly => "%Y-%m",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueSummary {
    pub total_revenue: i64,
    pub total_transactions: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueReport {
    pub period: RevenuePeriod,
    pub year: i32,
    pub breakdown: Vec<RevenueBucket>,
    pub by_method: Vec<MethodTotal>,
    pub summary: RevenueSummary,
}

pub fn revenue_report(conn: &Connection, period: RevenuePeriod, year: i32) -> AppResult<RevenueReport> {
    let breakdown = queries::get_revenue_buckets(conn, period.bucket_format(), year)?;
    let by_method = queries::get_revenue_by_method(conn, year)?;

    let summary = RevenueSummary {
        total_revenue: breakdown.iter().map(|b| b.total_revenue).sum(),
        total_transactions: breakdown.iter().map(|b| b.transaction_count).sum(),
    };

    Ok(RevenueReport {
        period,
        year,
        breakdown,
        by_method,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BookingPolicy;
    use crate::models::{PaymentMethod, PaymentType};
    use crate::services::reconciliation::{apply_payment, PaymentApplication};
    use crate::services::testing::{at, pending_booking, seed_user, setup_db};
    use chrono::NaiveDate;

    fn pay(conn: &mut Connection, booking_id: &str, amount: i64, tx: &str, when: &str) {
        apply_payment(
            conn,
            PaymentApplication {
                booking_id: booking_id.to_string(),
                amount,
                payment_type: PaymentType::Advance,
                method: PaymentMethod::Stripe,
                transaction_id: tx.to_string(),
                provider_intent_id: None,
            },
            &BookingPolicy::default(),
            at(when),
        )
        .unwrap();
    }

    #[test]
    fn test_dashboard_counts_and_revenue() {
        let mut conn = setup_db();
        seed_user(&conn, "u1");
        let soon = NaiveDate::from_ymd_opt(2025, 3, 12).unwrap();
        let later = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let a = pending_booking(&mut conn, "u1", soon);
        let b = pending_booking(&mut conn, "u1", later);
        pending_booking(&mut conn, "u1", later);

        pay(&mut conn, &a.id, 2_000, "pi_a", "2025-03-09 15:00:00");
        pay(&mut conn, &b.id, 3_000, "pi_b", "2025-03-10 08:00:00");

        let dash = dashboard(&conn, at("2025-03-10 12:00:00")).unwrap();
        assert_eq!(dash.stats.total_bookings, 3);
        assert_eq!(dash.stats.confirmed_bookings, 2);
        assert_eq!(dash.stats.pending_bookings, 1);
        assert_eq!(dash.stats.total_customers, 1);
        assert_eq!(dash.stats.total_revenue, 5_000);
        assert_eq!(dash.stats.today_revenue, 3_000);

        assert_eq!(dash.upcoming_bookings.len(), 1);
        assert_eq!(dash.upcoming_bookings[0].id, a.id);

        assert_eq!(dash.monthly_revenue.len(), 1);
        assert_eq!(dash.monthly_revenue[0].month, 3);
        assert_eq!(dash.monthly_revenue[0].revenue, 5_000);
        assert_eq!(dash.monthly_revenue[0].bookings, 2);

        assert_eq!(dash.recent_activity.len(), 5);
        assert_eq!(dash.recent_activity[0].kind, ActivityKind::Payment);
        assert_eq!(dash.recent_activity[0].booking_id, b.id);
    }

    #[test]
    fn test_revenue_report_groups_by_period() {
        let mut conn = setup_db();
        seed_user(&conn, "u1");
        let date = NaiveDate::from_ymd_opt(2025, 12, 20).unwrap();
        let a = pending_booking(&mut conn, "u1", date);
        let b = pending_booking(&mut conn, "u1", date + Duration::days(1));

        pay(&mut conn, &a.id, 1_000, "pi_1", "2025-01-15 10:00:00");
        pay(&mut conn, &a.id, 3_000, "pi_2", "2025-02-01 10:00:00");
        pay(&mut conn, &b.id, 2_000, "pi_3", "2025-02-03 10:00:00");

        let monthly = revenue_report(&conn, RevenuePeriod::Monthly, 2025).unwrap();
        assert_eq!(monthly.breakdown.len(), 2);
        assert_eq!(monthly.breakdown[1].period, "2025-02");
        assert_eq!(monthly.breakdown[1].total_revenue, 5_000);
        assert_eq!(monthly.breakdown[1].transaction_count, 2);
        assert!((monthly.breakdown[1].average_transaction - 2_500.0).abs() < f64::EPSILON);
        assert_eq!(monthly.summary.total_revenue, 6_000);
        assert_eq!(monthly.summary.total_transactions, 3);
        assert_eq!(monthly.by_method.len(), 1);
        assert_eq!(monthly.by_method[0].method, "stripe");

        let daily = revenue_report(&conn, RevenuePeriod::Daily, 2025).unwrap();
        assert_eq!(daily.breakdown.len(), 3);

        let other_year = revenue_report(&conn, RevenuePeriod::Monthly, 2024).unwrap();
        assert!(other_year.breakdown.is_empty());
        assert_eq!(other_year.summary.total_revenue, 0);
    }
}
