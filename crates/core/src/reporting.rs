//! Read-only aggregates over accounts and votes.
//!
//! Everything here takes `&self`; reporting never writes.

use chrono::{DateTime, Duration, Months, Utc};
use rusqlite::params_from_iter;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::store::{uuid_column, ContestStore, Filter, PUBLIC_ELIGIBILITY};
use crate::types::{from_millis, to_millis, AccountId, PaymentStatus, RegistrationStatus};

/// Count of accounts in one status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusCount<S> {
    #[serde(rename = "_id")]
    pub status: S,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryVotes {
    #[serde(rename = "_id")]
    pub category: String,
    pub count: u64,
    pub total_votes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentRegistration {
    pub id: AccountId,
    pub name: String,
    pub email: String,
    pub payment_status: PaymentStatus,
    pub registration_date: Option<DateTime<Utc>>,
}

/// Admin dashboard summary
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardOverview {
    pub payment_stats: Vec<StatusCount<PaymentStatus>>,
    pub registration_stats: Vec<StatusCount<RegistrationStatus>>,
    pub category_stats: Vec<CategoryVotes>,
    pub recent_registrations: Vec<RecentRegistration>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStat {
    #[serde(rename = "_id")]
    pub status: PaymentStatus,
    pub count: u64,
    /// Sum of payment amounts; only approved payments count as revenue
    pub total_amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueBucket {
    pub year: i32,
    pub month: u32,
    pub total_revenue: f64,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryReport {
    #[serde(rename = "_id")]
    pub category: String,
    pub contestant_count: u64,
    pub approved_count: u64,
    pub total_votes: u64,
    pub approval_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyVotes {
    /// `YYYY-MM-DD` in UTC
    pub date: String,
    pub category: Option<String>,
    pub vote_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicCategoryStats {
    #[serde(rename = "_id")]
    pub category: String,
    pub count: u64,
    pub avg_votes: f64,
    pub total_votes: u64,
}

/// Rolling window for voting analytics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    Day,
    Week,
    Month,
}

impl Timeframe {
    /// Start of the window ending at `now`
    pub fn since(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Timeframe::Day => now - Duration::days(1),
            Timeframe::Week => now - Duration::days(7),
            Timeframe::Month => now
                .checked_sub_months(Months::new(1))
                .unwrap_or(now - Duration::days(30)),
        }
    }
}

/// Approved share of a category in percent; 0 for an empty category
pub fn approval_rate(approved: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (approved as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
}

fn count_of(raw: i64) -> u64 {
    raw.max(0) as u64
}

impl ContestStore {
    /// Counts by payment and registration status, per-category votes and
    /// the five most recently completed registrations
    pub fn dashboard_overview(&self) -> Result<DashboardOverview> {
        let payment_stats = self.payment_status_counts()?;
        let registration_stats = self.registration_status_counts()?;

        let mut stmt = self.conn.prepare(
            "SELECT category, COUNT(*), COALESCE(SUM(votes_count), 0)
             FROM accounts
             WHERE category IS NOT NULL AND category <> ''
             GROUP BY category
             ORDER BY category ASC",
        )?;
        let category_stats = stmt
            .query_map([], |row| {
                Ok(CategoryVotes {
                    category: row.get(0)?,
                    count: count_of(row.get(1)?),
                    total_votes: count_of(row.get(2)?),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut stmt = self.conn.prepare(
            "SELECT id, name, email, payment_status, completed_at
             FROM accounts
             WHERE registration_status = 'completed'
             ORDER BY completed_at DESC, id ASC
             LIMIT 5",
        )?;
        let recent_registrations = stmt
            .query_map([], |row| {
                Ok(RecentRegistration {
                    id: uuid_column(row, 0)?,
                    name: row.get(1)?,
                    email: row.get(2)?,
                    payment_status: row.get(3)?,
                    registration_date: row.get::<_, Option<i64>>(4)?.map(from_millis),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(DashboardOverview {
            payment_stats,
            registration_stats,
            category_stats,
            recent_registrations,
        })
    }

    pub fn payment_status_counts(&self) -> Result<Vec<StatusCount<PaymentStatus>>> {
        let mut stmt = self.conn.prepare(
            "SELECT payment_status, COUNT(*) FROM accounts GROUP BY payment_status",
        )?;
        let counts = stmt
            .query_map([], |row| {
                Ok(StatusCount {
                    status: row.get(0)?,
                    count: count_of(row.get(1)?),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(counts)
    }

    pub fn registration_status_counts(&self) -> Result<Vec<StatusCount<RegistrationStatus>>> {
        let mut stmt = self.conn.prepare(
            "SELECT registration_status, COUNT(*) FROM accounts GROUP BY registration_status",
        )?;
        let counts = stmt
            .query_map([], |row| {
                Ok(StatusCount {
                    status: row.get(0)?,
                    count: count_of(row.get(1)?),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(counts)
    }

    /// Per payment status: count and approved revenue
    pub fn payment_stats(&self) -> Result<Vec<PaymentStat>> {
        let mut stmt = self.conn.prepare(
            "SELECT payment_status,
                    COUNT(*),
                    COALESCE(SUM(CASE WHEN payment_status = 'approved'
                                      THEN payment_amount ELSE 0.0 END), 0.0)
             FROM accounts
             GROUP BY payment_status
             ORDER BY payment_status ASC",
        )?;
        let stats = stmt
            .query_map([], |row| {
                Ok(PaymentStat {
                    status: row.get(0)?,
                    count: count_of(row.get(1)?),
                    total_amount: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(stats)
    }

    /// Approved revenue by calendar month of the payment date.
    ///
    /// `range` is inclusive on both ends.
    pub fn revenue_by_month(
        &self,
        range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Result<Vec<RevenueBucket>> {
        let mut filter = Filter::default();
        filter.raw("payment_status = 'approved'");
        filter.raw("payment_date IS NOT NULL");
        if let Some((start, end)) = range {
            filter.ge("payment_date", to_millis(start));
            filter.le("payment_date", to_millis(end));
        }

        let sql = format!(
            "SELECT CAST(strftime('%Y', payment_date / 1000, 'unixepoch') AS INTEGER) AS year,
                    CAST(strftime('%m', payment_date / 1000, 'unixepoch') AS INTEGER) AS month,
                    COALESCE(SUM(payment_amount), 0.0),
                    COUNT(*)
             FROM accounts
             {}
             GROUP BY year, month
             ORDER BY year ASC, month ASC",
            filter.where_sql()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let buckets = stmt
            .query_map(params_from_iter(filter.values.iter()), |row| {
                Ok(RevenueBucket {
                    year: row.get(0)?,
                    month: row.get(1)?,
                    total_revenue: row.get(2)?,
                    count: count_of(row.get(3)?),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(buckets)
    }

    /// Per category: registrations, approvals, votes and approval rate
    pub fn category_reports(&self) -> Result<Vec<CategoryReport>> {
        let mut stmt = self.conn.prepare(
            "SELECT category,
                    COUNT(*),
                    SUM(CASE WHEN payment_status = 'approved' THEN 1 ELSE 0 END),
                    COALESCE(SUM(votes_count), 0)
             FROM accounts
             WHERE category IS NOT NULL AND category <> ''
             GROUP BY category
             ORDER BY category ASC",
        )?;
        let reports = stmt
            .query_map([], |row| {
                let contestant_count = count_of(row.get(1)?);
                let approved_count = count_of(row.get(2)?);
                Ok(CategoryReport {
                    category: row.get(0)?,
                    contestant_count,
                    approved_count,
                    total_votes: count_of(row.get(3)?),
                    approval_rate: approval_rate(approved_count, contestant_count),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(reports)
    }

    /// Votes per UTC day and contestant category, oldest day first
    pub fn votes_by_day(
        &self,
        category: Option<&str>,
        timeframe: Option<Timeframe>,
        now: DateTime<Utc>,
    ) -> Result<Vec<DailyVotes>> {
        let mut filter = Filter::default();
        if let Some(category) = category.filter(|c| !c.is_empty()) {
            filter.eq("a.category", category.to_string());
        }
        if let Some(timeframe) = timeframe {
            filter.ge("v.voted_at", Value::Integer(to_millis(timeframe.since(now))));
        }

        let sql = format!(
            "SELECT strftime('%Y-%m-%d', v.voted_at / 1000, 'unixepoch') AS day,
                    a.category,
                    COUNT(*)
             FROM votes v
             JOIN accounts a ON a.id = v.contestant_id
             {}
             GROUP BY day, a.category
             ORDER BY day ASC, a.category ASC",
            filter.where_sql()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let days = stmt
            .query_map(params_from_iter(filter.values.iter()), |row| {
                Ok(DailyVotes {
                    date: row.get(0)?,
                    category: row.get(1)?,
                    vote_count: count_of(row.get(2)?),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(days)
    }

    /// Per-category stats over publicly eligible contestants only
    pub fn public_category_stats(&self) -> Result<Vec<PublicCategoryStats>> {
        let sql = format!(
            "SELECT category,
                    COUNT(*),
                    COALESCE(AVG(votes_count), 0.0),
                    COALESCE(SUM(votes_count), 0)
             FROM accounts
             WHERE ({PUBLIC_ELIGIBILITY}) AND category IS NOT NULL
             GROUP BY category
             ORDER BY category ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let stats = stmt
            .query_map([], |row| {
                Ok(PublicCategoryStats {
                    category: row.get(0)?,
                    count: count_of(row.get(1)?),
                    avg_votes: row.get(2)?,
                    total_votes: count_of(row.get(3)?),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(stats)
    }
}
