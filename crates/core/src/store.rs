//! Account Store - SQLite-backed persistence for accounts.
//!
//! One [`ContestStore`] owns one SQLite connection and exposes the account
//! operations; the vote ledger (`ledger.rs`) and the read-only aggregates
//! (`reporting.rs`) are further `impl ContestStore` blocks over the same
//! connection so that a vote insert and its counter increment can share a
//! transaction.
//!
//! # Storage layout
//!
//! - Scalar account fields are columns; nested registration collections
//!   (social links, measurements, talents, achievements, photos) are JSON text.
//! - Timestamps are Unix milliseconds.
//! - `email` and `payment_id` carry UNIQUE constraints (`NULL` payment ids do
//!   not collide).
//! - `votes_count` is only ever written by the vote ledger's in-place
//!   increment. [`ContestStore::save_account`] leaves it alone.
//!
//! # Public visibility
//!
//! Every public read path filters with [`PUBLIC_ELIGIBILITY`]. Do not inline
//! the clauses anywhere else.

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, Type, Value, ValueRef};
use rusqlite::{params, params_from_iter, Connection, OpenFlags, OptionalExtension, Row, ToSql};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::account::{Account, CompetitionRegistration, NewAccount, Payment};
use crate::config::StoreConfig;
use crate::error::{constraint_message, is_unique_violation, Result, StoreError};
use crate::types::{
    from_millis, to_millis, AccountId, Page, PageRequest, PaymentStatus, RegistrationStatus,
    Role, SortOrder,
};

/// The three-clause eligibility predicate for anything shown to the public.
pub const PUBLIC_ELIGIBILITY: &str = "payment_status = 'approved' \
     AND registration_status = 'completed' \
     AND is_publicly_visible = 1";

const ACCOUNT_COLUMNS: &str = "id, name, email, password_hash, role, \
     payment_status, payment_id, payment_amount, payment_date, payment_notes, \
     registration_status, category, age, biography, photo_url, completed_at, \
     social_links, measurements, talents, achievements, votes_count, \
     is_publicly_visible, approval_date, profile_photo, photos, \
     created_at, updated_at";

macro_rules! sql_enum {
    ($ty:ty) => {
        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e| FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

sql_enum!(Role);
sql_enum!(PaymentStatus);
sql_enum!(RegistrationStatus);

/// Public projection of an eligible contestant. Email and payment fields
/// never leave the store through this type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicContestant {
    pub id: AccountId,
    pub name: String,
    pub competition_registration: CompetitionRegistration,
}

impl From<Account> for PublicContestant {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            name: account.name,
            competition_registration: account.competition_registration,
        }
    }
}

/// Sort keys for the public listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum PublicSort {
    Votes,
    Recent,
    Name,
    #[default]
    ApprovalDate,
}

/// Public listing filters
#[derive(Debug, Clone, Default)]
pub struct PublicContestantQuery {
    pub category: Option<String>,
    /// Case-insensitive substring of name or biography
    pub search: Option<String>,
    pub sort: PublicSort,
    pub order: SortOrder,
    pub page: PageRequest,
}

/// Sort keys for the admin listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum AdminSort {
    Votes,
    Name,
    PaymentDate,
    #[default]
    CreatedAt,
}

/// Admin listing filters
#[derive(Debug, Clone, Default)]
pub struct AdminAccountQuery {
    pub registration_status: Option<RegistrationStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub category: Option<String>,
    /// Case-insensitive substring of name or email
    pub search: Option<String>,
    pub sort: AdminSort,
    pub order: SortOrder,
    pub page: PageRequest,
}

/// WHERE clause builder with positional parameters
#[derive(Default)]
pub(crate) struct Filter {
    clauses: Vec<String>,
    pub(crate) values: Vec<Value>,
}

impl Filter {
    pub(crate) fn eq(&mut self, column: &str, value: impl Into<Value>) {
        self.values.push(value.into());
        self.clauses.push(format!("{column} = ?{}", self.values.len()));
    }

    pub(crate) fn ge(&mut self, column: &str, value: impl Into<Value>) {
        self.values.push(value.into());
        self.clauses.push(format!("{column} >= ?{}", self.values.len()));
    }

    pub(crate) fn le(&mut self, column: &str, value: impl Into<Value>) {
        self.values.push(value.into());
        self.clauses.push(format!("{column} <= ?{}", self.values.len()));
    }

    pub(crate) fn raw(&mut self, clause: &str) {
        self.clauses.push(format!("({clause})"));
    }

    /// Substring match over any of `columns`
    fn search(&mut self, columns: &[&str], term: &str) {
        let term = term.trim();
        if term.is_empty() {
            return;
        }
        self.values.push(Value::Text(like_pattern(term)));
        let idx = self.values.len();
        let any = columns
            .iter()
            .map(|c| format!("lower(coalesce({c}, '')) LIKE ?{idx} ESCAPE '\\'"))
            .collect::<Vec<_>>()
            .join(" OR ");
        self.clauses.push(format!("({any})"));
    }

    pub(crate) fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.clauses.join(" AND "))
        }
    }
}

fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.to_lowercase().chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn conversion_error(idx: usize, e: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

pub(crate) fn uuid_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|e| conversion_error(idx, e))
}

fn json_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(idx, e))
}

fn time_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    Ok(row.get::<_, Option<i64>>(idx)?.map(from_millis))
}

fn opt_millis(ts: Option<DateTime<Utc>>) -> Option<i64> {
    ts.map(to_millis)
}

pub(crate) fn account_from_row(row: &Row<'_>) -> rusqlite::Result<Account> {
    let profile_photo: Option<String> = row.get(23)?;
    let profile_photo = profile_photo
        .map(|raw| serde_json::from_str(&raw).map_err(|e| conversion_error(23, e)))
        .transpose()?;

    Ok(Account {
        id: uuid_column(row, 0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        role: row.get(4)?,
        payment: Payment {
            status: row.get(5)?,
            payment_id: row.get(6)?,
            amount: row.get(7)?,
            date: time_column(row, 8)?,
            notes: row.get(9)?,
        },
        competition_registration: CompetitionRegistration {
            status: row.get(10)?,
            category: row.get(11)?,
            age: row.get(12)?,
            biography: row.get(13)?,
            photo_url: row.get(14)?,
            completed_at: time_column(row, 15)?,
            social_media_links: json_column(row, 16)?,
            measurements: json_column(row, 17)?,
            talents: json_column(row, 18)?,
            achievements: json_column(row, 19)?,
            votes_count: row.get::<_, i64>(20)?.max(0) as u64,
            is_publicly_visible: row.get(21)?,
            approval_date: time_column(row, 22)?,
            profile_photo,
            photos: json_column(row, 24)?,
        },
        created_at: from_millis(row.get(25)?),
        updated_at: from_millis(row.get(26)?),
    })
}

/// Persistent store for accounts and votes
pub struct ContestStore {
    pub(crate) conn: Connection,
    path: PathBuf,
}

impl ContestStore {
    /// Open (creating if needed) the store described by `config`.
    ///
    /// Runs the vote-count audit after the schema is in place; drift is
    /// logged, not fatal.
    pub fn open(config: &StoreConfig) -> Result<Self> {
        let path = config.path.as_path();

        info!(path = %path.display(), "Opening contest store");

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        conn.busy_timeout(config.busy_timeout())?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        Self::init_schema(&conn)?;

        let store = Self {
            conn,
            path: path.to_path_buf(),
        };

        let drift = store.audit_vote_counts()?;
        if drift.is_empty() {
            info!(path = %store.path.display(), "Vote counts consistent with ledger");
        } else {
            for d in &drift {
                warn!(
                    account_id = %d.account_id,
                    stored = d.stored,
                    actual = d.actual,
                    "votesCount drifted from vote ledger"
                );
            }
        }

        Ok(store)
    }

    /// Open with default settings at `path`
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(&StoreConfig::new(path.as_ref()))
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS accounts (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                role TEXT NOT NULL DEFAULT 'user'
                    CHECK (role IN ('user', 'admin')),
                payment_status TEXT NOT NULL DEFAULT 'pending'
                    CHECK (payment_status IN ('pending', 'processing', 'approved', 'rejected')),
                payment_id TEXT UNIQUE,
                payment_amount REAL NOT NULL DEFAULT 0,
                payment_date INTEGER,
                payment_notes TEXT,
                registration_status TEXT NOT NULL DEFAULT 'pending'
                    CHECK (registration_status IN ('pending', 'completed')),
                category TEXT,
                age INTEGER,
                biography TEXT,
                photo_url TEXT,
                completed_at INTEGER,
                social_links TEXT NOT NULL DEFAULT '{}',
                measurements TEXT NOT NULL DEFAULT '{}',
                talents TEXT NOT NULL DEFAULT '[]',
                achievements TEXT NOT NULL DEFAULT '[]',
                votes_count INTEGER NOT NULL DEFAULT 0 CHECK (votes_count >= 0),
                is_publicly_visible INTEGER NOT NULL DEFAULT 0,
                approval_date INTEGER,
                profile_photo TEXT,
                photos TEXT NOT NULL DEFAULT '[]',
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_accounts_payment_status ON accounts(payment_status);
            CREATE INDEX IF NOT EXISTS idx_accounts_registration ON accounts(registration_status, is_publicly_visible);
            CREATE INDEX IF NOT EXISTS idx_accounts_category ON accounts(category);
            "#,
        )?;

        crate::ledger::init_schema(conn)?;

        Ok(())
    }

    /// Database file backing this store
    pub fn db_path(&self) -> &Path {
        &self.path
    }

    fn map_write_error(error: rusqlite::Error, account: &Account) -> StoreError {
        if is_unique_violation(&error) {
            let msg = constraint_message(&error).unwrap_or_default();
            if msg.contains("accounts.email") {
                return StoreError::DuplicateEmail(account.email.clone());
            }
            if msg.contains("accounts.payment_id") {
                return StoreError::DuplicatePaymentId(
                    account.payment.payment_id.clone().unwrap_or_default(),
                );
            }
        }
        StoreError::DatabaseError(error)
    }

    /// Insert a new account with default payment and registration state
    pub fn create_account(&mut self, new: NewAccount, now: DateTime<Utc>) -> Result<Account> {
        let account = Account {
            id: Uuid::new_v4(),
            name: new.name,
            email: new.email,
            password_hash: new.password_hash,
            role: new.role,
            payment: Payment::default(),
            competition_registration: CompetitionRegistration::default(),
            created_at: now,
            updated_at: now,
        };

        self.conn
            .execute(
                "INSERT INTO accounts (id, name, email, password_hash, role, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    account.id.to_string(),
                    account.name,
                    account.email,
                    account.password_hash,
                    account.role,
                    to_millis(now),
                    to_millis(now),
                ],
            )
            .map_err(|e| Self::map_write_error(e, &account))?;

        info!(account_id = %account.id, role = %account.role, "Account created");

        Ok(account)
    }

    /// Persist every mutable field except `votes_count`
    pub fn save_account(&mut self, account: &Account) -> Result<()> {
        let registration = &account.competition_registration;
        let profile_photo = registration
            .profile_photo
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let changed = self
            .conn
            .execute(
                r#"
                UPDATE accounts SET
                    name = ?2, email = ?3, password_hash = ?4, role = ?5,
                    payment_status = ?6, payment_id = ?7, payment_amount = ?8,
                    payment_date = ?9, payment_notes = ?10,
                    registration_status = ?11, category = ?12, age = ?13,
                    biography = ?14, photo_url = ?15, completed_at = ?16,
                    social_links = ?17, measurements = ?18, talents = ?19,
                    achievements = ?20, is_publicly_visible = ?21,
                    approval_date = ?22, profile_photo = ?23, photos = ?24,
                    updated_at = ?25
                WHERE id = ?1
                "#,
                params![
                    account.id.to_string(),
                    account.name,
                    account.email,
                    account.password_hash,
                    account.role,
                    account.payment.status,
                    account.payment.payment_id,
                    account.payment.amount,
                    opt_millis(account.payment.date),
                    account.payment.notes,
                    registration.status,
                    registration.category,
                    registration.age,
                    registration.biography,
                    registration.photo_url,
                    opt_millis(registration.completed_at),
                    serde_json::to_string(&registration.social_media_links)?,
                    serde_json::to_string(&registration.measurements)?,
                    serde_json::to_string(&registration.talents)?,
                    serde_json::to_string(&registration.achievements)?,
                    registration.is_publicly_visible,
                    opt_millis(registration.approval_date),
                    profile_photo,
                    serde_json::to_string(&registration.photos)?,
                    to_millis(account.updated_at),
                ],
            )
            .map_err(|e| Self::map_write_error(e, account))?;

        if changed == 0 {
            return Err(StoreError::AccountNotFound(account.id));
        }

        debug!(account_id = %account.id, "Account saved");
        Ok(())
    }

    pub fn find_account(&self, id: AccountId) -> Result<Option<Account>> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?1");
        Ok(self
            .conn
            .query_row(&sql, [id.to_string()], account_from_row)
            .optional()?)
    }

    /// Load an account, failing with [`StoreError::AccountNotFound`]
    pub fn account(&self, id: AccountId) -> Result<Account> {
        self.find_account(id)?
            .ok_or(StoreError::AccountNotFound(id))
    }

    /// Look up by (already normalized) email
    pub fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = ?1");
        Ok(self
            .conn
            .query_row(&sql, [email], account_from_row)
            .optional()?)
    }

    pub fn has_admin(&self) -> Result<bool> {
        Ok(self
            .conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM accounts WHERE role = 'admin')",
                [],
                |row| row.get(0),
            )?)
    }

    /// Apply one admin payment decision to many accounts atomically.
    ///
    /// Unknown ids are skipped. Returns the accounts that were updated.
    pub fn bulk_review_payments(
        &mut self,
        ids: &[AccountId],
        status: PaymentStatus,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Account>> {
        let tx = self.conn.transaction()?;
        let mut updated = Vec::with_capacity(ids.len());
        {
            let select = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?1");
            let mut load = tx.prepare(&select)?;
            let mut write = tx.prepare(
                "UPDATE accounts SET payment_status = ?2, payment_notes = ?3,
                     payment_date = ?4, approval_date = ?5, updated_at = ?6
                 WHERE id = ?1",
            )?;

            for id in ids {
                let Some(mut account) = load
                    .query_row([id.to_string()], account_from_row)
                    .optional()?
                else {
                    continue;
                };

                account.review_payment(status, notes.clone(), now);
                write.execute(params![
                    account.id.to_string(),
                    account.payment.status,
                    account.payment.notes,
                    opt_millis(account.payment.date),
                    opt_millis(account.competition_registration.approval_date),
                    to_millis(account.updated_at),
                ])?;
                updated.push(account);
            }
        }
        tx.commit()?;

        info!(
            requested = ids.len(),
            updated = updated.len(),
            status = %status,
            "Bulk payment review applied"
        );

        Ok(updated)
    }

    fn count(&self, filter: &Filter) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM accounts {}", filter.where_sql());
        let total: i64 = self
            .conn
            .query_row(&sql, params_from_iter(filter.values.iter()), |row| row.get(0))?;
        Ok(total.max(0) as u64)
    }

    fn page_of_accounts(
        &self,
        filter: &Filter,
        order_by: &str,
        page: PageRequest,
    ) -> Result<Page<Account>> {
        let sql = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts {} ORDER BY {order_by}, id ASC LIMIT {} OFFSET {}",
            filter.where_sql(),
            page.limit,
            page.offset(),
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let items = stmt
            .query_map(params_from_iter(filter.values.iter()), account_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let total = self.count(filter)?;
        Ok(Page::new(items, page, total))
    }

    /// Public contestant listing; always filtered by [`PUBLIC_ELIGIBILITY`]
    pub fn public_contestants(
        &self,
        query: &PublicContestantQuery,
    ) -> Result<Page<PublicContestant>> {
        let mut filter = Filter::default();
        filter.raw(PUBLIC_ELIGIBILITY);
        if let Some(category) = query.category.as_deref().filter(|c| !c.is_empty()) {
            filter.eq("category", category.to_string());
        }
        if let Some(search) = query.search.as_deref() {
            filter.search(&["name", "biography"], search);
        }

        let order = query.order.sql();
        let order_by = match query.sort {
            PublicSort::Votes => format!("votes_count {order}"),
            PublicSort::Recent => format!("approval_date {order}"),
            PublicSort::Name => format!("name COLLATE NOCASE {order}"),
            PublicSort::ApprovalDate => "approval_date DESC".to_string(),
        };

        Ok(self
            .page_of_accounts(&filter, &order_by, query.page)?
            .map(PublicContestant::from))
    }

    /// Public detail view; `None` unless the account passes [`PUBLIC_ELIGIBILITY`]
    pub fn public_contestant(&self, id: AccountId) -> Result<Option<PublicContestant>> {
        let sql = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?1 AND ({PUBLIC_ELIGIBILITY})"
        );
        Ok(self
            .conn
            .query_row(&sql, [id.to_string()], account_from_row)
            .optional()?
            .map(PublicContestant::from))
    }

    /// Admin listing over every account
    pub fn admin_accounts(&self, query: &AdminAccountQuery) -> Result<Page<Account>> {
        let mut filter = Filter::default();
        if let Some(status) = query.registration_status {
            filter.eq("registration_status", status.as_str().to_string());
        }
        if let Some(status) = query.payment_status {
            filter.eq("payment_status", status.as_str().to_string());
        }
        if let Some(category) = query.category.as_deref().filter(|c| !c.is_empty()) {
            filter.eq("category", category.to_string());
        }
        if let Some(search) = query.search.as_deref() {
            filter.search(&["name", "email"], search);
        }

        let order = query.order.sql();
        let order_by = match query.sort {
            AdminSort::Votes => format!("votes_count {order}"),
            AdminSort::Name => format!("name COLLATE NOCASE {order}"),
            AdminSort::PaymentDate => format!("payment_date {order}"),
            AdminSort::CreatedAt => format!("created_at {order}"),
        };

        self.page_of_accounts(&filter, &order_by, query.page)
    }

    /// Every account, optionally restricted to one payment status
    pub fn export_accounts(&self, payment_status: Option<PaymentStatus>) -> Result<Vec<Account>> {
        let mut filter = Filter::default();
        if let Some(status) = payment_status {
            filter.eq("payment_status", status.as_str().to_string());
        }
        let sql = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts {} ORDER BY created_at ASC, id ASC",
            filter.where_sql()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let accounts = stmt
            .query_map(params_from_iter(filter.values.iter()), account_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(accounts)
    }

    /// Execute raw SQL for testing purposes only
    ///
    /// **WARNING**: bypasses every store invariant. Tests use it to simulate
    /// drift and tampering.
    #[doc(hidden)]
    pub fn __test_execute_raw_sql(&self, sql: &str, params: &[&dyn ToSql]) -> Result<usize> {
        Ok(self.conn.execute(sql, params)?)
    }
}
