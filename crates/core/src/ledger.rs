//! Vote Ledger - append-only record of one vote per (contestant, voter).
//!
//! # Guarantees
//!
//! - Uniqueness: `UNIQUE (contestant_id, voter_id)` at the storage layer. The
//!   existence check in [`ContestStore::cast_vote`] only produces the nicer
//!   error; the constraint is what holds under concurrency.
//! - Append-only: triggers abort any UPDATE or DELETE on `votes`.
//! - Counter consistency: the vote insert and `votes_count = votes_count + 1`
//!   commit in the same IMMEDIATE transaction, so the counter on the contestant
//!   always equals the number of ledger rows referencing it.
//! - No retries: a failed vote is reported as-is.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{is_unique_violation, Result, StoreError};
use crate::store::{uuid_column, ContestStore};
use crate::types::{from_millis, to_millis, AccountId, PaymentStatus};

pub(crate) fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS votes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            contestant_id TEXT NOT NULL REFERENCES accounts(id),
            voter_id TEXT NOT NULL REFERENCES accounts(id),
            ip_address TEXT,
            voted_at INTEGER NOT NULL,
            UNIQUE (contestant_id, voter_id)
        );

        CREATE INDEX IF NOT EXISTS idx_votes_voted_at ON votes(voted_at);

        CREATE TRIGGER IF NOT EXISTS votes_no_update
        BEFORE UPDATE ON votes
        BEGIN
            SELECT RAISE(ABORT, 'votes are append-only');
        END;

        CREATE TRIGGER IF NOT EXISTS votes_no_delete
        BEFORE DELETE ON votes
        BEGIN
            SELECT RAISE(ABORT, 'votes are append-only');
        END;
        "#,
    )?;
    Ok(())
}

/// Result of a recorded vote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteReceipt {
    /// Contestant's counter after this vote
    pub votes_count: u64,
}

/// One ledger row joined with the voter's identity, for admin views
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRecord {
    pub voter_id: AccountId,
    pub voter_name: String,
    pub voter_email: String,
    pub ip_address: Option<String>,
    pub voted_at: DateTime<Utc>,
}

/// A contestant whose stored counter disagrees with the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountDrift {
    pub account_id: AccountId,
    pub stored: u64,
    pub actual: u64,
}

impl ContestStore {
    /// Record `voter`'s vote for `contestant` exactly once.
    ///
    /// Checks, in order:
    /// 1. contestant exists with payment approved, else [`StoreError::ContestantNotFound`]
    /// 2. no prior vote for the pair, else [`StoreError::DuplicateVote`]
    /// 3. insert; a UNIQUE violation from a racing writer is also
    ///    [`StoreError::DuplicateVote`]
    /// 4. increment the contestant's counter in place
    pub fn cast_vote(
        &mut self,
        contestant: AccountId,
        voter: AccountId,
        ip_address: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<VoteReceipt> {
        let contestant_key = contestant.to_string();
        let voter_key = voter.to_string();

        // IMMEDIATE takes the write lock up front; concurrent voters queue on
        // the busy timeout instead of failing a lock upgrade mid-transaction.
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let status: Option<PaymentStatus> = tx
            .query_row(
                "SELECT payment_status FROM accounts WHERE id = ?1",
                [&contestant_key],
                |row| row.get(0),
            )
            .optional()?;

        if status != Some(PaymentStatus::Approved) {
            debug!(contestant = %contestant, "Vote rejected: contestant not eligible");
            return Err(StoreError::ContestantNotFound);
        }

        let already_voted: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM votes WHERE contestant_id = ?1 AND voter_id = ?2)",
            [&contestant_key, &voter_key],
            |row| row.get(0),
        )?;

        if already_voted {
            debug!(contestant = %contestant, voter = %voter, "Vote rejected: duplicate");
            return Err(StoreError::DuplicateVote);
        }

        tx.execute(
            "INSERT INTO votes (contestant_id, voter_id, ip_address, voted_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![contestant_key, voter_key, ip_address, to_millis(now)],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                warn!(contestant = %contestant, voter = %voter, "Concurrent duplicate vote hit unique constraint");
                StoreError::DuplicateVote
            } else {
                StoreError::DatabaseError(e)
            }
        })?;

        let votes_count: i64 = tx.query_row(
            "UPDATE accounts SET votes_count = votes_count + 1 WHERE id = ?1 RETURNING votes_count",
            [&contestant_key],
            |row| row.get(0),
        )?;

        tx.commit()?;

        debug!(
            contestant = %contestant,
            voter = %voter,
            votes_count = votes_count,
            "Vote recorded"
        );

        Ok(VoteReceipt {
            votes_count: votes_count.max(0) as u64,
        })
    }

    pub fn has_voted(&self, contestant: AccountId, voter: AccountId) -> Result<bool> {
        Ok(self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM votes WHERE contestant_id = ?1 AND voter_id = ?2)",
            [contestant.to_string(), voter.to_string()],
            |row| row.get(0),
        )?)
    }

    /// Number of ledger rows for `contestant`; the source of truth for its counter
    pub fn ledger_vote_count(&self, contestant: AccountId) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM votes WHERE contestant_id = ?1",
            [contestant.to_string()],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    /// Vote history for one contestant, newest first
    pub fn votes_for_contestant(&self, contestant: AccountId) -> Result<Vec<VoteRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT v.voter_id, a.name, a.email, v.ip_address, v.voted_at
            FROM votes v
            JOIN accounts a ON a.id = v.voter_id
            WHERE v.contestant_id = ?1
            ORDER BY v.voted_at DESC, v.id DESC
            "#,
        )?;

        let records = stmt
            .query_map([contestant.to_string()], |row| {
                Ok(VoteRecord {
                    voter_id: uuid_column(row, 0)?,
                    voter_name: row.get(1)?,
                    voter_email: row.get(2)?,
                    ip_address: row.get(3)?,
                    voted_at: from_millis(row.get(4)?),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(records)
    }

    /// Compare every stored `votes_count` with the ledger.
    ///
    /// Returns the accounts whose counter drifted; empty when consistent.
    pub fn audit_vote_counts(&self) -> Result<Vec<CountDrift>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT a.id, a.votes_count, COUNT(v.id) AS actual
            FROM accounts a
            LEFT JOIN votes v ON v.contestant_id = a.id
            GROUP BY a.id
            HAVING a.votes_count != actual
            "#,
        )?;

        let drift = stmt
            .query_map([], |row| {
                Ok(CountDrift {
                    account_id: uuid_column(row, 0)?,
                    stored: row.get::<_, i64>(1)?.max(0) as u64,
                    actual: row.get::<_, i64>(2)?.max(0) as u64,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(drift)
    }
}
