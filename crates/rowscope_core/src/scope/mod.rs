//! Units of work: one connection bound to one open transaction.
//!
//! # Responsibility
//! - Own the connection/transaction pairing shared by composed operations.
//! - Queue entity writes and submit them into the open transaction.
//! - Decide per call whether to join a caller scope or create one.
//!
//! # Invariants
//! - Only the value owner can finalize a scope; `&Scope` cannot commit.
//! - A scope dropped while its transaction is open rolls back.
//! - A scope is used by one operation at a time (`Scope` is not `Sync`).

mod changes;
mod manager;

pub use changes::PendingChange;
pub use manager::ScopeManager;

use crate::config::BeginMode;
use crate::repo::error::RepoResult;
use log::{debug, error, info, warn};
use rusqlite::Connection;
use std::cell::RefCell;
use std::fmt::{Debug, Formatter};
use std::time::Instant;
use uuid::Uuid;

/// One live connection with an open transaction and a pending-change queue.
pub struct Scope {
    id: Uuid,
    conn: Connection,
    pending: RefCell<Vec<PendingChange>>,
    opened_at: Instant,
}

impl Scope {
    /// Begins a transaction on `conn` and wraps it in a scope.
    pub(crate) fn begin(conn: Connection, mode: BeginMode) -> RepoResult<Self> {
        let id = Uuid::new_v4();
        if let Err(err) = conn.execute_batch(mode.begin_sql()) {
            error!(
                "event=scope_begin module=scope status=error scope_id={} mode={:?} error={}",
                id, mode, err
            );
            return Err(err.into());
        }
        debug!(
            "event=scope_begin module=scope status=ok scope_id={} mode={:?}",
            id, mode
        );
        Ok(Self {
            id,
            conn,
            pending: RefCell::new(Vec::new()),
            opened_at: Instant::now(),
        })
    }

    /// Correlation id used in scope log events.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Connection bound to this scope's transaction.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Whether the transaction is still open.
    pub fn is_active(&self) -> bool {
        !self.conn.is_autocommit()
    }

    pub fn pending_changes(&self) -> usize {
        self.pending.borrow().len()
    }

    pub(crate) fn queue(&self, change: PendingChange) {
        self.pending.borrow_mut().push(change);
    }

    /// Executes queued writes in queue order inside the open transaction.
    ///
    /// The queue is drained even when a write fails; the failing transaction
    /// is then expected to roll back.
    pub fn submit_changes(&self) -> RepoResult<usize> {
        let changes = std::mem::take(&mut *self.pending.borrow_mut());
        if changes.is_empty() {
            return Ok(0);
        }

        for change in &changes {
            if let Err(err) = change.apply(&self.conn) {
                error!(
                    "event=changes_submit module=scope status=error scope_id={} table={} operation={} error={}",
                    self.id,
                    change.table(),
                    change.operation(),
                    err
                );
                return Err(err);
            }
        }

        debug!(
            "event=changes_submit module=scope status=ok scope_id={} count={}",
            self.id,
            changes.len()
        );
        Ok(changes.len())
    }

    /// Submits anything still queued, commits and releases the connection.
    pub fn commit(self) -> RepoResult<()> {
        self.submit_changes()?;
        if let Err(err) = self.conn.execute_batch("COMMIT;") {
            error!(
                "event=scope_commit module=scope status=error scope_id={} duration_ms={} error={}",
                self.id,
                self.opened_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
        info!(
            "event=scope_commit module=scope status=ok scope_id={} duration_ms={}",
            self.id,
            self.opened_at.elapsed().as_millis()
        );
        Ok(())
    }

    /// Discards queued writes, rolls back and releases the connection.
    pub fn rollback(self) -> RepoResult<()> {
        self.pending.borrow_mut().clear();
        if self.is_active() {
            self.conn.execute_batch("ROLLBACK;")?;
        }
        info!(
            "event=scope_rollback module=scope status=ok scope_id={} duration_ms={}",
            self.id,
            self.opened_at.elapsed().as_millis()
        );
        Ok(())
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        if !self.is_active() {
            return;
        }
        warn!(
            "event=scope_rollback module=scope status=start scope_id={} reason=dropped_while_active",
            self.id
        );
        if let Err(err) = self.conn.execute_batch("ROLLBACK;") {
            error!(
                "event=scope_rollback module=scope status=error scope_id={} error={}",
                self.id, err
            );
        }
    }
}

impl Debug for Scope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .field("pending", &self.pending_changes())
            .finish()
    }
}
