//! Scope creation and the single entry point every data access goes through.

use super::Scope;
use crate::config::{ConnectionStringProvider, DataAccessConfig};
use crate::db::open_connection;
use crate::repo::error::RepoResult;
use log::warn;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Opens scopes and runs operations inside them.
///
/// Cheap to clone; clones share the provider and configuration.
#[derive(Clone)]
pub struct ScopeManager {
    provider: Arc<dyn ConnectionStringProvider>,
    config: Arc<DataAccessConfig>,
}

impl ScopeManager {
    pub fn new(provider: impl ConnectionStringProvider + 'static, config: DataAccessConfig) -> Self {
        Self {
            provider: Arc::new(provider),
            config: Arc::new(config),
        }
    }

    /// Uses `DataAccessConfig::default()`.
    pub fn with_provider(provider: impl ConnectionStringProvider + 'static) -> Self {
        Self::new(provider, DataAccessConfig::default())
    }

    pub fn config(&self) -> &DataAccessConfig {
        &self.config
    }

    /// Opens a connection and begins its transaction immediately.
    ///
    /// The caller owns the returned scope and must `commit` or `rollback` it;
    /// dropping it rolls back.
    pub fn begin_scope(&self) -> RepoResult<Scope> {
        let connection_string = self.provider.connection_string();
        let conn = open_connection(connection_string.as_deref(), &self.config)?;
        Scope::begin(conn, self.config.begin_mode)
    }

    /// Runs `body` inside `scope`, or inside a new scope owned by this call.
    ///
    /// # Contract
    /// - A caller scope is reused verbatim and never finalized here; on
    ///   success with `submit_on_success` its queued writes are submitted
    ///   into the caller's transaction.
    /// - A self-owned scope submits (when requested) and commits only if
    ///   `body` succeeds; any failure rolls it back. The connection is
    ///   released before returning in both cases.
    pub fn with_scope<T, F>(&self, scope: Option<&Scope>, submit_on_success: bool, body: F) -> RepoResult<T>
    where
        F: FnOnce(&Scope) -> RepoResult<T>,
    {
        if let Some(borrowed) = scope {
            let value = body(borrowed)?;
            if submit_on_success {
                borrowed.submit_changes()?;
            }
            return Ok(value);
        }

        let owned = self.begin_scope()?;
        let outcome = body(&owned).and_then(|value| {
            if submit_on_success {
                owned.submit_changes()?;
            }
            Ok(value)
        });

        match outcome {
            Ok(value) => {
                owned.commit()?;
                Ok(value)
            }
            Err(err) => {
                let scope_id = owned.id();
                if let Err(rollback_err) = owned.rollback() {
                    warn!(
                        "event=scope_rollback module=scope status=error scope_id={} error={}",
                        scope_id, rollback_err
                    );
                }
                Err(err)
            }
        }
    }
}

impl Debug for ScopeManager {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeManager")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
