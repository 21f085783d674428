//! The unit-of-work trait for platform state.
//!
//! `with_tx` is the explicit transaction object the engines are written
//! against: the closure receives a scratch copy of the state, and the store
//! commits only when it returns `Ok`. A failure after partial mutation
//! therefore rolls back entirely, and because the store holds an exclusive
//! lock for the duration of the closure, read-modify-write sequences (ledger
//! increments, badge existence-check-then-insert) serialize across threads.

use std::sync::Arc;

use crate::error::Result;
use crate::storage::Database;

/// Trait for platform state stores.
pub trait Store: Send + Sync {
    /// Run a read-only closure against the current snapshot.
    fn with_read<T>(&self, f: impl FnOnce(&Database) -> T) -> T;

    /// Run a transactional closure.
    ///
    /// Mutations are committed if and only if the closure returns `Ok`; any
    /// `Err` discards every write the closure made. Transactions are
    /// serialized with respect to each other and to `with_read`.
    fn with_tx<T>(&self, f: impl FnOnce(&mut Database) -> Result<T>) -> Result<T>;
}

/// Blanket implementation for Arc-wrapped stores.
///
/// This allows sharing one store between a service facade and tests.
impl<S: Store> Store for Arc<S> {
    fn with_read<T>(&self, f: impl FnOnce(&Database) -> T) -> T {
        (**self).with_read(f)
    }

    fn with_tx<T>(&self, f: impl FnOnce(&mut Database) -> Result<T>) -> Result<T> {
        (**self).with_tx(f)
    }
}
