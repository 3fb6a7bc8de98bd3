/// Durable ledger of pinned objects and the payments that fund them
///
/// The ledger is the only shared mutable resource of the settlement and
/// reclamation jobs. Jobs program against the [`LedgerStore`] trait;
/// [`FjallLedger`] is the embedded implementation, persisting:
///
/// - Objects (cid, realized size, first pin time, accumulated lifespan, notes)
/// - Payments (order id, target cid, amount, processed/tries/given-up state)
/// - A pending index of unprocessed payments, so claims never scan settled rows
///
/// ## Atomicity
///
/// Give-up marking plus tries increment (`claim_unprocessed_payments`) and
/// processed flag plus lifespan merge (`settle_payment`) each run as one
/// write transaction. Fjall serializes write transactions, so concurrent
/// settlements for one cid add their durations without losing updates.
///
/// ## Usage
///
/// ```rust,ignore
/// use pinkeep::ledger::{FjallLedger, LedgerStore, NewPayment};
///
/// let ledger = FjallLedger::open("data/ledger")?;
/// ledger.insert_payment(NewPayment { .. }).await?;
/// let batch = ledger.claim_unprocessed_payments(5).await?;
/// ```

pub mod error;
pub mod keys;
pub mod models;
pub mod store;
pub mod traits;

pub use error::{LedgerError, Result};
pub use models::{
    ClaimBatch, ClaimedPayment, NewPayment, Object, Payment, SettleOutcome, Settlement,
};
pub use store::{Clock, FjallLedger, StoreStats};
pub use traits::LedgerStore;
