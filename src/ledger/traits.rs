use async_trait::async_trait;

use super::error::Result;
use super::models::{ClaimBatch, NewPayment, Object, Payment, SettleOutcome, Settlement};

/// Durable storage of objects and payments
///
/// Every mutating operation is a single atomic unit that is serializable
/// with respect to the other mutating operations on the same rows. The jobs
/// never read-modify-write ledger state from their own memory.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// All objects, ascending by `ends_at`
    async fn list_objects(&self) -> Result<Vec<Object>>;

    async fn get_object(&self, cid: &str) -> Result<Option<Object>>;

    async fn get_payment(&self, order_id: &str) -> Result<Option<Payment>>;

    /// Record a new unprocessed payment; a duplicate `order_id` is an error
    async fn insert_payment(&self, payment: NewPayment) -> Result<()>;

    /// Atomically give up every unprocessed payment with `tries > retry_ceiling`,
    /// then increment `tries` on the remaining unprocessed payments and
    /// return them as the attempt set.
    async fn claim_unprocessed_payments(&self, retry_ceiling: u32) -> Result<ClaimBatch>;

    /// Atomically mark the payment processed and insert or extend its object
    async fn settle_payment(&self, settlement: Settlement) -> Result<SettleOutcome>;

    /// Cids of objects with `pinned_at + lifespan < now`
    async fn list_expired_object_cids(&self) -> Result<Vec<String>>;

    /// Remove an object row; removing an absent cid succeeds
    async fn delete_object(&self, cid: &str) -> Result<()>;
}
