use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fjall::{Config, PartitionCreateOptions, PersistMode, TxKeyspace, TxPartitionHandle};
use tracing::{debug, info, warn};

use super::error::{LedgerError, Result};
use super::keys::{
    decode_pending_key, encode_object_key, encode_payment_key, encode_pending_key,
};
use super::models::{
    ClaimBatch, ClaimedPayment, NewPayment, Object, Payment, SettleOutcome, Settlement,
};
use super::traits::LedgerStore;

/// Source of "now" for the ledger (pin times, payment times, expiry)
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Fjall-backed ledger of objects and payments
///
/// Mutations run as fjall write transactions. Write transactions are
/// serialized by the keyspace, which gives every claim/settle/insert/delete
/// all-or-nothing semantics and a total order against the others.
#[derive(Clone)]
pub struct FjallLedger {
    keyspace: TxKeyspace,
    objects: TxPartitionHandle,
    payments: TxPartitionHandle,
    pending: TxPartitionHandle,
    clock: Clock,
}

impl FjallLedger {
    /// Open or create a ledger at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_clock(path, Arc::new(Utc::now))
    }

    /// Open or create a ledger that reads time from `clock`
    pub fn open_with_clock<P: AsRef<Path>>(path: P, clock: Clock) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening ledger at: {}", path.display());

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let keyspace = Config::new(path).open_transactional()?;

        let objects = keyspace.open_partition("objects", PartitionCreateOptions::default())?;
        let payments = keyspace.open_partition("payments", PartitionCreateOptions::default())?;
        let pending = keyspace.open_partition("pending", PartitionCreateOptions::default())?;

        info!("Ledger opened successfully");
        Ok(Self {
            keyspace,
            objects,
            payments,
            pending,
            clock,
        })
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// Persist all pending writes to disk
    pub fn persist(&self) -> Result<()> {
        self.keyspace.persist(PersistMode::SyncAll)?;
        Ok(())
    }

    /// Liveness check: one point read, no partition scans
    pub fn check(&self) -> Result<()> {
        let rtx = self.keyspace.read_tx();
        rtx.get(&self.objects, encode_object_key(""))?;
        Ok(())
    }

    /// Get internal statistics (for debugging/monitoring)
    pub fn stats(&self) -> Result<StoreStats> {
        let rtx = self.keyspace.read_tx();
        let mut stats = StoreStats::default();

        for item in rtx.iter(&self.objects) {
            item?;
            stats.object_count += 1;
        }

        for item in rtx.iter(&self.payments) {
            item?;
            stats.payment_count += 1;
        }

        for item in rtx.iter(&self.pending) {
            item?;
            stats.pending_count += 1;
        }

        Ok(stats)
    }

    fn read_objects(&self) -> Result<Vec<Object>> {
        let rtx = self.keyspace.read_tx();
        let mut objects = Vec::new();
        for item in rtx.iter(&self.objects) {
            let (_, value) = item?;
            objects.push(serde_json::from_slice::<Object>(&value)?);
        }
        Ok(objects)
    }

    fn insert_payment_tx(&self, new: NewPayment) -> Result<()> {
        if new.amount < 0 {
            return Err(LedgerError::InvalidAmount {
                order_id: new.order_id,
                amount: new.amount,
            });
        }

        let mut tx = self.keyspace.write_tx();
        let key = encode_payment_key(&new.order_id);
        if tx.get(&self.payments, &key)?.is_some() {
            return Err(LedgerError::DuplicatePayment(new.order_id));
        }

        let payment = Payment {
            order_id: new.order_id,
            cid: new.cid,
            amount: new.amount,
            paid_at: self.now(),
            note: new.note,
            processed: false,
            tries: 0,
            given_up: false,
        };

        tx.insert(&self.payments, key, serde_json::to_vec(&payment)?);
        tx.insert(&self.pending, encode_pending_key(&payment.order_id), Vec::<u8>::new());
        tx.commit()?;
        self.persist()?;

        debug!(order_id = %payment.order_id, cid = %payment.cid, "Inserted payment");
        Ok(())
    }

    fn claim_tx(&self, retry_ceiling: u32) -> Result<ClaimBatch> {
        let mut tx = self.keyspace.write_tx();

        let pending_keys = tx
            .iter(&self.pending)
            .map(|item| item.map(|(key, _)| key))
            .collect::<std::result::Result<Vec<_>, fjall::Error>>()?;

        let mut batch = ClaimBatch::default();

        for pending_key in pending_keys {
            let Some(order_id) = decode_pending_key(&pending_key) else {
                warn!(key = ?pending_key, "Dropping malformed pending key");
                tx.remove(&self.pending, pending_key);
                continue;
            };

            let payment_key = encode_payment_key(&order_id);
            let Some(raw) = tx.get(&self.payments, &payment_key)? else {
                warn!(order_id = %order_id, "Pending index points at a missing payment");
                tx.remove(&self.pending, pending_key);
                continue;
            };

            let mut payment: Payment = serde_json::from_slice(&raw)?;
            if payment.processed {
                tx.remove(&self.pending, pending_key);
                continue;
            }

            // Exhausted payments leave the pending set before anything is incremented
            if payment.tries > retry_ceiling {
                payment.given_up = true;
                payment.processed = true;
                tx.insert(&self.payments, payment_key, serde_json::to_vec(&payment)?);
                tx.remove(&self.pending, pending_key);
                batch.given_up.push(order_id);
                continue;
            }

            payment.tries = payment.tries.saturating_add(1);
            tx.insert(&self.payments, payment_key, serde_json::to_vec(&payment)?);
            batch.attempts.push(ClaimedPayment {
                order_id: payment.order_id,
                cid: payment.cid,
                amount: payment.amount,
            });
        }

        tx.commit()?;
        self.persist()?;

        debug!(
            attempts = batch.attempts.len(),
            given_up = batch.given_up.len(),
            "Claimed unprocessed payments"
        );
        Ok(batch)
    }

    fn settle_tx(&self, settlement: Settlement) -> Result<SettleOutcome> {
        let mut tx = self.keyspace.write_tx();

        let payment_key = encode_payment_key(&settlement.order_id);
        let Some(raw) = tx.get(&self.payments, &payment_key)? else {
            return Err(LedgerError::PaymentNotFound(settlement.order_id));
        };

        let mut payment: Payment = serde_json::from_slice(&raw)?;
        if payment.cid != settlement.cid {
            return Err(LedgerError::CidMismatch {
                order_id: settlement.order_id,
                expected: payment.cid,
                actual: settlement.cid,
            });
        }

        // Dropping the transaction discards it
        if payment.processed {
            return Ok(SettleOutcome::AlreadyProcessed);
        }

        payment.processed = true;
        tx.insert(&self.payments, payment_key, serde_json::to_vec(&payment)?);
        tx.remove(&self.pending, encode_pending_key(&payment.order_id));

        let extension = settlement.duration.as_secs();
        let object_key = encode_object_key(&settlement.cid);

        let (mut object, outcome) = match tx.get(&self.objects, &object_key)? {
            Some(raw) => {
                let mut object: Object = serde_json::from_slice(&raw)?;
                object.lifespan_secs = object.lifespan_secs.saturating_add(extension);
                (object, SettleOutcome::Extended)
            }
            None => (
                Object {
                    cid: settlement.cid.clone(),
                    size_gb: settlement.size_gb,
                    pinned_at: self.now(),
                    lifespan_secs: extension,
                    notes: Vec::new(),
                },
                SettleOutcome::Created,
            ),
        };

        if !payment.note.is_empty() {
            object.notes.push(payment.note);
        }

        tx.insert(&self.objects, object_key, serde_json::to_vec(&object)?);
        tx.commit()?;
        self.persist()?;

        debug!(
            order_id = %settlement.order_id,
            cid = %settlement.cid,
            extension_secs = extension,
            lifespan_secs = object.lifespan_secs,
            ?outcome,
            "Settled payment"
        );
        Ok(outcome)
    }

    fn delete_object_tx(&self, cid: &str) -> Result<()> {
        let mut tx = self.keyspace.write_tx();
        tx.remove(&self.objects, encode_object_key(cid));
        tx.commit()?;
        self.persist()?;
        debug!(cid, "Deleted object");
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for FjallLedger {
    async fn list_objects(&self) -> Result<Vec<Object>> {
        let mut objects = self.read_objects()?;
        objects.sort_by(|a, b| a.ends_at().cmp(&b.ends_at()).then_with(|| a.cid.cmp(&b.cid)));
        Ok(objects)
    }

    async fn get_object(&self, cid: &str) -> Result<Option<Object>> {
        let rtx = self.keyspace.read_tx();
        match rtx.get(&self.objects, encode_object_key(cid))? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    async fn get_payment(&self, order_id: &str) -> Result<Option<Payment>> {
        let rtx = self.keyspace.read_tx();
        match rtx.get(&self.payments, encode_payment_key(order_id))? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    async fn insert_payment(&self, payment: NewPayment) -> Result<()> {
        self.insert_payment_tx(payment)
    }

    async fn claim_unprocessed_payments(&self, retry_ceiling: u32) -> Result<ClaimBatch> {
        self.claim_tx(retry_ceiling)
    }

    async fn settle_payment(&self, settlement: Settlement) -> Result<SettleOutcome> {
        self.settle_tx(settlement)
    }

    async fn list_expired_object_cids(&self) -> Result<Vec<String>> {
        let now = self.now();
        Ok(self
            .read_objects()?
            .into_iter()
            .filter(|object| object.is_expired(now))
            .map(|object| object.cid)
            .collect())
    }

    async fn delete_object(&self, cid: &str) -> Result<()> {
        self.delete_object_tx(cid)
    }
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct StoreStats {
    pub object_count: usize,
    pub payment_count: usize,
    pub pending_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    struct ManualClock(Arc<Mutex<DateTime<Utc>>>);

    impl ManualClock {
        fn new() -> (Self, Clock) {
            let now = Arc::new(Mutex::new(Utc::now()));
            let handle = now.clone();
            let clock: Clock = Arc::new(move || *handle.lock().unwrap());
            (Self(now), clock)
        }

        fn advance(&self, by: TimeDelta) {
            let mut now = self.0.lock().unwrap();
            *now += by;
        }
    }

    fn create_test_ledger() -> (FjallLedger, ManualClock, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let (manual, clock) = ManualClock::new();
        let ledger = FjallLedger::open_with_clock(temp_dir.path().join("ledger"), clock).unwrap();
        (ledger, manual, temp_dir)
    }

    fn new_payment(order_id: &str, cid: &str, amount: i64, note: &str) -> NewPayment {
        NewPayment {
            order_id: order_id.to_string(),
            cid: cid.to_string(),
            amount,
            note: note.to_string(),
        }
    }

    fn settlement(order_id: &str, cid: &str, secs: u64) -> Settlement {
        Settlement {
            order_id: order_id.to_string(),
            cid: cid.to_string(),
            size_gb: 2.0,
            duration: Duration::from_secs(secs),
        }
    }

    #[tokio::test]
    async fn test_insert_and_get_payment() {
        let (ledger, _clock, _temp) = create_test_ledger();
        ledger.insert_payment(new_payment("o1", "c1", 100, "hello")).await.unwrap();

        let payment = ledger.get_payment("o1").await.unwrap().unwrap();
        assert_eq!(payment.cid, "c1");
        assert_eq!(payment.amount, 100);
        assert_eq!(payment.tries, 0);
        assert!(!payment.processed);
        assert!(!payment.given_up);

        assert!(ledger.get_payment("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_and_negative_payments_rejected() {
        let (ledger, _clock, _temp) = create_test_ledger();
        ledger.insert_payment(new_payment("o1", "c1", 100, "")).await.unwrap();

        let dup = ledger.insert_payment(new_payment("o1", "c2", 5, "")).await;
        assert!(matches!(dup, Err(LedgerError::DuplicatePayment(id)) if id == "o1"));

        let negative = ledger.insert_payment(new_payment("o2", "c1", -1, "")).await;
        assert!(matches!(negative, Err(LedgerError::InvalidAmount { .. })));
    }

    #[tokio::test]
    async fn test_claim_increments_tries() {
        let (ledger, _clock, _temp) = create_test_ledger();
        ledger.insert_payment(new_payment("o1", "c1", 100, "")).await.unwrap();
        ledger.insert_payment(new_payment("o2", "c2", 50, "")).await.unwrap();

        let batch = ledger.claim_unprocessed_payments(5).await.unwrap();
        assert_eq!(batch.attempts.len(), 2);
        assert!(batch.given_up.is_empty());
        assert_eq!(batch.attempts[0].order_id, "o1");
        assert_eq!(batch.attempts[0].amount, 100);

        let batch = ledger.claim_unprocessed_payments(5).await.unwrap();
        assert_eq!(batch.attempts.len(), 2);
        assert_eq!(ledger.get_payment("o1").await.unwrap().unwrap().tries, 2);
    }

    #[tokio::test]
    async fn test_claim_gives_up_past_ceiling() {
        let (ledger, _clock, _temp) = create_test_ledger();
        ledger.insert_payment(new_payment("o1", "c1", 100, "")).await.unwrap();

        // Six attempts: tries 1..=6
        for _ in 0..6 {
            let batch = ledger.claim_unprocessed_payments(5).await.unwrap();
            assert_eq!(batch.attempts.len(), 1);
        }
        assert_eq!(ledger.get_payment("o1").await.unwrap().unwrap().tries, 6);

        let batch = ledger.claim_unprocessed_payments(5).await.unwrap();
        assert!(batch.attempts.is_empty());
        assert_eq!(batch.given_up, vec!["o1".to_string()]);

        let payment = ledger.get_payment("o1").await.unwrap().unwrap();
        assert!(payment.processed);
        assert!(payment.given_up);
        assert_eq!(payment.tries, 6);

        let batch = ledger.claim_unprocessed_payments(5).await.unwrap();
        assert!(batch.attempts.is_empty());
        assert!(batch.given_up.is_empty());
        assert_eq!(ledger.stats().unwrap().pending_count, 0);
    }

    #[tokio::test]
    async fn test_settle_creates_then_extends() {
        let (ledger, _clock, _temp) = create_test_ledger();
        ledger.insert_payment(new_payment("o1", "c1", 100, "first")).await.unwrap();
        ledger.insert_payment(new_payment("o2", "c1", 100, "")).await.unwrap();
        ledger.claim_unprocessed_payments(5).await.unwrap();

        let outcome = ledger.settle_payment(settlement("o1", "c1", 3600)).await.unwrap();
        assert_eq!(outcome, SettleOutcome::Created);
        let created = ledger.get_object("c1").await.unwrap().unwrap();

        let outcome = ledger.settle_payment(settlement("o2", "c1", 7200)).await.unwrap();
        assert_eq!(outcome, SettleOutcome::Extended);

        let object = ledger.get_object("c1").await.unwrap().unwrap();
        assert_eq!(object.lifespan_secs, 3600 + 7200);
        assert_eq!(object.pinned_at, created.pinned_at);
        assert_eq!(object.size_gb, 2.0);
        assert_eq!(object.notes, vec!["first".to_string()]);

        assert!(ledger.get_payment("o1").await.unwrap().unwrap().processed);
        assert!(ledger.get_payment("o2").await.unwrap().unwrap().processed);
        assert_eq!(ledger.stats().unwrap().pending_count, 0);
    }

    #[tokio::test]
    async fn test_settle_is_not_repeated() {
        let (ledger, _clock, _temp) = create_test_ledger();
        ledger.insert_payment(new_payment("o1", "c1", 100, "")).await.unwrap();

        ledger.settle_payment(settlement("o1", "c1", 3600)).await.unwrap();
        let outcome = ledger.settle_payment(settlement("o1", "c1", 3600)).await.unwrap();
        assert_eq!(outcome, SettleOutcome::AlreadyProcessed);

        let object = ledger.get_object("c1").await.unwrap().unwrap();
        assert_eq!(object.lifespan_secs, 3600);
    }

    #[tokio::test]
    async fn test_settle_validates_payment() {
        let (ledger, _clock, _temp) = create_test_ledger();
        let missing = ledger.settle_payment(settlement("nope", "c1", 1)).await;
        assert!(matches!(missing, Err(LedgerError::PaymentNotFound(_))));

        ledger.insert_payment(new_payment("o1", "c1", 100, "")).await.unwrap();
        let mismatch = ledger.settle_payment(settlement("o1", "c2", 1)).await;
        assert!(matches!(mismatch, Err(LedgerError::CidMismatch { .. })));
        assert!(ledger.get_object("c2").await.unwrap().is_none());
        assert!(!ledger.get_payment("o1").await.unwrap().unwrap().processed);
    }

    #[tokio::test]
    async fn test_expired_listing_and_delete() {
        let (ledger, clock, _temp) = create_test_ledger();
        ledger.insert_payment(new_payment("o1", "short", 1, "")).await.unwrap();
        ledger.insert_payment(new_payment("o2", "long", 1, "")).await.unwrap();
        ledger.settle_payment(settlement("o1", "short", 3600)).await.unwrap();
        ledger.settle_payment(settlement("o2", "long", 48 * 3600)).await.unwrap();

        assert!(ledger.list_expired_object_cids().await.unwrap().is_empty());

        clock.advance(TimeDelta::hours(2));
        assert_eq!(ledger.list_expired_object_cids().await.unwrap(), vec!["short".to_string()]);

        let listed: Vec<String> = ledger
            .list_objects()
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.cid)
            .collect();
        assert_eq!(listed, vec!["short".to_string(), "long".to_string()]);

        ledger.delete_object("short").await.unwrap();
        ledger.delete_object("short").await.unwrap();
        assert!(ledger.get_object("short").await.unwrap().is_none());
        assert!(ledger.list_expired_object_cids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reopen_keeps_state() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("ledger");
        {
            let ledger = FjallLedger::open(&path).unwrap();
            ledger.insert_payment(new_payment("o1", "c1", 100, "")).await.unwrap();
            ledger.persist().unwrap();
        }

        let ledger = FjallLedger::open(&path).unwrap();
        assert!(ledger.get_payment("o1").await.unwrap().is_some());
        let stats = ledger.stats().unwrap();
        assert_eq!(stats.payment_count, 1);
        assert_eq!(stats.pending_count, 1);
    }

    #[test]
    fn test_check_on_open_ledger() {
        let (ledger, _clock, _temp_dir) = create_test_ledger();
        assert!(ledger.check().is_ok());
    }
}
