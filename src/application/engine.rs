use crate::domain::account::{Account, AccountId, Balance};
use crate::domain::ports::{LedgerStoreBox, UnitOfWork};
use crate::domain::transfer::{TransferRecord, TransferRequest, ValidatedTransfer};
use crate::error::{
    AccountError, AccountRole, ExecutionError, StoreError, TransferError, ValidationError,
};
use rust_decimal::Decimal;
use tracing::{Instrument, Span, debug, error, info, info_span, warn};

/// The entry point for account management and fund transfers.
///
/// `TransferEngine` owns a ledger store and nothing else. It keeps no mutable
/// state between calls, so a single instance can be shared behind an `Arc` by
/// any number of concurrent tasks. Every transfer runs inside one unit of work
/// that either commits as a whole or leaves the store untouched.
pub struct TransferEngine {
    store: LedgerStoreBox,
    span: Span,
}

impl TransferEngine {
    /// Creates a new `TransferEngine`.
    ///
    /// # Arguments
    ///
    /// * `store` - The ledger holding accounts and the transfer log.
    /// * `span` - Parent span for every event the engine emits. Pass
    ///   `Span::none()` to detach the engine from any enclosing context.
    pub fn new(store: LedgerStoreBox, span: Span) -> Self {
        Self { store, span }
    }

    /// Checks a request without touching the store.
    pub fn validate(&self, request: &TransferRequest) -> Result<ValidatedTransfer, ValidationError> {
        request.validate()
    }

    /// Validates the request, then executes it.
    pub async fn transfer(&self, request: TransferRequest) -> Result<TransferRecord, TransferError> {
        let transfer = request.validate().inspect_err(|err| {
            warn!(
                parent: &self.span,
                source_account_id = request.source_account_id,
                destination_account_id = request.destination_account_id,
                amount = %request.amount,
                error = %err,
                "transfer request rejected"
            );
        })?;
        Ok(self.execute(&transfer).await?)
    }

    /// Moves funds between two accounts as a single atomic unit of work.
    ///
    /// Row holds are always taken lowest account id first, so two transfers over
    /// the same pair of accounts can never wait on each other in a cycle. The
    /// engine makes exactly one attempt; retrying is up to the caller.
    ///
    /// Dropping the returned future before it resolves drops the unit of work,
    /// which releases the holds and discards everything it staged.
    pub async fn execute(
        &self,
        transfer: &ValidatedTransfer,
    ) -> Result<TransferRecord, ExecutionError> {
        let span = info_span!(
            parent: &self.span,
            "transfer",
            source = transfer.source(),
            destination = transfer.destination(),
            amount = %transfer.amount(),
        );

        async move {
            let mut uow = self.store.begin().await.inspect_err(log_store_failure)?;

            match apply(uow.as_mut(), transfer).await {
                Ok(record) => {
                    uow.commit().await.inspect_err(log_store_failure)?;
                    info!(transfer_id = record.id, "transfer committed");
                    Ok(record)
                }
                Err(err) => {
                    if let Err(rollback_err) = uow.rollback().await {
                        error!(error = ?rollback_err, "rollback failed");
                    }
                    match &err {
                        ExecutionError::StoreFailure(store_err) => log_store_failure(store_err),
                        rejection => warn!(error = %rejection, "transfer rejected"),
                    }
                    Err(err)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Opens a new account. Ids must be positive and the opening balance non-negative.
    pub async fn create_account(
        &self,
        id: AccountId,
        initial_balance: Decimal,
    ) -> Result<Account, AccountError> {
        if id <= 0 {
            return Err(AccountError::InvalidAccountId(id));
        }
        let balance = Balance::new(initial_balance);
        if balance.is_negative() {
            return Err(AccountError::NegativeBalance);
        }

        let account = self.store.create_account(Account::new(id, balance)).await?;
        info!(parent: &self.span, account_id = id, balance = %account.balance, "account created");
        Ok(account)
    }

    pub async fn get_account(&self, id: AccountId) -> Result<Account, AccountError> {
        self.store
            .get_account(id)
            .await?
            .ok_or(AccountError::NotFound(id))
    }

    /// Every account in the ledger, ordered by id.
    pub async fn accounts(&self) -> Result<Vec<Account>, StoreError> {
        self.store.all_accounts().await
    }

    /// The transfer log, ordered by id.
    pub async fn transfers(&self) -> Result<Vec<TransferRecord>, StoreError> {
        self.store.all_transfers().await
    }
}

fn log_store_failure(err: &StoreError) {
    error!(error = ?err, "ledger store failure");
}

/// Order in which a transfer takes its row holds: ascending account id,
/// whichever side of the transfer each account is on.
fn lock_order(transfer: &ValidatedTransfer) -> [(AccountId, AccountRole); 2] {
    let source = (transfer.source(), AccountRole::Source);
    let destination = (transfer.destination(), AccountRole::Destination);
    if source.0 < destination.0 {
        [source, destination]
    } else {
        [destination, source]
    }
}

async fn lock_participant(
    uow: &mut dyn UnitOfWork,
    (id, role): (AccountId, AccountRole),
) -> Result<Account, ExecutionError> {
    debug!(account_id = id, %role, "acquiring row hold");
    uow.lock_account(id)
        .await?
        .ok_or(ExecutionError::AccountNotFound { id, role })
}

/// Everything between `begin` and `commit`. Any error leaves the caller to roll back.
async fn apply(
    uow: &mut dyn UnitOfWork,
    transfer: &ValidatedTransfer,
) -> Result<TransferRecord, ExecutionError> {
    let [first, second] = lock_order(transfer);
    let first_account = lock_participant(uow, first).await?;
    let second_account = lock_participant(uow, second).await?;

    let (mut source, mut destination) = match first.1 {
        AccountRole::Source => (first_account, second_account),
        AccountRole::Destination => (second_account, first_account),
    };

    source.debit(transfer.amount())?;
    destination.credit(transfer.amount())?;

    uow.write_balance(source.id, source.balance).await?;
    uow.write_balance(destination.id, destination.balance).await?;
    let record = uow.append_transfer(transfer).await?;
    debug!(transfer_id = record.id, "balances staged");
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{LedgerStore, UnitOfWorkBox};
    use crate::infrastructure::in_memory::InMemoryLedgerStore;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Where a [`ScriptedStore`] should fail.
    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Fault {
        None,
        SecondLock,
        Append,
        Commit,
    }

    /// In-memory ledger that records lock order and fails on demand.
    #[derive(Clone)]
    struct ScriptedStore {
        inner: InMemoryLedgerStore,
        fault: Fault,
        locked: Arc<Mutex<Vec<AccountId>>>,
    }

    impl ScriptedStore {
        fn new(inner: InMemoryLedgerStore, fault: Fault) -> Self {
            Self {
                inner,
                fault,
                locked: Arc::default(),
            }
        }

        fn locked(&self) -> Vec<AccountId> {
            self.locked.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LedgerStore for ScriptedStore {
        async fn create_account(&self, account: Account) -> Result<Account, AccountError> {
            self.inner.create_account(account).await
        }

        async fn get_account(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
            self.inner.get_account(id).await
        }

        async fn all_accounts(&self) -> Result<Vec<Account>, StoreError> {
            self.inner.all_accounts().await
        }

        async fn all_transfers(&self) -> Result<Vec<TransferRecord>, StoreError> {
            self.inner.all_transfers().await
        }

        async fn begin(&self) -> Result<UnitOfWorkBox, StoreError> {
            Ok(Box::new(ScriptedUnitOfWork {
                inner: self.inner.begin().await?,
                fault: self.fault,
                locked: Arc::clone(&self.locked),
                locks_taken: 0,
            }))
        }
    }

    struct ScriptedUnitOfWork {
        inner: UnitOfWorkBox,
        fault: Fault,
        locked: Arc<Mutex<Vec<AccountId>>>,
        locks_taken: usize,
    }

    fn injected() -> StoreError {
        StoreError::backend("injected failure")
    }

    #[async_trait]
    impl UnitOfWork for ScriptedUnitOfWork {
        async fn lock_account(&mut self, id: AccountId) -> Result<Option<Account>, StoreError> {
            self.locked.lock().unwrap().push(id);
            self.locks_taken += 1;
            if self.fault == Fault::SecondLock && self.locks_taken == 2 {
                return Err(injected());
            }
            self.inner.lock_account(id).await
        }

        async fn write_balance(
            &mut self,
            id: AccountId,
            balance: Balance,
        ) -> Result<(), StoreError> {
            self.inner.write_balance(id, balance).await
        }

        async fn append_transfer(
            &mut self,
            transfer: &ValidatedTransfer,
        ) -> Result<TransferRecord, StoreError> {
            if self.fault == Fault::Append {
                return Err(injected());
            }
            self.inner.append_transfer(transfer).await
        }

        async fn commit(self: Box<Self>) -> Result<(), StoreError> {
            let this = *self;
            if this.fault == Fault::Commit {
                return Err(injected());
            }
            this.inner.commit().await
        }

        async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
            let this = *self;
            this.inner.rollback().await
        }
    }

    async fn seeded(fault: Fault) -> (TransferEngine, ScriptedStore) {
        let store = ScriptedStore::new(InMemoryLedgerStore::new(), fault);
        let engine = TransferEngine::new(Box::new(store.clone()), Span::none());
        engine.create_account(1, dec!(100.00)).await.unwrap();
        engine.create_account(2, dec!(0.00)).await.unwrap();
        (engine, store)
    }

    async fn balance(engine: &TransferEngine, id: AccountId) -> Balance {
        engine.get_account(id).await.unwrap().balance
    }

    #[tokio::test]
    async fn test_transfer_moves_funds_and_logs_record() {
        let (engine, _) = seeded(Fault::None).await;

        let record = engine
            .transfer(TransferRequest::new(1, 2, dec!(25.50)))
            .await
            .unwrap();

        assert_eq!(balance(&engine, 1).await, Balance::new(dec!(74.50)));
        assert_eq!(balance(&engine, 2).await, Balance::new(dec!(25.50)));
        assert_eq!(record.source_account_id, 1);
        assert_eq!(record.destination_account_id, 2);
        assert_eq!(record.amount, dec!(25.50));
        assert_eq!(engine.transfers().await.unwrap(), vec![record]);
    }

    #[tokio::test]
    async fn test_insufficient_funds_leaves_ledger_unchanged() {
        let (engine, _) = seeded(Fault::None).await;
        engine.create_account(3, dec!(100)).await.unwrap();

        let result = engine.transfer(TransferRequest::new(3, 2, dec!(101))).await;

        assert!(matches!(
            result,
            Err(TransferError::Execution(ExecutionError::InsufficientFunds { id: 3, .. }))
        ));
        assert_eq!(balance(&engine, 3).await, Balance::new(dec!(100)));
        assert_eq!(balance(&engine, 2).await, Balance::new(dec!(0.00)));
        assert!(engine.transfers().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_whole_balance_can_be_moved() {
        let (engine, _) = seeded(Fault::None).await;
        engine
            .transfer(TransferRequest::new(1, 2, dec!(100.00)))
            .await
            .unwrap();
        assert_eq!(balance(&engine, 1).await, Balance::ZERO);
    }

    #[tokio::test]
    async fn test_missing_accounts_report_their_role() {
        let (engine, _) = seeded(Fault::None).await;

        let result = engine.transfer(TransferRequest::new(9, 1, dec!(1))).await;
        assert!(matches!(
            result,
            Err(TransferError::Execution(ExecutionError::AccountNotFound {
                id: 9,
                role: AccountRole::Source
            }))
        ));

        let result = engine.transfer(TransferRequest::new(1, 9, dec!(1))).await;
        assert!(matches!(
            result,
            Err(TransferError::Execution(ExecutionError::AccountNotFound {
                id: 9,
                role: AccountRole::Destination
            }))
        ));

        assert_eq!(balance(&engine, 1).await, Balance::new(dec!(100.00)));
        assert!(engine.transfers().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_validation_runs_before_store() {
        let (engine, store) = seeded(Fault::None).await;

        let result = engine.transfer(TransferRequest::new(1, 1, dec!(-3))).await;
        assert!(matches!(
            result,
            Err(TransferError::Validation(ValidationError::SameAccount))
        ));
        assert!(store.locked().is_empty());
    }

    #[tokio::test]
    async fn test_holds_taken_in_ascending_id_order() {
        let (engine, store) = seeded(Fault::None).await;
        engine.create_account(7, dec!(50)).await.unwrap();

        engine
            .transfer(TransferRequest::new(7, 2, dec!(5)))
            .await
            .unwrap();
        engine
            .transfer(TransferRequest::new(1, 7, dec!(5)))
            .await
            .unwrap();

        assert_eq!(store.locked(), vec![2, 7, 1, 7]);
    }

    #[test]
    fn test_lock_order_ignores_direction() {
        let forward = TransferRequest::new(3, 8, dec!(1)).validate().unwrap();
        let backward = TransferRequest::new(8, 3, dec!(1)).validate().unwrap();

        assert_eq!(
            lock_order(&forward),
            [(3, AccountRole::Source), (8, AccountRole::Destination)]
        );
        assert_eq!(
            lock_order(&backward),
            [(3, AccountRole::Destination), (8, AccountRole::Source)]
        );
    }

    #[tokio::test]
    async fn test_store_failures_roll_back_everything() {
        for fault in [Fault::SecondLock, Fault::Append, Fault::Commit] {
            let (engine, _) = seeded(fault).await;

            let result = engine.transfer(TransferRequest::new(1, 2, dec!(10))).await;

            assert!(
                matches!(
                    result,
                    Err(TransferError::Execution(ExecutionError::StoreFailure(_)))
                ),
                "{fault:?} should surface as a store failure"
            );
            assert_eq!(balance(&engine, 1).await, Balance::new(dec!(100.00)));
            assert_eq!(balance(&engine, 2).await, Balance::new(dec!(0.00)));
            assert!(engine.transfers().await.unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn test_cancelled_transfer_releases_holds() {
        let ledger = InMemoryLedgerStore::new();
        let engine = TransferEngine::new(Box::new(ledger.clone()), Span::none());
        engine.create_account(1, dec!(100)).await.unwrap();
        engine.create_account(2, dec!(0)).await.unwrap();

        // Another unit of work is sitting on account 2.
        let mut blocker = ledger.begin().await.unwrap();
        blocker.lock_account(2).await.unwrap();

        let cancelled = tokio::time::timeout(
            Duration::from_millis(50),
            engine.transfer(TransferRequest::new(1, 2, dec!(10))),
        )
        .await;
        assert!(cancelled.is_err());

        blocker.rollback().await.unwrap();

        engine
            .transfer(TransferRequest::new(1, 2, dec!(10)))
            .await
            .unwrap();
        assert_eq!(balance(&engine, 1).await, Balance::new(dec!(90)));
        assert_eq!(engine.transfers().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_account_rules() {
        let engine = TransferEngine::new(Box::new(InMemoryLedgerStore::new()), Span::none());

        assert!(matches!(
            engine.create_account(0, dec!(1)).await,
            Err(AccountError::InvalidAccountId(0))
        ));
        assert!(matches!(
            engine.create_account(4, dec!(-0.01)).await,
            Err(AccountError::NegativeBalance)
        ));

        engine.create_account(4, dec!(0)).await.unwrap();
        assert!(matches!(
            engine.create_account(4, dec!(10)).await,
            Err(AccountError::AlreadyExists(4))
        ));
        assert!(matches!(
            engine.get_account(5).await,
            Err(AccountError::NotFound(5))
        ));
    }

    async fn ledger(balances: &[(AccountId, Decimal)]) -> TransferEngine {
        let engine = TransferEngine::new(Box::new(InMemoryLedgerStore::new()), Span::none());
        for (id, balance) in balances {
            engine.create_account(*id, *balance).await.unwrap();
        }
        engine
    }

    fn assert_out_of_range(result: Result<TransferRecord, TransferError>, expected: AccountId) {
        match result {
            Err(TransferError::Execution(ExecutionError::BalanceOutOfRange { id })) => {
                assert_eq!(id, expected)
            }
            other => panic!("expected balance_out_of_range, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_credit_overflow_rolls_back() {
        let engine = ledger(&[(1, Decimal::MAX), (2, dec!(1))]).await;

        let result = engine.transfer(TransferRequest::new(2, 1, dec!(1))).await;

        assert_out_of_range(result, 1);
        assert_eq!(balance(&engine, 1).await, Balance::new(Decimal::MAX));
        assert_eq!(balance(&engine, 2).await, Balance::new(dec!(1)));
        assert!(engine.transfers().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rounding_credit_or_debit_is_rejected() {
        let large: Decimal = "7922816251426433759354395033.5".parse().unwrap();
        let engine = ledger(&[(1, large), (2, dec!(0.01))]).await;

        assert_out_of_range(
            engine.transfer(TransferRequest::new(2, 1, dec!(0.01))).await,
            1,
        );
        assert_out_of_range(
            engine.transfer(TransferRequest::new(1, 2, dec!(0.01))).await,
            1,
        );

        assert_eq!(balance(&engine, 1).await, Balance::new(large));
        assert_eq!(balance(&engine, 2).await, Balance::new(dec!(0.01)));
        assert!(engine.transfers().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_full_scale_transfer_conserves_funds() {
        let engine = ledger(&[(1, dec!(1)), (2, dec!(0))]).await;
        let tiny = Decimal::new(1, 28);

        engine
            .transfer(TransferRequest::new(1, 2, tiny))
            .await
            .unwrap();

        let first = balance(&engine, 1).await;
        let second = balance(&engine, 2).await;
        assert_eq!(first.to_string(), "0.9999999999999999999999999999");
        assert_eq!(second, Balance::new(tiny));
        assert_eq!(first + second, Balance::new(dec!(1)));
    }
}
