//! Менеджер транзакций txndb
//!
//! Связывает два ядра воедино: выдает монотонные идентификаторы транзакций,
//! ведет журнальную цепочку prev_lsn и при завершении транзакции снимает все
//! ее блокировки. Фиксация долговечна: запись COMMIT принудительно
//! сбрасывается на диск до освобождения блокировок.

use crate::common::types::{Lsn, PageId, Rid};
use crate::concurrency::lock_manager::LockManager;
use crate::concurrency::transaction::{Transaction, TransactionState};
use crate::logging::log_manager::LogManager;
use crate::logging::log_record::LogRecord;
use crate::storage::tuple::Tuple;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex};

/// Статистика менеджера транзакций
#[derive(Debug, Clone, Default)]
pub struct TransactionManagerStats {
    /// Общее количество начатых транзакций
    pub total_transactions: u64,
    /// Количество зафиксированных транзакций
    pub committed_transactions: u64,
    /// Количество отмененных транзакций
    pub aborted_transactions: u64,
}

/// Менеджер транзакций
pub struct TransactionManager {
    /// Счетчик для выдачи монотонных идентификаторов
    next_txn_id: AtomicI32,
    /// Менеджер блокировок
    lock_manager: Arc<LockManager>,
    /// Менеджер журнала; без него транзакции работают без журналирования
    log_manager: Option<Arc<LogManager>>,
    /// Статистика
    stats: Mutex<TransactionManagerStats>,
}

impl TransactionManager {
    /// Создает менеджер транзакций без журналирования
    pub fn new(lock_manager: Arc<LockManager>) -> Self {
        Self {
            next_txn_id: AtomicI32::new(0),
            lock_manager,
            log_manager: None,
            stats: Mutex::new(TransactionManagerStats::default()),
        }
    }

    /// Создает менеджер транзакций с журналированием
    pub fn with_log_manager(lock_manager: Arc<LockManager>, log_manager: Arc<LogManager>) -> Self {
        Self {
            next_txn_id: AtomicI32::new(0),
            lock_manager,
            log_manager: Some(log_manager),
            stats: Mutex::new(TransactionManagerStats::default()),
        }
    }

    /// Возвращает менеджер блокировок
    pub fn lock_manager(&self) -> &Arc<LockManager> {
        &self.lock_manager
    }

    /// Начинает новую транзакцию
    pub fn begin(&self) -> Transaction {
        let txn = Transaction::new(self.next_txn_id.fetch_add(1, Ordering::SeqCst));

        if let Some(log_manager) = self.enabled_log_manager() {
            let mut record = LogRecord::new_begin(txn.id());
            let lsn = log_manager.append_log_record(&mut record);
            txn.set_prev_lsn(lsn);
        }

        self.stats.lock().unwrap().total_transactions += 1;
        txn
    }

    /// Фиксирует транзакцию
    ///
    /// Запись COMMIT становится долговечной до снятия блокировок; к возврату
    /// оба множества блокировок транзакции пусты.
    pub fn commit(&self, txn: &Transaction) {
        if let Some(log_manager) = self.enabled_log_manager() {
            let mut record = LogRecord::new_commit(txn.id(), txn.prev_lsn());
            let lsn = log_manager.append_log_record(&mut record);
            txn.set_prev_lsn(lsn);
            log_manager.flush(true);
        }

        txn.set_state(TransactionState::Committed);
        self.release_locks(txn);
        self.stats.lock().unwrap().committed_transactions += 1;
    }

    /// Отменяет транзакцию
    ///
    /// Откат изменений выполняет вышележащий движок восстановления; здесь
    /// пишется запись ABORT и снимаются блокировки.
    pub fn abort(&self, txn: &Transaction) {
        if let Some(log_manager) = self.enabled_log_manager() {
            let mut record = LogRecord::new_abort(txn.id(), txn.prev_lsn());
            let lsn = log_manager.append_log_record(&mut record);
            txn.set_prev_lsn(lsn);
            log_manager.flush(true);
        }

        txn.set_state(TransactionState::Aborted);
        self.release_locks(txn);
        self.stats.lock().unwrap().aborted_transactions += 1;
    }

    /// Журналирует вставку кортежа
    pub fn log_insert(&self, txn: &Transaction, rid: Rid, tuple: Tuple) -> Option<Lsn> {
        self.append(txn, |prev_lsn| {
            LogRecord::new_insert(txn.id(), prev_lsn, rid, tuple)
        })
    }

    /// Журналирует пометку кортежа удаленным
    pub fn log_mark_delete(&self, txn: &Transaction, rid: Rid, tuple: Tuple) -> Option<Lsn> {
        self.append(txn, |prev_lsn| {
            LogRecord::new_mark_delete(txn.id(), prev_lsn, rid, tuple)
        })
    }

    /// Журналирует физическое удаление кортежа
    pub fn log_apply_delete(&self, txn: &Transaction, rid: Rid, tuple: Tuple) -> Option<Lsn> {
        self.append(txn, |prev_lsn| {
            LogRecord::new_apply_delete(txn.id(), prev_lsn, rid, tuple)
        })
    }

    /// Журналирует откат пометки удаления
    pub fn log_rollback_delete(&self, txn: &Transaction, rid: Rid, tuple: Tuple) -> Option<Lsn> {
        self.append(txn, |prev_lsn| {
            LogRecord::new_rollback_delete(txn.id(), prev_lsn, rid, tuple)
        })
    }

    /// Журналирует обновление кортежа
    pub fn log_update(
        &self,
        txn: &Transaction,
        rid: Rid,
        old_tuple: Tuple,
        new_tuple: Tuple,
    ) -> Option<Lsn> {
        self.append(txn, |prev_lsn| {
            LogRecord::new_update(txn.id(), prev_lsn, rid, old_tuple, new_tuple)
        })
    }

    /// Журналирует выделение новой страницы
    pub fn log_new_page(
        &self,
        txn: &Transaction,
        prev_page_id: PageId,
        page_id: PageId,
    ) -> Option<Lsn> {
        self.append(txn, |prev_lsn| {
            LogRecord::new_new_page(txn.id(), prev_lsn, prev_page_id, page_id)
        })
    }

    /// Возвращает статистику менеджера транзакций
    pub fn get_statistics(&self) -> TransactionManagerStats {
        self.stats.lock().unwrap().clone()
    }

    fn enabled_log_manager(&self) -> Option<&Arc<LogManager>> {
        self.log_manager.as_ref().filter(|lm| lm.is_enabled())
    }

    /// Добавляет запись в журнал и продолжает цепочку prev_lsn транзакции
    fn append(
        &self,
        txn: &Transaction,
        build: impl FnOnce(Lsn) -> LogRecord,
    ) -> Option<Lsn> {
        let log_manager = self.enabled_log_manager()?;
        let mut record = build(txn.prev_lsn());
        let lsn = log_manager.append_log_record(&mut record);
        txn.set_prev_lsn(lsn);
        Some(lsn)
    }

    /// Снимает все блокировки транзакции
    fn release_locks(&self, txn: &Transaction) {
        for rid in txn.shared_lock_set() {
            self.lock_manager.unlock(txn, rid);
        }
        for rid in txn.exclusive_lock_set() {
            self.lock_manager.unlock(txn, rid);
        }
    }
}

impl std::fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionManager")
            .field("next_txn_id", &self.next_txn_id.load(Ordering::SeqCst))
            .field("logging", &self.log_manager.is_some())
            .finish()
    }
}
