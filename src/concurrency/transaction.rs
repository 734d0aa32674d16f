//! Транзакция как объект транзакционного ядра txndb
//!
//! Транзакция принадлежит вышележащему движку; ядро читает и меняет ее
//! состояние и множества удерживаемых блокировок. Идентификаторы назначаются
//! монотонно: меньший идентификатор означает более старую транзакцию, на этом
//! строится схема wait-die менеджера блокировок.

use crate::common::types::{Lsn, Rid, TransactionId, INVALID_LSN};
use std::collections::HashSet;
use std::sync::Mutex;

/// Состояния транзакции в модели двухфазного блокирования
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Фаза роста: транзакция набирает блокировки
    Growing,
    /// Фаза сокращения: транзакция освободила первую блокировку (нестрогий 2PL)
    Shrinking,
    /// Транзакция зафиксирована
    Committed,
    /// Транзакция отменена
    Aborted,
}

/// Транзакция
///
/// Все поля кроме идентификатора защищены внутренними мьютексами, поэтому
/// ссылку на транзакцию можно разделять между потоком владельца и
/// менеджером блокировок.
#[derive(Debug)]
pub struct Transaction {
    /// Идентификатор; меньший - старше
    id: TransactionId,
    /// Текущее состояние
    state: Mutex<TransactionState>,
    /// Записи, удерживаемые в разделяемом режиме
    shared_lock_set: Mutex<HashSet<Rid>>,
    /// Записи, удерживаемые в исключительном режиме
    exclusive_lock_set: Mutex<HashSet<Rid>>,
    /// LSN последней лог-записи транзакции (для цепочки prev_lsn)
    prev_lsn: Mutex<Lsn>,
}

impl Transaction {
    /// Создает транзакцию в фазе роста
    pub fn new(id: TransactionId) -> Self {
        Self {
            id,
            state: Mutex::new(TransactionState::Growing),
            shared_lock_set: Mutex::new(HashSet::new()),
            exclusive_lock_set: Mutex::new(HashSet::new()),
            prev_lsn: Mutex::new(INVALID_LSN),
        }
    }

    /// Возвращает идентификатор транзакции
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Возвращает текущее состояние
    pub fn state(&self) -> TransactionState {
        *self.state.lock().unwrap()
    }

    /// Устанавливает состояние
    pub fn set_state(&self, state: TransactionState) {
        *self.state.lock().unwrap() = state;
    }

    /// Возвращает LSN последней лог-записи транзакции
    pub fn prev_lsn(&self) -> Lsn {
        *self.prev_lsn.lock().unwrap()
    }

    /// Обновляет LSN последней лог-записи транзакции
    pub fn set_prev_lsn(&self, lsn: Lsn) {
        *self.prev_lsn.lock().unwrap() = lsn;
    }

    /// Добавляет запись в разделяемое множество
    pub fn insert_shared_lock(&self, rid: Rid) {
        self.shared_lock_set.lock().unwrap().insert(rid);
    }

    /// Убирает запись из разделяемого множества; возвращает, была ли она там
    pub fn erase_shared_lock(&self, rid: Rid) -> bool {
        self.shared_lock_set.lock().unwrap().remove(&rid)
    }

    /// Проверяет, удерживается ли запись в разделяемом режиме
    pub fn holds_shared_lock(&self, rid: Rid) -> bool {
        self.shared_lock_set.lock().unwrap().contains(&rid)
    }

    /// Добавляет запись в исключительное множество
    pub fn insert_exclusive_lock(&self, rid: Rid) {
        self.exclusive_lock_set.lock().unwrap().insert(rid);
    }

    /// Убирает запись из исключительного множества; возвращает, была ли она там
    pub fn erase_exclusive_lock(&self, rid: Rid) -> bool {
        self.exclusive_lock_set.lock().unwrap().remove(&rid)
    }

    /// Проверяет, удерживается ли запись в исключительном режиме
    pub fn holds_exclusive_lock(&self, rid: Rid) -> bool {
        self.exclusive_lock_set.lock().unwrap().contains(&rid)
    }

    /// Возвращает снимок разделяемого множества
    pub fn shared_lock_set(&self) -> Vec<Rid> {
        self.shared_lock_set.lock().unwrap().iter().copied().collect()
    }

    /// Возвращает снимок исключительного множества
    pub fn exclusive_lock_set(&self) -> Vec<Rid> {
        self.exclusive_lock_set.lock().unwrap().iter().copied().collect()
    }
}
