//! Менеджер блокировок записей для txndb
//!
//! Реализует блокировки уровня кортежа с двухфазным блокированием (2PL):
//! - Разделяемый и исключительный режимы плюс повышение SHARED -> EXCLUSIVE
//! - Предотвращение дедлоков по схеме wait-die: младшая транзакция не ждет
//! - Очередь запросов на каждую запись со своим мьютексом
//! - Персональный сигнал пробуждения у каждого ожидающего запроса
//!
//! Все отказы выражаются одинаково: транзакция переводится в состояние
//! ABORTED и возвращается `false`. Менеджер никогда не паникует на контрактных
//! нарушениях и не прерывает начатое ожидание: единственный выход из ожидания -
//! выдача блокировки.
//!
//! Иерархия мьютексов: мьютекс таблицы берется раньше мьютекса очереди;
//! мьютекс очереди отпускается до засыпания на персональном сигнале запроса.

use crate::common::config::LockManagerConfig;
use crate::common::types::{Rid, TransactionId};
use crate::concurrency::transaction::{Transaction, TransactionState};
use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

/// Режим запроса блокировки
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Разделяемая блокировка для чтения
    Shared,
    /// Исключительная блокировка для записи
    Exclusive,
    /// Ожидающее повышение SHARED -> EXCLUSIVE; при выдаче становится Exclusive
    Upgrading,
}

/// Персональный сигнал пробуждения запроса
///
/// Ожидающий спит на собственной паре мьютекс+condvar, поэтому преемники
/// будятся адресно, а ложные пробуждения задевают только своего владельца.
#[derive(Debug)]
struct Waiter {
    granted: Mutex<bool>,
    cv: Condvar,
}

impl Waiter {
    fn new(granted: bool) -> Self {
        Self {
            granted: Mutex::new(granted),
            cv: Condvar::new(),
        }
    }

    /// Спит, пока запрос не будет выдан
    fn wait(&self) {
        let mut granted = self.granted.lock().unwrap();
        while !*granted {
            granted = self.cv.wait(granted).unwrap();
        }
    }

    /// Выдает запрос и будит владельца
    fn grant(&self) {
        *self.granted.lock().unwrap() = true;
        self.cv.notify_one();
    }
}

/// Запрос в очереди блокировок записи
#[derive(Debug)]
struct LockRequest {
    txn_id: TransactionId,
    mode: LockMode,
    granted: bool,
    waiter: Arc<Waiter>,
}

/// Содержимое очереди, защищенное ее мьютексом
#[derive(Debug)]
struct QueueState {
    /// Не более одного ожидающего повышения на очередь
    has_upgrading: bool,
    /// Очередь уже удалена из таблицы блокировок
    closed: bool,
    /// Запросы в порядке поступления; выданные образуют префикс
    requests: Vec<LockRequest>,
}

impl QueueState {
    fn new() -> Self {
        Self {
            has_upgrading: false,
            closed: false,
            requests: Vec::new(),
        }
    }

    /// Можно ли выдать новый запрос немедленно
    ///
    /// Да, если очередь пуста либо хвост выдан в разделяемом режиме и сам
    /// запрос разделяемый.
    fn can_grant(&self, mode: LockMode) -> bool {
        match self.requests.last() {
            None => true,
            Some(last) => mode == LockMode::Shared && last.granted && last.mode == LockMode::Shared,
        }
    }

    /// Будит преемников после удаления запроса из очереди
    ///
    /// Если голова очереди не выдана: выдает либо непрерывный разделяемый
    /// префикс, либо единственный неразделяемый запрос в голове; ожидающее
    /// повышение при выдаче становится исключительным, и флаг повышения
    /// снимается. Выданный префикс всегда остается совместимым.
    fn wake_successors(&mut self) {
        match self.requests.first() {
            None => return,
            Some(first) if first.granted => return,
            Some(_) => {}
        }

        match self.requests[0].mode {
            LockMode::Shared => {
                let mut i = 0;
                while i < self.requests.len()
                    && self.requests[i].mode == LockMode::Shared
                    && !self.requests[i].granted
                {
                    self.requests[i].granted = true;
                    self.requests[i].waiter.grant();
                    i += 1;
                }
            }
            LockMode::Exclusive => {
                self.requests[0].granted = true;
                self.requests[0].waiter.grant();
            }
            LockMode::Upgrading => {
                self.has_upgrading = false;
                self.requests[0].mode = LockMode::Exclusive;
                self.requests[0].granted = true;
                self.requests[0].waiter.grant();
            }
        }
    }
}

/// Очередь блокировок одной записи
///
/// Очереди закреплены в куче за `Arc`, поэтому перестроение таблицы не
/// инвалидирует ссылки, которые держат ожидающие.
#[derive(Debug)]
struct LockQueue {
    state: Mutex<QueueState>,
}

impl LockQueue {
    fn new() -> Self {
        Self {
            state: Mutex::new(QueueState::new()),
        }
    }
}

/// Статистика менеджера блокировок
#[derive(Debug, Clone, Default)]
pub struct LockManagerStats {
    /// Общее количество запросов блокировок
    pub total_lock_requests: u64,
    /// Количество выданных блокировок
    pub locks_granted: u64,
    /// Количество запросов, ушедших в ожидание
    pub lock_waits: u64,
    /// Количество запросов на снятие блокировки
    pub unlock_requests: u64,
    /// Отказы по схеме wait-die
    pub wait_die_aborts: u64,
    /// Отказы протокола повышения
    pub upgrade_conflicts: u64,
    /// Отказы из-за неверного состояния транзакции
    pub wrong_state_aborts: u64,
}

/// Менеджер блокировок
pub struct LockManager {
    /// Строгий 2PL: снятие разрешено только зафиксированным и отмененным
    strict_2pl: bool,
    /// Таблица блокировок: запись -> очередь запросов
    lock_table: Mutex<HashMap<Rid, Arc<LockQueue>>>,
    /// Статистика
    stats: Mutex<LockManagerStats>,
}

impl LockManager {
    /// Создает менеджер блокировок
    pub fn new(strict_2pl: bool) -> Self {
        Self {
            strict_2pl,
            lock_table: Mutex::new(HashMap::new()),
            stats: Mutex::new(LockManagerStats::default()),
        }
    }

    /// Создает менеджер блокировок из конфигурации
    pub fn with_config(config: &LockManagerConfig) -> Self {
        Self::new(config.strict_2pl)
    }

    /// Возвращает, включен ли строгий режим 2PL
    pub fn is_strict_2pl(&self) -> bool {
        self.strict_2pl
    }

    /// Запрашивает разделяемую блокировку записи
    ///
    /// Блокируется до выдачи. Возвращает `false` и отменяет транзакцию, если
    /// она не в фазе роста или wait-die потребовал бы ждать более молодую.
    pub fn lock_shared(&self, txn: &Transaction, rid: Rid) -> bool {
        self.lock_internal(txn, rid, LockMode::Shared)
    }

    /// Запрашивает исключительную блокировку записи
    pub fn lock_exclusive(&self, txn: &Transaction, rid: Rid) -> bool {
        self.lock_internal(txn, rid, LockMode::Exclusive)
    }

    /// Повышает удерживаемую разделяемую блокировку до исключительной
    ///
    /// Требует выданной разделяемой блокировки на эту запись и отсутствия
    /// другого ожидающего повышения в очереди.
    pub fn lock_upgrade(&self, txn: &Transaction, rid: Rid) -> bool {
        self.lock_internal(txn, rid, LockMode::Upgrading)
    }

    /// Снимает блокировку транзакции с записи
    ///
    /// В строгом режиме снятие до фиксации или отмены отменяет транзакцию и
    /// возвращает `false`. В нестрогом режиме первое снятие переводит
    /// транзакцию из фазы роста в фазу сокращения. После успешного снятия
    /// запись отсутствует в обоих множествах блокировок транзакции.
    pub fn unlock(&self, txn: &Transaction, rid: Rid) -> bool {
        self.stats.lock().unwrap().unlock_requests += 1;

        if self.strict_2pl {
            if !matches!(
                txn.state(),
                TransactionState::Committed | TransactionState::Aborted
            ) {
                txn.set_state(TransactionState::Aborted);
                self.stats.lock().unwrap().wrong_state_aborts += 1;
                return false;
            }
        } else if txn.state() == TransactionState::Growing {
            txn.set_state(TransactionState::Shrinking);
        }

        let mut table = self.lock_table.lock().unwrap();
        let queue = match table.get(&rid) {
            Some(queue) => Arc::clone(queue),
            None => return false,
        };
        let mut state = queue.state.lock().unwrap();

        let pos = match state.requests.iter().position(|r| r.txn_id == txn.id()) {
            Some(pos) => pos,
            None => return false,
        };
        let request = state.requests.remove(pos);

        if request.mode == LockMode::Shared {
            txn.erase_shared_lock(rid);
        } else {
            txn.erase_exclusive_lock(rid);
        }
        if request.mode == LockMode::Upgrading {
            state.has_upgrading = false;
        }

        if state.requests.is_empty() {
            state.closed = true;
            table.remove(&rid);
            return true;
        }
        drop(table);

        state.wake_successors();
        true
    }

    /// Общий путь всех трех видов запроса блокировки
    fn lock_internal(&self, txn: &Transaction, rid: Rid, mode: LockMode) -> bool {
        self.stats.lock().unwrap().total_lock_requests += 1;

        if txn.state() != TransactionState::Growing {
            txn.set_state(TransactionState::Aborted);
            self.stats.lock().unwrap().wrong_state_aborts += 1;
            return false;
        }

        loop {
            let queue = {
                let mut table = self.lock_table.lock().unwrap();
                Arc::clone(
                    table
                        .entry(rid)
                        .or_insert_with(|| Arc::new(LockQueue::new())),
                )
            };
            let state = queue.state.lock().unwrap();
            if state.closed {
                // Очередь опустела и была удалена из таблицы, пока мы шли к ней
                continue;
            }
            return self.lock_in_queue(txn, rid, mode, state);
        }
    }

    /// Выполняет запрос внутри захваченной очереди
    fn lock_in_queue(
        &self,
        txn: &Transaction,
        rid: Rid,
        mode: LockMode,
        mut state: MutexGuard<'_, QueueState>,
    ) -> bool {
        if mode == LockMode::Upgrading {
            if state.has_upgrading {
                txn.set_state(TransactionState::Aborted);
                self.stats.lock().unwrap().upgrade_conflicts += 1;
                return false;
            }
            let pos = state.requests.iter().position(|r| r.txn_id == txn.id());
            match pos {
                Some(pos)
                    if state.requests[pos].granted
                        && state.requests[pos].mode == LockMode::Shared =>
                {
                    state.requests.remove(pos);
                    txn.erase_shared_lock(rid);
                }
                _ => {
                    txn.set_state(TransactionState::Aborted);
                    self.stats.lock().unwrap().upgrade_conflicts += 1;
                    return false;
                }
            }
        }

        let granted = state.can_grant(mode);
        if !granted {
            // wait-die: ждать можно только более старую транзакцию в хвосте
            let tail_id = state.requests.last().map(|r| r.txn_id);
            if let Some(tail_id) = tail_id {
                if tail_id < txn.id() {
                    txn.set_state(TransactionState::Aborted);
                    self.stats.lock().unwrap().wait_die_aborts += 1;
                    if mode == LockMode::Upgrading {
                        // Разделяемая блокировка просителя уже снята
                        state.wake_successors();
                    }
                    return false;
                }
            }
        }

        let stored_mode = if mode == LockMode::Upgrading && granted {
            LockMode::Exclusive
        } else {
            mode
        };
        let waiter = Arc::new(Waiter::new(granted));
        state.requests.push(LockRequest {
            txn_id: txn.id(),
            mode: stored_mode,
            granted,
            waiter: Arc::clone(&waiter),
        });

        if granted {
            drop(state);
        } else {
            if mode == LockMode::Upgrading {
                state.has_upgrading = true;
            }
            self.stats.lock().unwrap().lock_waits += 1;
            drop(state);
            waiter.wait();
        }

        if mode == LockMode::Shared {
            txn.insert_shared_lock(rid);
        } else {
            txn.insert_exclusive_lock(rid);
        }
        self.stats.lock().unwrap().locks_granted += 1;
        true
    }

    /// Возвращает статистику менеджера блокировок
    pub fn get_statistics(&self) -> LockManagerStats {
        self.stats.lock().unwrap().clone()
    }

    /// Возвращает количество записей с непустыми очередями
    pub fn locked_rid_count(&self) -> usize {
        self.lock_table.lock().unwrap().len()
    }
}
