//! Подсистема конкурентного доступа txndb
//!
//! Менеджер блокировок записей (2PL, wait-die), объект транзакции и
//! менеджер транзакций, связывающий блокировки с журналом.

pub mod lock_manager;
pub mod transaction;
pub mod transaction_manager;

pub use lock_manager::{LockManager, LockManagerStats, LockMode};
pub use transaction::{Transaction, TransactionState};
pub use transaction_manager::{TransactionManager, TransactionManagerStats};

#[cfg(test)]
mod tests;
