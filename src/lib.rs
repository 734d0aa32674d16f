//! txndb - Транзакционное ядро кортежного хранилища на Rust
//!
//! Этот модуль предоставляет два независимых компонента транзакционного движка:
//! - Менеджер блокировок записей с двухфазным блокированием (2PL)
//!   и предотвращением дедлоков по схеме wait-die
//! - Менеджер журнала упреждающей записи (WAL) с двойной буферизацией
//!   и фоновым потоком сброса на диск
//!
//! Дисковый менеджер и объект транзакции оформлены как внешние контракты;
//! остальной движок (каталог, пул буферов, восстановление) подключает их снаружи.

pub mod common;
pub mod concurrency;
pub mod logging;
pub mod storage;

pub use common::error::{Error, Result};
pub use common::types::*;

/// Версия библиотеки
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
