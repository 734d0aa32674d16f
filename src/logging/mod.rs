//! Система журналирования txndb
//!
//! Этот модуль содержит журнал упреждающей записи (WAL):
//! - Самоописывающиеся лог-записи с фиксированным 20-байтовым заголовком
//! - Менеджер журнала с двойной буферизацией и фоновым потоком сброса
//! - Потоковый декодер сброшенных байт обратно в записи

pub mod log_manager;
pub mod log_record;

pub use log_manager::{LogManager, LogManagerStats};
pub use log_record::{LogPayload, LogRecord, LogRecordStream, LogRecordType};

#[cfg(test)]
mod tests;
