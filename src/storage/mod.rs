//! Уровень хранения txndb
//!
//! Здесь лежат примитивы, через которые транзакционное ядро общается с диском:
//! - Кортеж как непрозрачный байтовый payload с length-prefixed кодеком
//! - Контракт дискового менеджера и его файловая реализация

pub mod disk_manager;
pub mod tuple;

pub use disk_manager::{DiskManager, DiskManagerStats, FileDiskManager};
pub use tuple::Tuple;
