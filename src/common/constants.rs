//! Константы для txndb

use std::time::Duration;

/// Размер страницы данных в байтах
pub const PAGE_SIZE: usize = 4096;

/// Размер каждого из двух буферов журнала по умолчанию (в байтах)
///
/// Буфер добавления и буфер сброса всегда одного размера.
pub const LOG_BUFFER_SIZE: usize = PAGE_SIZE;

/// Периодичность фонового сброса журнала по умолчанию
pub const LOG_TIMEOUT: Duration = Duration::from_secs(1);

/// Размер фиксированного заголовка лог-записи в байтах
pub const LOG_HEADER_SIZE: usize = 20;

/// Режим строгого 2PL по умолчанию
pub const DEFAULT_STRICT_2PL: bool = true;
