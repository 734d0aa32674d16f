//! Базовые типы данных для txndb

use serde::{Deserialize, Serialize};

/// Порядковый номер лог-записи (Log Sequence Number)
///
/// 32-битный знаковый, чтобы значение-страж -1 выражалось естественно.
/// Номера назначаются монотонно и без пропусков при добавлении записи в журнал.
pub type Lsn = i32;

/// Идентификатор транзакции
///
/// Назначается монотонно; меньший идентификатор означает более старую транзакцию.
pub type TransactionId = i32;

/// Идентификатор страницы
pub type PageId = i32;

/// Номер слота записи внутри страницы
pub type SlotId = u32;

/// Значение-страж для LSN: журнал пуст или запись еще не получила номер
pub const INVALID_LSN: Lsn = -1;

/// Значение-страж для идентификатора транзакции
pub const INVALID_TXN_ID: TransactionId = -1;

/// Значение-страж для идентификатора страницы
pub const INVALID_PAGE_ID: PageId = -1;

/// Идентификатор записи (Record ID)
///
/// Непрозрачный адрес кортежа в хранилище: страница плюс слот.
/// Служит ключом таблицы блокировок и входит в полезную нагрузку лог-записей.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rid {
    page_id: PageId,
    slot: SlotId,
}

impl Rid {
    /// Размер сериализованного представления в байтах
    pub const SERIALIZED_SIZE: usize = 8;

    /// Создает новый идентификатор записи
    pub fn new(page_id: PageId, slot: SlotId) -> Self {
        Self { page_id, slot }
    }

    /// Возвращает идентификатор страницы
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Возвращает номер слота
    pub fn slot(&self) -> SlotId {
        self.slot
    }

    /// Сериализует идентификатор в буфер (little-endian, без выравнивания)
    pub fn serialize_into(&self, buf: &mut [u8]) {
        buf[0..4].copy_from_slice(&self.page_id.to_le_bytes());
        buf[4..8].copy_from_slice(&self.slot.to_le_bytes());
    }

    /// Восстанавливает идентификатор из буфера
    pub fn deserialize(buf: &[u8]) -> Self {
        let page_id = PageId::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let slot = SlotId::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
        Self { page_id, slot }
    }
}

impl std::fmt::Display for Rid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RID({}, {})", self.page_id, self.slot)
    }
}
