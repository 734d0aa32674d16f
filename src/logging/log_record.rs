//! Структуры лог-записей для журнала txndb
//!
//! Этот модуль определяет самоописывающиеся лог-записи переменной длины:
//! - Операции с кортежами (INSERT, MARK_DELETE, APPLY_DELETE, ROLLBACK_DELETE, UPDATE)
//! - Транзакционные операции (BEGIN, COMMIT, ABORT)
//! - Выделение новой страницы (NEWPAGE)
//!
//! Дисковый формат: фиксированный 20-байтовый заголовок из пяти 32-битных
//! little-endian слов `размер | lsn | txn_id | prev_lsn | тип`, затем
//! полезная нагрузка, зависящая от типа. Все целые little-endian, без
//! выравнивания и отступов.

use crate::common::constants::LOG_HEADER_SIZE;
use crate::common::types::{Lsn, PageId, Rid, TransactionId, INVALID_LSN};
use crate::common::{Error, Result};
use crate::storage::tuple::Tuple;
use serde::{Deserialize, Serialize};

/// Тип лог-записи
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u32)]
pub enum LogRecordType {
    /// Некорректная запись (нулевое значение на диске)
    Invalid = 0,
    /// Вставка кортежа
    Insert = 1,
    /// Пометка кортежа удаленным
    MarkDelete = 2,
    /// Физическое удаление кортежа
    ApplyDelete = 3,
    /// Откат пометки удаления
    RollbackDelete = 4,
    /// Обновление кортежа
    Update = 5,
    /// Выделение новой страницы
    NewPage = 6,
    /// Начало транзакции
    Begin = 7,
    /// Фиксация транзакции
    Commit = 8,
    /// Отмена транзакции
    Abort = 9,
}

impl LogRecordType {
    /// Восстанавливает тип из дискового представления
    fn from_u32(value: u32) -> Result<Self> {
        match value {
            0 => Ok(Self::Invalid),
            1 => Ok(Self::Insert),
            2 => Ok(Self::MarkDelete),
            3 => Ok(Self::ApplyDelete),
            4 => Ok(Self::RollbackDelete),
            5 => Ok(Self::Update),
            6 => Ok(Self::NewPage),
            7 => Ok(Self::Begin),
            8 => Ok(Self::Commit),
            9 => Ok(Self::Abort),
            other => Err(Error::log(format!("Неизвестный тип лог-записи: {}", other))),
        }
    }
}

impl std::fmt::Display for LogRecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Invalid => "INVALID",
            Self::Insert => "INSERT",
            Self::MarkDelete => "MARK_DELETE",
            Self::ApplyDelete => "APPLY_DELETE",
            Self::RollbackDelete => "ROLLBACK_DELETE",
            Self::Update => "UPDATE",
            Self::NewPage => "NEWPAGE",
            Self::Begin => "BEGIN",
            Self::Commit => "COMMIT",
            Self::Abort => "ABORT",
        };
        write!(f, "{}", name)
    }
}

/// Полезная нагрузка лог-записи
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogPayload {
    /// Пустая нагрузка (BEGIN, COMMIT, ABORT)
    Empty,
    /// Операция над одним кортежем (INSERT и все виды DELETE)
    TupleOp {
        /// Адрес кортежа
        rid: Rid,
        /// Образ кортежа: новый для INSERT, старый для удалений
        tuple: Tuple,
    },
    /// Обновление кортежа: старый и новый образы
    Update {
        /// Адрес кортежа
        rid: Rid,
        /// Образ до обновления (для UNDO)
        old_tuple: Tuple,
        /// Образ после обновления (для REDO)
        new_tuple: Tuple,
    },
    /// Выделение новой страницы
    NewPage {
        /// Предыдущая страница цепочки
        prev_page_id: PageId,
        /// Выделенная страница
        page_id: PageId,
    },
}

impl LogPayload {
    /// Размер сериализованной нагрузки в байтах
    fn serialized_size(&self) -> usize {
        match self {
            Self::Empty => 0,
            Self::TupleOp { tuple, .. } => Rid::SERIALIZED_SIZE + tuple.serialized_size(),
            Self::Update {
                old_tuple,
                new_tuple,
                ..
            } => Rid::SERIALIZED_SIZE + old_tuple.serialized_size() + new_tuple.serialized_size(),
            Self::NewPage { .. } => 8,
        }
    }
}

/// Лог-запись журнала упреждающей записи
///
/// LSN назначается менеджером журнала в момент добавления; до этого запись
/// несет значение-страж `INVALID_LSN`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Полный размер записи на диске (заголовок плюс нагрузка)
    size: u32,
    /// Порядковый номер записи
    pub lsn: Lsn,
    /// Транзакция, породившая запись
    txn_id: TransactionId,
    /// LSN предыдущей записи той же транзакции
    prev_lsn: Lsn,
    /// Тип операции
    record_type: LogRecordType,
    /// Полезная нагрузка
    payload: LogPayload,
}

impl LogRecord {
    /// Размер фиксированного заголовка записи в байтах
    pub const HEADER_SIZE: usize = LOG_HEADER_SIZE;

    fn new(
        txn_id: TransactionId,
        prev_lsn: Lsn,
        record_type: LogRecordType,
        payload: LogPayload,
    ) -> Self {
        let size = (Self::HEADER_SIZE + payload.serialized_size()) as u32;
        Self {
            size,
            lsn: INVALID_LSN,
            txn_id,
            prev_lsn,
            record_type,
            payload,
        }
    }

    /// Создает запись о начале транзакции
    pub fn new_begin(txn_id: TransactionId) -> Self {
        Self::new(txn_id, INVALID_LSN, LogRecordType::Begin, LogPayload::Empty)
    }

    /// Создает запись о фиксации транзакции
    pub fn new_commit(txn_id: TransactionId, prev_lsn: Lsn) -> Self {
        Self::new(txn_id, prev_lsn, LogRecordType::Commit, LogPayload::Empty)
    }

    /// Создает запись об отмене транзакции
    pub fn new_abort(txn_id: TransactionId, prev_lsn: Lsn) -> Self {
        Self::new(txn_id, prev_lsn, LogRecordType::Abort, LogPayload::Empty)
    }

    /// Создает запись о вставке кортежа
    pub fn new_insert(txn_id: TransactionId, prev_lsn: Lsn, rid: Rid, tuple: Tuple) -> Self {
        Self::new(
            txn_id,
            prev_lsn,
            LogRecordType::Insert,
            LogPayload::TupleOp { rid, tuple },
        )
    }

    /// Создает запись о пометке кортежа удаленным
    pub fn new_mark_delete(txn_id: TransactionId, prev_lsn: Lsn, rid: Rid, tuple: Tuple) -> Self {
        Self::new(
            txn_id,
            prev_lsn,
            LogRecordType::MarkDelete,
            LogPayload::TupleOp { rid, tuple },
        )
    }

    /// Создает запись о физическом удалении кортежа
    pub fn new_apply_delete(txn_id: TransactionId, prev_lsn: Lsn, rid: Rid, tuple: Tuple) -> Self {
        Self::new(
            txn_id,
            prev_lsn,
            LogRecordType::ApplyDelete,
            LogPayload::TupleOp { rid, tuple },
        )
    }

    /// Создает запись об откате пометки удаления
    pub fn new_rollback_delete(
        txn_id: TransactionId,
        prev_lsn: Lsn,
        rid: Rid,
        tuple: Tuple,
    ) -> Self {
        Self::new(
            txn_id,
            prev_lsn,
            LogRecordType::RollbackDelete,
            LogPayload::TupleOp { rid, tuple },
        )
    }

    /// Создает запись об обновлении кортежа
    pub fn new_update(
        txn_id: TransactionId,
        prev_lsn: Lsn,
        rid: Rid,
        old_tuple: Tuple,
        new_tuple: Tuple,
    ) -> Self {
        Self::new(
            txn_id,
            prev_lsn,
            LogRecordType::Update,
            LogPayload::Update {
                rid,
                old_tuple,
                new_tuple,
            },
        )
    }

    /// Создает запись о выделении новой страницы
    pub fn new_new_page(
        txn_id: TransactionId,
        prev_lsn: Lsn,
        prev_page_id: PageId,
        page_id: PageId,
    ) -> Self {
        Self::new(
            txn_id,
            prev_lsn,
            LogRecordType::NewPage,
            LogPayload::NewPage {
                prev_page_id,
                page_id,
            },
        )
    }

    /// Возвращает полный размер записи на диске
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Возвращает идентификатор транзакции
    pub fn txn_id(&self) -> TransactionId {
        self.txn_id
    }

    /// Возвращает LSN предыдущей записи той же транзакции
    pub fn prev_lsn(&self) -> Lsn {
        self.prev_lsn
    }

    /// Возвращает тип записи
    pub fn record_type(&self) -> LogRecordType {
        self.record_type
    }

    /// Возвращает полезную нагрузку записи
    pub fn payload(&self) -> &LogPayload {
        &self.payload
    }

    /// Сериализует запись в буфер; буфер должен вмещать ровно `size()` байт
    pub fn serialize_into(&self, buf: &mut [u8]) {
        debug_assert!(buf.len() >= self.size as usize);

        buf[0..4].copy_from_slice(&self.size.to_le_bytes());
        buf[4..8].copy_from_slice(&self.lsn.to_le_bytes());
        buf[8..12].copy_from_slice(&self.txn_id.to_le_bytes());
        buf[12..16].copy_from_slice(&self.prev_lsn.to_le_bytes());
        buf[16..20].copy_from_slice(&(self.record_type as u32).to_le_bytes());

        let mut pos = Self::HEADER_SIZE;
        match &self.payload {
            LogPayload::Empty => {}
            LogPayload::TupleOp { rid, tuple } => {
                rid.serialize_into(&mut buf[pos..pos + Rid::SERIALIZED_SIZE]);
                pos += Rid::SERIALIZED_SIZE;
                tuple.serialize_into(&mut buf[pos..pos + tuple.serialized_size()]);
            }
            LogPayload::Update {
                rid,
                old_tuple,
                new_tuple,
            } => {
                rid.serialize_into(&mut buf[pos..pos + Rid::SERIALIZED_SIZE]);
                pos += Rid::SERIALIZED_SIZE;
                old_tuple.serialize_into(&mut buf[pos..pos + old_tuple.serialized_size()]);
                pos += old_tuple.serialized_size();
                new_tuple.serialize_into(&mut buf[pos..pos + new_tuple.serialized_size()]);
            }
            LogPayload::NewPage {
                prev_page_id,
                page_id,
            } => {
                buf[pos..pos + 4].copy_from_slice(&prev_page_id.to_le_bytes());
                buf[pos + 4..pos + 8].copy_from_slice(&page_id.to_le_bytes());
            }
        }
    }

    /// Восстанавливает запись из начала буфера
    pub fn deserialize(buf: &[u8]) -> Result<Self> {
        if buf.len() < Self::HEADER_SIZE {
            return Err(Error::log("Обрезанный заголовок лог-записи"));
        }

        let size = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let lsn = Lsn::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
        let txn_id = TransactionId::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]);
        let prev_lsn = Lsn::from_le_bytes([buf[12], buf[13], buf[14], buf[15]]);
        let record_type =
            LogRecordType::from_u32(u32::from_le_bytes([buf[16], buf[17], buf[18], buf[19]]))?;

        if (size as usize) < Self::HEADER_SIZE || buf.len() < size as usize {
            return Err(Error::log(format!(
                "Некорректный размер лог-записи: {} при {} доступных байтах",
                size,
                buf.len()
            )));
        }

        let body = &buf[Self::HEADER_SIZE..size as usize];
        let payload = match record_type {
            LogRecordType::Begin | LogRecordType::Commit | LogRecordType::Abort => {
                LogPayload::Empty
            }
            LogRecordType::Insert
            | LogRecordType::MarkDelete
            | LogRecordType::ApplyDelete
            | LogRecordType::RollbackDelete => {
                if body.len() < Rid::SERIALIZED_SIZE {
                    return Err(Error::log("Обрезанный RID в лог-записи"));
                }
                let rid = Rid::deserialize(&body[..Rid::SERIALIZED_SIZE]);
                let (tuple, _) = Tuple::deserialize(&body[Rid::SERIALIZED_SIZE..])?;
                LogPayload::TupleOp { rid, tuple }
            }
            LogRecordType::Update => {
                if body.len() < Rid::SERIALIZED_SIZE {
                    return Err(Error::log("Обрезанный RID в лог-записи"));
                }
                let rid = Rid::deserialize(&body[..Rid::SERIALIZED_SIZE]);
                let mut pos = Rid::SERIALIZED_SIZE;
                let (old_tuple, consumed) = Tuple::deserialize(&body[pos..])?;
                pos += consumed;
                let (new_tuple, _) = Tuple::deserialize(&body[pos..])?;
                LogPayload::Update {
                    rid,
                    old_tuple,
                    new_tuple,
                }
            }
            LogRecordType::NewPage => {
                if body.len() < 8 {
                    return Err(Error::log("Обрезанная нагрузка NEWPAGE"));
                }
                let prev_page_id = PageId::from_le_bytes([body[0], body[1], body[2], body[3]]);
                let page_id = PageId::from_le_bytes([body[4], body[5], body[6], body[7]]);
                LogPayload::NewPage {
                    prev_page_id,
                    page_id,
                }
            }
            LogRecordType::Invalid => {
                return Err(Error::log("Лог-запись типа INVALID"));
            }
        };

        let record = Self {
            size,
            lsn,
            txn_id,
            prev_lsn,
            record_type,
            payload,
        };

        if record.size as usize != Self::HEADER_SIZE + record.payload.serialized_size() {
            return Err(Error::log(format!(
                "Размер в заголовке ({}) не совпадает с фактическим ({})",
                record.size,
                Self::HEADER_SIZE + record.payload.serialized_size()
            )));
        }

        Ok(record)
    }
}

impl std::fmt::Display for LogRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} lsn={} txn={} prev={}",
            self.record_type, self.lsn, self.txn_id, self.prev_lsn
        )
    }
}

/// Потоковый декодер лог-записей из сброшенных на диск байт
///
/// Записи в буфере идут подряд, в порядке назначения LSN; декодер читает их
/// одну за другой до конца буфера.
pub struct LogRecordStream<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> LogRecordStream<'a> {
    /// Создает декодер над байтами журнала
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Возвращает текущее смещение в буфере
    pub fn position(&self) -> usize {
        self.pos
    }
}

impl Iterator for LogRecordStream<'_> {
    type Item = Result<LogRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.buf.len() {
            return None;
        }
        match LogRecord::deserialize(&self.buf[self.pos..]) {
            Ok(record) => {
                self.pos += record.size() as usize;
                Some(Ok(record))
            }
            Err(e) => {
                // Дальнейший разбор невозможен, останавливаемся на ошибке
                self.pos = self.buf.len();
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(record: &LogRecord) -> LogRecord {
        let mut buf = vec![0u8; record.size() as usize];
        record.serialize_into(&mut buf);
        LogRecord::deserialize(&buf).unwrap()
    }

    #[test]
    fn test_header_size() {
        let record = LogRecord::new_begin(1);
        assert_eq!(LogRecord::HEADER_SIZE, 20);
        assert_eq!(record.size(), 20);
        assert_eq!(record.lsn, INVALID_LSN);
    }

    #[test]
    fn test_begin_commit_abort_round_trip() {
        let mut begin = LogRecord::new_begin(7);
        begin.lsn = 0;
        assert_eq!(round_trip(&begin), begin);

        let mut commit = LogRecord::new_commit(7, 0);
        commit.lsn = 1;
        let restored = round_trip(&commit);
        assert_eq!(restored, commit);
        assert_eq!(restored.prev_lsn(), 0);
        assert_eq!(restored.record_type(), LogRecordType::Commit);

        let mut abort = LogRecord::new_abort(7, 1);
        abort.lsn = 2;
        assert_eq!(round_trip(&abort), abort);
    }

    #[test]
    fn test_insert_round_trip() {
        let rid = Rid::new(3, 14);
        let tuple = Tuple::new(vec![10, 20, 30]);
        let mut record = LogRecord::new_insert(5, INVALID_LSN, rid, tuple.clone());
        record.lsn = 42;

        assert_eq!(record.size() as usize, 20 + 8 + 4 + 3);

        let restored = round_trip(&record);
        assert_eq!(restored.lsn, 42);
        match restored.payload() {
            LogPayload::TupleOp {
                rid: r,
                tuple: t,
            } => {
                assert_eq!(*r, rid);
                assert_eq!(*t, tuple);
            }
            other => panic!("Неожиданная нагрузка: {:?}", other),
        }
    }

    #[test]
    fn test_delete_variants_round_trip() {
        let rid = Rid::new(1, 2);
        let tuple = Tuple::new(vec![9; 16]);

        for record in [
            LogRecord::new_mark_delete(2, 4, rid, tuple.clone()),
            LogRecord::new_apply_delete(2, 5, rid, tuple.clone()),
            LogRecord::new_rollback_delete(2, 6, rid, tuple.clone()),
        ] {
            let mut record = record;
            record.lsn = 10;
            assert_eq!(round_trip(&record), record);
        }
    }

    #[test]
    fn test_update_round_trip() {
        let rid = Rid::new(8, 0);
        let old_tuple = Tuple::new(vec![1, 2]);
        let new_tuple = Tuple::new(vec![3, 4, 5, 6]);
        let mut record = LogRecord::new_update(9, 100, rid, old_tuple.clone(), new_tuple.clone());
        record.lsn = 101;

        assert_eq!(record.size() as usize, 20 + 8 + (4 + 2) + (4 + 4));

        let restored = round_trip(&record);
        match restored.payload() {
            LogPayload::Update {
                old_tuple: o,
                new_tuple: n,
                ..
            } => {
                assert_eq!(*o, old_tuple);
                assert_eq!(*n, new_tuple);
            }
            other => panic!("Неожиданная нагрузка: {:?}", other),
        }
    }

    #[test]
    fn test_new_page_round_trip() {
        let mut record = LogRecord::new_new_page(4, 17, crate::common::INVALID_PAGE_ID, 12);
        record.lsn = 18;

        assert_eq!(record.size(), 28);

        let restored = round_trip(&record);
        match restored.payload() {
            LogPayload::NewPage {
                prev_page_id,
                page_id,
            } => {
                assert_eq!(*prev_page_id, crate::common::INVALID_PAGE_ID);
                assert_eq!(*page_id, 12);
            }
            other => panic!("Неожиданная нагрузка: {:?}", other),
        }
    }

    #[test]
    fn test_stream_decodes_in_order() {
        let records = vec![
            LogRecord::new_begin(1),
            LogRecord::new_insert(1, 0, Rid::new(0, 0), Tuple::new(vec![1, 2, 3])),
            LogRecord::new_commit(1, 1),
        ];

        let mut buf = Vec::new();
        for (i, record) in records.iter().enumerate() {
            let mut record = record.clone();
            record.lsn = i as Lsn;
            let mut chunk = vec![0u8; record.size() as usize];
            record.serialize_into(&mut chunk);
            buf.extend_from_slice(&chunk);
        }

        let decoded: Vec<_> = LogRecordStream::new(&buf)
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(decoded.len(), 3);
        assert_eq!(decoded[0].record_type(), LogRecordType::Begin);
        assert_eq!(decoded[1].record_type(), LogRecordType::Insert);
        assert_eq!(decoded[2].record_type(), LogRecordType::Commit);
        for (i, record) in decoded.iter().enumerate() {
            assert_eq!(record.lsn, i as Lsn);
        }
    }

    #[test]
    fn test_deserialize_rejects_garbage() {
        // Слишком короткий заголовок
        assert!(LogRecord::deserialize(&[0u8; 10]).is_err());

        // Неизвестный тип записи
        let mut buf = vec![0u8; 20];
        buf[0..4].copy_from_slice(&20u32.to_le_bytes());
        buf[16..20].copy_from_slice(&99u32.to_le_bytes());
        assert!(LogRecord::deserialize(&buf).is_err());

        // Заявленный размер больше буфера
        let mut record = LogRecord::new_begin(1);
        record.lsn = 0;
        let mut buf = vec![0u8; 20];
        record.serialize_into(&mut buf);
        buf[0..4].copy_from_slice(&64u32.to_le_bytes());
        assert!(LogRecord::deserialize(&buf).is_err());
    }
}
