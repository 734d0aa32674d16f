//! Кортеж хранилища
//!
//! Для транзакционного ядра кортеж непрозрачен: это байтовый payload,
//! который журналируется как есть. Разбор схемы и колонок выполняет
//! вышележащий слой каталога.

use crate::common::{Error, Result};
use serde::{Deserialize, Serialize};

/// Кортеж (строка) таблицы
///
/// На диске представлен length-prefixed формой: `длина: u32` (little-endian),
/// затем ровно `длина` байт данных.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tuple {
    data: Vec<u8>,
}

impl Tuple {
    /// Создает кортеж из байтового представления
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Возвращает данные кортежа
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Возвращает длину данных кортежа в байтах
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Проверяет, пуст ли кортеж
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Размер сериализованного представления: префикс длины плюс данные
    pub fn serialized_size(&self) -> usize {
        4 + self.data.len()
    }

    /// Сериализует кортеж в буфер; буфер должен вмещать `serialized_size()` байт
    pub fn serialize_into(&self, buf: &mut [u8]) {
        buf[0..4].copy_from_slice(&(self.data.len() as u32).to_le_bytes());
        buf[4..4 + self.data.len()].copy_from_slice(&self.data);
    }

    /// Восстанавливает кортеж из начала буфера
    ///
    /// Возвращает кортеж и количество прочитанных байт.
    pub fn deserialize(buf: &[u8]) -> Result<(Self, usize)> {
        if buf.len() < 4 {
            return Err(Error::log("Обрезанный префикс длины кортежа"));
        }
        let len = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
        if buf.len() < 4 + len {
            return Err(Error::log(format!(
                "Обрезанные данные кортежа: ожидалось {} байт, доступно {}",
                len,
                buf.len() - 4
            )));
        }
        Ok((Self::new(buf[4..4 + len].to_vec()), 4 + len))
    }
}
