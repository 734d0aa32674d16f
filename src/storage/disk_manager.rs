//! Дисковый менеджер журнала для txndb
//!
//! Этот модуль отвечает за низкоуровневую работу с лог-файлом:
//! - Контракт `DiskManager`, который потребляет менеджер журнала
//! - Файловая реализация с упорядоченным дозаписыванием и fsync
//! - Чтение журнала для тестов и восстановления

use crate::common::Result;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Контракт дискового менеджера, потребляемый менеджером журнала
///
/// `write_log` долговечно дозаписывает буфер в конец лог-файла и возвращается
/// только после завершения записи. Вызовы упорядочены порядком обращения;
/// менеджер журнала гарантирует это, выполняя их из единственного потока сброса.
pub trait DiskManager: Send + Sync {
    /// Долговечно дозаписывает `data` в конец журнала
    fn write_log(&self, data: &[u8]) -> Result<()>;

    /// Читает журнал начиная со смещения `offset`; возвращает число прочитанных байт
    fn read_log(&self, offset: u64, buf: &mut [u8]) -> Result<usize>;

    /// Возвращает текущий размер журнала в байтах
    fn log_size(&self) -> Result<u64>;
}

/// Статистика дискового менеджера
#[derive(Debug, Clone, Default)]
pub struct DiskManagerStats {
    /// Количество операций записи журнала
    pub log_writes: u64,
    /// Общее количество записанных байт
    pub bytes_written: u64,
    /// Количество операций чтения журнала
    pub log_reads: u64,
}

/// Файловый дисковый менеджер
///
/// Держит лог-файл открытым на все время жизни; каждая запись завершается
/// fsync, поэтому возврат из `write_log` означает долговечность данных.
pub struct FileDiskManager {
    log_path: PathBuf,
    log_file: Mutex<File>,
    stats: Mutex<DiskManagerStats>,
}

impl FileDiskManager {
    /// Открывает (или создает) лог-файл по указанному пути
    pub fn new(log_path: impl AsRef<Path>) -> Result<Self> {
        let log_path = log_path.as_ref().to_path_buf();
        let log_file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&log_path)?;

        Ok(Self {
            log_path,
            log_file: Mutex::new(log_file),
            stats: Mutex::new(DiskManagerStats::default()),
        })
    }

    /// Возвращает путь к лог-файлу
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Возвращает статистику дискового менеджера
    pub fn get_statistics(&self) -> DiskManagerStats {
        self.stats.lock().unwrap().clone()
    }
}

impl DiskManager for FileDiskManager {
    fn write_log(&self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }

        {
            let mut file = self.log_file.lock().unwrap();
            file.write_all(data)?;
            file.sync_data()?;
        }

        let mut stats = self.stats.lock().unwrap();
        stats.log_writes += 1;
        stats.bytes_written += data.len() as u64;

        Ok(())
    }

    fn read_log(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let read = {
            let mut file = self.log_file.lock().unwrap();
            file.seek(SeekFrom::Start(offset))?;

            // Файл открыт в режиме append, поэтому позиция записи от seek не зависит
            let mut total = 0;
            loop {
                let n = file.read(&mut buf[total..])?;
                if n == 0 {
                    break;
                }
                total += n;
                if total == buf.len() {
                    break;
                }
            }
            total
        };

        self.stats.lock().unwrap().log_reads += 1;
        Ok(read)
    }

    fn log_size(&self) -> Result<u64> {
        let file = self.log_file.lock().unwrap();
        Ok(file.metadata()?.len())
    }
}
