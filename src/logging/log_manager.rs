//! Менеджер журнала упреждающей записи для txndb
//!
//! Этот модуль реализует буферизованное накопление лог-записей и их
//! асинхронный сброс на диск:
//! - Двойная буферизация: буфер добавления и буфер сброса одинакового размера
//! - Фоновый поток сброса, срабатывающий по таймеру или по заполнению буфера
//! - Принудительный сброс по требованию пула буферов
//! - Водяные знаки `next_lsn` / `last_lsn` / `persistent_lsn`
//!
//! Все состояние добавления защищено единственным мьютексом `latch`;
//! два условных сигнала делят его: `flush_cv` будит поток сброса,
//! `append_cv` будит добавляющие потоки и ожидающих принудительного сброса.

use crate::common::config::LogManagerConfig;
use crate::common::types::{Lsn, INVALID_LSN};
use crate::logging::log_record::LogRecord;
use crate::storage::disk_manager::DiskManager;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

/// Статистика менеджера журнала
#[derive(Debug, Clone, Default)]
pub struct LogManagerStats {
    /// Количество добавленных лог-записей
    pub records_appended: u64,
    /// Общее количество добавленных байт
    pub bytes_appended: u64,
    /// Количество блокировок добавляющего потока из-за заполнения буфера
    pub append_stalls: u64,
    /// Количество выполненных циклов сброса с данными
    pub flush_cycles: u64,
    /// Общее количество сброшенных на диск байт
    pub bytes_flushed: u64,
    /// Количество принудительных сбросов
    pub forced_flushes: u64,
}

/// Состояние добавления, целиком защищенное мьютексом `latch`
struct AppendState {
    /// Текущий буфер: цель добавления
    log_buffer: Vec<u8>,
    /// Количество действительных байт в текущем буфере
    log_buffer_offset: usize,
    /// Буфер сброса: записывается на диск
    flush_buffer: Vec<u8>,
    /// Количество действительных байт в буфере сброса
    flush_buffer_size: usize,
    /// Следующий назначаемый LSN
    next_lsn: Lsn,
    /// LSN последней добавленной записи
    last_lsn: Lsn,
    /// Запрошен внеочередной сброс
    need_flush: bool,
}

/// Разделяемое ядро менеджера журнала: им владеют и внешние потоки,
/// и фоновый поток сброса
struct LogCore {
    latch: Mutex<AppendState>,
    flush_cv: Condvar,
    append_cv: Condvar,
    /// Флаг включенного логирования; владелец жизненного цикла -
    /// `start_flush_thread` / `stop_flush_thread`
    enabled: AtomicBool,
    /// Наибольший LSN, запись которого долговечна на диске
    persistent_lsn: AtomicI32,
    disk_manager: Arc<dyn DiskManager>,
    config: LogManagerConfig,
    stats: Mutex<LogManagerStats>,
}

impl LogCore {
    /// Цикл фонового потока сброса
    fn flush_loop(self: Arc<Self>) {
        while self.enabled.load(Ordering::SeqCst) {
            let state = self.latch.lock().unwrap();
            let (mut state, _timeout) = self
                .flush_cv
                .wait_timeout_while(state, self.config.flush_timeout, |s| !s.need_flush)
                .unwrap();

            // В каждый момент сбрасывается не более одного буфера
            assert_eq!(state.flush_buffer_size, 0);

            if state.log_buffer_offset > 0 {
                let state = &mut *state;
                std::mem::swap(&mut state.log_buffer, &mut state.flush_buffer);
                state.flush_buffer_size = state.log_buffer_offset;
                state.log_buffer_offset = 0;
                let durable_lsn = state.last_lsn;
                let flush_len = state.flush_buffer_size;

                // latch удерживается на время записи на диск
                self.disk_manager
                    .write_log(&state.flush_buffer[..flush_len])
                    .expect("фатальная ошибка записи журнала на диск");

                state.flush_buffer_size = 0;
                self.persistent_lsn.store(durable_lsn, Ordering::SeqCst);

                let mut stats = self.stats.lock().unwrap();
                stats.flush_cycles += 1;
                stats.bytes_flushed += flush_len as u64;
            }

            state.need_flush = false;
            self.append_cv.notify_all();
        }
    }
}

/// Менеджер журнала упреждающей записи
///
/// Обслуживает произвольное число добавляющих потоков и ровно один фоновый
/// поток сброса. Запись, получившая LSN, никогда не теряется: она либо в
/// текущем буфере, либо в буфере сброса, либо на диске.
pub struct LogManager {
    core: Arc<LogCore>,
    flush_thread: Mutex<Option<JoinHandle<()>>>,
}

impl LogManager {
    /// Создает менеджер журнала с конфигурацией по умолчанию
    pub fn new(disk_manager: Arc<dyn DiskManager>) -> Self {
        Self::with_config(LogManagerConfig::default(), disk_manager)
    }

    /// Создает менеджер журнала с заданной конфигурацией
    pub fn with_config(config: LogManagerConfig, disk_manager: Arc<dyn DiskManager>) -> Self {
        let capacity = config.log_buffer_size;
        let core = Arc::new(LogCore {
            latch: Mutex::new(AppendState {
                log_buffer: vec![0u8; capacity],
                log_buffer_offset: 0,
                flush_buffer: vec![0u8; capacity],
                flush_buffer_size: 0,
                next_lsn: 0,
                last_lsn: INVALID_LSN,
                need_flush: false,
            }),
            flush_cv: Condvar::new(),
            append_cv: Condvar::new(),
            enabled: AtomicBool::new(false),
            persistent_lsn: AtomicI32::new(INVALID_LSN),
            disk_manager,
            config,
            stats: Mutex::new(LogManagerStats::default()),
        });

        Self {
            core,
            flush_thread: Mutex::new(None),
        }
    }

    /// Включает логирование и запускает фоновый поток сброса
    ///
    /// Идемпотентна: повторный вызов при уже запущенном потоке ничего не делает.
    pub fn start_flush_thread(&self) {
        if self.core.enabled.swap(true, Ordering::SeqCst) {
            return;
        }
        let core = Arc::clone(&self.core);
        let handle = std::thread::spawn(move || core.flush_loop());
        *self.flush_thread.lock().unwrap() = Some(handle);
    }

    /// Выполняет финальный сброс, останавливает фоновый поток и выключает логирование
    ///
    /// Идемпотентна: повторный вызов при остановленном потоке ничего не делает.
    pub fn stop_flush_thread(&self) {
        if !self.core.enabled.swap(false, Ordering::SeqCst) {
            return;
        }
        self.flush(true);
        if let Some(handle) = self.flush_thread.lock().unwrap().take() {
            handle.join().expect("поток сброса журнала завершился аварийно");
        }

        let state = self.core.latch.lock().unwrap();
        assert_eq!(state.log_buffer_offset, 0);
        assert_eq!(state.flush_buffer_size, 0);
    }

    /// Добавляет лог-запись в текущий буфер и назначает ей LSN
    ///
    /// Может блокироваться, пока в текущем буфере не появится место; место
    /// освобождает поток сброса, меняя буферы местами. Назначение LSN и
    /// сериализация происходят в одной критической секции, поэтому записи
    /// лежат в буфере подряд в порядке возрастания LSN.
    pub fn append_log_record(&self, record: &mut LogRecord) -> Lsn {
        let size = record.size() as usize;
        debug_assert!(
            size < self.core.config.log_buffer_size,
            "лог-запись не помещается в буфер журнала"
        );

        let mut state = self.core.latch.lock().unwrap();
        let mut stalled = false;
        while state.log_buffer_offset + size >= self.core.config.log_buffer_size {
            state.need_flush = true;
            self.core.flush_cv.notify_one();
            stalled = true;
            state = self.core.append_cv.wait(state).unwrap();
        }

        record.lsn = state.next_lsn;
        state.next_lsn += 1;

        let offset = state.log_buffer_offset;
        record.serialize_into(&mut state.log_buffer[offset..offset + size]);
        state.log_buffer_offset += size;
        state.last_lsn = record.lsn;
        let lsn = record.lsn;
        drop(state);

        let mut stats = self.core.stats.lock().unwrap();
        stats.records_appended += 1;
        stats.bytes_appended += size as u64;
        if stalled {
            stats.append_stalls += 1;
        }

        lsn
    }

    /// Запрашивает сброс журнала
    ///
    /// При `force` инициирует цикл сброса и, если логирование включено, ждет
    /// его завершения: по возврату все записи, добавленные до вызова, имеют
    /// `lsn <= persistent_lsn()`. Без `force` просто ждет ближайшего
    /// уведомления от потока сброса.
    pub fn flush(&self, force: bool) {
        let state = self.core.latch.lock().unwrap();
        if force {
            self.core.stats.lock().unwrap().forced_flushes += 1;
            let mut state = state;
            state.need_flush = true;
            self.core.flush_cv.notify_one();
            if self.is_enabled() {
                let _state = self
                    .core
                    .append_cv
                    .wait_while(state, |s| s.need_flush)
                    .unwrap();
            }
        } else {
            let _state = self.core.append_cv.wait(state).unwrap();
        }
    }

    /// Возвращает, включено ли логирование
    pub fn is_enabled(&self) -> bool {
        self.core.enabled.load(Ordering::SeqCst)
    }

    /// Возвращает наибольший LSN, запись которого долговечна на диске
    ///
    /// Монотонно не убывает; пул буферов не имеет права вытеснять страницу,
    /// чей page-LSN больше этого значения, не запросив принудительный сброс.
    pub fn persistent_lsn(&self) -> Lsn {
        self.core.persistent_lsn.load(Ordering::SeqCst)
    }

    /// Возвращает следующий назначаемый LSN
    pub fn next_lsn(&self) -> Lsn {
        self.core.latch.lock().unwrap().next_lsn
    }

    /// Возвращает LSN последней добавленной записи или `INVALID_LSN`
    pub fn last_lsn(&self) -> Lsn {
        self.core.latch.lock().unwrap().last_lsn
    }

    /// Возвращает статистику менеджера журнала
    pub fn get_statistics(&self) -> LogManagerStats {
        self.core.stats.lock().unwrap().clone()
    }
}

impl Drop for LogManager {
    fn drop(&mut self) {
        self.stop_flush_thread();
    }
}
