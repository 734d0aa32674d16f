//! Тесты менеджера журнала txndb

use crate::common::config::LogManagerConfig;
use crate::common::types::{Lsn, Rid, INVALID_LSN};
use crate::logging::log_manager::LogManager;
use crate::logging::log_record::{LogRecord, LogRecordStream, LogRecordType};
use crate::storage::disk_manager::{DiskManager, FileDiskManager};
use crate::storage::tuple::Tuple;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn create_log_manager(dir: &TempDir, config: LogManagerConfig) -> (LogManager, Arc<FileDiskManager>) {
    let disk = Arc::new(FileDiskManager::new(dir.path().join("txndb.log")).unwrap());
    let lm = LogManager::with_config(config, Arc::clone(&disk) as Arc<dyn DiskManager>);
    (lm, disk)
}

/// Ждет, пока водяной знак долговечности не достигнет `target`
fn wait_for_persistent(lm: &LogManager, target: Lsn, timeout: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if lm.persistent_lsn() >= target {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    false
}

/// Читает весь лог-файл в память
fn read_whole_log(disk: &FileDiskManager) -> Vec<u8> {
    let size = disk.log_size().unwrap() as usize;
    let mut buf = vec![0u8; size];
    let read = disk.read_log(0, &mut buf).unwrap();
    assert_eq!(read, size);
    buf
}

#[test]
fn test_append_assigns_dense_lsns() {
    let dir = TempDir::new().unwrap();
    let (lm, _disk) = create_log_manager(&dir, LogManagerConfig::default());

    assert_eq!(lm.next_lsn(), 0);
    assert_eq!(lm.last_lsn(), INVALID_LSN);
    assert_eq!(lm.persistent_lsn(), INVALID_LSN);

    // LSN назначаются подряд, без пропусков
    for expected in 0..10 {
        let mut record = LogRecord::new_begin(expected);
        let lsn = lm.append_log_record(&mut record);
        assert_eq!(lsn, expected);
        assert_eq!(record.lsn, expected);
    }

    assert_eq!(lm.next_lsn(), 10);
    assert_eq!(lm.last_lsn(), 9);

    let stats = lm.get_statistics();
    assert_eq!(stats.records_appended, 10);
    assert_eq!(stats.bytes_appended, 200);
}

#[test]
fn test_forced_flush_advances_persistent_lsn() {
    let dir = TempDir::new().unwrap();
    let (lm, disk) = create_log_manager(&dir, LogManagerConfig::default());
    lm.start_flush_thread();

    let mut record = LogRecord::new_insert(1, INVALID_LSN, Rid::new(0, 0), Tuple::new(vec![7; 10]));
    let lsn = lm.append_log_record(&mut record);

    lm.flush(true);
    assert!(lm.persistent_lsn() >= lsn);

    // Сброшенные байты декодируются обратно в ту же запись
    let buf = read_whole_log(&disk);
    let decoded: Vec<_> = LogRecordStream::new(&buf)
        .collect::<crate::common::Result<Vec<_>>>()
        .unwrap();
    assert_eq!(decoded.len(), 1);
    assert_eq!(decoded[0], record);

    lm.stop_flush_thread();
}

#[test]
fn test_timer_driven_flush() {
    let dir = TempDir::new().unwrap();
    let config = LogManagerConfig {
        flush_timeout: Duration::from_millis(50),
        ..LogManagerConfig::default()
    };
    let (lm, _disk) = create_log_manager(&dir, config);
    lm.start_flush_thread();

    let mut record = LogRecord::new_begin(1);
    let lsn = lm.append_log_record(&mut record);

    // Без явного запроса сброс происходит по таймеру
    assert!(wait_for_persistent(&lm, lsn, Duration::from_secs(5)));

    lm.stop_flush_thread();
}

#[test]
fn test_buffer_rotation_under_pressure() {
    let dir = TempDir::new().unwrap();
    let config = LogManagerConfig {
        log_buffer_size: 1024,
        flush_timeout: Duration::from_millis(100),
    };
    let (lm, disk) = create_log_manager(&dir, config);
    lm.start_flush_thread();

    // Каждая запись занимает 40 байт: заголовок 20 + RID 8 + кортеж 4 + 8
    let record_count: Lsn = 40;
    for i in 0..record_count {
        let mut record =
            LogRecord::new_insert(1, i - 1, Rid::new(0, i as u32), Tuple::new(vec![i as u8; 8]));
        assert_eq!(record.size(), 40);
        let lsn = lm.append_log_record(&mut record);
        assert_eq!(lsn, i);
    }

    lm.flush(true);
    assert!(lm.persistent_lsn() >= record_count - 1);

    // В буфер помещается лишь часть записей, значит добавление блокировалось
    let stats = lm.get_statistics();
    assert!(stats.append_stalls >= 1);

    // Все 40 записей дошли до диска в порядке LSN
    lm.stop_flush_thread();
    let buf = read_whole_log(&disk);
    let decoded: Vec<_> = LogRecordStream::new(&buf)
        .collect::<crate::common::Result<Vec<_>>>()
        .unwrap();
    assert_eq!(decoded.len(), record_count as usize);
    for (i, record) in decoded.iter().enumerate() {
        assert_eq!(record.lsn, i as Lsn);
    }
}

#[test]
fn test_start_stop_idempotent() {
    let dir = TempDir::new().unwrap();
    let (lm, _disk) = create_log_manager(&dir, LogManagerConfig::default());

    lm.start_flush_thread();
    lm.start_flush_thread();
    assert!(lm.is_enabled());

    let mut record = LogRecord::new_begin(1);
    let lsn = lm.append_log_record(&mut record);
    lm.flush(true);
    let persistent = lm.persistent_lsn();
    assert!(persistent >= lsn);

    // Повторные принудительные сбросы без новых записей не двигают водяной знак
    lm.flush(true);
    lm.flush(true);
    assert_eq!(lm.persistent_lsn(), persistent);

    lm.stop_flush_thread();
    lm.stop_flush_thread();
    assert!(!lm.is_enabled());
}

#[test]
fn test_stop_flushes_remaining_records() {
    let dir = TempDir::new().unwrap();
    let (lm, disk) = create_log_manager(&dir, LogManagerConfig::default());
    lm.start_flush_thread();

    let mut last_lsn = INVALID_LSN;
    for i in 0..3 {
        let mut record = LogRecord::new_begin(i);
        last_lsn = lm.append_log_record(&mut record);
    }

    // Остановка выполняет финальный сброс
    lm.stop_flush_thread();
    assert_eq!(lm.persistent_lsn(), last_lsn);
    assert_eq!(disk.log_size().unwrap(), 60);
}

#[test]
fn test_round_trip_through_disk() {
    let dir = TempDir::new().unwrap();
    let (lm, disk) = create_log_manager(&dir, LogManagerConfig::default());
    lm.start_flush_thread();

    let rid = Rid::new(2, 5);
    let mut originals = vec![
        LogRecord::new_begin(1),
        LogRecord::new_insert(1, 0, rid, Tuple::new(vec![1, 2, 3])),
        LogRecord::new_update(1, 1, rid, Tuple::new(vec![1, 2, 3]), Tuple::new(vec![4, 5])),
        LogRecord::new_mark_delete(1, 2, rid, Tuple::new(vec![4, 5])),
        LogRecord::new_new_page(1, 3, crate::common::INVALID_PAGE_ID, 2),
        LogRecord::new_commit(1, 4),
    ];
    for record in originals.iter_mut() {
        lm.append_log_record(record);
    }

    lm.stop_flush_thread();

    let buf = read_whole_log(&disk);
    let decoded: Vec<_> = LogRecordStream::new(&buf)
        .collect::<crate::common::Result<Vec<_>>>()
        .unwrap();

    // Повторное чтение дает те же записи с теми же LSN
    assert_eq!(decoded, originals);
    assert_eq!(decoded[0].record_type(), LogRecordType::Begin);
    assert_eq!(decoded[5].record_type(), LogRecordType::Commit);
}

#[test]
fn test_concurrent_appends_keep_lsns_unique() {
    let dir = TempDir::new().unwrap();
    let config = LogManagerConfig {
        log_buffer_size: 512,
        flush_timeout: Duration::from_millis(20),
    };
    let (lm, disk) = create_log_manager(&dir, config);
    lm.start_flush_thread();

    let lm = Arc::new(lm);
    let mut handles = Vec::new();
    for t in 0..4 {
        let lm = Arc::clone(&lm);
        handles.push(std::thread::spawn(move || {
            let mut lsns = Vec::new();
            for i in 0..50u32 {
                let mut record = LogRecord::new_insert(
                    t,
                    INVALID_LSN,
                    Rid::new(t, i),
                    Tuple::new(vec![t as u8; 4]),
                );
                lsns.push(lm.append_log_record(&mut record));
            }
            lsns
        }));
    }

    let mut all_lsns: Vec<Lsn> = Vec::new();
    for handle in handles {
        let lsns = handle.join().unwrap();
        // Внутри одного потока LSN строго возрастают
        assert!(lsns.windows(2).all(|w| w[0] < w[1]));
        all_lsns.extend(lsns);
    }

    // Все LSN уникальны и плотны: 0..200
    all_lsns.sort_unstable();
    assert_eq!(all_lsns, (0..200).collect::<Vec<Lsn>>());

    lm.stop_flush_thread();

    // На диске ровно 200 записей в порядке LSN
    let buf = read_whole_log(&disk);
    let decoded: Vec<_> = LogRecordStream::new(&buf)
        .collect::<crate::common::Result<Vec<_>>>()
        .unwrap();
    assert_eq!(decoded.len(), 200);
    assert!(decoded.windows(2).all(|w| w[0].lsn < w[1].lsn));
}
