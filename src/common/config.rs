//! Конфигурация для txndb
//!
//! Предоставляет структуры конфигурации для менеджера блокировок
//! и менеджера журнала

use crate::common::constants::{DEFAULT_STRICT_2PL, LOG_BUFFER_SIZE, LOG_TIMEOUT};
use crate::common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Конфигурация менеджера блокировок
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockManagerConfig {
    /// Строгий режим 2PL: блокировки снимаются только после фиксации или отмены
    pub strict_2pl: bool,
}

impl Default for LockManagerConfig {
    fn default() -> Self {
        Self {
            strict_2pl: DEFAULT_STRICT_2PL,
        }
    }
}

/// Конфигурация менеджера журнала
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogManagerConfig {
    /// Размер каждого из двух буферов журнала (в байтах)
    pub log_buffer_size: usize,
    /// Периодичность фонового сброса журнала на диск
    pub flush_timeout: Duration,
}

impl Default for LogManagerConfig {
    fn default() -> Self {
        Self {
            log_buffer_size: LOG_BUFFER_SIZE,
            flush_timeout: LOG_TIMEOUT,
        }
    }
}

/// Общая конфигурация транзакционного ядра
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Конфигурация менеджера блокировок
    pub lock: LockManagerConfig,
    /// Конфигурация менеджера журнала
    pub log: LogManagerConfig,
}

impl EngineConfig {
    /// Загружает конфигурацию из TOML файла
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: EngineConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Сохраняет конфигурацию в TOML файл
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::configuration(format!("Ошибка сериализации конфигурации: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Загружает конфигурацию из переменных окружения
    pub fn from_env() -> Result<Self> {
        let mut config = EngineConfig::default();

        if let Ok(strict) = std::env::var("TXNDB_STRICT_2PL") {
            config.lock.strict_2pl = strict
                .parse()
                .map_err(|_| Error::configuration("TXNDB_STRICT_2PL должен быть true или false"))?;
        }

        if let Ok(size) = std::env::var("TXNDB_LOG_BUFFER_SIZE") {
            config.log.log_buffer_size = size
                .parse()
                .map_err(|_| Error::configuration("TXNDB_LOG_BUFFER_SIZE должен быть числом"))?;
        }

        if let Ok(timeout_ms) = std::env::var("TXNDB_LOG_TIMEOUT_MS") {
            let ms: u64 = timeout_ms
                .parse()
                .map_err(|_| Error::configuration("TXNDB_LOG_TIMEOUT_MS должен быть числом"))?;
            config.log.flush_timeout = Duration::from_millis(ms);
        }

        config.validate()?;
        Ok(config)
    }

    /// Валидирует конфигурацию
    pub fn validate(&self) -> Result<()> {
        if self.log.log_buffer_size == 0 {
            return Err(Error::configuration(
                "Размер буфера журнала должен быть больше нуля",
            ));
        }

        if self.log.flush_timeout.is_zero() {
            return Err(Error::configuration(
                "Периодичность сброса журнала должна быть больше нуля",
            ));
        }

        Ok(())
    }
}
