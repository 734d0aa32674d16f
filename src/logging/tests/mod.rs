//! Тесты системы журналирования txndb

pub mod log_manager_tests;
