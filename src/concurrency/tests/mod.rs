//! Тесты подсистемы конкурентного доступа txndb
