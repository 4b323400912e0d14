// src/tests/mod.rs

// End-to-end behaviour of the composed service
mod service_tests;
