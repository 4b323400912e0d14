// src/admission/tests/mod.rs
