//! Definições de Sistema
//!
//! Códigos de erro e tipos expostos a clientes (modo, pixel, timing).

pub mod error;
pub mod types;
