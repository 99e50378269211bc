//! Core Module
//!
//! Contém a lógica central do subsistema, independente de hardware:
//! logging e execução diferida (work queues).

pub mod logging;
pub mod work;
