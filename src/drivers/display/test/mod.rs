//! # Testes do Subsistema de Display
//!
//! Organização modular dos testes:
//! - `fake.rs` - Native driver falso com trace compartilhado
//! - `display_test.rs` - Lifecycle, power, conexão, modos, mirror
//! - Testes de codec (gamma, cursor, VRAM) vivem junto dos módulos

pub mod fake;

mod display_test;
