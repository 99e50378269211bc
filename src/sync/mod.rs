//! # Synchronization Primitives
//!
//! Primitivas de sincronização do subsistema gráfico.
//!
//! ## Hierarquia de Uso
//!
//! ```text
//! SystemGate    → Lock grosso do plano de controle (contexto serializado)
//! CursorShield  → Try-lock do cursor (seguro em nível de interrupção)
//! VblSemaphore  → Contador para threads esperando o próximo vertical blank
//! ```
//!
//! ## Regras
//!
//! - **SystemGate**: NUNCA adquirir em nível de interrupção. O caminho de
//!   interrupção só toca atômicos ou enfileira work items.
//! - **CursorShield**: apenas `try_lock`; falha = coalescer em pending bits.
//! - **Ordem de Lock**: Gate → estado do device → canal. Nunca o inverso.

pub mod gate;
pub mod shield;

pub use gate::{GateGuard, SystemGate};
pub use shield::{CursorShield, ShieldGuard, VblSemaphore};
