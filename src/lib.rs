//! Lumen - Display & Framebuffer Power Management Core.
//!
//! Ponto central de exportação dos módulos do subsistema.
//! Toda interação com hardware passa pelo trait `NativeDriver`;
//! este crate contém apenas a orquestração (power, modos, cursor, conexão).

#![cfg_attr(not(test), no_std)]

// Habilitar alocação dinâmica (necessário para Vec/Box/Arc)
extern crate alloc;

// --- Camada de Dispositivo ---
pub mod drivers; // NativeDriver, Framebuffer, subsistema gráfico

// --- Módulos Centrais ---
pub mod core; // Logging, Work Queues
pub mod sync; // Primitivas de Sincronização (Gate, Shield, VBL)
pub mod sys; // Definições de Sistema (Erros, Tipos de Modo/Pixel)

// Re-exportar os pontos de entrada principais
pub use crate::drivers::display::{Framebuffer, GraphicsSubsystem};
pub use crate::sys::error::{GfxError, GfxResult};
