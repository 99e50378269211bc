//! # Camada de Dispositivo
//!
//! O subsistema mantém APENAS a orquestração; o hardware real vive atrás do
//! trait `NativeDriver` (módulo vendor opaco, verbos Control/Status).
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │           Display server (cliente)          │
//! │  - open/close, ack de connect-change        │
//! │  - mode set, cursor, gamma/CLUT             │
//! └─────────────────────────────────────────────┘
//!                      ↑
//!            GraphicsSubsystem / Framebuffer
//!                      ↑
//! ┌─────────────────────────────────────────────┐
//! │         NativeDriver (vendor opaco)         │
//! │  - control(code, params)                    │
//! │  - status(code, params)                     │
//! └─────────────────────────────────────────────┘
//! ```

pub mod base; // Trait NativeDriver + operações Control/Status
pub mod display; // Framebuffer, power, conexão, modos, cursor
