//! Execução diferida
//!
//! O subsistema gráfico empurra todo trabalho iniciado em contexto de
//! interrupção (connect-change, CLUT diferido, barreira de sleep) para
//! uma fila processada no contexto serializado.

pub mod workqueue;

pub use workqueue::{ClosureWork, WorkItem, WorkQueue};
