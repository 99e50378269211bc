//! SystemGate - lock grosso do plano de controle
//!
//! Toda operação pública do subsistema (mode set, attribute set, processamento
//! de connect-change) roda dentro do gate, emulando "deve rodar na work queue
//! dona". A verificação de reentrância é um detector de erro de programação,
//! não um mecanismo de correção: violação gera diagnóstico no log e segue.

use core::sync::atomic::{AtomicBool, Ordering};
use spin::{Mutex, MutexGuard};

/// Lock de serialização do plano de controle.
///
/// # Quando usar
///
/// - Em TODO entry point público do subsistema
/// - Antes de qualquer chamada Control/Status ao native driver
///
/// # Quando NÃO usar
///
/// - Em nível de interrupção (VBL, connect interrupt) - usar atômicos
pub struct SystemGate {
    inner: Mutex<()>,
    entered: AtomicBool,
}

impl SystemGate {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(()),
            entered: AtomicBool::new(false),
        }
    }

    /// Entra no contexto serializado.
    pub fn enter(&self) -> GateGuard<'_> {
        let guard = self.inner.lock();
        self.entered.store(true, Ordering::Release);
        GateGuard { gate: self, _guard: guard }
    }

    /// Tenta entrar sem bloquear.
    pub fn try_enter(&self) -> Option<GateGuard<'_>> {
        let guard = self.inner.try_lock()?;
        self.entered.store(true, Ordering::Release);
        Some(GateGuard { gate: self, _guard: guard })
    }

    /// O contexto serializado está ativo?
    pub fn is_entered(&self) -> bool {
        self.entered.load(Ordering::Acquire)
    }

    /// Diagnóstico de reentrância: loga se o chamador NÃO está dentro do
    /// gate. Não impede a chamada.
    pub fn assert_entered(&self, who: &str) {
        if !self.is_entered() {
            crate::kwarn!("(Gate) Chamada fora do contexto serializado:");
            crate::kwarn!(who);
        }
    }
}

impl Default for SystemGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard do gate - libera ao sair do escopo
pub struct GateGuard<'a> {
    gate: &'a SystemGate,
    _guard: MutexGuard<'a, ()>,
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        self.gate.entered.store(false, Ordering::Release);
    }
}
