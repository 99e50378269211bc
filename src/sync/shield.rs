//! CursorShield e VblSemaphore
//!
//! O bloco de cursor compartilhado e o snapshot de VRAM são os únicos
//! recursos que cruzam a fronteira interrupção/contexto serializado sem o
//! SystemGate. O shield é um try-lock leve: o lado de interrupção nunca
//! espera, apenas coalesce o pedido em pending bits.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Try-lock do estado de cursor.
pub struct CursorShield {
    taken: AtomicBool,
}

impl CursorShield {
    pub const fn new() -> Self {
        Self {
            taken: AtomicBool::new(false),
        }
    }

    /// Tenta tomar o shield. `None` = alguém está desenhando; coalescer.
    pub fn try_lock(&self) -> Option<ShieldGuard<'_>> {
        if self
            .taken
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            Some(ShieldGuard { shield: self })
        } else {
            None
        }
    }

    /// Toma o shield com busy-wait. APENAS para o contexto serializado.
    pub fn lock(&self) -> ShieldGuard<'_> {
        loop {
            if let Some(g) = self.try_lock() {
                return g;
            }
            core::hint::spin_loop();
        }
    }
}

/// Guard do shield - libera ao sair do escopo
pub struct ShieldGuard<'a> {
    shield: &'a CursorShield,
}

impl Drop for ShieldGuard<'_> {
    fn drop(&mut self) {
        self.shield.taken.store(false, Ordering::Release);
    }
}

/// Semáforo de contagem sinalizado a cada vertical blank.
///
/// O handler de VBL chama `signal_all`; threads interessadas em timing
/// chamam `wait_count`/`current` e comparam gerações. Não há bloqueio real
/// aqui (o crate não conhece o scheduler do host): a espera é do chamador.
pub struct VblSemaphore {
    generation: AtomicU32,
    waiters: AtomicU32,
}

impl VblSemaphore {
    pub const fn new() -> Self {
        Self {
            generation: AtomicU32::new(0),
            waiters: AtomicU32::new(0),
        }
    }

    /// Geração atual (incrementa a cada VBL).
    pub fn current(&self) -> u32 {
        self.generation.load(Ordering::Acquire)
    }

    /// Registra interesse e devolve a geração que o chamador deve esperar
    /// ultrapassar.
    pub fn arm(&self) -> u32 {
        self.waiters.fetch_add(1, Ordering::AcqRel);
        self.current()
    }

    /// O VBL da geração `armed` já ocorreu?
    pub fn elapsed(&self, armed: u32) -> bool {
        // wrapping: diferença de geração, não comparação absoluta
        self.current().wrapping_sub(armed) > 0
    }

    /// Libera o registro feito por `arm`.
    pub fn disarm(&self) {
        self.waiters.fetch_sub(1, Ordering::AcqRel);
    }

    /// Sinaliza todos os esperadores (chamado pelo handler de VBL).
    pub fn signal_all(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Há threads esperando?
    pub fn has_waiters(&self) -> bool {
        self.waiters.load(Ordering::Acquire) > 0
    }
}

impl Default for VblSemaphore {
    fn default() -> Self {
        Self::new()
    }
}
