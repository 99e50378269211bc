//! # Subsistema de Display
//!
//! Orquestração de framebuffers: power, conexão, modos, cursor, gamma/CLUT
//! e VRAM save. Um único `GraphicsSubsystem` é construído no init e passado
//! por referência; não há registries globais.
//!
//! ## Modelo de execução
//!
//! - Plano de controle: serializado pelo `SystemGate` compartilhado.
//! - Interrupções (VBL, connect): só atômicos + enfileirar work item.
//! - Work queue compartilhada: processada no contexto serializado.

pub mod channel;
pub mod connection;
pub mod cursor;
pub mod device;
pub mod gamma;
pub mod modes;
pub mod params;
pub mod power;
pub mod vram;

#[cfg(test)]
mod test;

pub use channel::ControlChannel;
pub use device::{FbEvent, FbListener, Framebuffer, FramebufferConfig, MirrorRole};
pub use power::PowerChange;

use alloc::boxed::Box;
use alloc::sync::{Arc, Weak};
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

use spin::Mutex;

use crate::core::work::WorkQueue;
use crate::drivers::base::NativeDriver;
use crate::sync::SystemGate;
use crate::sys::error::{GfxError, GfxResult};

/// Contexto único do subsistema gráfico.
///
/// Dono do registro de devices, da work queue compartilhada e dos contadores
/// globais (votos de clamshell, barreira de sleep).
pub struct GraphicsSubsystem {
    gate: Arc<SystemGate>,
    work: WorkQueue,
    devices: Mutex<Vec<Arc<Framebuffer>>>,
    next_id: AtomicUsize,
    clamshell_closed: AtomicBool,
    clamshell_enable_votes: AtomicU32,
    system_sleeping: AtomicBool,
    sleep_tick_queued: AtomicBool,
    sleep_ack: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl GraphicsSubsystem {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            gate: Arc::new(SystemGate::new()),
            work: WorkQueue::new(),
            devices: Mutex::new(Vec::new()),
            next_id: AtomicUsize::new(0),
            clamshell_closed: AtomicBool::new(false),
            clamshell_enable_votes: AtomicU32::new(0),
            system_sleeping: AtomicBool::new(false),
            sleep_tick_queued: AtomicBool::new(false),
            sleep_ack: Mutex::new(None),
        })
    }

    /// Gate de serialização do plano de controle.
    pub fn gate(&self) -> &Arc<SystemGate> {
        &self.gate
    }

    /// Fila de trabalho compartilhada. O host drena no contexto serializado.
    pub fn work(&self) -> &WorkQueue {
        &self.work
    }

    /// Cria um framebuffer ainda NÃO enumerado (transições de power são
    /// síncronas até `enroll`).
    pub fn create_framebuffer(
        self: &Arc<Self>,
        driver: Box<dyn NativeDriver>,
        config: FramebufferConfig,
    ) -> GfxResult<Arc<Framebuffer>> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        Framebuffer::new(id, Arc::downgrade(self), driver, config)
    }

    /// Enumera o device no registro global. A partir daqui pedidos de power
    /// são diferidos para a work queue.
    pub fn enroll(&self, fb: &Arc<Framebuffer>) {
        let mut devs = self.devices.lock();
        if !devs.iter().any(|d| Arc::ptr_eq(d, fb)) {
            devs.push(Arc::clone(fb));
            fb.mark_enrolled();
            crate::kinfo!("(Gfx) Device enumerado id=", fb.id() as u64);
        }
    }

    /// Conveniência: cria e enumera.
    pub fn register(
        self: &Arc<Self>,
        driver: Box<dyn NativeDriver>,
        config: FramebufferConfig,
    ) -> GfxResult<Arc<Framebuffer>> {
        let fb = self.create_framebuffer(driver, config)?;
        self.enroll(&fb);
        Ok(fb)
    }

    /// Snapshot do registro.
    pub fn devices(&self) -> Vec<Arc<Framebuffer>> {
        self.devices.lock().clone()
    }

    // ------------------------------------------------------------------
    // CADEIA DEPENDENTE (multi-head)
    // ------------------------------------------------------------------

    /// Liga `members` numa cadeia circular de dependentes (siblings de uma
    /// placa multi-head). Aumentos de power propagam líder→seguidores;
    /// suspensão de conexão propaga para todos.
    pub fn link_dependents(&self, members: &[Arc<Framebuffer>]) -> GfxResult<()> {
        if members.len() < 2 {
            return Err(GfxError::BadArgument);
        }
        let _g = self.gate.enter();
        for (i, fb) in members.iter().enumerate() {
            let next = &members[(i + 1) % members.len()];
            fb.set_next_dependent(Arc::downgrade(next));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // MIRROR
    // ------------------------------------------------------------------

    /// Estabelece espelhamento primário/secundário.
    ///
    /// Invariante: no máximo UM relacionamento de mirror por device. Pedido
    /// contra um device já espelhado com outro parceiro devolve `Busy`; o
    /// chamador precisa desfazer o mirror existente primeiro.
    pub fn set_mirror(
        &self,
        primary: &Arc<Framebuffer>,
        secondary: &Arc<Framebuffer>,
    ) -> GfxResult<()> {
        if Arc::ptr_eq(primary, secondary) {
            return Err(GfxError::BadArgument);
        }
        let _g = self.gate.enter();
        if primary.mirror_partner().is_some() || secondary.mirror_partner().is_some() {
            return Err(GfxError::Busy);
        }
        primary.set_mirror_link(MirrorRole::Primary, Arc::downgrade(secondary));
        secondary.set_mirror_link(MirrorRole::Secondary, Arc::downgrade(primary));
        crate::kinfo!("(Gfx) Mirror: primário id=", primary.id() as u64);
        Ok(())
    }

    /// Desfaz o mirror do device (e do parceiro).
    pub fn clear_mirror(&self, fb: &Arc<Framebuffer>) {
        let _g = self.gate.enter();
        if let Some(partner) = fb.mirror_partner() {
            partner.clear_mirror_link();
        }
        fb.clear_mirror_link();
    }

    // ------------------------------------------------------------------
    // CLAMSHELL
    // ------------------------------------------------------------------

    /// Votos que habilitam a semântica de clamshell (refcount: AC ligado,
    /// display externo presente, ...).
    pub fn clamshell_enable_vote(&self, enable: bool) {
        if enable {
            self.clamshell_enable_votes.fetch_add(1, Ordering::AcqRel);
        } else {
            self.clamshell_enable_votes.fetch_sub(1, Ordering::AcqRel);
        }
    }

    /// Fechamento/abertura da tampa: vota suspensão forçada ("desktop mode")
    /// em todos os painéis integrados.
    pub fn set_clamshell_closed(&self, closed: bool) {
        if self.clamshell_closed.swap(closed, Ordering::AcqRel) == closed {
            return; // sem mudança
        }
        if closed && self.clamshell_enable_votes.load(Ordering::Acquire) == 0 {
            crate::kdebug!("(Gfx) Clamshell fechado sem votos de enable - ignorado");
            return;
        }
        let devs = self.devices();
        let _g = self.gate.enter();
        for fb in devs.iter() {
            if fb.is_builtin() {
                if closed {
                    fb.suspend_vote_clamshell();
                } else {
                    fb.unsuspend_vote_clamshell();
                }
            }
        }
    }

    pub fn clamshell_closed(&self) -> bool {
        self.clamshell_closed.load(Ordering::Acquire)
    }

    // ------------------------------------------------------------------
    // BARREIRA DE SLEEP DO SISTEMA
    // ------------------------------------------------------------------

    /// Sistema vai dormir. `ack` é chamado UMA vez quando nenhum device
    /// reporta trabalho pendente (save de VRAM, acks de cliente). O retry é
    /// um work item que se reagenda até a barreira limpar.
    pub fn system_will_sleep(self: &Arc<Self>, ack: Box<dyn FnOnce() + Send>) {
        self.system_sleeping.store(true, Ordering::Release);
        *self.sleep_ack.lock() = Some(ack);
        self.queue_sleep_tick();
    }

    /// Sistema acordou.
    pub fn system_did_wake(&self) {
        self.system_sleeping.store(false, Ordering::Release);
        *self.sleep_ack.lock() = None;
    }

    pub fn system_sleeping(&self) -> bool {
        self.system_sleeping.load(Ordering::Acquire)
    }

    /// OR de todos os "needs more time" por device.
    pub fn still_paging(&self) -> bool {
        self.devices.lock().iter().any(|d| d.needs_more_time())
    }

    pub(crate) fn queue_sleep_tick(self: &Arc<Self>) {
        if self.sleep_tick_queued.swap(true, Ordering::AcqRel) {
            return; // já na fila
        }
        let sys = Arc::clone(self);
        self.work.enqueue(crate::core::work::ClosureWork::new(move || {
            if sys.still_paging() {
                return crate::core::work::workqueue::WorkOutcome::Reschedule;
            }
            sys.sleep_tick_queued.store(false, Ordering::Release);
            if let Some(ack) = sys.sleep_ack.lock().take() {
                crate::kinfo!("(Gfx) Barreira de sleep limpa - ack ao PM");
                ack();
            }
            crate::core::work::workqueue::WorkOutcome::Done
        }));
    }
}
