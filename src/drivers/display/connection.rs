//! Arquivo: drivers/display/connection.rs
//!
//! Propósito: Protocolo de connect-change (hot-plug / mudança de
//! capacidade). Stable → Suspended(probe pendente) → Renegotiating → Stable.
//!
//! Detalhes de Implementação:
//! - O handler de interrupção SÓ incrementa um contador atômico e enfileira
//!   um work item (coalescido por flag atômica).
//! - O item diferido suspende a cadeia dependente INTEIRA antes de qualquer
//!   notificação a cliente (nenhum dependente observa "metade suspensa").
//! - Razões de suspensão são votos com refcount (probe, clamshell, AV-jack);
//!   só dessuspende quando TODOS os votos limpam.
//! - Saída do estado suspenso exige ack explícito do display server.

use alloc::sync::Arc;
use core::sync::atomic::Ordering;

use super::channel::ControlChannel;
use super::device::{FbEvent, Framebuffer};
use crate::core::work::ClosureWork;
use crate::drivers::base::{Query, Request};
use crate::sys::error::{GfxError, GfxResult};
use crate::sys::types::*;

/// Razão de um voto de suspensão.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuspendReason {
    /// Probe de connect-change pendente de ack.
    Probe,
    /// Tampa fechada (painel integrado, "desktop mode" forçado).
    Clamshell,
    /// Detecção de AV-jack.
    AvJack,
}

/// Estado de conexão do plano de controle.
pub(crate) struct ConnectionPlane {
    probe_votes: u32,
    clamshell_votes: u32,
    avjack_votes: u32,
    pub suspended: bool,
    info_cache: Option<ConnectionInfo>,
    /// Último contador de mudança reconhecido pelo cliente.
    pub acked_count: u32,
}

impl ConnectionPlane {
    pub fn new() -> Self {
        Self {
            probe_votes: 0,
            clamshell_votes: 0,
            avjack_votes: 0,
            suspended: false,
            info_cache: None,
            acked_count: 0,
        }
    }

    pub fn cached_info(&self) -> Option<&ConnectionInfo> {
        self.info_cache.as_ref()
    }

    /// Invalida o cache (connect-change).
    pub fn invalidate(&mut self) {
        self.info_cache = None;
    }

    /// Relê o status de conexão do driver e atualiza o cache.
    pub fn refresh(&mut self, chan: &mut ControlChannel) -> GfxResult<ConnectionInfo> {
        let mut info = ConnectionInfo::default();
        chan.status(&mut Query::Connection(&mut info))?;
        self.info_cache = Some(info);
        Ok(info)
    }

    fn votes_mut(&mut self, reason: SuspendReason) -> &mut u32 {
        match reason {
            SuspendReason::Probe => &mut self.probe_votes,
            SuspendReason::Clamshell => &mut self.clamshell_votes,
            SuspendReason::AvJack => &mut self.avjack_votes,
        }
    }

    pub fn vote(&mut self, reason: SuspendReason) {
        *self.votes_mut(reason) += 1;
        self.suspended = true;
    }

    /// Devolve true se o device dessuspendeu (todos os votos limpos).
    pub fn unvote(&mut self, reason: SuspendReason) -> bool {
        let v = self.votes_mut(reason);
        if *v > 0 {
            *v -= 1;
        }
        if self.probe_votes == 0 && self.clamshell_votes == 0 && self.avjack_votes == 0 {
            self.suspended = false;
            true
        } else {
            false
        }
    }

    pub fn any_votes(&self) -> bool {
        self.probe_votes > 0 || self.clamshell_votes > 0 || self.avjack_votes > 0
    }
}

/// Consulta rápida de online (sem mexer no cache).
pub(crate) fn query_online(chan: &mut ControlChannel) -> GfxResult<bool> {
    let mut info = ConnectionInfo::default();
    chan.status(&mut Query::Connection(&mut info))?;
    Ok(info.online)
}

impl Framebuffer {
    /// Device suspenso por connect-change/clamshell?
    pub fn is_suspended(&self) -> bool {
        self.ctl.lock().conn.suspended
    }

    /// Contador de connect-changes observados.
    pub fn connect_change_count(&self) -> u32 {
        self.connect_change.load(Ordering::Acquire)
    }

    /// Status de conexão (cache, senão consulta o driver).
    pub fn connection_info(&self) -> GfxResult<ConnectionInfo> {
        if self.is_dead() {
            return Err(GfxError::Unsupported);
        }
        let _g = self.gate.enter();
        let mut ctl = self.ctl.lock();
        if let Some(info) = ctl.conn.cached_info() {
            return Ok(*info);
        }
        let mut chan = self.chan.lock();
        ctl.conn.refresh(&mut chan)
    }

    // ------------------------------------------------------------------
    // CAMINHO DE INTERRUPÇÃO
    // ------------------------------------------------------------------

    /// Callback estilo interrupção do native driver: a conexão mudou.
    /// NÃO bloqueia: contador + coalescing + work item.
    pub fn connect_interrupt(self: &Arc<Self>) {
        self.connect_change.fetch_add(1, Ordering::AcqRel);
        self.queue_connect_work();
    }

    /// Enfileira o processamento diferido, coalescendo com um já pendente.
    pub(crate) fn queue_connect_work(self: &Arc<Self>) {
        if self.probe_pending.swap(true, Ordering::AcqRel) {
            return; // probe já na fila - coalescido
        }
        let sys = match self.system.upgrade() {
            Some(s) => s,
            None => {
                self.probe_pending.store(false, Ordering::Release);
                return;
            }
        };
        let fb = Arc::clone(self);
        sys.work().enqueue(ClosureWork::once(move || {
            fb.process_connect_change();
        }));
    }

    // ------------------------------------------------------------------
    // CONTEXTO SERIALIZADO
    // ------------------------------------------------------------------

    /// Item diferido: suspende a cadeia inteira, limpa caches transientes,
    /// notifica clientes. Roda na work queue.
    pub(crate) fn process_connect_change(self: &Arc<Self>) {
        let _g = self.gate.enter();
        self.probe_pending.store(false, Ordering::Release);
        if self.is_dead() {
            return;
        }
        crate::kinfo!("(Conn) Connect-change id=", self.id() as u64);

        // Fase 1: suspender TODOS os membros antes de qualquer notificação.
        let mut members = alloc::vec![Arc::clone(self)];
        members.extend(self.dependent_siblings());
        for m in members.iter() {
            m.suspend_for_probe();
            m.needs_time.store(true, Ordering::Release);
        }

        // Fase 2: notificar.
        let count = self.connect_change.load(Ordering::Acquire);
        for m in members.iter() {
            m.deliver_event(FbEvent::ConnectChange { count });
        }
    }

    /// Vota suspensão por probe e descarta estado transiente.
    fn suspend_for_probe(&self) {
        let mut ctl = self.ctl.lock();
        ctl.conn.vote(SuspendReason::Probe);
        ctl.conn.invalidate();
        ctl.modes.invalidate_caches();
        ctl.gamma.discard_staged();
        self.has_staged.store(false, Ordering::Release);
    }

    /// Ack explícito do display server. Re-consulta online/offline,
    /// re-resolve o modo corrente (fallback para o modo offline sintético se
    /// desconectado) e limpa o voto de probe DESTE device apenas.
    pub fn acknowledge_connect_change(self: &Arc<Self>) -> GfxResult<()> {
        if self.is_dead() {
            return Err(GfxError::Unsupported);
        }
        let _g = self.gate.enter();
        let mut ctl = self.ctl.lock();
        let mut chan = self.chan.lock();

        let info = ctl.conn.refresh(&mut chan)?;
        ctl.online = info.online;

        if !info.online {
            // Offline: modo corrente vira o sintético de resolução zero.
            ctl.modes.force_offline_mode();
        } else {
            ctl.modes.revalidate_current(&mut chan);
        }

        ctl.conn.acked_count = self.connect_change.load(Ordering::Acquire);
        ctl.conn.unvote(SuspendReason::Probe);
        drop(chan);
        drop(ctl);
        self.needs_time.store(false, Ordering::Release);
        crate::kdebug!("(Conn) Ack id=", self.id() as u64);
        Ok(())
    }

    // ------------------------------------------------------------------
    // VOTOS DE CLAMSHELL / AV-JACK
    // ------------------------------------------------------------------

    pub(crate) fn suspend_vote_clamshell(&self) {
        self.ctl.lock().conn.vote(SuspendReason::Clamshell);
    }

    pub(crate) fn unsuspend_vote_clamshell(&self) {
        self.ctl.lock().conn.unvote(SuspendReason::Clamshell);
    }

    /// Voto de AV-jack (detecção de TV/projetor).
    pub fn av_jack_vote(&self, present: bool) {
        let mut ctl = self.ctl.lock();
        if present {
            ctl.conn.vote(SuspendReason::AvJack);
        } else {
            ctl.conn.unvote(SuspendReason::AvJack);
        }
    }

    // ------------------------------------------------------------------
    // PROBE EXPLÍCITO
    // ------------------------------------------------------------------

    /// Probe pedido pelo usuário. `Unsupported` se o driver nunca anunciou
    /// capacidade de probe; coalescido se já houver um pendente.
    pub fn request_probe(self: &Arc<Self>) -> GfxResult<()> {
        if self.is_dead() {
            return Err(GfxError::Unsupported);
        }
        let capable = {
            let _g = self.gate.enter();
            let mut ctl = self.ctl.lock();
            let info = match ctl.conn.cached_info() {
                Some(i) => *i,
                None => {
                    let mut chan = self.chan.lock();
                    ctl.conn.refresh(&mut chan)?
                }
            };
            info.flags.contains(ConnectionFlags::PROBE_CAPABLE)
        };
        if !capable {
            return Err(GfxError::Unsupported);
        }
        if self.probe_pending.load(Ordering::Acquire) {
            return Ok(()); // coalescido
        }
        {
            let _g = self.gate.enter();
            let mut chan = self.chan.lock();
            chan.control(&mut Request::ProbeConnection)?;
        }
        self.connect_interrupt();
        Ok(())
    }
}
