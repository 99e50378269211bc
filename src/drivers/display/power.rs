//! Arquivo: drivers/display/power.rs
//!
//! Propósito: Máquina de estados de power por framebuffer.
//! Sleep(0) → Doze(1) → Wake(2), com piso de dimming opcional calculado
//! do dicionário de parâmetros do display.
//!
//! Invariantes de ordem (consumidores dependem disto):
//! - Descendo para o estado mais baixo: notificação WillSleep ANTES de
//!   tocar hardware ("hardware ainda vivo quando will-sleep dispara").
//! - Subindo para o topo: hardware primeiro, DEPOIS DidWake.
//! - Aumento de power propaga líder→seguidores pela cadeia dependente;
//!   redução NÃO propaga (cada device é dimmed pelo policy driver).

use alloc::sync::Arc;

use super::device::{FbEvent, Framebuffer};
use super::params::ParameterStore;
use crate::core::work::ClosureWork;
use crate::drivers::base::Request;
use crate::sys::error::{GfxError, GfxResult};
use crate::sys::types::DevicePowerState;

/// Latência máxima comunicada ao PM para um handshake de sleep completo.
pub const SLEEP_HANDSHAKE_BUDGET_US: u64 = 30_000_000;

/// Valor do parâmetro audio-mute-and-screen-blank que indica "apaga tela".
/// Heurística legada; ver `legacy_dim_floor`.
pub const SCREEN_BLANK_VALUE: i64 = 2;

/// Chave do parâmetro consultado pelo piso de dimming.
pub const AUDIO_MUTE_AND_SCREEN_BLANK: &str = "audio-mute-and-screen-blank";

/// Política de cálculo do piso de dimming. Devolve o menor ordinal usável
/// (0 = full-off permitido).
pub type DimFloorPolicy = fn(&ParameterStore) -> u8;

/// Heurística legada: display com parâmetro de blank cujo `max` alcança o
/// valor de blank ganha piso 1 (dimming nunca chega a full-off).
///
/// Isto é um knob de política, não contrato: o encoding do parâmetro vem de
/// uma geração antiga de displays.
pub fn legacy_dim_floor(store: &ParameterStore) -> u8 {
    match store.get(AUDIO_MUTE_AND_SCREEN_BLANK) {
        Some(t) if t.max >= SCREEN_BLANK_VALUE => 1,
        _ => 0,
    }
}

/// Resultado de um pedido de transição.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerChange {
    /// Transição completou sincronamente.
    Done,
    /// Vai completar na work queue; latência esperada em µs.
    Deferred { upto_us: u64 },
}

/// Estado de power do plano de controle.
pub(crate) struct PowerPlane {
    pub state: DevicePowerState,
    pub pending: Option<DevicePowerState>,
    pub dim_floor: u8,
    pub dim_policy: DimFloorPolicy,
}

impl PowerPlane {
    pub fn new(policy: DimFloorPolicy) -> Self {
        Self {
            state: DevicePowerState::Doze,
            pending: None,
            dim_floor: 0,
            dim_policy: policy,
        }
    }
}

impl Framebuffer {
    /// Estado de power corrente.
    pub fn power_state(&self) -> DevicePowerState {
        self.ctl.lock().power.state
    }

    /// Piso de dimming corrente (0 = full-off permitido).
    pub fn dim_floor(&self) -> u8 {
        self.ctl.lock().power.dim_floor
    }

    /// Estado inicial para o estado do domínio de power.
    ///
    /// Decisão documentada: SEM power no domínio o device reporta o estado
    /// mais baixo (não consegue estar acordado). As duas variantes
    /// históricas do driver divergiam aqui; esta é a escolha coerente.
    pub fn initial_power_state_for_domain(&self, domain_powered: bool) -> u8 {
        if domain_powered {
            DevicePowerState::Wake.ordinal()
        } else {
            DevicePowerState::Sleep.ordinal()
        }
    }

    /// Capacidade máxima para o estado do domínio.
    pub fn max_capability_for_domain(&self, domain_powered: bool) -> u8 {
        self.initial_power_state_for_domain(domain_powered)
    }

    /// Pedido de mudança de power vindo da árvore de PM.
    ///
    /// Enumerado no registro → diferido para a work queue (o contexto
    /// chamador pode estar acima do lock necessário); senão, síncrono.
    /// O ordinal é fixado no piso de dimming quando não é full-off.
    pub fn request_power_state(self: &Arc<Self>, ordinal: u8) -> GfxResult<PowerChange> {
        if self.is_dead() {
            return Err(GfxError::Unsupported);
        }
        let target = self.clamp_to_floor(ordinal);

        if self.is_enrolled() {
            if let Some(sys) = self.system.upgrade() {
                {
                    let mut ctl = self.ctl.lock();
                    ctl.power.pending = Some(target);
                }
                self.needs_time
                    .store(true, core::sync::atomic::Ordering::Release);
                let fb = Arc::clone(self);
                sys.work().enqueue(ClosureWork::once(move || {
                    let target = {
                        let mut ctl = fb.ctl.lock();
                        ctl.power.pending.take()
                    };
                    if let Some(target) = target {
                        fb.do_power_transition(target);
                    }
                    fb.needs_time
                        .store(false, core::sync::atomic::Ordering::Release);
                }));
                return Ok(PowerChange::Deferred {
                    upto_us: SLEEP_HANDSHAKE_BUDGET_US,
                });
            }
        }
        self.do_power_transition(target);
        Ok(PowerChange::Done)
    }

    fn clamp_to_floor(&self, ordinal: u8) -> DevicePowerState {
        let floor = self.ctl.lock().power.dim_floor;
        let eff = if ordinal > 0 && ordinal < floor {
            floor
        } else {
            ordinal
        };
        DevicePowerState::from_ordinal(eff)
    }

    /// Executa a transição no contexto serializado e propaga aumento pela
    /// cadeia dependente.
    pub(crate) fn do_power_transition(self: &Arc<Self>, target: DevicePowerState) {
        let _g = self.gate.enter();
        let raised = self.transition_one(target);
        if raised {
            // Aumento propaga líder→seguidores, em ordem de cadeia.
            for sib in self.dependent_siblings() {
                if !sib.is_dead() {
                    sib.transition_one(target);
                }
            }
        }
    }

    /// Transição de UM device, sem propagação. Devolve true se subiu.
    /// Chamado com o gate tomado.
    pub(crate) fn transition_one(self: &Arc<Self>, target: DevicePowerState) -> bool {
        let from = {
            let ctl = self.ctl.lock();
            ctl.power.state
        };
        if from == target {
            return false;
        }
        crate::kdebug!("(Power) id=", self.id() as u64);
        crate::kdebug!("(Power) transição para=", target.ordinal() as u64);

        if target < from {
            // --- DESCENDO: notificar antes de tocar hardware ---
            if target == DevicePowerState::Sleep {
                self.deliver_event(FbEvent::WillSleep);
                self.save_vram_for_sleep();
            }
            let status = self
                .chan
                .lock()
                .control(&mut Request::SetPower { state: target });
            if let Err(_e) = status {
                // Não-fatal: o handshake do PM tem timeout próprio; falhar
                // aqui deixaria o device preso no estado antigo.
                crate::kwarn!("(Power) SetPower falhou id=", self.id() as u64);
            }
            self.ctl.lock().power.state = target;
            false
        } else {
            // --- SUBINDO: hardware primeiro, notificar depois ---
            let status = self
                .chan
                .lock()
                .control(&mut Request::SetPower { state: target });
            if let Err(_e) = status {
                crate::kwarn!("(Power) SetPower falhou id=", self.id() as u64);
            }
            self.ctl.lock().power.state = target;
            if target == DevicePowerState::Wake {
                self.restore_vram_after_wake();
                self.deliver_event(FbEvent::DidWake);
                self.post_wake_probe();
            }
            true
        }
    }

    /// Sleep→Wake com connect change acumulado durante o sono: agenda o
    /// probe imediatamente.
    fn post_wake_probe(self: &Arc<Self>) {
        let pending = {
            let ctl = self.ctl.lock();
            self.connect_change
                .load(core::sync::atomic::Ordering::Acquire)
                != ctl.conn.acked_count
        };
        if pending {
            crate::kdebug!("(Power) Probe pós-wake id=", self.id() as u64);
            self.queue_connect_work();
        }
    }
}
