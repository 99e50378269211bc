//! Framebuffer - representação de um output físico
//!
//! Um device por saída física. Estado do plano de controle vive em `CtlState`
//! (tomado só dentro do SystemGate); o que cruza a fronteira de interrupção
//! são atômicos. Links de mirror/cadeia dependente são `Weak` (nunca donos).

use alloc::boxed::Box;
use alloc::sync::{Arc, Weak};
use alloc::vec::Vec;

use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use spin::Mutex;

use super::channel::ControlChannel;
use super::connection::ConnectionPlane;
use super::cursor::CursorCompositor;
use super::gamma::GammaPlane;
use super::modes::ModeCatalog;
use super::params::{ParameterChain, ParameterStore};
use super::power::{DimFloorPolicy, PowerPlane};
use super::vram::VramSnapshot;
use super::GraphicsSubsystem;
use crate::drivers::base::NativeDriver;
use crate::sync::SystemGate;
use crate::sys::error::{GfxError, GfxResult};
use crate::sys::types::*;

// ============================================================================
// EVENTOS / LISTENERS
// ============================================================================

/// Notificações entregues a colaboradores (aceleradores, display server).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FbEvent {
    /// Vai entrar no estado mais baixo. Hardware AINDA vivo quando dispara.
    WillSleep,
    /// Voltou ao estado mais alto. Hardware JÁ vivo quando dispara.
    DidWake,
    /// Conexão mudou; cliente deve re-probe e chamar
    /// `acknowledge_connect_change`. Carrega o contador de mudanças.
    ConnectChange { count: u32 },
}

/// Canal de entrega de notificações registrado por um cliente.
pub trait FbListener: Send + Sync {
    fn framebuffer_event(&self, fb: &Framebuffer, event: FbEvent);
}

/// Papel num par de mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorRole {
    /// Mostra o conteúdo; dono do cursor e do VRAM save.
    Primary,
    /// Repete o primário; suprime cursor próprio e VRAM save.
    Secondary,
}

// ============================================================================
// CONFIG
// ============================================================================

/// Parâmetros de criação de um framebuffer.
pub struct FramebufferConfig {
    pub name: &'static str,
    /// Comprimir o snapshot de VRAM no sleep.
    pub vram_compress: bool,
    /// Política do piso de dimming (default: heurística legada do parâmetro
    /// audio-mute-and-screen-blank).
    pub dim_floor: DimFloorPolicy,
    /// Frames de cursor alocados (animação de busy-cursor etc.).
    pub cursor_frames: u8,
    /// Maior imagem de cursor aceita (largura, altura).
    pub cursor_max_size: (u32, u32),
}

impl Default for FramebufferConfig {
    fn default() -> Self {
        Self {
            name: "fb",
            vram_compress: true,
            dim_floor: super::power::legacy_dim_floor,
            cursor_frames: 4,
            cursor_max_size: (64, 64),
        }
    }
}

// ============================================================================
// ESTADO DO PLANO DE CONTROLE
// ============================================================================

/// Estado mutável tocado apenas no contexto serializado.
pub(crate) struct CtlState {
    pub opened: bool,
    pub open_count: u32,
    pub online: bool,
    pub power: PowerPlane,
    pub conn: ConnectionPlane,
    pub modes: ModeCatalog,
    pub gamma: GammaPlane,
    pub snapshot: Option<VramSnapshot>,
    pub next_dependent: Option<Weak<Framebuffer>>,
    pub mirror: Option<(MirrorRole, Weak<Framebuffer>)>,
    pub listeners: Vec<Arc<dyn FbListener>>,
    pub params: ParameterChain,
}

// ============================================================================
// FRAMEBUFFER
// ============================================================================

pub struct Framebuffer {
    id: usize,
    name: &'static str,
    pub(crate) system: Weak<GraphicsSubsystem>,
    pub(crate) gate: Arc<SystemGate>,
    pub(crate) chan: Mutex<ControlChannel>,
    pub(crate) ctl: Mutex<CtlState>,
    pub(crate) cursor: CursorCompositor,
    pub(crate) vram_compress: bool,

    // --- Fronteira de interrupção (apenas atômicos) ---
    dead: AtomicBool,
    enrolled: AtomicBool,
    pub(crate) connect_change: AtomicU32,
    pub(crate) probe_pending: AtomicBool,
    pub(crate) needs_time: AtomicBool,
    pub(crate) vbl_last_us: AtomicU64,
    pub(crate) vbl_delta_us: AtomicU64,
    pub(crate) clut_work_pending: AtomicBool,
    pub(crate) has_staged: AtomicBool,
}

impl Framebuffer {
    pub(crate) fn new(
        id: usize,
        system: Weak<GraphicsSubsystem>,
        driver: Box<dyn NativeDriver>,
        config: FramebufferConfig,
    ) -> GfxResult<Arc<Self>> {
        let gate = match system.upgrade() {
            Some(sys) => Arc::clone(sys.gate()),
            None => Arc::new(SystemGate::new()),
        };
        let slots = driver.programmable_slots();
        let fb = Arc::new(Self {
            id,
            name: config.name,
            system,
            gate: Arc::clone(&gate),
            chan: Mutex::new(ControlChannel::new(driver, gate)),
            ctl: Mutex::new(CtlState {
                opened: false,
                open_count: 0,
                online: true,
                power: PowerPlane::new(config.dim_floor),
                conn: ConnectionPlane::new(),
                modes: ModeCatalog::new(slots),
                gamma: GammaPlane::new(),
                snapshot: None,
                next_dependent: None,
                mirror: None,
                listeners: Vec::new(),
                params: ParameterChain::new(),
            }),
            cursor: CursorCompositor::new(config.cursor_frames, config.cursor_max_size),
            vram_compress: config.vram_compress,
            dead: AtomicBool::new(false),
            enrolled: AtomicBool::new(false),
            connect_change: AtomicU32::new(0),
            probe_pending: AtomicBool::new(false),
            needs_time: AtomicBool::new(false),
            vbl_last_us: AtomicU64::new(0),
            vbl_delta_us: AtomicU64::new(0),
            clut_work_pending: AtomicBool::new(false),
            has_staged: AtomicBool::new(false),
        });
        Ok(fb)
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    // ------------------------------------------------------------------
    // LIFECYCLE
    // ------------------------------------------------------------------

    /// Abre a conexão de um cliente (display server).
    ///
    /// Primeiro open: handshake do native driver, device para Wake, lê
    /// estado de conexão. Aberturas seguintes só contam referência.
    pub fn open(self: &Arc<Self>) -> GfxResult<()> {
        if self.is_dead() {
            return Err(GfxError::Unsupported);
        }
        let first = {
            let _g = self.gate.enter();
            let mut ctl = self.ctl.lock();
            let first = ctl.open_count == 0;
            if first {
                // Handshake antes do incremento: em falha o refcount fica 0
                // e o retry refaz o handshake.
                self.chan.lock().open()?;
                ctl.opened = true;
            }
            ctl.open_count += 1;
            first
        };
        if first {
            self.refresh_power_floor();
            self.do_power_transition(DevicePowerState::Wake);
            let _g = self.gate.enter();
            let mut ctl = self.ctl.lock();
            let mut chan = self.chan.lock();
            ctl.online = super::connection::query_online(&mut chan).unwrap_or(true);
            let _ = ctl.conn.refresh(&mut chan);
        }
        Ok(())
    }

    /// Fecha a conexão de um cliente. Último close derruba para Doze.
    pub fn close(self: &Arc<Self>) {
        let last = {
            let _g = self.gate.enter();
            let mut ctl = self.ctl.lock();
            if ctl.open_count == 0 {
                return;
            }
            ctl.open_count -= 1;
            ctl.open_count == 0
        };
        if last && !self.is_dead() {
            self.do_power_transition(DevicePowerState::Doze);
        }
    }

    /// O native driver completou o open?
    pub fn is_opened(&self) -> bool {
        self.ctl.lock().opened
    }

    // ------------------------------------------------------------------
    // DEAD LATCH
    // ------------------------------------------------------------------

    /// Marca o device como morto (runaway/terminado). A partir daqui toda
    /// operação curto-circuita para `Unsupported` sem tocar hardware.
    pub fn mark_dead(&self) {
        if !self.dead.swap(true, Ordering::AcqRel) {
            crate::kerror!("(FB) Device morto id=", self.id as u64);
            let _g = self.gate.enter();
            self.chan.lock().close();
        }
    }

    pub fn is_dead(&self) -> bool {
        self.dead.load(Ordering::Acquire)
    }

    pub(crate) fn mark_enrolled(&self) {
        self.enrolled.store(true, Ordering::Release);
    }

    /// Enumerado no registro global? (define transição síncrona vs diferida)
    pub fn is_enrolled(&self) -> bool {
        self.enrolled.load(Ordering::Acquire)
    }

    // ------------------------------------------------------------------
    // STATUS
    // ------------------------------------------------------------------

    pub fn is_online(&self) -> bool {
        self.ctl.lock().online
    }

    pub fn is_builtin(&self) -> bool {
        let ctl = self.ctl.lock();
        ctl.conn
            .cached_info()
            .map(|i| i.flags.contains(ConnectionFlags::BUILT_IN))
            .unwrap_or(false)
    }

    /// Vote agregado na barreira de sleep do sistema.
    pub fn needs_more_time(&self) -> bool {
        self.needs_time.load(Ordering::Acquire)
    }

    // ------------------------------------------------------------------
    // LISTENERS
    // ------------------------------------------------------------------

    /// Registra um canal de notificação.
    pub fn add_listener(&self, listener: Arc<dyn FbListener>) {
        self.ctl.lock().listeners.push(listener);
    }

    /// Entrega `event` a todos os listeners, SEM segurar o lock de estado
    /// (listener pode chamar de volta no device).
    pub(crate) fn deliver_event(&self, event: FbEvent) {
        let listeners: Vec<Arc<dyn FbListener>> = self.ctl.lock().listeners.clone();
        for l in listeners.iter() {
            l.framebuffer_event(self, event);
        }
    }

    // ------------------------------------------------------------------
    // MIRROR / CADEIA DEPENDENTE
    // ------------------------------------------------------------------

    pub(crate) fn set_next_dependent(&self, next: Weak<Framebuffer>) {
        self.ctl.lock().next_dependent = Some(next);
    }

    pub(crate) fn next_dependent(&self) -> Option<Arc<Framebuffer>> {
        self.ctl.lock().next_dependent.as_ref()?.upgrade()
    }

    /// Siblings da cadeia circular, excluindo o próprio device.
    pub(crate) fn dependent_siblings(self: &Arc<Self>) -> Vec<Arc<Framebuffer>> {
        let mut out = Vec::new();
        let mut cur = match self.next_dependent() {
            Some(n) => n,
            None => return out,
        };
        while !Arc::ptr_eq(&cur, self) {
            out.push(Arc::clone(&cur));
            cur = match cur.next_dependent() {
                Some(n) => n,
                None => break, // cadeia quebrada
            };
        }
        out
    }

    pub(crate) fn set_mirror_link(&self, role: MirrorRole, partner: Weak<Framebuffer>) {
        self.ctl.lock().mirror = Some((role, partner));
    }

    pub(crate) fn clear_mirror_link(&self) {
        self.ctl.lock().mirror = None;
    }

    pub fn mirror_role(&self) -> Option<MirrorRole> {
        self.ctl.lock().mirror.as_ref().map(|(r, _)| *r)
    }

    pub fn mirror_partner(&self) -> Option<Arc<Framebuffer>> {
        self.ctl.lock().mirror.as_ref()?.1.upgrade()
    }

    /// Secundário de um par de mirror? (suprime cursor e VRAM save)
    pub fn is_mirror_secondary(&self) -> bool {
        self.mirror_role() == Some(MirrorRole::Secondary)
    }

    // ------------------------------------------------------------------
    // PARÂMETROS DE DISPLAY
    // ------------------------------------------------------------------

    /// Store de parâmetros (brightness, contrast, ...).
    pub fn parameter_store(&self) -> Arc<ParameterStore> {
        self.ctl.lock().params.store()
    }

    /// Acrescenta um handler no fim da cadeia.
    pub fn add_parameter_handler(
        &self,
        handler: Arc<dyn super::params::ParameterHandler>,
    ) {
        self.ctl.lock().params.push(handler);
    }

    /// Seta um parâmetro inteiro: percorre a cadeia até alguém aceitar.
    /// `NotReady` enquanto o device está suspenso por connect-change.
    pub fn set_parameter(&self, key: &str, value: i64) -> GfxResult<()> {
        if self.is_dead() {
            return Err(GfxError::Unsupported);
        }
        let _g = self.gate.enter();
        let chain = {
            let ctl = self.ctl.lock();
            if ctl.conn.suspended {
                return Err(GfxError::NotReady);
            }
            ctl.params.clone_handlers()
        };
        for h in chain.iter() {
            if h.integer_set(key, value) {
                return Ok(());
            }
        }
        Err(GfxError::Unsupported)
    }

    /// Broadcast de update: todos os handlers, em ordem de registro.
    pub fn broadcast_parameter_update(&self) {
        let chain = self.ctl.lock().params.clone_handlers();
        for h in chain.iter() {
            h.update();
        }
    }

    /// Recalcula o piso de dimming a partir do store de parâmetros.
    pub fn refresh_power_floor(&self) {
        let store = self.parameter_store();
        let mut ctl = self.ctl.lock();
        let floor = (ctl.power.dim_policy)(&store);
        ctl.power.dim_floor = floor;
    }

    // ------------------------------------------------------------------
    // VBL BOOKKEEPING (exposto a clientes)
    // ------------------------------------------------------------------

    /// Timestamp do último vertical blank (µs).
    pub fn vbl_time_us(&self) -> u64 {
        self.vbl_last_us.load(Ordering::Acquire)
    }

    /// Delta entre os dois últimos VBLs (µs).
    pub fn vbl_delta_us(&self) -> u64 {
        self.vbl_delta_us.load(Ordering::Acquire)
    }
}
