//! Trait base para native drivers de display
//!
//! O módulo vendor é uma caixa preta: dois verbos, Control e Status, cada um
//! dispatchado por código. Toda operação de modo, timing, CLUT, gamma,
//! cursor, conexão e power é um código específico contra este par. O canal
//! em si é agnóstico ao codec (drivers/display/channel.rs).

use crate::sys::error::GfxResult;
use crate::sys::types::*;

/// Códigos do verbo Control (mutações).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ControlCode {
    SetMode,
    SetClut,
    SetGamma,
    SetCursorImage,
    DrawCursor,
    SetPower,
    SetDetailedTiming,
    ProbeConnection,
}

/// Códigos do verbo Status (consultas).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StatusCode {
    CurrentMode,
    NextResolution,
    VideoParams,
    Connection,
    ModeTiming,
    HardwareCursorCaps,
    VramLossRisk,
}

/// Parâmetros de uma chamada Control.
pub enum Request<'a> {
    /// Programa modo + profundidade.
    SetMode {
        mode: DisplayModeId,
        depth_mode: DepthMode,
    },
    /// Escreve entradas de CLUT.
    SetClut {
        start: u16,
        options: ClutOptions,
        colors: &'a [ColorEntry],
    },
    /// Aplica tabela de gamma.
    SetGamma { table: &'a GammaTable },
    /// Sobe imagem de cursor convertida para o frame dado.
    SetCursorImage {
        frame: u8,
        image: &'a HardwareCursorImage,
    },
    /// Move/mostra/esconde o cursor de hardware.
    DrawCursor {
        x: i32,
        y: i32,
        frame: u8,
        visible: bool,
    },
    /// Transição de power do device.
    SetPower { state: DevicePowerState },
    /// Escreve um detailed timing num slot programável.
    SetDetailedTiming {
        slot: u8,
        timing: &'a DetailedTiming,
    },
    /// Re-sense da conexão (apenas se PROBE_CAPABLE).
    ProbeConnection,
}

impl Request<'_> {
    /// Código para logging/contagem.
    pub fn code(&self) -> ControlCode {
        match self {
            Request::SetMode { .. } => ControlCode::SetMode,
            Request::SetClut { .. } => ControlCode::SetClut,
            Request::SetGamma { .. } => ControlCode::SetGamma,
            Request::SetCursorImage { .. } => ControlCode::SetCursorImage,
            Request::DrawCursor { .. } => ControlCode::DrawCursor,
            Request::SetPower { .. } => ControlCode::SetPower,
            Request::SetDetailedTiming { .. } => ControlCode::SetDetailedTiming,
            Request::ProbeConnection => ControlCode::ProbeConnection,
        }
    }
}

/// Parâmetros de uma chamada Status (out-params preenchidos pelo driver).
pub enum Query<'a> {
    /// Modo/profundidade correntes.
    CurrentMode(&'a mut CurrentModeInfo),
    /// Iterador de resoluções: entrada seguinte a `previous`
    /// (`NO_MORE_MODES` como previous = começo; devolve `NO_MORE_MODES`
    /// em `out.mode` no fim).
    NextResolution {
        previous: DisplayModeId,
        out: &'a mut ResolutionSpec,
    },
    /// Layout de pixel de um depth mode na resolução corrente do modo dado.
    VideoParams {
        mode: DisplayModeId,
        depth_mode: DepthMode,
        out: &'a mut PixelInfo,
    },
    /// Status da conexão física.
    Connection(&'a mut ConnectionInfo),
    /// Timing detalhado de um modo concreto.
    ModeTiming {
        mode: DisplayModeId,
        out: &'a mut DetailedTiming,
    },
    /// Capacidades do cursor de hardware.
    HardwareCursorCaps(&'a mut HardwareCursorDescriptor),
    /// O hardware perde VRAM em Sleep?
    VramLossRisk(&'a mut bool),
}

impl Query<'_> {
    /// Código para logging/contagem.
    pub fn code(&self) -> StatusCode {
        match self {
            Query::CurrentMode(_) => StatusCode::CurrentMode,
            Query::NextResolution { .. } => StatusCode::NextResolution,
            Query::VideoParams { .. } => StatusCode::VideoParams,
            Query::Connection(_) => StatusCode::Connection,
            Query::ModeTiming { .. } => StatusCode::ModeTiming,
            Query::HardwareCursorCaps(_) => StatusCode::HardwareCursorCaps,
            Query::VramLossRisk(_) => StatusCode::VramLossRisk,
        }
    }
}

/// Trait que todo native driver deve implementar
pub trait NativeDriver: Send {
    /// Nome do driver
    fn name(&self) -> &'static str;

    /// Handshake de abertura. Nenhum Control/Status antes disso.
    fn open(&mut self) -> GfxResult<()>;

    /// Fecha o driver (device morto ou subsistema em shutdown).
    fn close(&mut self);

    /// Verbo Control: mutação dispatchada por código.
    fn control(&mut self, req: &mut Request) -> GfxResult<()>;

    /// Verbo Status: consulta dispatchada por código.
    fn status(&mut self, query: &mut Query) -> GfxResult<()>;

    /// Quantos slots de timing programáveis o hardware tem.
    fn programmable_slots(&self) -> usize {
        0
    }

    /// Aperture de VRAM mapeada (stride em bytes, altura em linhas).
    /// `None` = sem acesso linear (sem cursor de software nem VRAM save).
    fn vram(&mut self) -> Option<(&mut [u8], usize, usize)> {
        None
    }
}
