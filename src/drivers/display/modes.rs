//! Arquivo: drivers/display/modes.rs
//!
//! Propósito: Catálogo de modos de display. Enumera, valida e mapeia IDs
//! abstratos para descritores de timing/pixel concretos.
//!
//! Detalhes de Implementação:
//! - Modos concretos (ID < base reservada): scan linear pelo iterador
//!   NextResolution do driver, com cache de uma entrada.
//! - Modos sintéticos (ID >= base): tabela ordenada de detailed timings do
//!   cliente, materializada em slots programáveis do hardware. Um "seed"
//!   monotônico invalida validações cacheadas quando a tabela troca.
//! - Reciclagem de slot nunca despeja o slot do modo ativo nem o slot de
//!   boot ainda em uso.
//! - Profundidades: índice denso 0..max ↔ depth mode bruto, por resolução,
//!   com clamp de pedidos fora da faixa.

use alloc::vec::Vec;

use super::channel::ControlChannel;
use super::device::Framebuffer;
use crate::drivers::base::{Query, Request};
use crate::sys::error::{GfxError, GfxResult};
use crate::sys::types::*;

/// Slot de timing programável do hardware.
#[derive(Debug, Clone, Copy)]
struct SlotState {
    mode: Option<DisplayModeId>,
    seed: u32,
}

/// Estado do catálogo (plano de controle).
pub(crate) struct ModeCatalog {
    /// Cache de uma entrada do scan: (predecessor, spec resolvida).
    scan_cache: Option<(DisplayModeId, ResolutionSpec)>,
    /// Tabela ordenada de detailed timings (modos sintéticos).
    detailed: Vec<DetailedTiming>,
    /// Seed monotônico; muda quando a tabela é substituída.
    seed: u32,
    slots: Vec<SlotState>,
    /// Modo/profundidade correntes.
    pub current: CurrentModeInfo,
    /// Mapa denso↔bruto da resolução corrente: (modo, depth modes usáveis).
    depth_map: Option<(DisplayModeId, Vec<DepthMode>)>,
}

impl ModeCatalog {
    pub fn new(num_slots: usize) -> Self {
        Self {
            scan_cache: None,
            detailed: Vec::new(),
            seed: 0,
            slots: alloc::vec![SlotState { mode: None, seed: 0 }; num_slots],
            current: CurrentModeInfo::default(),
            depth_map: None,
        }
    }

    /// Limpa caches transientes (connect-change). Slots e seed ficam.
    pub fn invalidate_caches(&mut self) {
        self.scan_cache = None;
        self.depth_map = None;
    }

    /// Marca o modo corrente como o sintético offline.
    pub fn force_offline_mode(&mut self) {
        self.current = CurrentModeInfo {
            mode: OFFLINE_MODE,
            depth_mode: DepthMode::Depth1,
        };
        self.depth_map = None;
    }

    /// Relê o modo corrente do driver (pós-ack de connect-change).
    pub fn revalidate_current(&mut self, chan: &mut ControlChannel) {
        let mut info = CurrentModeInfo::default();
        if chan.status(&mut Query::CurrentMode(&mut info)).is_ok() {
            self.current = info;
            self.depth_map = None;
        }
    }

    // ------------------------------------------------------------------
    // SCAN DE MODOS CONCRETOS
    // ------------------------------------------------------------------

    /// Próxima entrada do iterador do driver.
    fn next_resolution(
        chan: &mut ControlChannel,
        previous: DisplayModeId,
    ) -> GfxResult<ResolutionSpec> {
        let mut out = ResolutionSpec::default();
        chan.status(&mut Query::NextResolution {
            previous,
            out: &mut out,
        })?;
        Ok(out)
    }

    /// Resolve um modo concreto, com cache de uma entrada.
    ///
    /// O scan continua do ponto cacheado; só reinicia do começo se a
    /// caminhada a partir do predecessor cacheado falhar.
    fn resolve_concrete(
        &mut self,
        chan: &mut ControlChannel,
        id: DisplayModeId,
    ) -> GfxResult<ResolutionSpec> {
        if let Some((_, spec)) = self.scan_cache {
            if spec.mode == id {
                return Ok(spec);
            }
        }
        // Continuar do cache, se houver.
        let start = self
            .scan_cache
            .map(|(_, spec)| spec.mode)
            .unwrap_or(NO_MORE_MODES);
        if let Some(spec) = self.scan_from(chan, start, id)? {
            return Ok(spec);
        }
        if start != NO_MORE_MODES {
            // Caminhada do predecessor falhou: reiniciar do começo.
            if let Some(spec) = self.scan_from(chan, NO_MORE_MODES, id)? {
                return Ok(spec);
            }
        }
        Err(GfxError::Unsupported)
    }

    fn scan_from(
        &mut self,
        chan: &mut ControlChannel,
        mut prev: DisplayModeId,
        target: DisplayModeId,
    ) -> GfxResult<Option<ResolutionSpec>> {
        loop {
            let spec = Self::next_resolution(chan, prev)?;
            if spec.mode == NO_MORE_MODES {
                return Ok(None);
            }
            if spec.mode == target {
                self.scan_cache = Some((prev, spec));
                return Ok(Some(spec));
            }
            prev = spec.mode;
        }
    }

    /// Todos os modos concretos do driver.
    fn enumerate_concrete(
        &mut self,
        chan: &mut ControlChannel,
    ) -> GfxResult<Vec<ResolutionSpec>> {
        let mut out = Vec::new();
        let mut prev = NO_MORE_MODES;
        loop {
            let spec = Self::next_resolution(chan, prev)?;
            if spec.mode == NO_MORE_MODES {
                break;
            }
            out.push(spec);
            prev = spec.mode;
        }
        Ok(out)
    }

    // ------------------------------------------------------------------
    // MODOS SINTÉTICOS
    // ------------------------------------------------------------------

    /// Substitui a tabela de detailed timings. Invalida TODAS as validações
    /// cacheadas de uma vez (seed novo).
    pub fn set_detailed_timings(&mut self, table: Vec<DetailedTiming>) -> GfxResult<Vec<DisplayModeId>> {
        if table.len() > 256 {
            return Err(GfxError::BadArgument);
        }
        self.detailed = table;
        self.seed = self.seed.wrapping_add(1);
        Ok((0..self.detailed.len()).map(DisplayModeId::synthetic).collect())
    }

    /// Valida um modo sintético: acha/recicla um slot programável, escreve o
    /// timing e marca com o seed. Revalidação sem troca de tabela = no-op
    /// (ZERO chamadas ao driver).
    fn validate_synthetic(
        &mut self,
        chan: &mut ControlChannel,
        id: DisplayModeId,
    ) -> GfxResult<DetailedTiming> {
        let index = id.arb_index();
        let timing = *self.detailed.get(index).ok_or(GfxError::BadArgument)?;

        // Já materializado com o seed atual?
        if self
            .slots
            .iter()
            .any(|s| s.mode == Some(id) && s.seed == self.seed)
        {
            return Ok(timing);
        }

        let victim = self.pick_slot(id)?;
        chan.control(&mut Request::SetDetailedTiming {
            slot: victim as u8,
            timing: &timing,
        })?;
        self.slots[victim] = SlotState {
            mode: Some(id),
            seed: self.seed,
        };
        Ok(timing)
    }

    /// Escolhe o slot a reciclar. Nunca o slot aliasado ao modo ativo, nem
    /// o slot de boot enquanto o boot mode está em uso.
    fn pick_slot(&self, id: DisplayModeId) -> GfxResult<usize> {
        if self.slots.is_empty() {
            return Err(GfxError::Unsupported);
        }
        let boot_in_use = self.current.mode == BOOT_PROGRAMMABLE_MODE;
        let active = self.current.mode;

        // Reusar o slot que já segura este ID (seed velho).
        if let Some(i) = self.slots.iter().position(|s| s.mode == Some(id)) {
            return Ok(i);
        }
        // Slot livre.
        if let Some(i) = self.slots.iter().enumerate().position(|(i, s)| {
            s.mode.is_none() && !(boot_in_use && i == 0)
        }) {
            return Ok(i);
        }
        // Reciclar o primeiro que não está em uso pelo modo ativo/boot.
        self.slots
            .iter()
            .enumerate()
            .position(|(i, s)| s.mode != Some(active) && !(boot_in_use && i == 0))
            .ok_or(GfxError::Busy)
    }

    // ------------------------------------------------------------------
    // PROFUNDIDADES
    // ------------------------------------------------------------------

    /// Garante o mapa denso↔bruto da resolução dada (cacheado).
    fn ensure_depth_map(
        &mut self,
        chan: &mut ControlChannel,
        mode: DisplayModeId,
    ) -> GfxResult<&Vec<DepthMode>> {
        let stale = match &self.depth_map {
            Some((m, _)) if *m == mode => false,
            _ => true,
        };
        if stale {
            let mut usable = Vec::new();
            for dm in DepthMode::ALL {
                let mut info = PixelInfo {
                    bytes_per_row: 0,
                    bytes_per_plane: 0,
                    bits_per_pixel: 0,
                    component_count: 0,
                    bits_per_component: 0,
                    format: PixelFormat::Clut8,
                };
                if chan
                    .status(&mut Query::VideoParams {
                        mode,
                        depth_mode: dm,
                        out: &mut info,
                    })
                    .is_ok()
                {
                    usable.push(dm);
                }
            }
            if usable.is_empty() {
                return Err(GfxError::Unsupported);
            }
            self.depth_map = Some((mode, usable));
        }
        match &self.depth_map {
            Some((_, v)) => Ok(v),
            None => Err(GfxError::Unsupported),
        }
    }

    fn info_flags_synthetic() -> ModeFlags {
        ModeFlags::VALID | ModeFlags::SAFE | ModeFlags::NOT_PRESET
    }
}

// ============================================================================
// API PÚBLICA (Framebuffer)
// ============================================================================

impl Framebuffer {
    /// Enumera todos os IDs visíveis: concretos do driver + sintéticos da
    /// tabela. O modo offline é interno (NEVER_SHOW) e não aparece aqui.
    pub fn display_modes(&self) -> GfxResult<Vec<DisplayModeId>> {
        if self.is_dead() {
            return Err(GfxError::Unsupported);
        }
        let _g = self.gate.enter();
        let mut ctl = self.ctl.lock();
        let mut chan = self.chan.lock();
        let mut ids: Vec<DisplayModeId> = ctl
            .modes
            .enumerate_concrete(&mut chan)?
            .iter()
            .map(|s| s.mode)
            .collect();
        ids.extend((0..ctl.modes.detailed.len()).map(DisplayModeId::synthetic));
        Ok(ids)
    }

    /// Registro de modo para clientes.
    pub fn mode_info(&self, id: DisplayModeId) -> GfxResult<DisplayModeInfo> {
        if self.is_dead() {
            return Err(GfxError::Unsupported);
        }
        let _g = self.gate.enter();
        let mut ctl = self.ctl.lock();
        let mut chan = self.chan.lock();

        if id == OFFLINE_MODE {
            return Ok(DisplayModeInfo {
                nominal_width: 0,
                nominal_height: 0,
                refresh_rate: Fixed16_16::ZERO,
                max_depth_index: 0,
                flags: ModeFlags::VALID | ModeFlags::NEVER_SHOW,
            });
        }

        if id.is_synthetic() && id != BOOT_PROGRAMMABLE_MODE {
            let timing = *ctl
                .modes
                .detailed
                .get(id.arb_index())
                .ok_or(GfxError::Unsupported)?;
            let max_depth = ctl
                .modes
                .ensure_depth_map(&mut chan, id)
                .map(|v| (v.len() - 1) as u8)
                .unwrap_or(0);
            return Ok(DisplayModeInfo {
                nominal_width: timing.horizontal_active,
                nominal_height: timing.vertical_active,
                refresh_rate: timing.refresh_rate(),
                max_depth_index: max_depth,
                flags: ModeCatalog::info_flags_synthetic(),
            });
        }

        if id == BOOT_PROGRAMMABLE_MODE {
            let mut timing = default_timing();
            chan.status(&mut Query::ModeTiming {
                mode: id,
                out: &mut timing,
            })?;
            return Ok(DisplayModeInfo {
                nominal_width: timing.horizontal_active,
                nominal_height: timing.vertical_active,
                refresh_rate: timing.refresh_rate(),
                max_depth_index: 0,
                flags: ModeFlags::VALID | ModeFlags::NOT_PRESET,
            });
        }

        let spec = ctl.modes.resolve_concrete(&mut chan, id)?;
        let max_depth = ctl
            .modes
            .ensure_depth_map(&mut chan, id)
            .map(|v| (v.len() - 1) as u8)
            .unwrap_or(0);
        Ok(DisplayModeInfo {
            nominal_width: spec.width,
            nominal_height: spec.height,
            refresh_rate: spec.refresh_rate,
            max_depth_index: max_depth,
            flags: ModeFlags::VALID | ModeFlags::SAFE,
        })
    }

    /// Valida um modo e devolve o timing resolvido.
    pub fn validate_mode(&self, id: DisplayModeId) -> GfxResult<DetailedTiming> {
        if self.is_dead() {
            return Err(GfxError::Unsupported);
        }
        let _g = self.gate.enter();
        let mut ctl = self.ctl.lock();
        let mut chan = self.chan.lock();

        if id.is_synthetic() && id != BOOT_PROGRAMMABLE_MODE && id != OFFLINE_MODE {
            return ctl.modes.validate_synthetic(&mut chan, id);
        }
        let mut timing = default_timing();
        chan.status(&mut Query::ModeTiming {
            mode: id,
            out: &mut timing,
        })
        .map_err(|_| GfxError::BadArgument)?;
        Ok(timing)
    }

    /// Substitui a tabela de detailed timings; devolve os IDs sintéticos.
    pub fn set_detailed_timings(
        &self,
        table: Vec<DetailedTiming>,
    ) -> GfxResult<Vec<DisplayModeId>> {
        if self.is_dead() {
            return Err(GfxError::Unsupported);
        }
        let _g = self.gate.enter();
        self.ctl.lock().modes.set_detailed_timings(table)
    }

    /// Programa modo + profundidade (índice denso).
    pub fn set_display_mode(&self, id: DisplayModeId, depth_index: u8) -> GfxResult<()> {
        if self.is_dead() {
            return Err(GfxError::Unsupported);
        }
        let _g = self.gate.enter();
        let mut ctl = self.ctl.lock();
        if ctl.conn.suspended {
            return Err(GfxError::NotReady);
        }
        let mut chan = self.chan.lock();

        if id.is_synthetic() && id != BOOT_PROGRAMMABLE_MODE {
            if id == OFFLINE_MODE {
                return Err(GfxError::BadArgument);
            }
            ctl.modes.validate_synthetic(&mut chan, id)?;
        }

        let depth_mode = {
            let map = ctl.modes.ensure_depth_map(&mut chan, id)?;
            // Clamp para a entrada válida mais próxima.
            let idx = (depth_index as usize).min(map.len() - 1);
            map[idx]
        };

        chan.control(&mut Request::SetMode {
            mode: id,
            depth_mode,
        })?;
        ctl.modes.current = CurrentModeInfo {
            mode: id,
            depth_mode,
        };
        // Profundidades mudam com a resolução.
        ctl.modes.depth_map = None;
        drop(chan);
        drop(ctl);
        self.refresh_cursor_geometry();
        Ok(())
    }

    /// Modo corrente: (id, índice denso de profundidade).
    ///
    /// Device offline devolve o modo sintético offline, NÃO um erro.
    pub fn current_display_mode(&self) -> GfxResult<(DisplayModeId, u8)> {
        if self.is_dead() {
            return Err(GfxError::Unsupported);
        }
        let _g = self.gate.enter();
        let mut ctl = self.ctl.lock();
        if !ctl.online {
            return Ok((OFFLINE_MODE, 0));
        }
        if ctl.modes.current.mode == NO_MORE_MODES {
            let mut chan = self.chan.lock();
            ctl.modes.revalidate_current(&mut chan);
        }
        let cur = ctl.modes.current;
        if cur.mode == NO_MORE_MODES {
            return Err(GfxError::NotReady);
        }
        let mut chan = self.chan.lock();
        let index = ctl
            .modes
            .ensure_depth_map(&mut chan, cur.mode)
            .map(|map| {
                map.iter()
                    .position(|dm| *dm == cur.depth_mode)
                    .unwrap_or(0) as u8
            })
            .unwrap_or(0);
        Ok((cur.mode, index))
    }

    /// Layout de pixel de modo+profundidade (índice denso, com clamp).
    pub fn pixel_info(&self, id: DisplayModeId, depth_index: u8) -> GfxResult<PixelInfo> {
        if self.is_dead() {
            return Err(GfxError::Unsupported);
        }
        let _g = self.gate.enter();
        let mut ctl = self.ctl.lock();
        let mut chan = self.chan.lock();
        let depth_mode = {
            let map = ctl.modes.ensure_depth_map(&mut chan, id)?;
            let idx = (depth_index as usize).min(map.len() - 1);
            map[idx]
        };
        let mut info = PixelInfo {
            bytes_per_row: 0,
            bytes_per_plane: 0,
            bits_per_pixel: 0,
            component_count: 0,
            bits_per_component: 0,
            format: PixelFormat::Clut8,
        };
        chan.status(&mut Query::VideoParams {
            mode: id,
            depth_mode,
            out: &mut info,
        })?;
        Ok(info)
    }
}

fn default_timing() -> DetailedTiming {
    DetailedTiming {
        pixel_clock: 0,
        horizontal_active: 0,
        horizontal_blanking: 0,
        horizontal_sync_offset: 0,
        horizontal_sync_width: 0,
        horizontal_border: 0,
        vertical_active: 0,
        vertical_blanking: 0,
        vertical_sync_offset: 0,
        vertical_sync_width: 0,
        vertical_border: 0,
        signal: SignalConfig::empty(),
        scaler: None,
    }
}
