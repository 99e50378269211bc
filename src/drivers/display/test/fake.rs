//! Native driver falso para os testes do subsistema
//!
//! Grava um trace textual de tudo que o subsistema manda para o hardware;
//! os testes de ordenação (WillSleep antes do SetPower, etc.) comparam
//! posições no trace. O estado de conexão é compartilhado para os testes
//! simularem hot-plug.

use alloc::format;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use core::sync::atomic::{AtomicBool, Ordering};

use spin::Mutex;

use crate::drivers::base::{NativeDriver, Query, Request};
use crate::sys::error::{GfxError, GfxResult};
use crate::sys::types::*;

/// Estado compartilhado entre o driver falso e o teste.
pub struct FakeShared {
    trace: Mutex<Vec<String>>,
    pub conn: Mutex<ConnectionInfo>,
    pub fail_cursor_upload: AtomicBool,
    /// Faz o PRÓXIMO open() do driver falhar (limpa sozinho).
    pub fail_open: AtomicBool,
}

impl FakeShared {
    pub fn push(&self, entry: String) {
        self.trace.lock().push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.trace.lock().clone()
    }

    pub fn clear(&self) {
        self.trace.lock().clear();
    }

    /// Quantas entradas contêm `needle`.
    pub fn count(&self, needle: &str) -> usize {
        self.trace
            .lock()
            .iter()
            .filter(|e| e.contains(needle))
            .count()
    }

    /// Posição da primeira entrada contendo `needle`.
    pub fn index_of(&self, needle: &str) -> Option<usize> {
        self.trace.lock().iter().position(|e| e.contains(needle))
    }
}

pub struct FakeDriver {
    tag: &'static str,
    shared: Arc<FakeShared>,
    opened: bool,
    current: CurrentModeInfo,
    modes: Vec<ResolutionSpec>,
    slots: usize,
    vram_loss: bool,
    vram: Vec<u8>,
    stride: usize,
    height: usize,
}

const FAKE_W: u32 = 64;
const FAKE_H: u32 = 32;

impl FakeDriver {
    pub fn new(tag: &'static str) -> (Self, Arc<FakeShared>) {
        let shared = Arc::new(FakeShared {
            trace: Mutex::new(Vec::new()),
            conn: Mutex::new(ConnectionInfo {
                online: true,
                flags: ConnectionFlags::EXTERNAL | ConnectionFlags::PROBE_CAPABLE,
                sense_code: 0,
            }),
            fail_cursor_upload: AtomicBool::new(false),
            fail_open: AtomicBool::new(false),
        });
        let stride = (FAKE_W * 4) as usize;
        let height = FAKE_H as usize;
        let driver = Self {
            tag,
            shared: Arc::clone(&shared),
            opened: false,
            current: CurrentModeInfo {
                mode: DisplayModeId(1),
                depth_mode: DepthMode::Depth3,
            },
            modes: alloc::vec![
                ResolutionSpec {
                    mode: DisplayModeId(1),
                    width: 1024,
                    height: 768,
                    refresh_rate: Fixed16_16::from_int(60),
                    max_depth_mode: DepthMode::Depth3,
                },
                ResolutionSpec {
                    mode: DisplayModeId(2),
                    width: 800,
                    height: 600,
                    refresh_rate: Fixed16_16::from_int(75),
                    max_depth_mode: DepthMode::Depth3,
                },
            ],
            slots: 2,
            vram_loss: false,
            // Padrão reconhecível para os testes de save/restore.
            vram: (0..stride * height).map(|i| (i * 7 % 251) as u8).collect(),
            stride,
            height,
        };
        (driver, shared)
    }

    pub fn with_vram_loss(mut self) -> Self {
        self.vram_loss = true;
        self
    }

    fn vram_sum(&self) -> u64 {
        self.vram.iter().map(|b| *b as u64).sum()
    }

    fn timing_for(&self, width: u32, height: u32) -> DetailedTiming {
        DetailedTiming {
            pixel_clock: 65_000_000,
            horizontal_active: width,
            horizontal_blanking: 320,
            horizontal_sync_offset: 24,
            horizontal_sync_width: 136,
            horizontal_border: 0,
            vertical_active: height,
            vertical_blanking: 38,
            vertical_sync_offset: 3,
            vertical_sync_width: 6,
            vertical_border: 0,
            signal: SignalConfig::empty(),
            scaler: None,
        }
    }
}

impl NativeDriver for FakeDriver {
    fn name(&self) -> &'static str {
        self.tag
    }

    fn open(&mut self) -> GfxResult<()> {
        if self.shared.fail_open.swap(false, Ordering::AcqRel) {
            return Err(GfxError::NotReady);
        }
        self.opened = true;
        Ok(())
    }

    fn close(&mut self) {
        self.opened = false;
    }

    fn control(&mut self, req: &mut Request) -> GfxResult<()> {
        match req {
            Request::SetPower { state } => {
                self.shared
                    .push(format!("{} power {}", self.tag, state.ordinal()));
                if *state == DevicePowerState::Sleep && self.vram_loss {
                    // Hardware que corta power da VRAM: conteúdo vira lixo.
                    for b in self.vram.iter_mut() {
                        *b = 0xaa;
                    }
                }
            }
            Request::SetGamma { table } => {
                self.shared
                    .push(format!("{} gamma {}", self.tag, table.data[0]));
                let sum = self.vram_sum();
                self.shared.push(format!("{} vramsum {}", self.tag, sum));
            }
            Request::SetClut { start, .. } => {
                self.shared.push(format!("{} clut {}", self.tag, start));
            }
            Request::SetMode { mode, depth_mode } => {
                self.shared
                    .push(format!("{} ctl SetMode {}", self.tag, mode.0));
                self.current = CurrentModeInfo {
                    mode: *mode,
                    depth_mode: *depth_mode,
                };
            }
            Request::SetCursorImage { .. } => {
                self.shared.push(format!("{} ctl SetCursorImage", self.tag));
                if self.shared.fail_cursor_upload.load(Ordering::Acquire) {
                    return Err(GfxError::Unsupported);
                }
            }
            Request::DrawCursor { visible, .. } => {
                self.shared
                    .push(format!("{} ctl DrawCursor {}", self.tag, visible));
            }
            Request::SetDetailedTiming { slot, .. } => {
                self.shared
                    .push(format!("{} ctl SetDetailedTiming {}", self.tag, slot));
            }
            Request::ProbeConnection => {
                self.shared.push(format!("{} ctl Probe", self.tag));
            }
        }
        Ok(())
    }

    fn status(&mut self, query: &mut Query) -> GfxResult<()> {
        match query {
            Query::CurrentMode(out) => {
                **out = self.current;
                Ok(())
            }
            Query::NextResolution { previous, out } => {
                let next = if *previous == NO_MORE_MODES {
                    self.modes.first().copied()
                } else {
                    match self.modes.iter().position(|m| m.mode == *previous) {
                        Some(i) => self.modes.get(i + 1).copied(),
                        None => None,
                    }
                };
                **out = next.unwrap_or_default();
                Ok(())
            }
            Query::VideoParams { depth_mode, out, .. } => {
                let (bpp, format) = match depth_mode {
                    DepthMode::Depth1 => (8, PixelFormat::Clut8),
                    DepthMode::Depth2 => (16, PixelFormat::Rgb555),
                    DepthMode::Depth3 => (32, PixelFormat::Rgb888),
                    _ => return Err(GfxError::Unsupported),
                };
                **out = PixelInfo {
                    bytes_per_row: FAKE_W * bpp / 8,
                    bytes_per_plane: FAKE_W * FAKE_H * bpp / 8,
                    bits_per_pixel: bpp,
                    component_count: if bpp == 8 { 1 } else { 3 },
                    bits_per_component: if bpp == 16 { 5 } else { 8 },
                    format,
                };
                Ok(())
            }
            Query::Connection(out) => {
                **out = *self.shared.conn.lock();
                Ok(())
            }
            Query::ModeTiming { mode, out } => {
                match self.modes.iter().find(|m| m.mode == *mode) {
                    Some(m) => {
                        **out = self.timing_for(m.width, m.height);
                        Ok(())
                    }
                    None => Err(GfxError::Unsupported),
                }
            }
            Query::HardwareCursorCaps(out) => {
                **out = HardwareCursorDescriptor {
                    width: 16,
                    height: 16,
                    bit_depth: 8,
                    num_colors: 8,
                    color_encodings: (1..=8).collect(),
                    supported_special_encodings: SpecialEncodings::TRANSPARENT
                        | SpecialEncodings::INVERTING,
                    special_encodings: [0, 255],
                };
                Ok(())
            }
            Query::VramLossRisk(out) => {
                **out = self.vram_loss;
                Ok(())
            }
        }
    }

    fn programmable_slots(&self) -> usize {
        self.slots
    }

    fn vram(&mut self) -> Option<(&mut [u8], usize, usize)> {
        Some((&mut self.vram, self.stride, self.height))
    }
}
