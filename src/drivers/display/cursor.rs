//! Arquivo: drivers/display/cursor.rs
//!
//! Propósito: Compositor de cursor. Converte a imagem ARGB do cliente para o
//! formato anunciado pelo cursor de hardware; quando o hardware recusa (ou a
//! imagem não converte), cai silenciosamente para o cursor de software
//! desenhado no aperture de VRAM.
//!
//! Detalhes de Implementação:
//! - Frames: N slots negociados na criação. Instalar num frame não-corrente
//!   só guarda a fonte; a conversão roda na troca de frame, e um frame já
//!   convertido troca sem novo upload.
//! - Conversão indexada aborta em alpha parcial e em paleta que estoura
//!   num_colors (sem erro ao cliente: fallback é transparente para ele).
//! - Encodings especiais: alpha 0 = transparente; alpha 0 com RGB máximo =
//!   invertente (se o hardware anuncia suporte).
//! - Imagem maior que o cursor de hardware tenta UM encolhimento por
//!   metades antes de desistir.
//! - Movimento e troca de frame fora do contexto serializado coalescem em
//!   pending bits; o VBL seguinte aplica.

use alloc::sync::Arc;
use alloc::vec::Vec;

use core::sync::atomic::{AtomicBool, AtomicI32, AtomicU8, Ordering};

use spin::Mutex;

use super::device::Framebuffer;
use crate::core::work::ClosureWork;
use crate::drivers::base::{Query, Request};
use crate::sync::{CursorShield, VblSemaphore};
use crate::sys::error::{GfxError, GfxResult};
use crate::sys::types::*;

// ============================================================================
// IMAGEM DO CLIENTE
// ============================================================================

/// Imagem de cursor entregue pelo cliente: ARGB 8:8:8:8, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorImage {
    pub width: u32,
    pub height: u32,
    pub hot_spot: (i32, i32),
    pub pixels: Vec<u32>,
}

#[inline]
fn alpha(p: u32) -> u32 {
    p >> 24
}

#[inline]
fn is_inverting(p: u32) -> bool {
    alpha(p) == 0 && (p & 0x00ff_ffff) == 0x00ff_ffff
}

#[inline]
fn is_transparent(p: u32) -> bool {
    alpha(p) == 0 && !is_inverting(p)
}

// ============================================================================
// CONVERSÃO
// ============================================================================

/// Encolhe por metades (amostra 1 em 2 nos dois eixos).
fn halve(src: &CursorImage) -> CursorImage {
    let w = (src.width / 2).max(1);
    let h = (src.height / 2).max(1);
    let mut pixels = Vec::with_capacity((w * h) as usize);
    for y in 0..h {
        for x in 0..w {
            pixels.push(src.pixels[((y * 2) * src.width + x * 2) as usize]);
        }
    }
    CursorImage {
        width: w,
        height: h,
        hot_spot: (src.hot_spot.0 / 2, src.hot_spot.1 / 2),
        pixels,
    }
}

/// Converte para o formato do hardware. `None` = não converte; usar o
/// caminho de software.
pub(crate) fn convert_cursor_image(
    src: &CursorImage,
    caps: &HardwareCursorDescriptor,
) -> Option<HardwareCursorImage> {
    if src.pixels.len() != (src.width * src.height) as usize {
        return None;
    }
    let shrunk;
    let img = if src.width > caps.width || src.height > caps.height {
        let h = halve(src);
        if h.width > caps.width || h.height > caps.height {
            return None;
        }
        shrunk = h;
        &shrunk
    } else {
        src
    };
    let adjust = (
        img.hot_spot.0 - src.hot_spot.0,
        img.hot_spot.1 - src.hot_spot.1,
    );

    match caps.bit_depth {
        32 => Some(HardwareCursorImage {
            width: img.width,
            height: img.height,
            bit_depth: 32,
            color_map: Vec::new(),
            data: img
                .pixels
                .iter()
                .flat_map(|p| p.to_le_bytes())
                .collect(),
            hot_spot_adjust: adjust,
        }),
        16 => Some(convert_direct16(img, adjust)),
        d if d <= 8 && d > 0 => convert_indexed(img, caps, adjust),
        _ => None,
    }
}

/// ARGB8888 → ARGB1555 (alpha vira bit único).
fn convert_direct16(img: &CursorImage, adjust: (i32, i32)) -> HardwareCursorImage {
    let mut data = Vec::with_capacity((img.width * img.height * 2) as usize);
    for p in img.pixels.iter() {
        let px: u16 = if alpha(*p) < 0x80 {
            0
        } else {
            let r = ((p >> 19) & 0x1f) as u16;
            let g = ((p >> 11) & 0x1f) as u16;
            let b = ((p >> 3) & 0x1f) as u16;
            0x8000 | (r << 10) | (g << 5) | b
        };
        data.extend_from_slice(&px.to_le_bytes());
    }
    HardwareCursorImage {
        width: img.width,
        height: img.height,
        bit_depth: 16,
        color_map: Vec::new(),
        data,
        hot_spot_adjust: adjust,
    }
}

/// Formato indexado: paleta construída sob demanda, pixels empacotados a
/// `bit_depth` bits, MSB primeiro, linhas alinhadas a byte.
fn convert_indexed(
    img: &CursorImage,
    caps: &HardwareCursorDescriptor,
    adjust: (i32, i32),
) -> Option<HardwareCursorImage> {
    let transparent = caps
        .supported_special_encodings
        .contains(SpecialEncodings::TRANSPARENT)
        .then_some(caps.special_encodings[0]);
    let inverting = caps
        .supported_special_encodings
        .contains(SpecialEncodings::INVERTING)
        .then_some(caps.special_encodings[1]);

    let mut palette: Vec<u32> = Vec::new(); // cores RGB únicas
    let mut color_map = Vec::new();
    let mut encoded = Vec::with_capacity(img.pixels.len());

    for p in img.pixels.iter() {
        let a = alpha(*p);
        let enc = if is_transparent(*p) {
            transparent?
        } else if is_inverting(*p) {
            // Sem suporte a inversão: degradar para transparente.
            match inverting.or(transparent) {
                Some(e) => e,
                None => return None,
            }
        } else if a != 0xff {
            // Alpha parcial não existe no formato indexado.
            return None;
        } else {
            let rgb = p & 0x00ff_ffff;
            let idx = match palette.iter().position(|c| *c == rgb) {
                Some(i) => i,
                None => {
                    if palette.len() >= caps.num_colors as usize
                        || palette.len() >= caps.color_encodings.len()
                    {
                        return None; // paleta estourou
                    }
                    palette.push(rgb);
                    let i = palette.len() - 1;
                    color_map.push(ColorEntry {
                        index: i as u16,
                        red: (((rgb >> 16) & 0xff) * 0x101) as u16,
                        green: (((rgb >> 8) & 0xff) * 0x101) as u16,
                        blue: ((rgb & 0xff) * 0x101) as u16,
                    });
                    i
                }
            };
            caps.color_encodings[idx]
        };
        encoded.push(enc);
    }

    // Empacotar.
    let bpp = caps.bit_depth;
    let row_bytes = ((img.width * bpp + 7) / 8) as usize;
    let mut data = alloc::vec![0u8; row_bytes * img.height as usize];
    for y in 0..img.height {
        for x in 0..img.width {
            let enc = encoded[(y * img.width + x) as usize];
            let bit = x * bpp;
            let byte = y as usize * row_bytes + (bit / 8) as usize;
            let shift = 8 - bpp - (bit % 8);
            data[byte] |= ((enc & ((1 << bpp) - 1)) << shift) as u8;
        }
    }
    Some(HardwareCursorImage {
        width: img.width,
        height: img.height,
        bit_depth: bpp,
        color_map,
        data,
        hot_spot_adjust: adjust,
    })
}

// ============================================================================
// COMPOSITOR
// ============================================================================

/// Área de tela salva por baixo do cursor de software.
struct SavedUnder {
    data: Vec<u8>,
    /// (x, y, w, h) em pixels, já clipado ao aperture.
    rect: Option<(i32, i32, u32, u32)>,
}

/// Conversão de um frame para o cursor de hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameConvState {
    /// Fonte (re)instalada; conversão pendente.
    New,
    /// Convertido e aceito pelo hardware.
    Capable,
    /// Inconvertível ou recusado; caminho de software.
    NotCapable,
}

/// Um slot de frame de cursor.
struct CursorFrameSlot {
    source: Option<CursorImage>,
    hw: FrameConvState,
}

/// Estado do cursor (tomado apenas sob o shield ou no contexto serializado).
struct CursorState {
    caps: Option<HardwareCursorDescriptor>,
    caps_probed: bool,
    hw_active: bool,
    /// Frame corrente.
    frame: u8,
    frames: Vec<CursorFrameSlot>,
    x: i32,
    y: i32,
    visible: bool,
    /// Bytes por pixel do framebuffer corrente (caminho de software).
    fb_bpp: u32,
    saved: SavedUnder,
}

pub(crate) struct CursorCompositor {
    pub(crate) shield: CursorShield,
    pub(crate) vbl: VblSemaphore,
    frame_count: u8,
    max_size: (u32, u32),
    state: Mutex<CursorState>,
    want_x: AtomicI32,
    want_y: AtomicI32,
    want_frame: AtomicU8,
    want_visible: AtomicBool,
    move_pending: AtomicBool,
    frame_pending: AtomicBool,
}

impl CursorCompositor {
    pub fn new(frames: u8, max_size: (u32, u32)) -> Self {
        let frame_count = frames.max(1);
        Self {
            shield: CursorShield::new(),
            vbl: VblSemaphore::new(),
            frame_count,
            max_size,
            state: Mutex::new(CursorState {
                caps: None,
                caps_probed: false,
                hw_active: false,
                frame: 0,
                frames: (0..frame_count)
                    .map(|_| CursorFrameSlot {
                        source: None,
                        hw: FrameConvState::NotCapable,
                    })
                    .collect(),
                x: 0,
                y: 0,
                visible: false,
                fb_bpp: 4,
                saved: SavedUnder {
                    data: Vec::new(),
                    rect: None,
                },
            }),
            want_x: AtomicI32::new(0),
            want_y: AtomicI32::new(0),
            want_frame: AtomicU8::new(0),
            want_visible: AtomicBool::new(false),
            move_pending: AtomicBool::new(false),
            frame_pending: AtomicBool::new(false),
        }
    }
}

impl Framebuffer {
    /// Número de frames de cursor negociado na criação.
    pub fn cursor_frame_count(&self) -> u8 {
        self.cursor.frame_count
    }

    /// Frame de cursor corrente.
    pub fn cursor_frame(&self) -> u8 {
        self.cursor.state.lock().frame
    }

    /// Instala uma nova imagem de cursor no frame dado.
    ///
    /// O frame corrente converte e sobe para o hardware na hora; frames
    /// não-correntes só guardam a fonte (a conversão roda na troca). Recusa
    /// do driver ou imagem inconvertível caem para software SEM erro ao
    /// cliente.
    pub fn set_cursor_image(self: &Arc<Self>, frame: u8, image: CursorImage) -> GfxResult<()> {
        if self.is_dead() {
            return Err(GfxError::Unsupported);
        }
        if image.pixels.len() != (image.width * image.height) as usize {
            return Err(GfxError::BadArgument);
        }
        if frame >= self.cursor.frame_count
            || image.width > self.cursor.max_size.0
            || image.height > self.cursor.max_size.1
        {
            return Err(GfxError::BadArgument);
        }
        let _g = self.gate.enter();
        let _shield = self.cursor.shield.lock();
        let mut st = self.cursor.state.lock();
        st.frames[frame as usize] = CursorFrameSlot {
            source: Some(image),
            hw: FrameConvState::New,
        };
        if frame == st.frame {
            self.activate_frame(&mut st, frame);
        }
        Ok(())
    }

    /// Seleciona um frame instalado (animação de busy-cursor). Chamável de
    /// qualquer contexto: fora do contexto serializado a troca coalesce e o
    /// próximo VBL aplica.
    pub fn set_cursor_frame(self: &Arc<Self>, frame: u8) -> GfxResult<()> {
        if self.is_dead() {
            return Err(GfxError::Unsupported);
        }
        if frame >= self.cursor.frame_count {
            return Err(GfxError::BadArgument);
        }
        self.cursor.want_frame.store(frame, Ordering::Release);
        if let Some(_g) = self.gate.try_enter() {
            self.apply_cursor_now();
        } else {
            self.cursor.frame_pending.store(true, Ordering::Release);
        }
        Ok(())
    }

    /// Torna `frame` o frame corrente, convertendo e subindo para o hardware
    /// se ainda marcado novo. Gate, shield e state já tomados.
    fn activate_frame(self: &Arc<Self>, st: &mut CursorState, frame: u8) {
        let f = frame as usize;
        if !st.caps_probed {
            st.caps_probed = true;
            let mut caps = HardwareCursorDescriptor {
                width: 0,
                height: 0,
                bit_depth: 0,
                num_colors: 0,
                color_encodings: Vec::new(),
                supported_special_encodings: SpecialEncodings::default(),
                special_encodings: [0, 0],
            };
            if self
                .chan
                .lock()
                .status(&mut Query::HardwareCursorCaps(&mut caps))
                .is_ok()
            {
                st.caps = Some(caps);
            }
        }

        if st.frames[f].hw == FrameConvState::New {
            st.frames[f].hw = FrameConvState::NotCapable;
            let converted = match (st.frames[f].source.as_ref(), st.caps.as_ref()) {
                (Some(img), Some(caps)) => convert_cursor_image(img, caps),
                _ => None,
            };
            if let Some(converted) = converted {
                let uploaded = self
                    .chan
                    .lock()
                    .control(&mut Request::SetCursorImage {
                        frame,
                        image: &converted,
                    })
                    .is_ok();
                if uploaded {
                    st.frames[f].hw = FrameConvState::Capable;
                } else {
                    crate::kdebug!("(Cursor) Hardware recusou imagem id=", self.id() as u64);
                }
            }
        }
        let hw = st.frames[f].hw == FrameConvState::Capable;

        // Trocar de hardware para software (ou de imagem no caminho de
        // software) limpa o rastro do frame anterior.
        if st.hw_active && !hw {
            let mut chan = self.chan.lock();
            let _ = chan.control(&mut Request::DrawCursor {
                x: st.x,
                y: st.y,
                frame: st.frame,
                visible: false,
            });
        } else if !st.hw_active {
            Self::sw_erase(st, &mut self.chan.lock());
        }

        st.hw_active = hw;
        st.frame = frame;
        self.cursor.want_frame.store(frame, Ordering::Release);
        if st.visible {
            self.redraw_locked(st);
        }
    }

    /// Move o hot-spot do cursor. Chamável de qualquer contexto: fora do
    /// contexto serializado o pedido coalesce e o próximo VBL aplica.
    pub fn move_cursor(self: &Arc<Self>, x: i32, y: i32) {
        self.cursor.want_x.store(x, Ordering::Release);
        self.cursor.want_y.store(y, Ordering::Release);
        if let Some(_g) = self.gate.try_enter() {
            self.apply_cursor_now();
        } else {
            self.cursor.move_pending.store(true, Ordering::Release);
        }
    }

    /// Mostra/esconde o cursor.
    pub fn set_cursor_visible(self: &Arc<Self>, visible: bool) {
        self.cursor.want_visible.store(visible, Ordering::Release);
        if let Some(_g) = self.gate.try_enter() {
            self.apply_cursor_now();
        } else {
            self.cursor.move_pending.store(true, Ordering::Release);
        }
    }

    /// Posição corrente (x, y, visível).
    pub fn cursor_position(&self) -> (i32, i32, bool) {
        let st = self.cursor.state.lock();
        (st.x, st.y, st.visible)
    }

    /// Cursor de hardware em uso? (senão: software ou nenhum)
    pub fn hardware_cursor_active(&self) -> bool {
        self.cursor.state.lock().hw_active
    }

    /// Aplica posição/visibilidade/frame pendentes. Gate já tomado pelo
    /// chamador.
    fn apply_cursor_now(self: &Arc<Self>) {
        let _shield = self.cursor.shield.lock();
        let mut st = self.cursor.state.lock();
        st.x = self.cursor.want_x.load(Ordering::Acquire);
        st.y = self.cursor.want_y.load(Ordering::Acquire);
        st.visible = self.cursor.want_visible.load(Ordering::Acquire);
        if self.is_dead() {
            return;
        }
        let want = self.cursor.want_frame.load(Ordering::Acquire);
        if want != st.frame {
            // activate_frame já redesenha.
            self.activate_frame(&mut st, want);
            return;
        }
        self.redraw_locked(&mut st);
    }

    /// Redesenha no estado corrente. Shield e state já tomados.
    fn redraw_locked(&self, st: &mut CursorState) {
        let mut chan = self.chan.lock();
        if st.hw_active {
            if let Err(_e) = chan.control(&mut Request::DrawCursor {
                x: st.x,
                y: st.y,
                frame: st.frame,
                visible: st.visible,
            }) {
                crate::kwarn!("(Cursor) DrawCursor falhou id=", self.id() as u64);
            }
            return;
        }
        Self::sw_erase(st, &mut chan);
        if st.visible {
            Self::sw_draw(st, &mut chan);
        }
    }

    /// Recalcula bytes-por-pixel do caminho de software. Chamado com o gate
    /// tomado (pós mode set); NÃO reentra no gate.
    pub(crate) fn refresh_cursor_geometry(&self) {
        let bpp = {
            let cur = self.ctl.lock().modes.current;
            if cur.mode == NO_MORE_MODES {
                return;
            }
            let mut info = PixelInfo {
                bytes_per_row: 0,
                bytes_per_plane: 0,
                bits_per_pixel: 0,
                component_count: 0,
                bits_per_component: 0,
                format: PixelFormat::Rgb888,
            };
            let mut chan = self.chan.lock();
            match chan.status(&mut Query::VideoParams {
                mode: cur.mode,
                depth_mode: cur.depth_mode,
                out: &mut info,
            }) {
                Ok(()) => info.bytes_per_pixel(),
                Err(_) => return,
            }
        };
        let _shield = self.cursor.shield.lock();
        let mut st = self.cursor.state.lock();
        st.fb_bpp = bpp;
        // O aperture foi reprogramado: o saved-under aponta para lixo.
        st.saved.rect = None;
    }

    // ------------------------------------------------------------------
    // CAMINHO DE SOFTWARE
    // ------------------------------------------------------------------

    /// Restaura a área salva por baixo do cursor.
    fn sw_erase(st: &mut CursorState, chan: &mut super::channel::ControlChannel) {
        let (rx, ry, rw, rh) = match st.saved.rect.take() {
            Some(r) => r,
            None => return,
        };
        let bpp = st.fb_bpp as usize;
        if let Some((vram, stride, _h)) = chan.vram() {
            let mut src = 0;
            for row in 0..rh {
                let off = (ry + row as i32) as usize * stride + rx as usize * bpp;
                let n = rw as usize * bpp;
                vram[off..off + n].copy_from_slice(&st.saved.data[src..src + n]);
                src += n;
            }
        }
    }

    /// Salva a área de destino e compõe a imagem por cima.
    fn sw_draw(st: &mut CursorState, chan: &mut super::channel::ControlChannel) {
        let img = match st.frames[st.frame as usize].source.as_ref() {
            Some(i) => i,
            None => return,
        };
        let bpp = st.fb_bpp as usize;
        let (vram, stride, height) = match chan.vram() {
            Some(v) => v,
            None => return,
        };
        let fb_w = (stride / bpp.max(1)) as i32;
        let fb_h = height as i32;

        // Clip do retângulo do cursor à tela.
        let x0 = (st.x - img.hot_spot.0).clamp(0, fb_w);
        let y0 = (st.y - img.hot_spot.1).clamp(0, fb_h);
        let x1 = (st.x - img.hot_spot.0 + img.width as i32).clamp(0, fb_w);
        let y1 = (st.y - img.hot_spot.1 + img.height as i32).clamp(0, fb_h);
        if x0 >= x1 || y0 >= y1 {
            return;
        }
        let (rw, rh) = ((x1 - x0) as u32, (y1 - y0) as u32);
        let src_x = x0 - (st.x - img.hot_spot.0);
        let src_y = y0 - (st.y - img.hot_spot.1);

        st.saved.data.clear();
        for row in 0..rh {
            let off = (y0 + row as i32) as usize * stride + x0 as usize * bpp;
            st.saved
                .data
                .extend_from_slice(&vram[off..off + rw as usize * bpp]);
        }
        st.saved.rect = Some((x0, y0, rw, rh));

        for row in 0..rh {
            for col in 0..rw {
                let p = img.pixels
                    [((src_y as u32 + row) * img.width + src_x as u32 + col) as usize];
                let a = alpha(p);
                if a == 0 {
                    continue; // transparente (inversão não é composta aqui)
                }
                let off = (y0 + row as i32) as usize * stride + (x0 + col as i32) as usize * bpp;
                blend_pixel(&mut vram[off..off + bpp], bpp, p, a);
            }
        }
    }
}

/// Compõe um pixel ARGB sobre o framebuffer no layout dado.
fn blend_pixel(dst: &mut [u8], bpp: usize, src: u32, a: u32) {
    let sr = (src >> 16) & 0xff;
    let sg = (src >> 8) & 0xff;
    let sb = src & 0xff;
    match bpp {
        4 => {
            let d = u32::from_le_bytes([dst[0], dst[1], dst[2], dst[3]]);
            let dr = (d >> 16) & 0xff;
            let dg = (d >> 8) & 0xff;
            let db = d & 0xff;
            let r = (sr * a + dr * (255 - a)) / 255;
            let g = (sg * a + dg * (255 - a)) / 255;
            let b = (sb * a + db * (255 - a)) / 255;
            dst.copy_from_slice(&((r << 16) | (g << 8) | b).to_le_bytes());
        }
        2 => {
            let d = u16::from_le_bytes([dst[0], dst[1]]) as u32;
            let dr = ((d >> 10) & 0x1f) << 3;
            let dg = ((d >> 5) & 0x1f) << 3;
            let db = (d & 0x1f) << 3;
            let r = ((sr * a + dr * (255 - a)) / 255) >> 3;
            let g = ((sg * a + dg * (255 - a)) / 255) >> 3;
            let b = ((sb * a + db * (255 - a)) / 255) >> 3;
            let px = ((r << 10) | (g << 5) | b) as u16;
            dst.copy_from_slice(&px.to_le_bytes());
        }
        _ => {
            // 8bpp indexado: sem conhecimento da CLUT do cliente, só
            // sobrescreve pixels opacos com a luminância como índice.
            if a >= 0x80 {
                dst[0] = ((sr * 30 + sg * 59 + sb * 11) / 100) as u8;
            }
        }
    }
}

// ============================================================================
// VBL
// ============================================================================

impl Framebuffer {
    /// Handler de vertical blank (contexto de interrupção): timestamps,
    /// semáforo, movimento pendente e kick do flush de CLUT/gamma diferido.
    /// Nunca bloqueia.
    pub fn vbl_tick(self: &Arc<Self>, now_us: u64) {
        let last = self.vbl_last_us.swap(now_us, Ordering::AcqRel);
        if last != 0 {
            self.vbl_delta_us
                .store(now_us.wrapping_sub(last), Ordering::Release);
        }
        self.cursor.vbl.signal_all();

        let mv = self.cursor.move_pending.swap(false, Ordering::AcqRel);
        let fr = self.cursor.frame_pending.swap(false, Ordering::AcqRel);
        if mv || fr {
            if let Some(_g) = self.gate.try_enter() {
                self.apply_cursor_now();
            } else {
                // Plano de controle ocupado: fica para o próximo VBL.
                if mv {
                    self.cursor.move_pending.store(true, Ordering::Release);
                }
                if fr {
                    self.cursor.frame_pending.store(true, Ordering::Release);
                }
            }
        }

        if self.has_staged.load(Ordering::Acquire)
            && !self.clut_work_pending.swap(true, Ordering::AcqRel)
        {
            if let Some(sys) = self.system.upgrade() {
                let fb = Arc::clone(self);
                sys.work().enqueue(ClosureWork::once(move || {
                    fb.flush_staged_tables();
                    fb.clut_work_pending.store(false, Ordering::Release);
                }));
            } else {
                self.clut_work_pending.store(false, Ordering::Release);
            }
        }
    }
}
