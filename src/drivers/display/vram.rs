//! Arquivo: drivers/display/vram.rs
//!
//! Propósito: Snapshot de VRAM para sleep profundo. Hardware que corta power
//! da VRAM em Sleep perde o conteúdo; salvamos o aperture antes do SetPower
//! e restauramos depois do wake, antes do DidWake chegar aos clientes.
//!
//! Detalhes de Implementação:
//! - Só salva quando vale a pena: device online, não-secundário de mirror,
//!   e o driver reporta risco de perda (VramLossRisk).
//! - Codec byte-run estilo PackBits; pior caso limitado a
//!   `len + len/127 + 16`, arredondado a páginas de 4KiB.
//! - O snapshot é consumido na primeira tentativa de restore, com ou sem
//!   sucesso (retentar com dados velhos só prolonga o lixo na tela).

use alloc::sync::Arc;
use alloc::vec::Vec;

use super::device::Framebuffer;
use crate::drivers::base::Query;

const PAGE: usize = 4096;

/// Conteúdo de VRAM salvo para um ciclo de sleep.
pub(crate) struct VramSnapshot {
    data: Vec<u8>,
    compressed: bool,
    /// Tamanho original do aperture (valida contra o aperture pós-wake).
    uncompressed_len: usize,
}

fn page_round(n: usize) -> usize {
    (n + PAGE - 1) & !(PAGE - 1)
}

/// Pior caso do codec para `len` bytes de entrada.
pub(crate) fn compress_bound(len: usize) -> usize {
    page_round(len + len / 127 + 16)
}

/// Byte-run encoding: controle `n` em 0..=127 = literal de n+1 bytes;
/// controle `n` em 129..=255 = repetir o byte seguinte 257-n vezes.
/// O controle 128 não é emitido.
pub(crate) fn compress(src: &[u8], out: &mut Vec<u8>) {
    let mut i = 0;
    while i < src.len() {
        // Medir run de repetição.
        let b = src[i];
        let mut run = 1;
        while run < 128 && i + run < src.len() && src[i + run] == b {
            run += 1;
        }
        if run >= 3 {
            out.push((257 - run) as u8);
            out.push(b);
            i += run;
            continue;
        }
        // Literal: até o próximo run de 3+ ou 128 bytes.
        let start = i;
        let mut lit = 0;
        while lit < 128 && i < src.len() {
            let b = src[i];
            let mut r = 1;
            while r < 3 && i + r < src.len() && src[i + r] == b {
                r += 1;
            }
            if r >= 3 {
                break;
            }
            i += 1;
            lit += 1;
        }
        out.push((lit - 1) as u8);
        out.extend_from_slice(&src[start..start + lit]);
    }
}

/// Decodifica para `dst`. Devolve false se o stream não couber exatamente.
pub(crate) fn decompress(src: &[u8], dst: &mut [u8]) -> bool {
    let mut i = 0;
    let mut o = 0;
    while i < src.len() {
        let ctl = src[i];
        i += 1;
        if ctl <= 127 {
            let n = ctl as usize + 1;
            if i + n > src.len() || o + n > dst.len() {
                return false;
            }
            dst[o..o + n].copy_from_slice(&src[i..i + n]);
            i += n;
            o += n;
        } else if ctl >= 129 {
            let n = 257 - ctl as usize;
            if i >= src.len() || o + n > dst.len() {
                return false;
            }
            let b = src[i];
            i += 1;
            for d in dst[o..o + n].iter_mut() {
                *d = b;
            }
            o += n;
        } else {
            return false; // controle 128 nunca é emitido
        }
    }
    o == dst.len()
}

impl Framebuffer {
    /// O sleep iminente justifica um snapshot?
    fn vram_save_worthwhile(&self) -> bool {
        if self.is_mirror_secondary() {
            return false;
        }
        {
            let ctl = self.ctl.lock();
            if !ctl.online {
                return false;
            }
        }
        let mut at_risk = false;
        let mut chan = self.chan.lock();
        match chan.status(&mut Query::VramLossRisk(&mut at_risk)) {
            Ok(()) => at_risk,
            Err(_) => false, // driver não sabe dizer: assume que preserva
        }
    }

    /// Salva o aperture antes do SetPower de descida. Chamado com o gate
    /// tomado, ANTES de o hardware perder power.
    pub(crate) fn save_vram_for_sleep(self: &Arc<Self>) {
        if !self.vram_save_worthwhile() {
            return;
        }
        let snapshot = {
            let mut chan = self.chan.lock();
            let (aperture, _stride, _height) = match chan.vram() {
                Some(v) => v,
                None => return, // sem acesso linear
            };
            let len = aperture.len();
            if self.vram_compress {
                let mut data = Vec::with_capacity(compress_bound(len));
                compress(aperture, &mut data);
                data.shrink_to_fit();
                VramSnapshot {
                    data,
                    compressed: true,
                    uncompressed_len: len,
                }
            } else {
                let mut data = Vec::with_capacity(page_round(len));
                data.extend_from_slice(aperture);
                VramSnapshot {
                    data,
                    compressed: false,
                    uncompressed_len: len,
                }
            }
        };
        crate::kdebug!("(Vram) Snapshot salvo id=", self.id() as u64);
        crate::kdebug!("(Vram) bytes=", snapshot.data.len() as u64);
        self.ctl.lock().snapshot = Some(snapshot);
    }

    /// Restaura o aperture depois do SetPower de subida, antes do DidWake.
    /// O snapshot é consumido aqui, mesmo se a cópia falhar.
    pub(crate) fn restore_vram_after_wake(self: &Arc<Self>) {
        let snapshot = {
            let mut ctl = self.ctl.lock();
            let snapshot = match ctl.snapshot.take() {
                Some(s) => s,
                None => return,
            };
            if ctl.conn.suspended {
                // Connect-change pendente: o conteúdo salvo é do display
                // antigo. Descartar conta como a única tentativa de restore.
                crate::kdebug!("(Vram) Suspenso no wake, snapshot descartado id=", self.id() as u64);
                return;
            }
            snapshot
        };
        let _shield = self.cursor.shield.lock();
        let mut chan = self.chan.lock();
        let (aperture, _stride, _height) = match chan.vram() {
            Some(v) => v,
            None => return,
        };
        if aperture.len() != snapshot.uncompressed_len {
            // Modo mudou durante o sono; o snapshot não serve mais.
            crate::kwarn!("(Vram) Aperture mudou, snapshot descartado id=", self.id() as u64);
            return;
        }
        let ok = if snapshot.compressed {
            decompress(&snapshot.data, aperture)
        } else {
            aperture.copy_from_slice(&snapshot.data);
            true
        };
        if ok {
            crate::kdebug!("(Vram) Restaurado id=", self.id() as u64);
        } else {
            crate::kwarn!("(Vram) Stream corrompido id=", self.id() as u64);
        }
    }

    /// Snapshot pendente de restore?
    pub fn has_vram_snapshot(&self) -> bool {
        self.ctl.lock().snapshot.is_some()
    }
}
