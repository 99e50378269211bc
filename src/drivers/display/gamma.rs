//! Arquivo: drivers/display/gamma.rs
//!
//! Propósito: Tabelas de cor (gamma e CLUT). Converte a tabela do cliente
//! para a largura/contagem que o hardware pede e, quando o device suporta
//! aplicação diferida, segura a última escrita até o próximo vertical blank.
//!
//! Detalhes de Implementação:
//! - Conversão: downshift de precisão (largura fonte >= desejada, senão
//!   BadArgument) e reamostragem de contagem (fonte menor replica entradas).
//! - Staging é last-write-wins POR TIPO: um gamma staged e um CLUT staged
//!   coexistem; cada novo pedido substitui só o do mesmo tipo.
//! - Connect-change descarta o staged inteiro (a tabela foi calculada para
//!   o display antigo).

use alloc::sync::Arc;
use alloc::vec::Vec;

use core::sync::atomic::Ordering;

use super::device::Framebuffer;
use crate::drivers::base::Request;
use crate::sys::error::{GfxError, GfxResult};
use crate::sys::types::{ClutOptions, ColorEntry, GammaTable};

/// Estado de gamma/CLUT do plano de controle.
pub(crate) struct GammaPlane {
    /// Largura em bits que o hardware quer por entrada.
    pub desired_width: u32,
    /// Contagem de entradas que o hardware quer por canal.
    pub desired_count: u32,
    /// Aplicar no próximo VBL em vez de imediatamente.
    pub deferred: bool,
    staged_gamma: Option<GammaTable>,
    staged_clut: Option<(u16, ClutOptions, Vec<ColorEntry>)>,
}

impl GammaPlane {
    pub fn new() -> Self {
        Self {
            desired_width: 16,
            desired_count: 256,
            deferred: false,
            staged_gamma: None,
            staged_clut: None,
        }
    }

    /// Descarta todo o estado staged (connect-change).
    pub fn discard_staged(&mut self) {
        self.staged_gamma = None;
        self.staged_clut = None;
    }

    fn has_staged(&self) -> bool {
        self.staged_gamma.is_some() || self.staged_clut.is_some()
    }
}

/// Converte a tabela do cliente para a largura/contagem do hardware.
///
/// Largura fonte menor que a desejada é erro (precisão não se inventa);
/// contagem fonte menor replica entradas no mapeamento `i*src/dst`.
pub(crate) fn convert_gamma_table(
    table: &GammaTable,
    desired_width: u32,
    desired_count: u32,
) -> GfxResult<GammaTable> {
    if table.channels != 1 && table.channels != 3 {
        return Err(GfxError::BadArgument);
    }
    if table.width == 0 || table.width > 16 || table.count == 0 {
        return Err(GfxError::BadArgument);
    }
    if table.data.len() != (table.channels * table.count) as usize {
        return Err(GfxError::BadArgument);
    }
    if table.width < desired_width {
        return Err(GfxError::BadArgument);
    }
    let shift = table.width - desired_width;
    let mut data = Vec::with_capacity((table.channels * desired_count) as usize);
    for ch in 0..table.channels {
        let base = (ch * table.count) as usize;
        for i in 0..desired_count {
            // Reamostragem: fonte menor replica, fonte maior decima.
            let src = (i as u64 * table.count as u64 / desired_count as u64) as usize;
            data.push(table.data[base + src] >> shift);
        }
    }
    Ok(GammaTable {
        channels: table.channels,
        count: desired_count,
        width: desired_width,
        data,
    })
}

impl Framebuffer {
    /// Formato de tabela pedido pelo hardware (colado do host glue na
    /// inicialização do device).
    pub fn set_gamma_format(&self, width: u32, count: u32) {
        let mut ctl = self.ctl.lock();
        ctl.gamma.desired_width = width;
        ctl.gamma.desired_count = count;
    }

    /// Liga/desliga aplicação diferida (próximo VBL). Desligar descarrega
    /// qualquer staged pendente imediatamente.
    pub fn set_deferred_updates(self: &Arc<Self>, deferred: bool) {
        {
            let mut ctl = self.ctl.lock();
            ctl.gamma.deferred = deferred;
        }
        if !deferred {
            self.flush_staged_tables();
        }
    }

    /// Aplica (ou stage) uma tabela de gamma do cliente.
    pub fn set_gamma_table(self: &Arc<Self>, table: &GammaTable) -> GfxResult<()> {
        if self.is_dead() {
            return Err(GfxError::Unsupported);
        }
        let _g = self.gate.enter();
        let mut ctl = self.ctl.lock();
        let converted =
            convert_gamma_table(table, ctl.gamma.desired_width, ctl.gamma.desired_count)?;
        if ctl.gamma.deferred {
            // Last-write-wins: só a tabela mais recente sobrevive ao VBL.
            ctl.gamma.staged_gamma = Some(converted);
            self.has_staged.store(true, Ordering::Release);
            return Ok(());
        }
        drop(ctl);
        self.chan
            .lock()
            .control(&mut Request::SetGamma { table: &converted })
    }

    /// Aplica (ou stage) entradas de CLUT do cliente.
    pub fn set_color_table(
        self: &Arc<Self>,
        start: u16,
        options: ClutOptions,
        colors: &[ColorEntry],
    ) -> GfxResult<()> {
        if self.is_dead() {
            return Err(GfxError::Unsupported);
        }
        if colors.is_empty() {
            return Err(GfxError::BadArgument);
        }
        let _g = self.gate.enter();
        let mut ctl = self.ctl.lock();
        if ctl.gamma.deferred {
            ctl.gamma.staged_clut = Some((start, options, colors.to_vec()));
            self.has_staged.store(true, Ordering::Release);
            return Ok(());
        }
        drop(ctl);
        self.chan.lock().control(&mut Request::SetClut {
            start,
            options,
            colors,
        })
    }

    /// Descarrega staged (CLUT primeiro, depois gamma) no contexto
    /// serializado. Chamado pelo work item agendado no VBL.
    pub(crate) fn flush_staged_tables(self: &Arc<Self>) {
        let _g = self.gate.enter();
        let (clut, gamma) = {
            let mut ctl = self.ctl.lock();
            (ctl.gamma.staged_clut.take(), ctl.gamma.staged_gamma.take())
        };
        self.has_staged.store(false, Ordering::Release);
        if self.is_dead() {
            return;
        }
        let mut chan = self.chan.lock();
        if let Some((start, options, colors)) = clut {
            if let Err(_e) = chan.control(&mut Request::SetClut {
                start,
                options,
                colors: &colors,
            }) {
                crate::kwarn!("(Gamma) SetClut diferido falhou id=", self.id() as u64);
            }
        }
        if let Some(table) = gamma {
            if let Err(_e) = chan.control(&mut Request::SetGamma { table: &table }) {
                crate::kwarn!("(Gamma) SetGamma diferido falhou id=", self.id() as u64);
            }
        }
    }

    /// Há staged aguardando VBL?
    pub fn has_staged_tables(&self) -> bool {
        self.ctl.lock().gamma.has_staged()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn ramp(channels: u32, count: u32, width: u32) -> GammaTable {
        let max = (1u32 << width) - 1;
        let mut data = Vec::new();
        for _ in 0..channels {
            for i in 0..count {
                data.push((i * max / (count - 1).max(1)) as u16);
            }
        }
        GammaTable {
            channels,
            count,
            width,
            data,
        }
    }

    #[test]
    fn downshifts_precision() {
        let src = ramp(1, 256, 16);
        let out = convert_gamma_table(&src, 10, 256).unwrap();
        assert_eq!(out.width, 10);
        assert_eq!(out.count, 256);
        assert_eq!(out.data[255], 0xffff >> 6);
    }

    #[test]
    fn narrow_source_rejected() {
        let src = ramp(1, 256, 8);
        assert!(matches!(
            convert_gamma_table(&src, 10, 256),
            Err(GfxError::BadArgument)
        ));
    }

    #[test]
    fn short_source_replicates() {
        let src = GammaTable {
            channels: 1,
            count: 2,
            width: 16,
            data: vec![0x0000, 0xffff],
        };
        let out = convert_gamma_table(&src, 16, 4).unwrap();
        assert_eq!(out.data, vec![0x0000, 0x0000, 0xffff, 0xffff]);
    }

    #[test]
    fn bad_shapes_rejected() {
        let mut src = ramp(3, 16, 16);
        src.data.pop();
        assert!(convert_gamma_table(&src, 16, 16).is_err());
        let src = ramp(2, 16, 16);
        assert!(convert_gamma_table(&src, 16, 16).is_err());
    }
}
