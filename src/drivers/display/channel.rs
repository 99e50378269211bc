//! ControlChannel - serialização das chamadas ao native driver
//!
//! Todas as chamadas Control/Status passam por aqui, e SÓ devem acontecer
//! dentro do SystemGate. A checagem de reentrância é diagnóstico (loga e
//! segue), não correção. Antes do handshake de open toda chamada devolve
//! `NotOpen`.

use alloc::boxed::Box;
use alloc::sync::Arc;

use crate::drivers::base::{NativeDriver, Query, Request};
use crate::sync::SystemGate;
use crate::sys::error::{GfxError, GfxResult};

pub struct ControlChannel {
    driver: Box<dyn NativeDriver>,
    gate: Arc<SystemGate>,
    opened: bool,
    control_calls: u64,
    status_calls: u64,
}

impl ControlChannel {
    pub fn new(driver: Box<dyn NativeDriver>, gate: Arc<SystemGate>) -> Self {
        Self {
            driver,
            gate,
            opened: false,
            control_calls: 0,
            status_calls: 0,
        }
    }

    /// Handshake de open do native driver.
    pub fn open(&mut self) -> GfxResult<()> {
        if self.opened {
            return Ok(());
        }
        self.driver.open()?;
        self.opened = true;
        crate::kinfo!("(Canal) Driver aberto");
        Ok(())
    }

    pub fn close(&mut self) {
        if self.opened {
            self.driver.close();
            self.opened = false;
        }
    }

    pub fn is_open(&self) -> bool {
        self.opened
    }

    /// Verbo Control.
    pub fn control(&mut self, req: &mut Request) -> GfxResult<()> {
        self.gate.assert_entered("control");
        if !self.opened {
            return Err(GfxError::NotOpen);
        }
        self.control_calls += 1;
        crate::ktrace!("(Canal) control code=", req.code() as u64);
        self.driver.control(req)
    }

    /// Verbo Status.
    pub fn status(&mut self, query: &mut Query) -> GfxResult<()> {
        self.gate.assert_entered("status");
        if !self.opened {
            return Err(GfxError::NotOpen);
        }
        self.status_calls += 1;
        crate::ktrace!("(Canal) status code=", query.code() as u64);
        self.driver.status(query)
    }

    /// Total de chamadas Control emitidas (diagnóstico/testes).
    pub fn control_calls(&self) -> u64 {
        self.control_calls
    }

    /// Total de chamadas Status emitidas (diagnóstico/testes).
    pub fn status_calls(&self) -> u64 {
        self.status_calls
    }

    pub fn programmable_slots(&self) -> usize {
        self.driver.programmable_slots()
    }

    /// Aperture de VRAM do driver: (bytes, stride, altura).
    pub fn vram(&mut self) -> Option<(&mut [u8], usize, usize)> {
        if !self.opened {
            return None;
        }
        self.driver.vram()
    }
}
