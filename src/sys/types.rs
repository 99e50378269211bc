//! # Tipos do Subsistema Gráfico
//!
//! Registros visíveis a clientes (info de modo, info de pixel, timing
//! detalhado) e identificadores opacos. Clientes introspectam estes registros
//! para escolher modo/profundidade, então o formato é contrato estável.

use alloc::vec::Vec;
use bitflags::bitflags;

// ============================================================================
// IDENTIFICADORES DE MODO
// ============================================================================

/// Base reservada: IDs >= base são modos sintéticos (detailed timing).
pub const RESERVED_MODE_BASE: i32 = 0x4000_0000;

/// Modo programado pelo firmware de boot (slot programável já em uso).
pub const BOOT_PROGRAMMABLE_MODE: DisplayModeId =
    DisplayModeId(RESERVED_MODE_BASE + 1);

/// Modo sintético "offline, resolução zero" usado quando o display
/// desconecta.
pub const OFFLINE_MODE: DisplayModeId = DisplayModeId(RESERVED_MODE_BASE + 2);

/// Sentinela do iterador de resoluções do native driver: fim da tabela.
pub const NO_MORE_MODES: DisplayModeId = DisplayModeId(-1);

/// ID opaco de modo de display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DisplayModeId(pub i32);

impl DisplayModeId {
    /// Modo sintético (acima da base reservada)?
    pub fn is_synthetic(self) -> bool {
        (self.0 as u32) >= (RESERVED_MODE_BASE as u32)
    }

    /// Índice na tabela de detailed timings (apenas IDs criados por
    /// `synthetic`; boot/offline não têm entrada na tabela).
    pub fn arb_index(self) -> usize {
        (self.0 & 0xff) as usize
    }

    /// Constrói o ID sintético para a posição `index` da tabela (até 256).
    pub fn synthetic(index: usize) -> Self {
        DisplayModeId(RESERVED_MODE_BASE + 0x100 + index as i32)
    }
}

// ============================================================================
// DEPTH MODES
// ============================================================================

/// Códigos brutos de profundidade do native driver (esparsos, até 6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum DepthMode {
    Depth1 = 128,
    Depth2 = 129,
    Depth3 = 130,
    Depth4 = 131,
    Depth5 = 132,
    Depth6 = 133,
}

impl DepthMode {
    pub const ALL: [DepthMode; 6] = [
        DepthMode::Depth1,
        DepthMode::Depth2,
        DepthMode::Depth3,
        DepthMode::Depth4,
        DepthMode::Depth5,
        DepthMode::Depth6,
    ];

    pub fn raw(self) -> u8 {
        self as u8
    }
}

// ============================================================================
// FIXED POINT 16.16
// ============================================================================

/// Valor fixed-point 16.16 (refresh rate).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Fixed16_16(pub u32);

impl Fixed16_16 {
    pub const ZERO: Fixed16_16 = Fixed16_16(0);

    pub fn from_int(v: u32) -> Self {
        Fixed16_16(v << 16)
    }

    /// `num / den` em 16.16, com arredondamento truncado.
    pub fn from_ratio(num: u64, den: u64) -> Self {
        if den == 0 {
            return Fixed16_16(0);
        }
        Fixed16_16(((num << 16) / den) as u32)
    }

    /// Parte inteira.
    pub fn int_part(self) -> u32 {
        self.0 >> 16
    }

    /// Dobra o valor (sinais entrelaçados contam dois fields por frame).
    pub fn doubled(self) -> Self {
        Fixed16_16(self.0 << 1)
    }
}

// ============================================================================
// INFO DE MODO / PIXEL
// ============================================================================

bitflags! {
    /// Flags de validade/visibilidade de um modo.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct ModeFlags: u32 {
        /// Modo validado contra o display atual.
        const VALID      = 1 << 0;
        /// Seguro para uso sem confirmação do usuário.
        const SAFE       = 1 << 1;
        /// Modo default do display.
        const DEFAULT    = 1 << 2;
        /// Não veio da tabela de presets do driver.
        const NOT_PRESET = 1 << 3;
        /// Nunca mostrar ao usuário (modos internos, ex: offline).
        const NEVER_SHOW = 1 << 4;
        /// Sinal entrelaçado.
        const INTERLACED = 1 << 5;
    }
}

/// Registro de modo exposto a clientes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayModeInfo {
    /// Largura nominal em pixels.
    pub nominal_width: u32,
    /// Altura nominal em pixels.
    pub nominal_height: u32,
    /// Refresh rate em 16.16.
    pub refresh_rate: Fixed16_16,
    /// Maior índice denso de profundidade válido.
    pub max_depth_index: u8,
    /// Flags de validade/visibilidade.
    pub flags: ModeFlags,
}

/// Layout de pixel de uma combinação modo/profundidade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 8 bits indexado via CLUT.
    Clut8,
    /// 16 bits direto (1:5:5:5).
    Rgb555,
    /// 32 bits direto (x:8:8:8).
    Rgb888,
}

/// Registro de pixel exposto a clientes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelInfo {
    pub bytes_per_row: u32,
    pub bytes_per_plane: u32,
    pub bits_per_pixel: u32,
    pub component_count: u32,
    pub bits_per_component: u32,
    pub format: PixelFormat,
}

impl PixelInfo {
    /// Bytes por pixel (arredondado para cima).
    pub fn bytes_per_pixel(&self) -> u32 {
        (self.bits_per_pixel + 7) / 8
    }
}

// ============================================================================
// DETAILED TIMING
// ============================================================================

bitflags! {
    /// Configuração de sinal de um detailed timing.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct SignalConfig: u32 {
        const INTERLACED = 1 << 0;
        const SYNC_ON_GREEN = 1 << 1;
        const COMPOSITE_SYNC = 1 << 2;
    }
}

/// Parâmetros de scaler opcionais de um modo sintético.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScalerConfig {
    pub width: u32,
    pub height: u32,
    pub flags: u32,
}

/// Descrição explícita (não tabelada) de um modo de vídeo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetailedTiming {
    /// Pixel clock em Hz.
    pub pixel_clock: u64,
    pub horizontal_active: u32,
    pub horizontal_blanking: u32,
    pub horizontal_sync_offset: u32,
    pub horizontal_sync_width: u32,
    pub horizontal_border: u32,
    pub vertical_active: u32,
    pub vertical_blanking: u32,
    pub vertical_sync_offset: u32,
    pub vertical_sync_width: u32,
    pub vertical_border: u32,
    pub signal: SignalConfig,
    pub scaler: Option<ScalerConfig>,
}

impl DetailedTiming {
    /// Refresh em 16.16: `clock / ((hA+hB) * (vA+vB))`, dobrado se
    /// entrelaçado.
    pub fn refresh_rate(&self) -> Fixed16_16 {
        let h = (self.horizontal_active + self.horizontal_blanking) as u64;
        let v = (self.vertical_active + self.vertical_blanking) as u64;
        let rate = Fixed16_16::from_ratio(self.pixel_clock, h * v);
        if self.signal.contains(SignalConfig::INTERLACED) {
            rate.doubled()
        } else {
            rate
        }
    }
}

// ============================================================================
// CONEXÃO
// ============================================================================

bitflags! {
    /// Capacidades/status de uma conexão de display.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct ConnectionFlags: u32 {
        /// Painel integrado (clamshell se aplica).
        const BUILT_IN     = 1 << 0;
        /// Display externo.
        const EXTERNAL     = 1 << 1;
        /// Canal DDC disponível.
        const DDC_CAPABLE  = 1 << 2;
        /// Sense type tagged (código de sense significativo).
        const TAGGED_SENSE = 1 << 3;
        /// Driver suporta probe sob demanda.
        const PROBE_CAPABLE = 1 << 4;
    }
}

/// Status de conexão reportado pelo native driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectionInfo {
    pub online: bool,
    pub flags: ConnectionFlags,
    /// Código de sense bruto (significativo com TAGGED_SENSE).
    pub sense_code: u8,
}

// ============================================================================
// CLUT / GAMMA
// ============================================================================

bitflags! {
    /// Opções de escrita de CLUT.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct ClutOptions: u32 {
        /// Cada entrada carrega o próprio índice (senão sequencial).
        const BY_VALUE = 1 << 0;
    }
}

/// Entrada de tabela de cores (componentes de 16 bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ColorEntry {
    pub index: u16,
    pub red: u16,
    pub green: u16,
    pub blue: u16,
}

/// Tabela de gamma completa (1 ou 3 canais).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GammaTable {
    pub channels: u32,
    pub count: u32,
    /// Largura de cada entrada em bits (<= 16).
    pub width: u32,
    /// Entradas, canal a canal, já na largura/contagem desejadas.
    pub data: Vec<u16>,
}

// ============================================================================
// CURSOR DE HARDWARE
// ============================================================================

bitflags! {
    /// Encodings especiais que o cursor de hardware aceita.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct SpecialEncodings: u32 {
        /// Pixel transparente (destino inalterado).
        const TRANSPARENT = 1 << 0;
        /// Pixel que inverte o destino.
        const INVERTING   = 1 << 1;
    }
}

/// Capacidades do cursor de hardware, anunciadas pelo native driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwareCursorDescriptor {
    pub width: u32,
    pub height: u32,
    /// Profundidade do formato do hardware: <=8 = indexado, 16/32 = direto.
    pub bit_depth: u32,
    /// Máximo de cores da tabela (formato indexado).
    pub num_colors: u32,
    /// Valores de pixel usáveis para cada cor alocada (formato indexado).
    pub color_encodings: Vec<u32>,
    pub supported_special_encodings: SpecialEncodings,
    /// [transparent, inverting]
    pub special_encodings: [u32; 2],
}

/// Imagem de cursor já convertida para o formato do hardware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwareCursorImage {
    pub width: u32,
    pub height: u32,
    pub bit_depth: u32,
    /// Tabela de cores construída (formato indexado).
    pub color_map: Vec<ColorEntry>,
    /// Pixels empacotados no formato do hardware.
    pub data: Vec<u8>,
    /// Ajuste de hot-spot aplicado na conversão.
    pub hot_spot_adjust: (i32, i32),
}

// ============================================================================
// POWER
// ============================================================================

/// Estado de power por device, em ordinal crescente de atividade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum DevicePowerState {
    /// Hardware pode perder VRAM; display apagado.
    Sleep = 0,
    /// Display apagado, VRAM e estado preservados.
    Doze = 1,
    /// Totalmente ligado.
    Wake = 2,
}

impl DevicePowerState {
    pub fn from_ordinal(ord: u8) -> Self {
        match ord {
            0 => DevicePowerState::Sleep,
            1 => DevicePowerState::Doze,
            _ => DevicePowerState::Wake,
        }
    }

    pub fn ordinal(self) -> u8 {
        self as u8
    }
}

// ============================================================================
// REGISTROS AUXILIARES DE STATUS
// ============================================================================

/// Uma entrada do iterador de resoluções do native driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolutionSpec {
    pub mode: DisplayModeId,
    pub width: u32,
    pub height: u32,
    pub refresh_rate: Fixed16_16,
    /// Maior depth mode bruto suportado nesta resolução.
    pub max_depth_mode: DepthMode,
}

impl Default for ResolutionSpec {
    fn default() -> Self {
        Self {
            mode: NO_MORE_MODES,
            width: 0,
            height: 0,
            refresh_rate: Fixed16_16::ZERO,
            max_depth_mode: DepthMode::Depth1,
        }
    }
}

/// Modo/profundidade correntes reportados pelo native driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentModeInfo {
    pub mode: DisplayModeId,
    pub depth_mode: DepthMode,
}

impl Default for CurrentModeInfo {
    fn default() -> Self {
        Self {
            mode: NO_MORE_MODES,
            depth_mode: DepthMode::Depth1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_rate_formula() {
        // 1024x768@60: clock 65MHz, blanking 320x38
        let t = DetailedTiming {
            pixel_clock: 65_000_000,
            horizontal_active: 1024,
            horizontal_blanking: 320,
            horizontal_sync_offset: 24,
            horizontal_sync_width: 136,
            horizontal_border: 0,
            vertical_active: 768,
            vertical_blanking: 38,
            vertical_sync_offset: 3,
            vertical_sync_width: 6,
            vertical_border: 0,
            signal: SignalConfig::empty(),
            scaler: None,
        };
        assert_eq!(t.refresh_rate().int_part(), 60);

        let interlaced = DetailedTiming {
            signal: SignalConfig::INTERLACED,
            ..t
        };
        assert_eq!(interlaced.refresh_rate().int_part(), 120);
    }

    #[test]
    fn synthetic_mode_ids() {
        let id = DisplayModeId::synthetic(3);
        assert!(id.is_synthetic());
        assert_eq!(id.arb_index(), 3);
        assert!(!DisplayModeId(42).is_synthetic());
        assert!(OFFLINE_MODE.is_synthetic());
    }
}
