//! # Error Codes do Subsistema Gráfico
//!
//! Define os códigos de erro retornados pelo plano de controle.
//!
//! ## Política de propagação
//! - Falhas do native driver voltam ao chamador imediato.
//! - Durante transições de power/conexão a maioria é NÃO-fatal: loga e segue
//!   (o handshake da plataforma tem timeout próprio; travar o device é pior).
//! - Cursor e gamma/CLUT tratam falha como soft: fallback silencioso
//!   (cursor de software, pular a aplicação), nunca erro no pipeline.

/// Erro do subsistema gráfico.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GfxError {
    /// Native driver ainda não completou o handshake de open.
    NotOpen,
    /// Device suspenso ou em transição de power - tentar de novo depois.
    NotReady,
    /// Capacidade ausente - nunca retentar, chamador deve fazer fallback.
    Unsupported,
    /// Entrada malformada - bug do chamador.
    BadArgument,
    /// Falha de alocação - propagada sem corromper estado parcial.
    NoMemory,
    /// Operação reentrante ou conflitante em andamento - pode retentar.
    Busy,
}

/// Resultado padrão do subsistema.
pub type GfxResult<T> = Result<T, GfxError>;
