// =============================================================================
// LUMEN LOGGING SYSTEM - ZERO OVERHEAD
// =============================================================================
//
// Sistema de logging do subsistema gráfico com custo ZERO em release.
//
// ARQUITETURA:
// Este sistema foi projetado para ser completamente removível em release:
// - Usa features do Cargo para compile-time filtering
// - Com feature "no_logs", TODOS os macros viram expressões vazias
// - SEM core::fmt - Evita geração de código SSE/AVX
// - SEM alocação - Apenas strings literais
// - Escreve através de um sink registrado (o kernel registra o emissor
//   serial; o harness de teste registra um capturador)
//
// NÍVEIS DE LOG (do mais crítico ao menos):
// - ERROR: Erros fatais ou críticos
// - WARN:  Situações suspeitas mas recuperáveis
// - INFO:  Fluxo normal de execução
// - DEBUG: Informações de debugging
// - TRACE: Detalhes extremos (cada control call)
//
// COMO USAR:
//
//   kinfo!("(FB) Inicializando...");           // Apenas string
//   kinfo!("(FB) Mode=", mode_id);             // String + hex
//   klog!("Prev=", prev, " Next=", next);      // Múltiplos valores
//
// =============================================================================

use core::sync::atomic::{AtomicUsize, Ordering};

// =============================================================================
// PREFIXOS COM CORES ANSI
// =============================================================================
//
// Cores ANSI para terminais que suportam (como o QEMU serial console).
// Cada prefixo inclui: código de cor + texto + reset de cor.
//

pub const P_ERROR: &str = "\x1b[1;31m[ERRO]\x1b[0m ";
pub const P_WARN: &str = "\x1b[1;33m[WARN]\x1b[0m ";
pub const P_INFO: &str = "\x1b[32m[INFO]\x1b[0m ";
pub const P_DEBUG: &str = "\x1b[36m[DEBG]\x1b[0m ";
pub const P_TRACE: &str = "\x1b[35m[TRAC]\x1b[0m ";

// =============================================================================
// SINK
// =============================================================================
//
// O sink é um fn pointer simples armazenado como usize (0 = nenhum).
// fn(&str) não captura estado, então o registro é trivialmente atômico.
//

static SINK: AtomicUsize = AtomicUsize::new(0);

/// Registra a função que recebe os bytes de log (ex: emissor serial).
pub fn set_sink(sink: fn(&str)) {
    SINK.store(sink as usize, Ordering::Release);
}

/// Remove o sink registrado.
pub fn clear_sink() {
    SINK.store(0, Ordering::Release);
}

#[inline]
fn sink() -> Option<fn(&str)> {
    let raw = SINK.load(Ordering::Acquire);
    if raw == 0 {
        None
    } else {
        // SAFETY: SINK só é escrito por set_sink com um fn(&str) válido
        Some(unsafe { core::mem::transmute::<usize, fn(&str)>(raw) })
    }
}

/// Emite uma string literal.
pub fn emit_str(s: &str) {
    if let Some(f) = sink() {
        f(s);
    }
}

/// Emite um valor como hex (0x....), sem core::fmt.
pub fn emit_hex(val: u64) {
    let mut buf = [0u8; 18];
    buf[0] = b'0';
    buf[1] = b'x';
    const DIGITS: &[u8; 16] = b"0123456789abcdef";
    for i in 0..16 {
        let shift = 60 - (i * 4);
        buf[2 + i] = DIGITS[((val >> shift) & 0xf) as usize];
    }
    if let Some(f) = sink() {
        // SAFETY: buf contém apenas ASCII
        f(unsafe { core::str::from_utf8_unchecked(&buf) });
    }
}

/// Emite uma quebra de linha.
pub fn emit_nl() {
    if let Some(f) = sink() {
        f("\n");
    }
}

// =============================================================================
// MACROS DE LOG - NÍVEL ERROR
// =============================================================================
//
// kerror! - Sempre ativo (exceto com no_logs)
// Usado para erros críticos que podem deixar o device inutilizável.
//

#[cfg(not(feature = "no_logs"))]
#[macro_export]
macro_rules! kerror {
    // Apenas string literal
    ($msg:expr) => {{
        $crate::core::logging::emit_str($crate::core::logging::P_ERROR);
        $crate::core::logging::emit_str($msg);
        $crate::core::logging::emit_nl();
    }};
    // String + valor hex
    ($msg:expr, $val:expr) => {{
        $crate::core::logging::emit_str($crate::core::logging::P_ERROR);
        $crate::core::logging::emit_str($msg);
        $crate::core::logging::emit_hex($val as u64);
        $crate::core::logging::emit_nl();
    }};
}

#[cfg(feature = "no_logs")]
#[macro_export]
macro_rules! kerror {
    ($($t:tt)*) => {{}};
}

// =============================================================================
// MACROS DE LOG - NÍVEL WARN
// =============================================================================
//
// kwarn! - Ativo exceto com no_logs
// Usado para situações suspeitas mas recuperáveis (falha de control call
// durante transição de power, violação de reentrância do gate, etc).
//

#[cfg(not(feature = "no_logs"))]
#[macro_export]
macro_rules! kwarn {
    ($msg:expr) => {{
        $crate::core::logging::emit_str($crate::core::logging::P_WARN);
        $crate::core::logging::emit_str($msg);
        $crate::core::logging::emit_nl();
    }};
    ($msg:expr, $val:expr) => {{
        $crate::core::logging::emit_str($crate::core::logging::P_WARN);
        $crate::core::logging::emit_str($msg);
        $crate::core::logging::emit_hex($val as u64);
        $crate::core::logging::emit_nl();
    }};
}

#[cfg(feature = "no_logs")]
#[macro_export]
macro_rules! kwarn {
    ($($t:tt)*) => {{}};
}

// =============================================================================
// MACROS DE LOG - NÍVEL INFO
// =============================================================================

#[cfg(not(feature = "no_logs"))]
#[macro_export]
macro_rules! kinfo {
    ($msg:expr) => {{
        $crate::core::logging::emit_str($crate::core::logging::P_INFO);
        $crate::core::logging::emit_str($msg);
        $crate::core::logging::emit_nl();
    }};
    ($msg:expr, $val:expr) => {{
        $crate::core::logging::emit_str($crate::core::logging::P_INFO);
        $crate::core::logging::emit_str($msg);
        $crate::core::logging::emit_hex($val as u64);
        $crate::core::logging::emit_nl();
    }};
}

#[cfg(feature = "no_logs")]
#[macro_export]
macro_rules! kinfo {
    ($($t:tt)*) => {{}};
}

// =============================================================================
// MACROS DE LOG - NÍVEL DEBUG
// =============================================================================
//
// kdebug! - Ativo apenas com log_debug ou log_trace
//

#[cfg(any(feature = "log_trace", feature = "log_debug"))]
#[macro_export]
macro_rules! kdebug {
    ($msg:expr) => {{
        $crate::core::logging::emit_str($crate::core::logging::P_DEBUG);
        $crate::core::logging::emit_str($msg);
        $crate::core::logging::emit_nl();
    }};
    ($msg:expr, $val:expr) => {{
        $crate::core::logging::emit_str($crate::core::logging::P_DEBUG);
        $crate::core::logging::emit_str($msg);
        $crate::core::logging::emit_hex($val as u64);
        $crate::core::logging::emit_nl();
    }};
}

#[cfg(not(any(feature = "log_trace", feature = "log_debug")))]
#[macro_export]
macro_rules! kdebug {
    ($($t:tt)*) => {{}};
}

// =============================================================================
// MACROS DE LOG - NÍVEL TRACE
// =============================================================================
//
// ktrace! - Ativo apenas com log_trace
// Usado para detalhes extremos de cada operação.
//

#[cfg(feature = "log_trace")]
#[macro_export]
macro_rules! ktrace {
    ($msg:expr) => {{
        $crate::core::logging::emit_str($crate::core::logging::P_TRACE);
        $crate::core::logging::emit_str($msg);
        $crate::core::logging::emit_nl();
    }};
    ($msg:expr, $val:expr) => {{
        $crate::core::logging::emit_str($crate::core::logging::P_TRACE);
        $crate::core::logging::emit_str($msg);
        $crate::core::logging::emit_hex($val as u64);
        $crate::core::logging::emit_nl();
    }};
}

#[cfg(not(feature = "log_trace"))]
#[macro_export]
macro_rules! ktrace {
    ($($t:tt)*) => {{}};
}

// =============================================================================
// MACROS AUXILIARES
// =============================================================================

/// klog! - Log genérico sem prefixo de nível.
///
/// Útil para construir logs complexos com múltiplos valores.
///
/// # Uso
/// ```ignore
/// klog!("Mode=", mode_id);                 // String + hex
/// klog!("Prev=", prev, " Next=", next);    // Múltiplos
/// ```
#[cfg(not(feature = "no_logs"))]
#[macro_export]
macro_rules! klog {
    // Apenas string
    ($msg:expr) => {{
        $crate::core::logging::emit_str($msg);
    }};
    // String + hex
    ($msg:expr, $val:expr) => {{
        $crate::core::logging::emit_str($msg);
        $crate::core::logging::emit_hex($val as u64);
    }};
    // String + hex + string
    ($msg1:expr, $val:expr, $msg2:expr) => {{
        $crate::core::logging::emit_str($msg1);
        $crate::core::logging::emit_hex($val as u64);
        $crate::core::logging::emit_str($msg2);
    }};
    // String + hex + string + hex
    ($msg1:expr, $val1:expr, $msg2:expr, $val2:expr) => {{
        $crate::core::logging::emit_str($msg1);
        $crate::core::logging::emit_hex($val1 as u64);
        $crate::core::logging::emit_str($msg2);
        $crate::core::logging::emit_hex($val2 as u64);
    }};
}

#[cfg(feature = "no_logs")]
#[macro_export]
macro_rules! klog {
    ($($t:tt)*) => {{}};
}
