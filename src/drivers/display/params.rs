//! Arquivo: drivers/display/params.rs
//!
//! Propósito: Parâmetros de display (brightness, contrast, blank...). Um
//! store compartilhado guarda (valor, min, max) por chave simbólica; uma
//! cadeia de handlers tenta cada pedido de escrita em ordem de registro até
//! alguém aceitar.
//!
//! O primeiro handler da cadeia é sempre o backed-by-store: aceita qualquer
//! chave já publicada no store e grava com clamp em [min, max].

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;

use spin::Mutex;

/// Valor de parâmetro com faixa.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamTriple {
    pub value: i64,
    pub min: i64,
    pub max: i64,
}

/// Store compartilhado de parâmetros publicados.
pub struct ParameterStore {
    map: Mutex<BTreeMap<String, ParamTriple>>,
}

impl ParameterStore {
    pub fn new() -> Self {
        Self {
            map: Mutex::new(BTreeMap::new()),
        }
    }

    /// Publica um parâmetro (ou redefine a faixa de um existente).
    pub fn publish(&self, key: &str, value: i64, min: i64, max: i64) {
        self.map
            .lock()
            .insert(key.to_string(), ParamTriple { value, min, max });
    }

    pub fn get(&self, key: &str) -> Option<ParamTriple> {
        self.map.lock().get(key).copied()
    }

    /// Grava com clamp na faixa publicada. `false` se a chave não existe.
    pub fn set(&self, key: &str, value: i64) -> bool {
        let mut map = self.map.lock();
        match map.get_mut(key) {
            Some(t) => {
                t.value = value.clamp(t.min, t.max);
                true
            }
            None => false,
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.map.lock().keys().cloned().collect()
    }
}

/// Um elo da cadeia de handlers.
pub trait ParameterHandler: Send + Sync {
    /// Tenta aceitar uma escrita inteira. `true` = consumida.
    fn integer_set(&self, key: &str, value: i64) -> bool;

    /// Tenta aceitar uma escrita de blob. `true` = consumida.
    fn data_set(&self, _key: &str, _data: &[u8]) -> bool {
        false
    }

    /// Re-sincroniza estado externo (broadcast pós connect-change).
    fn update(&self) {}
}

/// Handler default: aceita toda chave publicada no store.
struct StoreHandler {
    store: Arc<ParameterStore>,
}

impl ParameterHandler for StoreHandler {
    fn integer_set(&self, key: &str, value: i64) -> bool {
        self.store.set(key, value)
    }
}

/// Cadeia de handlers de um framebuffer.
pub(crate) struct ParameterChain {
    store: Arc<ParameterStore>,
    handlers: Vec<Arc<dyn ParameterHandler>>,
}

impl ParameterChain {
    pub fn new() -> Self {
        let store = Arc::new(ParameterStore::new());
        let head: Arc<dyn ParameterHandler> = Arc::new(StoreHandler {
            store: Arc::clone(&store),
        });
        Self {
            store,
            handlers: alloc::vec![head],
        }
    }

    pub fn store(&self) -> Arc<ParameterStore> {
        Arc::clone(&self.store)
    }

    /// Acrescenta no fim (o store-backed sempre tenta primeiro).
    pub fn push(&mut self, handler: Arc<dyn ParameterHandler>) {
        self.handlers.push(handler);
    }

    /// Snapshot da cadeia para iterar sem segurar o lock de estado.
    pub fn clone_handlers(&self) -> Vec<Arc<dyn ParameterHandler>> {
        self.handlers.clone()
    }
}
