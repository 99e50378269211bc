//! Arquivo: core/work/workqueue.rs
//!
//! Propósito: Implementação de Filas de Trabalho (Work Queues).
//! Permite agendar a execução de funções para um momento posterior, fora do
//! contexto de interrupção.
//!
//! Detalhes de Implementação:
//! - Usa `VecDeque` protegido por `spin::Mutex` para armazenar trabalhos.
//! - Um item pode se reagendar (retornando `Reschedule`), o que implementa o
//!   loop de retry da barreira de sleep sem bloquear a fila.
//! - Projetado para ser drenado pela worker thread do host no contexto
//!   serializado (a mesma que segura o SystemGate).

use alloc::boxed::Box;
use alloc::collections::VecDeque;
use spin::Mutex;

/// Resultado de um item de trabalho.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkOutcome {
    /// Trabalho concluído.
    Done,
    /// Reagendar o mesmo item no fim da fila (retry).
    Reschedule,
}

/// Trait para itens de trabalho
pub trait WorkItem: Send {
    /// Executa o trabalho
    fn run(&mut self) -> WorkOutcome;
}

/// Um item de trabalho genérico (Closure)
pub struct ClosureWork {
    func: Box<dyn FnMut() -> WorkOutcome + Send>,
}

impl ClosureWork {
    pub fn new<F>(f: F) -> Self
    where
        F: FnMut() -> WorkOutcome + Send + 'static,
    {
        Self { func: Box::new(f) }
    }

    /// Conveniência para trabalhos one-shot que nunca se reagendam.
    pub fn once<F>(mut f: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        Self {
            func: Box::new(move || {
                f();
                WorkOutcome::Done
            }),
        }
    }
}

impl WorkItem for ClosureWork {
    fn run(&mut self) -> WorkOutcome {
        (self.func)()
    }
}

/// Fila de trabalho
pub struct WorkQueue {
    queue: Mutex<VecDeque<Box<dyn WorkItem>>>,
}

impl WorkQueue {
    pub const fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
        }
    }

    /// Enfileira um trabalho para execução futura
    pub fn enqueue<W: WorkItem + 'static>(&self, work: W) {
        let mut q = self.queue.lock();
        q.push_back(Box::new(work));
    }

    /// Quantidade de itens pendentes.
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Processa todos os itens pendentes na fila (Flush).
    ///
    /// Itens que pedem `Reschedule` voltam para o fim da fila mas NÃO são
    /// re-executados nesta passada, senão a barreira de sleep viraria
    /// busy-loop dentro de um único flush.
    pub fn process_all(&self) {
        let batch = {
            let mut q = self.queue.lock();
            q.len()
        };

        for _ in 0..batch {
            // Retirar um item protegendo o lock o mínimo possível
            let item = {
                let mut q = self.queue.lock();
                q.pop_front()
            };

            match item {
                Some(mut work) => {
                    if work.run() == WorkOutcome::Reschedule {
                        let mut q = self.queue.lock();
                        q.push_back(work);
                    }
                }
                None => break, // Fila vazia
            }
        }
    }

    /// Drena a fila até esvaziar, com limite de passadas (proteção contra
    /// itens que se reagendam para sempre).
    pub fn drain(&self, max_passes: usize) -> bool {
        for _ in 0..max_passes {
            if self.pending() == 0 {
                return true;
            }
            self.process_all();
        }
        self.pending() == 0
    }
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new()
    }
}
