use std::sync::Arc;

use crate::embedding::Embedder;
use crate::orchestrator::Orchestrator;
use crate::provider::ModelProvider;
use crate::vectordb::VectorIndex;

/// Shared state for all gateway handlers.
pub struct HandlerState<E, V, P>
where
    E: Embedder + 'static,
    V: VectorIndex + 'static,
    P: ModelProvider + 'static,
{
    pub orchestrator: Arc<Orchestrator<E, V, P>>,
}

impl<E, V, P> HandlerState<E, V, P>
where
    E: Embedder + 'static,
    V: VectorIndex + 'static,
    P: ModelProvider + 'static,
{
    pub fn new(orchestrator: Arc<Orchestrator<E, V, P>>) -> Self {
        Self { orchestrator }
    }
}

// Manual impl: a derived Clone would demand Clone on the type parameters.
impl<E, V, P> Clone for HandlerState<E, V, P>
where
    E: Embedder + 'static,
    V: VectorIndex + 'static,
    P: ModelProvider + 'static,
{
    fn clone(&self) -> Self {
        Self {
            orchestrator: Arc::clone(&self.orchestrator),
        }
    }
}
