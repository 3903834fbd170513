use std::sync::Arc;

use hospital_twin_core::config::Config;
use hospital_twin_core::query::QueryService;
use hospital_twin_core::runner::SimulationRunner;
use hospital_twin_core::store::SimulationStore;

/// Shared application state, threaded through every handler via
/// `axum::Extension` — the same shape as `sem_os_server`'s
/// `Extension<Arc<dyn CoreService>>`, split here into the store plus the two
/// stateless services (`SimulationRunner`, `QueryService`) built on top of it.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SimulationStore>,
    pub runner: Arc<SimulationRunner>,
    pub query: Arc<QueryService>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: Arc<dyn SimulationStore>, config: Config) -> Self {
        let config = Arc::new(config);
        let runner = Arc::new(SimulationRunner::new(
            Arc::clone(&store),
            std::time::Duration::from_secs(config.max_simulation_seconds),
            config.default_seed,
        ));
        let query = Arc::new(QueryService::new(Arc::clone(&store)));
        Self {
            store,
            runner,
            query,
            config,
        }
    }
}
