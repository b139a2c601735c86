use scout::agent::{Agent, AgentConfig};
use scout::providers::base::Provider;
use scout::search::{SearchConfig, SearchTool};
use scout::store::CompanyStore;
use scout::transport::ForwardOptions;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<dyn Provider>,
    pub store: Arc<dyn CompanyStore>,
    pub agent_config: AgentConfig,
    pub search_config: SearchConfig,
    pub forward_options: ForwardOptions,
}

impl AppState {
    /// A fresh agent for one conversation turn
    pub fn agent(&self) -> Agent {
        Agent::new(Arc::clone(&self.provider), self.agent_config.clone()).with_tool(Box::new(
            SearchTool::new(Arc::clone(&self.store), self.search_config.clone()),
        ))
    }
}
