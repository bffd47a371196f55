pub mod strategies {
    use serde::{Deserialize, Serialize};
    use std::sync::Arc;
    use tokio::sync::RwLock;
    
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub enum StrategyType {
        Production,
        Enhanced,
        MarketMaking,
        Arbitrage,
        MeanReversion,
        Momentum,
    }
    
    #[derive(Debug, Clone)]
    pub struct StrategyEngine {
        pub active_strategies: Arc<RwLock<Vec<Strategy>>>,
    }
    
    #[derive(Debug, Clone)]
    pub struct Strategy {
        pub id: String,
        pub strategy_type: StrategyType,
        pub enabled: bool,
        pub risk_limit: f64,
        pub position_size: f64,
    }
    
    impl StrategyEngine {
        pub fn new() -> Self {
            Self {
                active_strategies: Arc::new(RwLock::new(Vec::new())),
            }
        }
        
        pub async fn execute_strategy(&self, strategy_type: StrategyType) -> anyhow::Result<()> {
            // Strategy execution logic
            Ok(())
        }
    }
}