pub mod bet;
pub mod bet_record;
pub mod cache;
pub mod candidate;
pub mod config;
pub mod config_loader;
pub mod error;
pub mod kelly;
pub mod odds;
pub mod registry;
pub mod traits;

pub use bet::{BetOutcome, SettledBet, SimulatedBet};
pub use bet_record::{BetMetadata, BetRecord, BetRecordError};
pub use cache::TtlCache;
pub use candidate::{Candidate, MarketCandidate, ModelOutput, ModelPrediction, PostedOdds, Side};
pub use config::{RiskLimits, RunConfig, StakeMode};
pub use config_loader::ConfigLoader;
pub use error::{ConfigurationError, DataGapError, EngineError};
pub use kelly::{KellyDecision, KellyReason, KellySizer};
pub use odds::Odds;
pub use registry::ModelRegistry;
pub use traits::{HistoricalDataProvider, LineupSelector, PredictionModel};
