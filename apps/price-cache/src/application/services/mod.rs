//! Application Services
//!
//! Services that orchestrate domain logic and coordinate between ports.
//!
//! - `MarketStatusService`: Caches the market schedule, answers "is open"
//! - `FallbackQuoteFetcher`: One-shot REST price for cold tickers
//! - `PriceCacheOrchestrator`: Per-request price resolution
//! - `PeriodicScheduler`: Market refresh and idle sweep timers

mod fallback;
mod market_status;
mod orchestrator;
mod scheduler;

pub use fallback::FallbackQuoteFetcher;
pub use market_status::{MarketStatusConfig, MarketStatusService};
pub use orchestrator::{
    BulkSubscribeReport, OrchestratorConfig, PriceCacheOrchestrator, PriceResolution,
    UnavailableReason,
};
pub use scheduler::PeriodicScheduler;
