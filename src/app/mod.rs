pub mod lifecycle;
pub mod orchestrator;
pub mod slots;

pub use lifecycle::ModelLifecycleManager;
pub use orchestrator::{EnhancementOrchestrator, ProviderState};
pub use slots::TaskSlots;
