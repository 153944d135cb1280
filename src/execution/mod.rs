// Signal-to-order reconciliation engine
pub mod cycle;
pub mod executor;
pub mod position;
pub mod reconciler;

pub use cycle::{CycleConfig, CycleOutcome, ExecutionCycle};
pub use executor::{ExecutionMechanism, ExecutionResult, OrderExecutor};
pub use position::PositionTracker;
pub use reconciler::{OrderReconciler, ReconcileAction};
