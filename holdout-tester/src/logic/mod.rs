pub mod policy;
pub mod reports;
pub mod simulation;
pub mod tester;

pub use policy::PlayerStrategy;
pub use simulation::{DEFAULT_DT, SimulationPlan, SimulationSummary};
pub use tester::*;
