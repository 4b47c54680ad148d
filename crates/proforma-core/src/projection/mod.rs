pub mod amortization;
pub mod equity;
pub mod inputs;
pub mod model;
pub mod revenue;
pub mod seasonality;
pub mod simulator;
pub mod yearly;

pub use amortization::{build_amortization_schedule, AmortizationInput, AmortizationOutput};
pub use inputs::{parse_manual_counts, ManualCounts, ProFormaInput, SubscriptionMode};
pub use model::{project_pro_forma, ProjectionResult, ReturnMetrics};
pub use simulator::Dscr;
