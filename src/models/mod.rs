pub mod account;
pub mod campaign;
pub mod lead;
pub mod step;
pub mod workflow;

pub use account::ConnectedAccount;
pub use campaign::Campaign;
pub use lead::Lead;
pub use step::WorkflowStep;
pub use workflow::Workflow;
