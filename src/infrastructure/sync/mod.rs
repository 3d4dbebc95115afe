pub mod reconcile_job;
pub mod simulated_transport;

pub use reconcile_job::{ReconcileJob, ReconcileReport};
pub use simulated_transport::SimulatedSyncTransport;
