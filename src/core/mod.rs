pub mod gates;
pub mod simulator;
pub mod state;

// Convenience re-exports for library users
pub use gates::Matrix2x2;
pub use simulator::Simulator;
pub use state::{StateVector, MAX_QUBITS};
