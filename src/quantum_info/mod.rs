/// Observables: Pauli strings and weighted sums of them.
pub mod pauli;
pub mod sparse_pauli_op;

pub use pauli::{Pauli, PauliMasks, PauliString};
pub use sparse_pauli_op::SparsePauliOp;
