pub mod policy;
pub mod supervisor;

pub use policy::SupervisorPolicy;
pub use supervisor::{Supervisor, Worker};
