pub mod fixtures;
pub mod harness;
pub mod local_transport;

pub use harness::{seed, stored, Exchange, TestDependent, TestNetwork};
pub use local_transport::{LocalLink, LocalTransportPair};
