pub mod http;
pub mod state;
pub mod storage;
pub mod tcp;

pub use state::NodeState;
pub use storage::FileStore;
