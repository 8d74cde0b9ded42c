pub mod coinbase;
pub mod eip1193;
pub mod error;
pub mod http;
pub mod manager;
pub mod provider;
pub mod session;
pub mod store;
pub mod subscription;

pub use error::{RpcError, WalletError};
pub use manager::{ManagerParams, SessionManager};
pub use provider::{ProviderKind, WalletProvider};
pub use session::{Session, SessionPhase};
