pub mod dispatcher;
pub mod interface;

pub use dispatcher::{MintDispatcher, MintRequest, PendingMint};
pub use interface::{parse_custom_abi, resolve_call, ResolvedCall};
