pub mod reader;

pub use reader::{fetch_token_info, ContractClient, Erc20Client, TokenInfo};
