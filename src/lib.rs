pub mod chain;
pub mod config;
pub mod mint;
pub mod utils;
pub mod wallet;

#[cfg(test)]
mod test_helpers;
