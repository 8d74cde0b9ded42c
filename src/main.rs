use std::path::PathBuf;

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use eyre::Result;
use log::info;

use faction::config::Config;
use faction::mint::MintRequest;
use faction::utils::app_context::AppContext;
use faction::utils::logger::{level_from_str, setup_logger};
use faction::wallet::{Session, SessionManager};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Keep the session in memory only; nothing is restored or persisted
    #[arg(long, global = true)]
    ephemeral: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the current session
    Status,
    /// Connect a wallet
    Connect {
        /// Use Coinbase Wallet instead of the injected wallet
        #[arg(long)]
        coinbase: bool,
    },
    /// Forget the connected wallet
    Disconnect,
    /// Switch the wallet to Base, adding the chain if needed
    SwitchChain,
    /// Native balance in ETH, of the session account by default
    Balance { address: Option<String> },
    /// ERC-20 symbol, decimals and balance
    Token {
        address: String,
        /// Account whose balance to read, the session account by default
        #[arg(long)]
        holder: Option<String>,
    },
    /// Call a mint function through the connected wallet
    Mint {
        contract: String,
        function: String,
        #[arg(long)]
        quantity: Option<String>,
        /// Contract interface as JSON, overriding the synthesized one
        #[arg(long, conflicts_with = "abi_file")]
        abi: Option<String>,
        /// Read the contract interface from a file
        #[arg(long)]
        abi_file: Option<PathBuf>,
    },
    /// Follow session changes until interrupted
    Watch,
}

fn print_session(session: &Session) {
    if session.is_connected() {
        println!("Account:  {} ({})", session.account, session.short_account());
        println!("Wallet:   {}", session.provider_kind);
        println!("Chain:    {}", session.chain_id);
    } else {
        println!("Account:  not connected");
    }
    if let Some(balance) = &session.balance {
        println!("Balance:  {balance} ETH");
    }
    if let Some(token) = &session.token {
        println!("Token:    {} {} ({})", token.balance, token.symbol, token.address);
    }
    if !session.status.is_empty() {
        println!("Status:   {}", session.status);
    }
}

async fn mint(
    manager: &SessionManager,
    mut request: MintRequest,
    abi_file: Option<PathBuf>,
) -> Result<()> {
    if let Some(path) = abi_file {
        request.custom_abi = Some(tokio::fs::read_to_string(&path).await?);
    }

    let pending = manager.mint(&request).await?;
    println!("Submitted {}", pending.tx_hash);
    println!("Waiting for confirmation...");
    let block = manager.confirm_mint(&pending).await?;
    println!("Confirmed in block {block}");
    Ok(())
}

async fn watch(manager: &SessionManager) -> Result<()> {
    let mut feed = manager.subscribe_state();
    print_session(&feed.borrow_and_update());

    loop {
        tokio::select! {
            changed = feed.changed() => {
                if changed.is_err() {
                    break;
                }
                println!();
                print_session(&feed.borrow_and_update());
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    let config = Config::from_env();
    setup_logger(level_from_str(&config.log_level))?;

    let context = AppContext::new(&config, cli.ephemeral)?;
    let manager = context.manager.clone();
    let session = manager.start().await;
    info!("Session restored: {}", session.is_connected());

    match cli.command.unwrap_or(Commands::Status) {
        Commands::Status => {}
        Commands::Connect { coinbase } => {
            let result = if coinbase {
                manager.connect_coinbase().await
            } else {
                manager.connect_injected().await
            };
            // The status line carries the failure
            if let Err(e) = result {
                info!("Connect failed: {e}");
            }
        }
        Commands::Disconnect => manager.disconnect().await,
        Commands::SwitchChain => {
            if let Err(e) = manager.switch_to_target_chain().await {
                info!("Switch failed: {e}");
            }
        }
        Commands::Balance { address } => {
            let address = address.unwrap_or(session.account);
            if address.is_empty() {
                println!("Pass an address or connect a wallet first");
                return Ok(());
            }
            let balance = manager.fetch_native_balance(&address).await;
            println!("{address}: {balance} ETH");
            return Ok(());
        }
        Commands::Token { address, holder } => {
            let token = manager.fetch_token(&address, holder.as_deref()).await?;
            println!(
                "{} ({} decimals): {}",
                token.symbol, token.decimals, token.balance
            );
            return Ok(());
        }
        Commands::Mint {
            contract,
            function,
            quantity,
            abi,
            abi_file,
        } => {
            let request = MintRequest {
                contract_address: contract,
                function_name: function,
                quantity,
                custom_abi: abi,
            };
            mint(&manager, request, abi_file).await?;
        }
        Commands::Watch => return watch(&manager).await,
    }

    print_session(&manager.snapshot().await);
    Ok(())
}
