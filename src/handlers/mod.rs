//! Command Handlers module
//!
//! The transfer engine and the wallet initializer. Both are generic over the
//! account store they run against.

mod commands;
mod transfer_handler;
mod wallet_handler;


pub use commands::*;
pub use transfer_handler::TransferEngine;
pub use wallet_handler::WalletInitializer;
