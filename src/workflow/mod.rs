//! Workflow module - the harvest run built on the executor, gate and quotes
//!
//! This module provides:
//! - Claim and collect across every configured wallet
//! - Market snapshot over WETH, EURC and USDC
//! - Exchange-and-delegate and sell-and-unwrap procedures
//! - Procedure decision and the interactive prompt
//! - A JSON run report

mod engine;
pub mod procedure;
mod report;

pub use engine::Harvester;
pub use report::RunReport;
