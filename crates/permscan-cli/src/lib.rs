//! permscan command line
//!
//! - `cli`: clap command and config-file merging
//! - `inventory`: JSON tenant snapshot serving as directory and probe
//! - `app`: report and listing runs, exit-code classification

#![warn(unreachable_pub)]

pub mod app;
pub mod cli;
pub mod inventory;

pub use app::{list_sites, run_report, AppError, SiteListing};
pub use inventory::{GrantEntry, Inventory, InventoryBackend, InventoryError, SiteEntry};
