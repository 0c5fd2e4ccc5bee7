pub mod catalog;
pub mod config;
pub mod error;
pub mod process;
pub mod server;
pub mod ttyrec;

pub use catalog::{RunCatalog, RunsQuery};
pub use config::Config;
pub use error::DashboardError;
pub use process::{RunTable, Value};
pub use server::Server;
