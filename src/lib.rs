// Library module organization

pub mod bridge;
pub mod config;
pub mod content_types;
pub mod coordinator;
pub mod errors;
pub mod options;
pub mod printers;
pub mod resolver;
pub mod routes;
pub mod session;
pub mod ui;

// Re-export commonly used types for convenience
pub use bridge::{dispatch, BridgeCall, BridgeResponse};
pub use config::Config;
pub use coordinator::{PickResponse, PrintCoordinator, PrintResponse};
pub use errors::{AppError, AppResult, PrintError};
pub use options::PrintJobOptions;
pub use printers::{
    new_print_interaction, Completion, MockBehavior, MockPrintInteraction, PrintInteraction,
    PrintJob,
};
pub use resolver::{ContentResolver, ResolvedLocation};

#[cfg(feature = "printer-cups")]
pub use printers::CupsPrintInteraction;
