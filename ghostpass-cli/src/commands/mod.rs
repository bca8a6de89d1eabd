mod authority;
mod config;
mod keygen;
mod pass;
mod scan;

pub use config::handle_config;
pub use keygen::handle_keygen;
pub use pass::{handle_issue, handle_present, handle_verify};
pub use scan::handle_scan;
