//! REST API handlers organized by domain.

pub mod health;
pub mod history;
pub mod scan;

pub use health::*;
pub use history::*;
pub use scan::*;
