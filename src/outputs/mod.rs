//! Output files written alongside delivery.
//!
//! # Submodules
//!
//! - [`json`]: Archives each generated report with its source items
//!
//! # Output Structure
//!
//! ```text
//! archive_dir/
//! ├── 2025-05-05.json
//! └── 2025-05-12.json
//! ```

pub mod json;
