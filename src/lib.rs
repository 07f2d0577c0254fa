//! Example add-in built on xlkit: the functions in `excel_wrappers` are registered by the
//! `xlAutoOpen` that xlkit-core exports.

mod excel_wrappers;
pub mod stats;

pub use excel_wrappers::*;

xlkit_core::xlkit_addin_label!("XLKit Example Addin");
