//! Building blocks for Excel add-ins (XLLs) on the Excel 4 `XLOPER` API.
//!
//! [`Operand`] is the value Excel passes in and gets back, with the same layout as `XLOPER`.
//! Functions are described by their Rust types ([`types`]), collected into a [`Registry`] and
//! registered with Excel by `xlAutoOpen`. Exported functions run their bodies through
//! [`function::guard`] so that every failure reaches Excel as a cell value.

pub mod config;
pub mod entrypoint;
pub mod error;
pub mod function;
pub mod logging;
pub mod operand;
pub mod registrator;
pub mod registry;
pub mod result;
pub mod types;
pub mod value;
pub mod xlauto;
pub mod xlcall;

pub use inventory;

pub use config::HostLimits;
pub use entrypoint::{Excel, Excel4, XlRet};
pub use error::{ErrorCode, Result, XlKitError};
pub use function::{IntoResultOperand, guard};
pub use operand::{CellMatrixRef, ConstCellMatrixRef, FromOperand, IntoOperand, Kind, Operand, Ownership};
pub use registrator::{AttachReport, Registrator};
pub use registry::{FunctionDescriptor, Registration, Registry};
pub use result::ResultOperandPtr;
pub use types::{HostStr, Parm, ParmHelp, TypeMetadata, XlFunction, XlType};
pub use value::{Matrix, Reference, Value};
