//! Rust rendition of the parts of XLCALL.H used by the add-in: the legacy
//! `XLOPER` layout, its type and ownership bits, error codes, return codes and
//! the handful of function numbers we call back into Excel with.
//!
//! Everything here must stay byte-for-byte identical to the SDK header, Excel
//! reads and writes these structs directly.

#![allow(non_snake_case, non_camel_case_types, non_upper_case_globals)]

use std::ffi::c_void;

pub type LPXLOPER = *mut XLOPER;

/// Rectangular single-area reference, rows 0-based.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct XLREF {
    pub rwFirst: u16,
    pub rwLast: u16,
    pub colFirst: u8,
    pub colLast: u8,
}

impl XLREF {
    /// (rows, columns) covered by the reference
    pub fn dim(&self) -> (usize, usize) {
        (
            (self.rwLast as usize + 1).saturating_sub(self.rwFirst as usize),
            (self.colLast as usize + 1).saturating_sub(self.colFirst as usize),
        )
    }
}

/// Multi-area reference table. `reftbl` is declared with one element but Excel
/// allocates `count` of them contiguously.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct XLMREF {
    pub count: u16,
    pub reftbl: [XLREF; 1],
}

#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct XloperSRef {
    pub count: u16,
    pub ref_: XLREF,
}

#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct XloperMRef {
    pub lpmref: *mut XLMREF,
    pub idSheet: usize,
}

#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct XloperArray {
    pub lparray: LPXLOPER,
    pub rows: u16,
    pub columns: u16,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub union XloperFlowLevel {
    pub level: i16,
    pub tbctrl: i16,
    pub idSheet: usize,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct XloperFlow {
    pub valflow: XloperFlowLevel,
    pub rw: u16,
    pub col: u8,
    pub xlflow: u8,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub union XloperBigDataHandle {
    pub lpbData: *mut u8,
    pub hdata: *mut c_void,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct XloperBigData {
    pub h: XloperBigDataHandle,
    pub cbData: i32,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub union XloperValue {
    pub num: f64,
    /// Byte-counted string: first byte is the length.
    pub str: *mut u8,
    pub xbool: u16,
    pub err: u16,
    pub w: i16,
    pub sref: XloperSRef,
    pub mref: XloperMRef,
    pub array: XloperArray,
    pub flow: XloperFlow,
    pub bigdata: XloperBigData,
}

/// The Excel 4 operand. Note the payload comes first and the type word last.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct XLOPER {
    pub val: XloperValue,
    pub xltype: u16,
}

// XLOPER data types
pub const xltypeNum: u16 = 0x0001;
pub const xltypeStr: u16 = 0x0002;
pub const xltypeBool: u16 = 0x0004;
pub const xltypeRef: u16 = 0x0008;
pub const xltypeErr: u16 = 0x0010;
pub const xltypeFlow: u16 = 0x0020;
pub const xltypeMulti: u16 = 0x0040;
pub const xltypeMissing: u16 = 0x0080;
pub const xltypeNil: u16 = 0x0100;
pub const xltypeSRef: u16 = 0x0400;
pub const xltypeInt: u16 = 0x0800;
pub const xlbitXLFree: u16 = 0x1000;
pub const xlbitDLLFree: u16 = 0x4000;
pub const xltypeBigData: u16 = xltypeStr | xltypeInt;

/// Mask that strips both ownership bits from an xltype word
pub const xltypeMask: u16 = !(xlbitXLFree | xlbitDLLFree);

// Error codes, used for the val.err field of XLOPER
pub const xlerrNull: u16 = 0;
pub const xlerrDiv0: u16 = 7;
pub const xlerrValue: u16 = 15;
pub const xlerrRef: u16 = 23;
pub const xlerrName: u16 = 29;
pub const xlerrNum: u16 = 36;
pub const xlerrNA: u16 = 42;
pub const xlerrGettingData: u16 = 43;

// Return codes of Excel4v
pub const xlretSuccess: i32 = 0;
pub const xlretAbort: i32 = 1;
pub const xlretInvXlfn: i32 = 2;
pub const xlretInvCount: i32 = 4;
pub const xlretInvXloper: i32 = 8;
pub const xlretStackOvfl: i32 = 16;
pub const xlretFailed: i32 = 32;
pub const xlretUncalced: i32 = 64;

// Function number bits
pub const xlCommand: i32 = 0x8000;
pub const xlSpecial: i32 = 0x4000;
pub const xlIntl: i32 = 0x2000;
pub const xlPrompt: i32 = 0x1000;

// Special function numbers
pub const xlFree: i32 = 0 | xlSpecial;
pub const xlCoerce: i32 = 2 | xlSpecial;
pub const xlGetName: i32 = 9 | xlSpecial;

// Function and command numbers
pub const xlfRegister: i32 = 149;
pub const xlfUnregister: i32 = 201;
pub const xlcMessage: i32 = 122 | xlCommand;
