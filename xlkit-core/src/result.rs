//! The value an exported function hands back to Excel. Excel reads it after the function
//! returns, so it cannot live on the stack: every thread owns one result slot and each call
//! overwrites it. Library-owned payloads in the slot are released by `xlAutoFree` once Excel
//! has copied them.

use std::cell::UnsafeCell;
use std::ptr;

use crate::error::{ErrorCode, Result};
use crate::operand::{IntoOperand, Operand};

thread_local! {
    static RESULT_SLOT: UnsafeCell<Operand> = const { UnsafeCell::new(Operand::missing()) };
}

/// Pointer to this thread's result slot, in the form Excel expects for a 'P' return type.
#[repr(transparent)]
#[derive(Debug)]
pub struct ResultOperandPtr(*mut Operand);

impl ResultOperandPtr {
    /// Reset this thread's slot to missing and point at it
    pub fn new() -> ResultOperandPtr {
        let slot = RESULT_SLOT.with(UnsafeCell::get);
        // only this thread can reach the slot, and no reference to it outlives a call
        let op = unsafe { &mut *slot };
        if let Err(err) = op.reset() {
            log::error!("{}", err);
            op.init();
        }
        ResultOperandPtr(slot)
    }

    /// Excel treats a null result as an error
    pub fn null() -> ResultOperandPtr {
        ResultOperandPtr(ptr::null_mut())
    }

    pub fn from_value<T: IntoOperand>(value: T) -> Result<ResultOperandPtr> {
        let mut result = ResultOperandPtr::new();
        if let Some(op) = result.operand_mut() {
            op.set(value)?;
        }
        Ok(result)
    }

    /// Deep copy of `op`, so the result never points into memory Excel may reclaim
    pub fn with_copy(op: &Operand) -> Result<ResultOperandPtr> {
        ResultOperandPtr::from_value(op)
    }

    pub fn from_error(code: ErrorCode) -> ResultOperandPtr {
        let mut result = ResultOperandPtr::new();
        if let Some(op) = result.operand_mut() {
            // the slot was just reset, so it holds nothing that could refuse the write
            let _ = op.set_error(code);
        }
        result
    }

    pub fn with_text(text: &str) -> ResultOperandPtr {
        let mut result = ResultOperandPtr::new();
        if let Some(op) = result.operand_mut() {
            let _ = op.set_str(text);
        }
        result
    }

    pub fn is_null(&self) -> bool {
        self.0.is_null()
    }

    pub fn as_ptr(&self) -> *mut Operand {
        self.0
    }

    pub fn operand(&self) -> Option<&Operand> {
        unsafe { self.0.as_ref() }
    }

    pub fn operand_mut(&mut self) -> Option<&mut Operand> {
        unsafe { self.0.as_mut() }
    }
}

impl Default for ResultOperandPtr {
    fn default() -> ResultOperandPtr {
        ResultOperandPtr::new()
    }
}
