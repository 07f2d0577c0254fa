//! Calls back into Excel through `Excel4v`.
//!
//! The callback is hidden behind the [`Excel`] trait so everything that talks to the host
//! (registration, the status bar message, xlFree) can be driven by a recording host in tests.

use std::fmt;
use std::ops::Deref;
use std::sync::OnceLock;

use libc::c_int;

use crate::error::{Result, XlKitError};
use crate::operand::{Operand, Ownership};
use crate::xlcall::{
    LPXLOPER, xlFree, xlretAbort, xlretFailed, xlretInvCount, xlretInvXlfn, xlretInvXloper,
    xlretStackOvfl, xlretSuccess, xlretUncalced,
};

/// Return code of a callback, a set of `xlret*` flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XlRet(pub i32);

impl XlRet {
    pub const SUCCESS: XlRet = XlRet(xlretSuccess);
    pub const FAILED: XlRet = XlRet(xlretFailed);

    pub fn is_success(self) -> bool {
        self.0 == xlretSuccess
    }
}

impl fmt::Display for XlRet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        const FLAGS: [(i32, &str); 7] = [
            (xlretAbort, "xlretAbort"),
            (xlretInvXlfn, "xlretInvXlfn"),
            (xlretInvCount, "xlretInvCount"),
            (xlretInvXloper, "xlretInvXloper"),
            (xlretStackOvfl, "xlretStackOvfl"),
            (xlretFailed, "xlretFailed"),
            (xlretUncalced, "xlretUncalced"),
        ];
        if self.is_success() {
            return write!(f, "xlretSuccess");
        }
        let names = FLAGS
            .iter()
            .filter(|(bit, _)| self.0 & bit != 0)
            .map(|(_, name)| *name)
            .collect::<Vec<_>>();
        if names.is_empty() {
            write!(f, "xlret({})", self.0)
        } else {
            write!(f, "{}", names.join("|"))
        }
    }
}

/// Something that executes Excel callback functions
pub trait Excel {
    /// Call function number `xlfn` with `args`, writing Excel's answer into `result`
    fn call(&self, xlfn: i32, result: &mut Operand, args: &[&Operand]) -> XlRet;

    /// Call `xlfn` and hold on to the result until it is dropped, which hands any memory Excel
    /// allocated for it back through xlFree.
    fn excel(&self, xlfn: i32, args: &[&Operand]) -> Result<HostResult<'_, Self>>
    where
        Self: Sized,
    {
        let mut result = Operand::missing();
        let ret = self.call(xlfn, &mut result, args);
        if ret.is_success() {
            Ok(HostResult { host: self, operand: result })
        } else {
            result.init();
            Err(XlKitError::host_call(xlfn, ret))
        }
    }

    /// Release a callback result: Excel's own memory goes back through xlFree, anything else
    /// is reset as usual.
    fn free(&self, op: &mut Operand) {
        if op.ownership() != Ownership::Host {
            drop(op.take());
            return;
        }
        let mut ignored = Operand::missing();
        let ret = self.call(xlFree, &mut ignored, &[&*op]);
        if !ret.is_success() {
            log::warn!("xlFree failed with {}", ret);
        }
        op.init();
    }
}

/// The result of a callback. Derefs to the operand Excel filled in.
pub struct HostResult<'h, H: Excel> {
    host: &'h H,
    operand: Operand,
}

impl<H: Excel> Deref for HostResult<'_, H> {
    type Target = Operand;

    fn deref(&self) -> &Operand {
        &self.operand
    }
}

impl<H: Excel> Drop for HostResult<'_, H> {
    fn drop(&mut self) {
        self.host.free(&mut self.operand);
    }
}

type EXCEL4PROC = extern "system" fn(xlfn: c_int, oper_res: LPXLOPER, count: c_int, opers: *const LPXLOPER) -> c_int;

/// Cached Excel4v function pointer, 0 if not found
static PEXCEL4: OnceLock<usize> = OnceLock::new();

#[cfg(windows)]
fn fetch_excel4_entry_pt() -> usize {
    use windows::Win32::System::LibraryLoader::{GetModuleHandleW, GetProcAddress, LoadLibraryW};
    use windows::core::{s, w};

    *PEXCEL4.get_or_init(|| unsafe {
        let module = GetModuleHandleW(w!("XLCALL32.DLL")).or_else(|_| LoadLibraryW(w!("XLCALL32.DLL")));
        match module {
            Ok(hmod) => GetProcAddress(hmod, s!("Excel4v")).map_or(0, |p| p as usize),
            Err(err) => {
                log::error!("XLCALL32.DLL not available: {}", err);
                0
            }
        }
    })
}

#[cfg(not(windows))]
fn fetch_excel4_entry_pt() -> usize {
    *PEXCEL4.get_or_init(|| 0)
}

/// The real host, reached through `Excel4v` in XLCALL32.DLL
#[derive(Debug, Default, Clone, Copy)]
pub struct Excel4;

impl Excel4 {
    pub fn is_available(&self) -> bool {
        fetch_excel4_entry_pt() != 0
    }

    pub fn ensure_available(&self) -> Result<()> {
        if self.is_available() {
            Ok(())
        } else {
            Err(XlKitError::HostUnavailable("Excel4v could not be resolved".to_string()))
        }
    }
}

impl Excel for Excel4 {
    fn call(&self, xlfn: i32, result: &mut Operand, args: &[&Operand]) -> XlRet {
        let pexcel4 = fetch_excel4_entry_pt();
        if pexcel4 == 0 {
            return XlRet::FAILED;
        }
        log::trace!("Excel4v({}, {} args)", xlfn, args.len());
        let opers = args.iter().map(|op| op.as_ptr()).collect::<Vec<LPXLOPER>>();
        unsafe {
            let f: EXCEL4PROC = std::mem::transmute(pexcel4);
            XlRet(f(xlfn, result.as_mut_xloper(), opers.len() as c_int, opers.as_ptr()))
        }
    }
}
