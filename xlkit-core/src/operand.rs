#![allow(non_upper_case_globals)]

use std::ops::{Index, IndexMut};
use std::{fmt, mem, ptr, slice};

use crate::config;
use crate::error::{ErrorCode, Result, XlKitError};
use crate::xlcall::{
    xlbitDLLFree, xlbitXLFree, xltypeBigData, xltypeBool, xltypeErr, xltypeFlow, xltypeInt,
    xltypeMask, xltypeMissing, xltypeMulti, xltypeNil, xltypeNum, xltypeRef, xltypeSRef,
    xltypeStr, LPXLOPER, XLOPER, XLREF, XloperArray, XloperSRef, XloperValue,
};

// ####################################################################################################################
// 1. KINDS AND OWNERSHIP
// ####################################################################################################################

/// The kind of value an operand holds, with the ownership bits stripped off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Number,
    Integer,
    Str,
    Bool,
    Error,
    Matrix,
    Missing,
    Nil,
    Reference,
    Flow,
    BigData,
    Unknown(u16),
}

impl Kind {
    pub fn from_xltype(xltype: u16) -> Kind {
        match xltype & xltypeMask {
            xltypeNum => Kind::Number,
            xltypeInt => Kind::Integer,
            xltypeStr => Kind::Str,
            xltypeBool => Kind::Bool,
            xltypeErr => Kind::Error,
            xltypeMulti => Kind::Matrix,
            xltypeMissing => Kind::Missing,
            xltypeNil => Kind::Nil,
            xltypeRef | xltypeSRef => Kind::Reference,
            xltypeFlow => Kind::Flow,
            xltypeBigData => Kind::BigData,
            other => Kind::Unknown(other),
        }
    }
}

/// Who frees the variable-length payload of an operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// Allocated by Excel. We must never free it.
    Host,
    /// Allocated by us, released on reset or drop.
    Library,
    /// Nobody frees it through this operand, e.g. arguments Excel passes in.
    Borrowed,
}

impl Ownership {
    pub fn from_xltype(xltype: u16) -> Ownership {
        if xltype & xlbitXLFree != 0 {
            Ownership::Host
        } else if xltype & xlbitDLLFree != 0 {
            Ownership::Library
        } else {
            Ownership::Borrowed
        }
    }
}

/// Render a raw xltype word the way the SDK names it, e.g. `xltypeStr|xlbitDLLFree`.
pub fn kind_name(xltype: u16) -> String {
    let mut bits = String::new();
    if xltype & xlbitXLFree != 0 {
        bits.push_str("|xlbitXLFree");
    }
    if xltype & xlbitDLLFree != 0 {
        bits.push_str("|xlbitDLLFree");
    }
    let base = match xltype & xltypeMask {
        xltypeBigData => "xltypeBigData",
        xltypeNum => "xltypeNum",
        xltypeStr => "xltypeStr",
        xltypeBool => "xltypeBool",
        xltypeRef => "xltypeRef",
        xltypeErr => "xltypeErr",
        xltypeFlow => "xltypeFlow",
        xltypeMulti => "xltypeMulti",
        xltypeMissing => "xltypeMissing",
        xltypeNil => "xltypeNil",
        xltypeSRef => "xltypeSRef",
        xltypeInt => "xltypeInt",
        _ => "Unknown xltype",
    };
    format!("{}{}", base, bits)
}

// ####################################################################################################################
// 2. OPERAND
// ####################################################################################################################

/// Operand wraps Excel's XLOPER and adds ownership-aware memory management on top of it. It has
/// exactly the layout of an XLOPER, so a `*mut Operand` can be handed to Excel as an `LPXLOPER`
/// and arguments Excel passes in can be read as `&Operand`.
#[repr(transparent)]
pub struct Operand(XLOPER);

impl Operand {
    /// A missing operand with a zeroed payload. Every operand starts out like this.
    pub const fn missing() -> Operand {
        Operand(XLOPER {
            // all-zero is a valid bit pattern for every member of the union
            val: unsafe { mem::zeroed::<XloperValue>() },
            xltype: xltypeMissing,
        })
    }

    /// An empty cell
    pub fn nil() -> Operand {
        let mut op = Operand::missing();
        op.0.xltype = xltypeNil;
        op
    }

    pub fn number(num: f64) -> Operand {
        let mut op = Operand::missing();
        op.0.xltype = xltypeNum;
        op.0.val.num = num;
        op
    }

    pub fn integer(w: i16) -> Operand {
        let mut op = Operand::missing();
        op.0.xltype = xltypeInt;
        op.0.val.w = w;
        op
    }

    pub fn boolean(b: bool) -> Operand {
        let mut op = Operand::missing();
        op.0.xltype = xltypeBool;
        op.0.val.xbool = b as u16;
        op
    }

    pub fn error(code: ErrorCode) -> Operand {
        let mut op = Operand::missing();
        op.0.xltype = xltypeErr;
        op.0.val.err = code.raw();
        op
    }

    /// A library-owned string, truncated to the installed host string limit
    pub fn string(s: &str) -> Operand {
        Operand::string_with_limit(s, config::limits().max_string_len)
    }

    /// A library-owned string truncated to at most `max_len` bytes. Truncation never splits a
    /// UTF-8 character, so the result may be a few bytes shorter than `max_len`.
    pub fn string_with_limit(s: &str, max_len: usize) -> Operand {
        let max_len = max_len.min(config::MAX_STRING_PREFIX);
        let mut end = s.len().min(max_len);
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        Operand::from_bytes(&s.as_bytes()[..end])
    }

    /// A single-area reference on the current sheet
    pub fn sref(area: XLREF) -> Operand {
        let mut op = Operand::missing();
        op.0.xltype = xltypeSRef;
        op.0.val.sref = XloperSRef { count: 1, ref_: area };
        op
    }

    /// Take over an XLOPER as-is, ownership bits included.
    ///
    /// # Safety
    /// Pointers inside `xloper` must be valid for its kind. If it carries `xlbitDLLFree` its
    /// payload must have been allocated by this library.
    pub unsafe fn from_xloper(xloper: XLOPER) -> Operand {
        Operand(xloper)
    }

    /// View an XLOPER passed in by Excel as an operand.
    ///
    /// # Safety
    /// `xloper` must be non-null and valid for `'a`.
    pub unsafe fn from_raw<'a>(xloper: *const XLOPER) -> &'a Operand {
        unsafe { &*(xloper as *const Operand) }
    }

    /// # Safety
    /// `xloper` must be non-null, valid for `'a` and not aliased.
    pub unsafe fn from_raw_mut<'a>(xloper: LPXLOPER) -> &'a mut Operand {
        unsafe { &mut *(xloper as *mut Operand) }
    }

    /// Exposes the underlying XLOPER
    pub fn as_xloper(&self) -> &XLOPER {
        &self.0
    }

    /// Exposes the underlying XLOPER, e.g. as the result slot of a call into Excel
    pub fn as_mut_xloper(&mut self) -> &mut XLOPER {
        &mut self.0
    }

    pub fn as_ptr(&self) -> LPXLOPER {
        &self.0 as *const XLOPER as LPXLOPER
    }

    pub fn xltype(&self) -> u16 {
        self.0.xltype
    }

    pub fn kind(&self) -> Kind {
        Kind::from_xltype(self.0.xltype)
    }

    pub fn ownership(&self) -> Ownership {
        Ownership::from_xltype(self.0.xltype)
    }

    /// Move the value out, leaving this operand missing
    pub fn take(&mut self) -> Operand {
        mem::replace(self, Operand::missing())
    }

    /// Free any payload we own and go back to missing. Payloads Excel owns are left alone and
    /// reported as an error: freeing them would corrupt Excel's heap.
    pub fn reset(&mut self) -> Result<()> {
        let xltype = self.0.xltype;
        if matches!(self.kind(), Kind::Str | Kind::Matrix) {
            if xltype & xlbitXLFree != 0 {
                return Err(XlKitError::ownership_violation(kind_name(xltype)));
            }
            if xltype & xlbitDLLFree != 0 {
                self.free_payload();
            }
        }
        self.init();
        Ok(())
    }

    /// Back to missing without freeing anything
    pub(crate) fn init(&mut self) {
        // the previous payload, if any, is forgotten
        self.0 = Operand::missing().into_xloper();
    }

    fn into_xloper(self) -> XLOPER {
        let xloper = self.0;
        mem::forget(self);
        xloper
    }

    fn free_payload(&mut self) {
        match self.kind() {
            Kind::Str => unsafe {
                let p = self.0.val.str;
                if !p.is_null() {
                    // allocated as a boxed slice of exactly length + 1 bytes
                    let len = *p as usize + 1;
                    drop(Box::from_raw(ptr::slice_from_raw_parts_mut(p, len)));
                }
            },
            Kind::Matrix => unsafe {
                let array = self.0.val.array;
                if !array.lparray.is_null() {
                    let len = array.rows as usize * array.columns as usize;
                    let cells = ptr::slice_from_raw_parts_mut(array.lparray as *mut Operand, len);
                    drop(Box::from_raw(cells));
                }
            },
            _ => {}
        }
    }

    fn from_bytes(bytes: &[u8]) -> Operand {
        debug_assert!(bytes.len() <= config::MAX_STRING_PREFIX);
        let mut buf = Vec::with_capacity(bytes.len() + 1);
        buf.push(bytes.len() as u8);
        buf.extend_from_slice(bytes);
        let p = Box::into_raw(buf.into_boxed_slice()) as *mut u8;

        let mut op = Operand::missing();
        op.0.xltype = xltypeStr | xlbitDLLFree;
        op.0.val.str = p;
        op
    }

    fn from_cells(rows: usize, cols: usize, cells: Box<[Operand]>) -> Operand {
        debug_assert_eq!(rows * cols, cells.len());
        let lparray = Box::into_raw(cells) as *mut Operand as LPXLOPER;

        let mut op = Operand::missing();
        op.0.xltype = xltypeMulti | xlbitDLLFree;
        op.0.val.array = XloperArray {
            lparray,
            rows: rows as u16,
            columns: cols as u16,
        };
        op
    }

    /// Copy that never shares memory with `self`: strings and matrices are duplicated into
    /// library-owned allocations, whoever owned the original.
    pub fn deep_copy(&self) -> Operand {
        match self.kind() {
            Kind::Str => Operand::from_bytes(self.str_bytes().unwrap_or_default()),
            Kind::Matrix => match self.as_matrix() {
                Ok(src) => {
                    let cells = src.iter().map(Operand::deep_copy).collect::<Box<[_]>>();
                    Operand::from_cells(src.rows(), src.cols(), cells)
                }
                Err(_) => Operand::missing(),
            },
            _ => self.shallow_copy(),
        }
    }

    fn shallow_copy(&self) -> Operand {
        let mut raw = self.0;
        raw.xltype &= xltypeMask;
        Operand(raw)
    }

    fn replace(&mut self, new: Operand) -> Result<()> {
        self.reset()?;
        *self = new;
        Ok(())
    }
}

/// Construct a missing operand. This is also the state of the thread-local result slot.
impl Default for Operand {
    fn default() -> Operand {
        Operand::missing()
    }
}

impl Drop for Operand {
    fn drop(&mut self) {
        if let Err(err) = self.reset() {
            log::error!("{}", err);
        }
    }
}

/// Library-owned strings and matrices are deep-copied into fresh allocations. Anything else,
/// including Excel's own strings and matrices, is copied shallowly and the copy owns nothing.
impl Clone for Operand {
    fn clone(&self) -> Operand {
        match self.ownership() {
            Ownership::Library => self.deep_copy(),
            _ => self.shallow_copy(),
        }
    }
}

// ####################################################################################################################
// 3. PREDICATES AND RAW ACCESS
// ####################################################################################################################

impl Operand {
    pub fn is_number(&self) -> bool {
        self.kind() == Kind::Number
    }
    pub fn is_integer(&self) -> bool {
        self.kind() == Kind::Integer
    }
    pub fn is_string(&self) -> bool {
        self.kind() == Kind::Str
    }
    pub fn is_bool(&self) -> bool {
        self.kind() == Kind::Bool
    }
    pub fn is_error(&self) -> bool {
        self.kind() == Kind::Error
    }
    pub fn is_missing(&self) -> bool {
        self.kind() == Kind::Missing
    }
    pub fn is_nil(&self) -> bool {
        self.kind() == Kind::Nil
    }
    pub fn is_matrix(&self) -> bool {
        self.kind() == Kind::Matrix
    }
    pub fn is_reference(&self) -> bool {
        self.kind() == Kind::Reference
    }
    pub fn is_missing_or_nil(&self) -> bool {
        self.is_missing() || self.is_nil()
    }

    /// The raw bytes of a string, without conversion. None for other kinds.
    pub fn str_bytes(&self) -> Option<&[u8]> {
        if !self.is_string() {
            return None;
        }
        unsafe {
            let p = self.0.val.str;
            if p.is_null() {
                return Some(&[]);
            }
            Some(slice::from_raw_parts(p.add(1), *p as usize))
        }
    }

    /// Length in bytes of a string operand
    pub fn string_length(&self) -> Result<usize> {
        self.str_bytes()
            .map(<[u8]>::len)
            .ok_or_else(|| XlKitError::type_mismatch(kind_name(self.0.xltype), "string"))
    }

    pub fn cell_matrix_rows(&self) -> Result<usize> {
        self.as_matrix().map(|m| m.rows())
    }

    pub fn cell_matrix_cols(&self) -> Result<usize> {
        self.as_matrix().map(|m| m.cols())
    }

    /// Areas of a reference operand plus the sheet id for multi-area references
    pub fn reference_areas(&self) -> Option<(Option<usize>, Vec<XLREF>)> {
        unsafe {
            match self.0.xltype & xltypeMask {
                xltypeSRef => Some((None, vec![self.0.val.sref.ref_])),
                xltypeRef => {
                    let mref = self.0.val.mref;
                    if mref.lpmref.is_null() {
                        return Some((Some(mref.idSheet), Vec::new()));
                    }
                    let count = (*mref.lpmref).count as usize;
                    let first = ptr::addr_of!((*mref.lpmref).reftbl) as *const XLREF;
                    Some((Some(mref.idSheet), slice::from_raw_parts(first, count).to_vec()))
                }
                _ => None,
            }
        }
    }

    fn text(&self) -> String {
        String::from_utf8_lossy(self.str_bytes().unwrap_or_default()).into_owned()
    }
}

// ####################################################################################################################
// 4. SETTERS
// ####################################################################################################################

/// Values that can be stored into an operand with `Operand::set`.
pub trait IntoOperand {
    fn write_into(self, op: &mut Operand) -> Result<()>;
}

impl Operand {
    /// Release the current payload and store `value`. Heap kinds become library-owned.
    pub fn set<T: IntoOperand>(&mut self, value: T) -> Result<()> {
        value.write_into(self)
    }

    pub fn set_number(&mut self, num: f64) -> Result<()> {
        self.replace(Operand::number(num))
    }

    pub fn set_integer(&mut self, w: i16) -> Result<()> {
        self.replace(Operand::integer(w))
    }

    pub fn set_bool(&mut self, b: bool) -> Result<()> {
        self.replace(Operand::boolean(b))
    }

    pub fn set_error(&mut self, code: ErrorCode) -> Result<()> {
        self.replace(Operand::error(code))
    }

    pub fn set_str(&mut self, s: &str) -> Result<()> {
        self.replace(Operand::string(s))
    }

    pub fn set_str_with_limit(&mut self, s: &str, max_len: usize) -> Result<()> {
        self.replace(Operand::string_with_limit(s, max_len))
    }

    pub fn set_nil(&mut self) -> Result<()> {
        self.replace(Operand::nil())
    }

    pub fn set_sref(&mut self, area: XLREF) -> Result<()> {
        self.replace(Operand::sref(area))
    }

    /// Deep copy of `other`, whoever owns it
    pub fn assign(&mut self, other: &Operand) -> Result<()> {
        self.replace(other.deep_copy())
    }

    /// Make a library-owned matrix of the given size and return a mutable view of it. Every cell
    /// is a copy of `fill`, or missing when no fill is given.
    pub fn set_matrix(&mut self, rows: usize, cols: usize, fill: Option<&Operand>) -> Result<CellMatrixRef<'_>> {
        let limits = config::limits();
        if rows > limits.max_rows || cols > limits.max_cols {
            return Err(XlKitError::dimension(rows, cols, limits.max_rows, limits.max_cols));
        }
        let cells = (0..rows * cols)
            .map(|_| fill.map_or_else(Operand::missing, Operand::deep_copy))
            .collect::<Box<[_]>>();
        self.replace(Operand::from_cells(rows, cols, cells))?;
        self.as_matrix_mut()
    }

    /// Replace this operand by a deep copy of a matrix
    pub fn set_matrix_copy(&mut self, src: ConstCellMatrixRef<'_>) -> Result<()> {
        let cells = src.iter().map(Operand::deep_copy).collect::<Box<[_]>>();
        self.replace(Operand::from_cells(src.rows(), src.cols(), cells))
    }
}

impl IntoOperand for f64 {
    fn write_into(self, op: &mut Operand) -> Result<()> {
        op.set_number(self)
    }
}

impl IntoOperand for i16 {
    fn write_into(self, op: &mut Operand) -> Result<()> {
        op.set_integer(self)
    }
}

impl IntoOperand for bool {
    fn write_into(self, op: &mut Operand) -> Result<()> {
        op.set_bool(self)
    }
}

impl IntoOperand for ErrorCode {
    fn write_into(self, op: &mut Operand) -> Result<()> {
        op.set_error(self)
    }
}

impl IntoOperand for &str {
    fn write_into(self, op: &mut Operand) -> Result<()> {
        op.set_str(self)
    }
}

impl IntoOperand for String {
    fn write_into(self, op: &mut Operand) -> Result<()> {
        op.set_str(&self)
    }
}

impl IntoOperand for &String {
    fn write_into(self, op: &mut Operand) -> Result<()> {
        op.set_str(self)
    }
}

impl IntoOperand for ConstCellMatrixRef<'_> {
    fn write_into(self, op: &mut Operand) -> Result<()> {
        op.set_matrix_copy(self)
    }
}

impl IntoOperand for Operand {
    fn write_into(self, op: &mut Operand) -> Result<()> {
        op.replace(self)
    }
}

impl IntoOperand for &Operand {
    fn write_into(self, op: &mut Operand) -> Result<()> {
        op.assign(self)
    }
}

// ####################################################################################################################
// 5. GETTERS AND COERCIONS
// ####################################################################################################################

/// Types that can be read out of an operand with `Operand::get`.
pub trait FromOperand<'a>: Sized {
    fn from_operand(op: &'a Operand) -> Result<Self>;
}

impl Operand {
    /// Read the value as `T`. If the operand holds a different kind a coercion is attempted:
    /// numbers, integers, strings and booleans convert into each other, everything else fails
    /// with a type mismatch.
    pub fn get<'a, T: FromOperand<'a>>(&'a self) -> Result<T> {
        T::from_operand(self)
    }

    /// Immutable view of a matrix operand. Never coerced.
    pub fn as_matrix(&self) -> Result<ConstCellMatrixRef<'_>> {
        if !self.is_matrix() {
            return Err(XlKitError::type_mismatch(kind_name(self.0.xltype), "cell matrix"));
        }
        let array = unsafe { self.0.val.array };
        let (rows, cols) = (array.rows as usize, array.columns as usize);
        let cells = if rows * cols == 0 || array.lparray.is_null() {
            Default::default()
        } else {
            unsafe { slice::from_raw_parts(array.lparray as *const Operand, rows * cols) }
        };
        Ok(ConstCellMatrixRef { cells, rows, cols })
    }

    /// Mutable view of a matrix operand. Never coerced.
    pub fn as_matrix_mut(&mut self) -> Result<CellMatrixRef<'_>> {
        if !self.is_matrix() {
            return Err(XlKitError::type_mismatch(kind_name(self.0.xltype), "cell matrix"));
        }
        let array = unsafe { self.0.val.array };
        let (rows, cols) = (array.rows as usize, array.columns as usize);
        let cells = if rows * cols == 0 || array.lparray.is_null() {
            Default::default()
        } else {
            unsafe { slice::from_raw_parts_mut(array.lparray as *mut Operand, rows * cols) }
        };
        Ok(CellMatrixRef { cells, rows, cols })
    }

    #[track_caller]
    fn unsupported(&self, target: &'static str) -> XlKitError {
        XlKitError::type_mismatch(kind_name(self.0.xltype), target)
    }

    fn cast_number(&self) -> Result<f64> {
        unsafe {
            match self.kind() {
                Kind::Number => Ok(self.0.val.num),
                Kind::Integer => Ok(self.0.val.w as f64),
                Kind::Bool => Ok(if self.0.val.xbool != 0 { 1.0 } else { 0.0 }),
                Kind::Str => {
                    let text = self.text();
                    text.parse::<f64>().map_err(|_| XlKitError::parse(text, "number"))
                }
                _ => Err(self.unsupported("number")),
            }
        }
    }

    fn cast_integer<T>(&self, target: &'static str, from_f64: fn(f64) -> T, from_i16: fn(i16) -> T) -> Result<T>
    where
        T: std::str::FromStr + From<bool>,
    {
        unsafe {
            match self.kind() {
                Kind::Number => Ok(from_f64(self.0.val.num)),
                Kind::Integer => Ok(from_i16(self.0.val.w)),
                Kind::Bool => Ok(T::from(self.0.val.xbool != 0)),
                Kind::Str => {
                    let text = self.text();
                    text.parse::<T>().map_err(|_| XlKitError::parse(text, target))
                }
                _ => Err(self.unsupported(target)),
            }
        }
    }

    fn cast_string(&self) -> Result<String> {
        unsafe {
            match self.kind() {
                Kind::Str => Ok(self.text()),
                Kind::Number => Ok(self.0.val.num.to_string()),
                Kind::Integer => Ok(self.0.val.w.to_string()),
                Kind::Bool => Ok((self.0.val.xbool != 0).to_string()),
                Kind::Error => ErrorCode::from_operand(self).map(|e| e.symbol().to_string()),
                Kind::Missing => Ok("#MISSING".to_string()),
                _ => Err(self.unsupported("string")),
            }
        }
    }

    fn cast_bool(&self) -> Result<bool> {
        unsafe {
            match self.kind() {
                Kind::Bool => Ok(self.0.val.xbool != 0),
                Kind::Number => Ok(self.0.val.num != 0.0),
                Kind::Integer => Ok(self.0.val.w != 0),
                Kind::Str => Ok(self.string_length()? != 0),
                _ => Err(self.unsupported("bool")),
            }
        }
    }
}

impl FromOperand<'_> for f64 {
    fn from_operand(op: &Operand) -> Result<f64> {
        op.cast_number()
    }
}

impl FromOperand<'_> for i16 {
    fn from_operand(op: &Operand) -> Result<i16> {
        op.cast_integer("16-bit integer", |n| n as i16, |w| w)
    }
}

impl FromOperand<'_> for i32 {
    fn from_operand(op: &Operand) -> Result<i32> {
        op.cast_integer("32-bit integer", |n| n as i32, i32::from)
    }
}

impl FromOperand<'_> for u16 {
    fn from_operand(op: &Operand) -> Result<u16> {
        op.cast_integer("unsigned 16-bit integer", |n| n as u16, |w| w as u16)
    }
}

impl FromOperand<'_> for bool {
    fn from_operand(op: &Operand) -> Result<bool> {
        op.cast_bool()
    }
}

impl FromOperand<'_> for String {
    fn from_operand(op: &Operand) -> Result<String> {
        op.cast_string()
    }
}

/// Raw string bytes, for efficiency only: does not convert other kinds.
impl<'a> FromOperand<'a> for &'a [u8] {
    fn from_operand(op: &'a Operand) -> Result<&'a [u8]> {
        op.str_bytes()
            .ok_or_else(|| XlKitError::type_mismatch(kind_name(op.0.xltype), "string bytes"))
    }
}

impl FromOperand<'_> for ErrorCode {
    fn from_operand(op: &Operand) -> Result<ErrorCode> {
        if !op.is_error() {
            return Err(XlKitError::type_mismatch(kind_name(op.0.xltype), "error code"));
        }
        let code = unsafe { op.0.val.err };
        ErrorCode::from_raw(code).ok_or_else(|| XlKitError::UnknownErrorCode {
            code,
            location: crate::error::Location::caller(),
        })
    }
}

impl<'a> FromOperand<'a> for ConstCellMatrixRef<'a> {
    fn from_operand(op: &'a Operand) -> Result<ConstCellMatrixRef<'a>> {
        op.as_matrix()
    }
}

// ####################################################################################################################
// 6. MATRIX VIEWS
// ####################################################################################################################

/// Mutable row-major view of a matrix operand. Indexing outside `rows() x cols()` panics.
#[derive(Debug)]
pub struct CellMatrixRef<'a> {
    cells: &'a mut [Operand],
    rows: usize,
    cols: usize,
}

/// Immutable row-major view of a matrix operand.
#[derive(Debug, Clone, Copy)]
pub struct ConstCellMatrixRef<'a> {
    cells: &'a [Operand],
    rows: usize,
    cols: usize,
}

impl<'a> CellMatrixRef<'a> {
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn as_const(&self) -> ConstCellMatrixRef<'_> {
        ConstCellMatrixRef {
            cells: &*self.cells,
            rows: self.rows,
            cols: self.cols,
        }
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        self.cells.iter_mut()
    }
}

impl<'a> From<CellMatrixRef<'a>> for ConstCellMatrixRef<'a> {
    fn from(m: CellMatrixRef<'a>) -> ConstCellMatrixRef<'a> {
        ConstCellMatrixRef {
            cells: m.cells,
            rows: m.rows,
            cols: m.cols,
        }
    }
}

impl<'a> ConstCellMatrixRef<'a> {
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get(&self, i: usize, j: usize) -> Option<&'a Operand> {
        if i < self.rows && j < self.cols {
            self.cells.get(i * self.cols + j)
        } else {
            None
        }
    }

    /// Cells in row-major order
    pub fn iter(&self) -> slice::Iter<'a, Operand> {
        self.cells.iter()
    }
}

impl Index<(usize, usize)> for CellMatrixRef<'_> {
    type Output = Operand;

    fn index(&self, (i, j): (usize, usize)) -> &Operand {
        debug_assert!(j < self.cols, "column {} out of range", j);
        &self.cells[i * self.cols + j]
    }
}

impl IndexMut<(usize, usize)> for CellMatrixRef<'_> {
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut Operand {
        debug_assert!(j < self.cols, "column {} out of range", j);
        &mut self.cells[i * self.cols + j]
    }
}

impl Index<(usize, usize)> for ConstCellMatrixRef<'_> {
    type Output = Operand;

    fn index(&self, (i, j): (usize, usize)) -> &Operand {
        debug_assert!(j < self.cols, "column {} out of range", j);
        &self.cells[i * self.cols + j]
    }
}

// ####################################################################################################################
// 7. FORMATTING
// ####################################################################################################################

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind() {
            Kind::Matrix => write!(
                f,
                "#MULTI({}x{})",
                self.cell_matrix_rows().unwrap_or(0),
                self.cell_matrix_cols().unwrap_or(0)
            ),
            Kind::Nil => write!(f, "#NIL"),
            Kind::Reference => match self.reference_areas() {
                Some((_, areas)) if areas.len() == 1 => {
                    let r = areas[0];
                    write!(f, "Ref:({},{}) -> ({},{})", r.rwFirst, r.colFirst, r.rwLast, r.colLast)
                }
                Some((_, areas)) => write!(f, "Ref:[{} areas]", areas.len()),
                None => write!(f, "#REF_ERR"),
            },
            _ => match self.cast_string() {
                Ok(s) => write!(f, "{}", s),
                Err(_) => write!(f, "#BAD_XLOPER {}", self.0.xltype),
            },
        }
    }
}

impl fmt::Debug for Operand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Operand({}: {})", kind_name(self.0.xltype), self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xlcall::XLMREF;

    fn host_string(buf: &mut Vec<u8>) -> Operand {
        let mut raw = Operand::missing().into_xloper();
        raw.xltype = xltypeStr | xlbitXLFree;
        raw.val.str = buf.as_mut_ptr();
        unsafe { Operand::from_xloper(raw) }
    }

    /// Strip the ownership bits before drop so the test buffer is never touched.
    fn release_host(mut op: Operand) {
        op.init();
    }

    #[test]
    fn fresh_operand_is_missing_and_zeroed() {
        let op = Operand::default();
        assert!(op.is_missing());
        assert_eq!(op.ownership(), Ownership::Borrowed);
        assert_eq!(unsafe { op.0.val.num }, 0.0);
        assert_eq!(std::mem::size_of::<Operand>(), std::mem::size_of::<XLOPER>());
    }

    #[test]
    fn set_and_get_same_kind() {
        let mut op = Operand::missing();
        op.set(2.5).unwrap();
        assert_eq!(op.get::<f64>().unwrap(), 2.5);
        op.set(-7i16).unwrap();
        assert_eq!(op.get::<i16>().unwrap(), -7);
        op.set(true).unwrap();
        assert!(op.get::<bool>().unwrap());
        op.set(ErrorCode::NA).unwrap();
        assert_eq!(op.get::<ErrorCode>().unwrap(), ErrorCode::NA);
        op.set("hello").unwrap();
        assert_eq!(op.get::<String>().unwrap(), "hello");
        assert_eq!(op.ownership(), Ownership::Library);
    }

    #[test]
    fn strings_truncate_on_char_boundary() {
        let long = "x".repeat(300);
        let op = Operand::string(&long);
        assert_eq!(op.string_length().unwrap(), 255);

        let op = Operand::string_with_limit("héllo", 2);
        assert_eq!(op.get::<String>().unwrap(), "h");
        let op = Operand::string_with_limit("héllo", 3);
        assert_eq!(op.get::<String>().unwrap(), "hé");
    }

    #[test]
    fn coercions() {
        assert_eq!(Operand::string("42").get::<f64>().unwrap(), 42.0);
        assert_eq!(Operand::string("42").get::<i16>().unwrap(), 42);
        assert_eq!(Operand::number(3.9).get::<i16>().unwrap(), 3);
        assert_eq!(Operand::boolean(true).get::<f64>().unwrap(), 1.0);
        assert_eq!(Operand::integer(12).get::<String>().unwrap(), "12");
        assert_eq!(Operand::error(ErrorCode::Div0).get::<String>().unwrap(), "#DIV/0!");
        assert_eq!(Operand::missing().get::<String>().unwrap(), "#MISSING");
        assert!(!Operand::string("").get::<bool>().unwrap());
        assert!(Operand::string("false").get::<bool>().unwrap());
        assert!(!Operand::number(0.0).get::<bool>().unwrap());
        assert!(Operand::integer(-1).get::<bool>().unwrap());
    }

    #[test]
    fn failed_parse_reports_text() {
        let err = Operand::string("abc").get::<f64>().unwrap_err();
        assert!(matches!(err, XlKitError::Parse { ref text, .. } if text == "abc"));
        let err = Operand::string("70000").get::<i16>().unwrap_err();
        assert!(matches!(err, XlKitError::Parse { .. }));
    }

    #[test]
    fn uncoercible_kinds_are_type_mismatches() {
        assert!(matches!(Operand::nil().get::<bool>(), Err(XlKitError::TypeMismatch { .. })));
        assert!(matches!(Operand::missing().get::<f64>(), Err(XlKitError::TypeMismatch { .. })));
        assert!(matches!(Operand::number(1.0).get::<ErrorCode>(), Err(XlKitError::TypeMismatch { .. })));
        assert!(matches!(Operand::integer(1).get::<&[u8]>(), Err(XlKitError::TypeMismatch { .. })));
    }

    #[test]
    fn matrix_view_rejects_every_other_kind() {
        let others = [
            Operand::missing(),
            Operand::nil(),
            Operand::number(1.0),
            Operand::integer(1),
            Operand::boolean(false),
            Operand::error(ErrorCode::Ref),
            Operand::string("m"),
            Operand::sref(XLREF::default()),
        ];
        for op in others.iter() {
            assert!(matches!(op.as_matrix(), Err(XlKitError::TypeMismatch { .. })), "{:?}", op);
            assert!(matches!(op.get::<ConstCellMatrixRef>(), Err(XlKitError::TypeMismatch { .. })));
        }
    }

    #[test]
    fn set_matrix_fills_row_major() {
        let mut op = Operand::missing();
        let fill = Operand::string("f");
        {
            let m = op.set_matrix(2, 2, Some(&fill)).unwrap();
            assert_eq!((m.rows(), m.cols()), (2, 2));
        }
        let m = op.as_matrix().unwrap();
        for i in 0..2 {
            for j in 0..2 {
                assert_eq!(m[(i, j)].get::<String>().unwrap(), "f");
                assert_eq!(m[(i, j)].ownership(), Ownership::Library);
            }
        }

        let mut op = Operand::missing();
        let mut m = op.set_matrix(2, 3, None).unwrap();
        assert!(m.iter_mut().all(|c| c.is_missing()));
        m[(1, 2)].set(5.0).unwrap();
        m[(0, 1)].set(1.0).unwrap();
        let m = ConstCellMatrixRef::from(m);
        assert_eq!(m.iter().position(|c| c.is_number() && c.get::<f64>().unwrap() == 5.0), Some(5));
        assert_eq!(m.get(0, 1).unwrap().get::<f64>().unwrap(), 1.0);
        assert!(m.get(2, 0).is_none());
    }

    #[test]
    fn empty_matrices_are_valid() {
        let mut op = Operand::missing();
        op.set_matrix(0, 3, None).unwrap();
        assert_eq!(op.cell_matrix_rows().unwrap(), 0);
        assert_eq!(op.cell_matrix_cols().unwrap(), 3);
        assert!(op.as_matrix().unwrap().is_empty());
        op.set_matrix(4, 0, None).unwrap();
        assert_eq!(op.as_matrix().unwrap().rows(), 4);
        let copy = op.clone();
        assert_eq!(copy.cell_matrix_cols().unwrap(), 0);
    }

    #[test]
    fn oversized_matrix_is_rejected() {
        let mut op = Operand::missing();
        let err = op.set_matrix(1, 100_000, None).unwrap_err();
        assert!(matches!(err, XlKitError::Dimension { .. }));
        assert!(op.is_missing());
    }

    #[test]
    fn matrix_views_print_their_shape() {
        let mut op = Operand::missing();
        let m = op.set_matrix(1, 2, None).unwrap();
        assert!(format!("{:?}", m).contains("rows: 1, cols: 2"));
        let m = op.as_matrix().unwrap();
        assert!(format!("{:?}", m).contains("rows: 1, cols: 2"));
    }

    #[test]
    fn library_clone_is_deep() {
        let mut a = Operand::missing();
        a.set_matrix(1, 2, Some(&Operand::string("abc"))).unwrap();
        let b = a.clone();
        a.as_matrix_mut().unwrap()[(0, 0)].set("changed").unwrap();
        assert_eq!(b.as_matrix().unwrap()[(0, 0)].get::<String>().unwrap(), "abc");
        assert_ne!(a.as_ptr(), b.as_ptr());
    }

    #[test]
    fn host_owned_reset_is_refused() {
        let mut buf = vec![3u8, b'a', b'b', b'c'];
        let mut op = host_string(&mut buf);
        assert_eq!(op.ownership(), Ownership::Host);
        assert!(op.is_string());
        assert_eq!(op.get::<String>().unwrap(), "abc");
        let err = op.reset().unwrap_err();
        assert!(matches!(err, XlKitError::OwnershipViolation { ref kind, .. } if kind == "xltypeStr|xlbitXLFree"));
        assert!(op.set(1.0).is_err());
        assert!(op.is_string());

        let copy = op.clone();
        assert_eq!(copy.ownership(), Ownership::Borrowed);
        assert_eq!(copy.str_bytes().unwrap().as_ptr(), op.str_bytes().unwrap().as_ptr());
        release_host(op);
    }

    #[test]
    fn host_owned_matrix_reset_is_refused() {
        let mut cells = vec![Operand::number(1.0), Operand::number(2.0)];
        let mut raw = Operand::missing().into_xloper();
        raw.xltype = xltypeMulti | xlbitXLFree;
        raw.val.array = XloperArray {
            lparray: cells.as_mut_ptr() as LPXLOPER,
            rows: 1,
            columns: 2,
        };
        let mut op = unsafe { Operand::from_xloper(raw) };
        assert!(op.is_matrix());
        assert_eq!(op.as_matrix().unwrap()[(0, 1)].get::<f64>().unwrap(), 2.0);
        assert!(matches!(op.reset(), Err(XlKitError::OwnershipViolation { .. })));
        release_host(op);
    }

    #[test]
    fn take_moves_ownership() {
        let mut a = Operand::string("moved");
        let b = a.take();
        assert!(a.is_missing());
        assert_eq!(b.get::<String>().unwrap(), "moved");
        assert_eq!(b.ownership(), Ownership::Library);
    }

    #[test]
    fn assign_deep_copies_borrowed_strings() {
        let mut buf = vec![2u8, b'h', b'i'];
        let mut raw = Operand::missing().into_xloper();
        raw.xltype = xltypeStr;
        raw.val.str = buf.as_mut_ptr();
        let arg = unsafe { Operand::from_raw(&raw) };

        let mut op = Operand::missing();
        op.set(arg).unwrap();
        assert_eq!(op.ownership(), Ownership::Library);
        assert_ne!(op.str_bytes().unwrap().as_ptr(), arg.str_bytes().unwrap().as_ptr());
        assert_eq!(op.get::<String>().unwrap(), "hi");
    }

    #[test]
    fn references_expose_their_areas() {
        let area = XLREF { rwFirst: 1, rwLast: 3, colFirst: 0, colLast: 1 };
        let op = Operand::sref(area);
        assert!(op.is_reference());
        assert_eq!(op.reference_areas(), Some((None, vec![area])));

        let mut mref = XLMREF { count: 1, reftbl: [area] };
        let mut raw = Operand::missing().into_xloper();
        raw.xltype = xltypeRef;
        raw.val.mref = crate::xlcall::XloperMRef { lpmref: &mut mref, idSheet: 7 };
        let op = unsafe { Operand::from_raw(&raw) };
        assert_eq!(op.reference_areas(), Some((Some(7), vec![area])));
    }

    #[test]
    fn kind_names_include_ownership_bits() {
        assert_eq!(kind_name(xltypeMulti | xlbitDLLFree), "xltypeMulti|xlbitDLLFree");
        assert_eq!(kind_name(xltypeBigData), "xltypeBigData");
        assert_eq!(kind_name(xltypeNum), "xltypeNum");
    }
}
