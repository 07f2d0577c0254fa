//! Per-type metadata used to build the signature string Excel wants at registration time.
//!
//! Every type that may appear as a parameter or return value of an exported function implements
//! [`XlType`]; the table below is the complete list. A function whose signature mentions any
//! other type does not implement [`XlFunction`] and cannot be registered.

use std::borrow::Cow;
use std::ffi::{CStr, c_char};
use std::marker::PhantomData;
use std::mem::size_of;
use std::ops::Deref;

use crate::operand::Operand;
use crate::result::ResultOperandPtr;

/// What the registration protocol needs to know about a parameter type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeMetadata {
    pub size: usize,
    /// Excel's single character type code, e.g. 'B' for a double passed by value
    pub code: char,
    /// Shown in the function wizard's argument list
    pub name: &'static str,
    pub help: &'static str,
}

pub trait XlType {
    const METADATA: TypeMetadata;
}

/// A null terminated byte string Excel passes for parameters of type 'C'.
#[repr(transparent)]
#[derive(Debug, Clone, Copy)]
pub struct HostStr(*const c_char);

impl HostStr {
    pub fn is_null(&self) -> bool {
        self.0.is_null()
    }

    pub fn as_ptr(&self) -> *const c_char {
        self.0
    }

    /// Text of the string, with invalid UTF-8 replaced. Null reads as empty.
    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        if self.0.is_null() {
            return Cow::Borrowed("");
        }
        // Excel keeps the buffer alive for the duration of the call
        unsafe { CStr::from_ptr(self.0) }.to_string_lossy()
    }
}

impl From<&CStr> for HostStr {
    fn from(s: &CStr) -> HostStr {
        HostStr(s.as_ptr())
    }
}

macro_rules! xl_type_table {
    ($($t:ty => $code:literal, $name:literal, $help:literal;)*) => {
        $(
            impl XlType for $t {
                const METADATA: TypeMetadata = TypeMetadata {
                    size: size_of::<Self>(),
                    code: $code,
                    name: $name,
                    help: $help,
                };
            }
        )*
    };
}

xl_type_table! {
    f64 => 'B', "Number", "Number";
    HostStr => 'C', "String", "String";
    *const c_char => 'C', "String", "String";
    u16 => 'H', "Unsigned Integer", "Unsigned Integer";
    i16 => 'I', "Signed Integer", "Signed Integer";
    i32 => 'J', "Long Integer", "Signed Integer";
    &Operand => 'P', "Range", "Cell or Cell Range";
    *const Operand => 'P', "Range", "Cell or Cell Range";
    *mut Operand => 'P', "Range", "Cell or Cell Range";
    ResultOperandPtr => 'P', "Result", "Result";
}

// ####################################################################################################################
// PARAMETER HELP
// ####################################################################################################################

/// Display name and help for a parameter, attached through [`Parm`]. Declare with
/// [`xlkit_parm!`](crate::xlkit_parm).
pub trait ParmHelp {
    const NAME: &'static str;
    const HELP: &'static str;
}

/// A parameter of type `T` whose display name and help come from `H` instead of `T`'s defaults.
/// Same layout as `T`, so Excel passes it exactly like a bare `T`.
#[repr(transparent)]
pub struct Parm<T, H: ParmHelp>(T, PhantomData<H>);

impl<T, H: ParmHelp> Parm<T, H> {
    pub fn new(value: T) -> Parm<T, H> {
        Parm(value, PhantomData)
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T: Clone, H: ParmHelp> Clone for Parm<T, H> {
    fn clone(&self) -> Self {
        Parm(self.0.clone(), PhantomData)
    }
}

impl<T: Copy, H: ParmHelp> Copy for Parm<T, H> {}

impl<T, H: ParmHelp> Deref for Parm<T, H> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: XlType, H: ParmHelp> XlType for Parm<T, H> {
    const METADATA: TypeMetadata = TypeMetadata {
        name: H::NAME,
        help: H::HELP,
        ..T::METADATA
    };
}

/// Declare a help tag for [`Parm`]: `xlkit_parm!(Diameter, "Diameter of the circle");`
#[macro_export]
macro_rules! xlkit_parm {
    ($(#[$meta:meta])* $vis:vis $tag:ident, $help:literal) => {
        $(#[$meta])*
        $vis struct $tag;

        impl $crate::types::ParmHelp for $tag {
            const NAME: &'static str = stringify!($tag);
            const HELP: &'static str = $help;
        }
    };
}

// ####################################################################################################################
// FUNCTION SIGNATURES
// ####################################################################################################################

/// Return code first, then one code per parameter in declared order
pub fn signature(ret: &TypeMetadata, params: &[TypeMetadata]) -> String {
    std::iter::once(ret).chain(params).map(|m| m.code).collect()
}

/// Parameter display names joined for the function wizard
pub fn arg_names(params: &[TypeMetadata]) -> String {
    params.iter().map(|m| m.name).collect::<Vec<_>>().join(", ")
}

pub fn arg_help(params: &[TypeMetadata]) -> Vec<&'static str> {
    params.iter().map(|m| m.help).collect()
}

/// Implemented for every Rust function (or closure) whose return and parameter types all have
/// metadata. `Args` is the tuple of parameter types and only exists to keep the impls apart.
///
/// `extern "system"` functions, which is what Excel calls, do not implement the `Fn` traits.
/// They are described from their spelled-out parameter types instead, see
/// [`xlkit_descriptor!`](crate::xlkit_descriptor).
pub trait XlFunction<Args> {
    fn return_type() -> TypeMetadata;
    fn parameter_types() -> Vec<TypeMetadata>;

    fn signature() -> String {
        signature(&Self::return_type(), &Self::parameter_types())
    }

    fn arg_names() -> String {
        arg_names(&Self::parameter_types())
    }

    fn arg_help() -> Vec<&'static str> {
        arg_help(&Self::parameter_types())
    }
}

macro_rules! impl_xl_function {
    ($($arg:ident),*) => {
        impl<F, R, $($arg,)*> XlFunction<($($arg,)*)> for F
        where
            F: Fn($($arg),*) -> R,
            R: XlType,
            $($arg: XlType,)*
        {
            fn return_type() -> TypeMetadata {
                R::METADATA
            }

            fn parameter_types() -> Vec<TypeMetadata> {
                vec![$($arg::METADATA),*]
            }
        }
    };
}

impl_xl_function!();
impl_xl_function!(A1);
impl_xl_function!(A1, A2);
impl_xl_function!(A1, A2, A3);
impl_xl_function!(A1, A2, A3, A4);
impl_xl_function!(A1, A2, A3, A4, A5);
impl_xl_function!(A1, A2, A3, A4, A5, A6);
impl_xl_function!(A1, A2, A3, A4, A5, A6, A7);
impl_xl_function!(A1, A2, A3, A4, A5, A6, A7, A8);
impl_xl_function!(A1, A2, A3, A4, A5, A6, A7, A8, A9);
impl_xl_function!(A1, A2, A3, A4, A5, A6, A7, A8, A9, A10);
impl_xl_function!(A1, A2, A3, A4, A5, A6, A7, A8, A9, A10, A11);
impl_xl_function!(A1, A2, A3, A4, A5, A6, A7, A8, A9, A10, A11, A12);
impl_xl_function!(A1, A2, A3, A4, A5, A6, A7, A8, A9, A10, A11, A12, A13);
impl_xl_function!(A1, A2, A3, A4, A5, A6, A7, A8, A9, A10, A11, A12, A13, A14);
impl_xl_function!(A1, A2, A3, A4, A5, A6, A7, A8, A9, A10, A11, A12, A13, A14, A15);
impl_xl_function!(A1, A2, A3, A4, A5, A6, A7, A8, A9, A10, A11, A12, A13, A14, A15, A16);

/// Signature of a function value, e.g. `signature_of(&circ)`
pub fn signature_of<Args, F: XlFunction<Args>>(_f: &F) -> String {
    F::signature()
}
