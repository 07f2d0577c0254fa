//! Error types shared by the marshalling layer, the registry and the host glue.

use std::fmt;
use std::panic::Location as CallerLocation;

use thiserror::Error;

use crate::entrypoint::XlRet;
use crate::xlcall::{
    xlerrDiv0, xlerrGettingData, xlerrNA, xlerrName, xlerrNull, xlerrNum, xlerrRef, xlerrValue,
};

pub type Result<T> = std::result::Result<T, XlKitError>;

/// Source position an error was raised from, rendered as `file(line)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub file: &'static str,
    pub line: u32,
}

impl Location {
    #[track_caller]
    pub fn caller() -> Location {
        let loc = CallerLocation::caller();
        Location {
            file: loc.file(),
            line: loc.line(),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let base = self
            .file
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(self.file);
        write!(f, "{}({})", base, self.line)
    }
}

/// The error values Excel can hold in a cell. Also usable as an error in its own right: a
/// function that fails with an `ErrorCode` makes that code the cell's value.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    #[error("null intersection")]
    Null = xlerrNull,
    #[error("division by zero")]
    Div0 = xlerrDiv0,
    #[error("invalid value")]
    Value = xlerrValue,
    #[error("invalid reference")]
    Ref = xlerrRef,
    #[error("invalid name")]
    Name = xlerrName,
    #[error("invalid number")]
    Num = xlerrNum,
    #[error("value not available")]
    NA = xlerrNA,
    #[error("data awaited")]
    GettingData = xlerrGettingData,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 8] = [
        ErrorCode::Null,
        ErrorCode::Div0,
        ErrorCode::Value,
        ErrorCode::Ref,
        ErrorCode::Name,
        ErrorCode::Num,
        ErrorCode::NA,
        ErrorCode::GettingData,
    ];

    pub fn from_raw(code: u16) -> Option<ErrorCode> {
        ErrorCode::ALL.into_iter().find(|e| e.raw() == code)
    }

    pub fn raw(self) -> u16 {
        self as u16
    }

    /// The text Excel shows in the cell
    pub fn symbol(self) -> &'static str {
        match self {
            ErrorCode::Null => "#NULL!",
            ErrorCode::Div0 => "#DIV/0!",
            ErrorCode::Value => "#VALUE!",
            ErrorCode::Ref => "#REF!",
            ErrorCode::Name => "#NAME?",
            ErrorCode::Num => "#NUM!",
            ErrorCode::NA => "#N/A",
            ErrorCode::GettingData => "#GETTING_DATA",
        }
    }
}

#[derive(Error, Debug)]
pub enum XlKitError {
    #[error("{location}: Cannot reset memory allocated by Excel ({kind})")]
    OwnershipViolation { kind: String, location: Location },

    #[error("{location}: Cannot convert {from} to {to}")]
    TypeMismatch {
        from: String,
        to: &'static str,
        location: Location,
    },

    #[error("{location}: Cannot parse '{text}' as {target}")]
    Parse {
        text: String,
        target: &'static str,
        location: Location,
    },

    #[error("{location}: {what}")]
    EmptyInput { what: String, location: Location },

    #[error("{location}: Matrix of {rows}x{cols} exceeds the host limit of {max_rows}x{max_cols}")]
    Dimension {
        rows: usize,
        cols: usize,
        max_rows: usize,
        max_cols: usize,
        location: Location,
    },

    #[error("{location}: Unknown Excel error code {code}")]
    UnknownErrorCode { code: u16, location: Location },

    #[error("Failed to register {function} ({signature}): {reason}")]
    Registration {
        function: String,
        signature: String,
        reason: String,
    },

    #[error("{location}: Excel call {xlfn} failed with {ret}")]
    HostCall {
        xlfn: i32,
        ret: XlRet,
        location: Location,
    },

    #[error("Excel callback entry point is unavailable: {0}")]
    HostUnavailable(String),
}

impl XlKitError {
    #[track_caller]
    pub fn ownership_violation(kind: impl Into<String>) -> XlKitError {
        XlKitError::OwnershipViolation {
            kind: kind.into(),
            location: Location::caller(),
        }
    }

    #[track_caller]
    pub fn type_mismatch(from: impl Into<String>, to: &'static str) -> XlKitError {
        XlKitError::TypeMismatch {
            from: from.into(),
            to,
            location: Location::caller(),
        }
    }

    #[track_caller]
    pub fn parse(text: impl Into<String>, target: &'static str) -> XlKitError {
        XlKitError::Parse {
            text: text.into(),
            target,
            location: Location::caller(),
        }
    }

    #[track_caller]
    pub fn empty_input(what: impl Into<String>) -> XlKitError {
        XlKitError::EmptyInput {
            what: what.into(),
            location: Location::caller(),
        }
    }

    #[track_caller]
    pub fn dimension(rows: usize, cols: usize, max_rows: usize, max_cols: usize) -> XlKitError {
        XlKitError::Dimension {
            rows,
            cols,
            max_rows,
            max_cols,
            location: Location::caller(),
        }
    }

    #[track_caller]
    pub fn host_call(xlfn: i32, ret: XlRet) -> XlKitError {
        XlKitError::HostCall {
            xlfn,
            ret,
            location: Location::caller(),
        }
    }

    /// The cell error a failed function call shows in Excel
    pub fn error_code(&self) -> ErrorCode {
        match self {
            XlKitError::EmptyInput { .. } => ErrorCode::Div0,
            XlKitError::Dimension { .. } => ErrorCode::Num,
            _ => ErrorCode::Value,
        }
    }
}
