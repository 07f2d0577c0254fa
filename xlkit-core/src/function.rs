//! The boundary between an exported function and the Rust code behind it. Whatever happens in
//! the body, Excel gets a result operand back: values are written into the result slot, errors
//! become cell errors or messages and panics become `#VALUE!`.

use std::error::Error;
use std::panic::{self, AssertUnwindSafe};

use crate::error::{ErrorCode, Result, XlKitError};
use crate::operand::{ConstCellMatrixRef, Operand};
use crate::result::ResultOperandPtr;
use crate::value::Value;

/// Return values an exported function body may produce
pub trait IntoResultOperand {
    fn into_result_operand(self) -> Result<ResultOperandPtr>;
}

/// Run `body` and translate its outcome into a result operand. Every exported wrapper goes
/// through here exactly once.
pub fn guard<T, E, F>(body: F) -> ResultOperandPtr
where
    F: FnOnce() -> std::result::Result<T, E>,
    T: IntoResultOperand,
    E: Into<Box<dyn Error>>,
{
    match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(Ok(value)) => match value.into_result_operand() {
            Ok(result) => result,
            Err(err) => translate(Box::new(err)),
        },
        Ok(Err(err)) => translate(err.into()),
        Err(payload) => {
            let msg = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            log::error!("Function panicked: {}", msg);
            ResultOperandPtr::from_error(ErrorCode::Value)
        }
    }
}

fn translate(err: Box<dyn Error>) -> ResultOperandPtr {
    if let Some(code) = err.downcast_ref::<ErrorCode>() {
        return ResultOperandPtr::from_error(*code);
    }
    if let Some(err) = err.downcast_ref::<XlKitError>() {
        log::warn!("{}", err);
        return ResultOperandPtr::from_error(err.error_code());
    }
    log::debug!("Returning error text: {}", err);
    ResultOperandPtr::with_text(&err.to_string())
}

impl IntoResultOperand for ResultOperandPtr {
    fn into_result_operand(self) -> Result<ResultOperandPtr> {
        Ok(self)
    }
}

/// Infinities and NaN have no cell representation and show as `#N/A`
impl IntoResultOperand for f64 {
    fn into_result_operand(self) -> Result<ResultOperandPtr> {
        if self.is_finite() {
            ResultOperandPtr::from_value(self)
        } else {
            Ok(ResultOperandPtr::from_error(ErrorCode::NA))
        }
    }
}

macro_rules! result_from_operand_value {
    ($($t:ty),*) => {
        $(
            impl IntoResultOperand for $t {
                fn into_result_operand(self) -> Result<ResultOperandPtr> {
                    ResultOperandPtr::from_value(self)
                }
            }
        )*
    };
}

result_from_operand_value!(i16, bool, &str, String, ErrorCode, Value, Operand);

impl IntoResultOperand for &Operand {
    fn into_result_operand(self) -> Result<ResultOperandPtr> {
        ResultOperandPtr::with_copy(self)
    }
}

impl IntoResultOperand for ConstCellMatrixRef<'_> {
    fn into_result_operand(self) -> Result<ResultOperandPtr> {
        ResultOperandPtr::from_value(self)
    }
}

/// A row vector
impl IntoResultOperand for Vec<f64> {
    fn into_result_operand(self) -> Result<ResultOperandPtr> {
        vec![self].into_result_operand()
    }
}

/// One inner vector per row. Short rows are padded with `#N/A`.
impl IntoResultOperand for Vec<Vec<f64>> {
    fn into_result_operand(self) -> Result<ResultOperandPtr> {
        let rows = self.len();
        let cols = self.iter().map(Vec::len).max().unwrap_or(0);
        let mut result = ResultOperandPtr::new();
        if let Some(op) = result.operand_mut() {
            let pad = Operand::error(ErrorCode::NA);
            let mut m = op.set_matrix(rows, cols, Some(&pad))?;
            for (i, row) in self.iter().enumerate() {
                for (j, x) in row.iter().enumerate() {
                    if x.is_finite() {
                        m[(i, j)].set_number(*x)?;
                    }
                }
            }
        }
        Ok(result)
    }
}
