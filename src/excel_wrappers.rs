#![allow(non_snake_case)]

use xlkit_core::operand::kind_name;
use xlkit_core::{Operand, Parm, ResultOperandPtr, XlKitError, guard};
use xlkit_core::{xlkit_parm, xlkit_register, xlkit_register_as};
use xlkit_derive::xl_func;

use crate::stats;

xlkit_parm!(pub Diameter, "Diameter of a circle");
xlkit_parm!(pub DataRange, "Cell range of data");

/// Circumference of a circle. The diameter carries its own help for the function wizard.
#[unsafe(no_mangle)]
pub extern "system" fn xlCirc(diameter: Parm<f64, Diameter>) -> ResultOperandPtr {
    guard(|| Ok::<_, XlKitError>(stats::circumference(*diameter)))
}
xlkit_register!(xlCirc(Parm<f64, Diameter>) -> ResultOperandPtr, "Circumference of circle");

/// Same as xlCirc with a bare f64, so the wizard only shows the default help
#[unsafe(no_mangle)]
pub extern "system" fn xlCircWithoutHelp(diameter: f64) -> ResultOperandPtr {
    guard(|| Ok::<_, XlKitError>(stats::circumference(diameter)))
}
xlkit_register_as!("xlCirc2", xlCircWithoutHelp(f64) -> ResultOperandPtr, "Circumference of circle");

/// Mean and variance of a range as a 1x2 array. Enter with CTRL+SHIFT+ENTER over two cells.
#[unsafe(no_mangle)]
pub extern "system" fn xlStats(cells: Parm<&Operand, DataRange>) -> ResultOperandPtr {
    let cells = cells.into_inner();
    guard(move || {
        let src = cells.as_matrix()?;
        log::debug!("xlStats over {}x{} cells", src.rows(), src.cols());
        let xs = src.iter().map(|cell| cell.get::<f64>()).collect::<Result<Vec<_>, _>>()?;
        let summary = stats::summarize(&xs).map_err(XlKitError::from)?;
        Ok::<_, XlKitError>(vec![summary.mean, summary.variance])
    })
}
xlkit_register!(xlStats(Parm<&Operand, DataRange>) -> ResultOperandPtr, "Compute mean and variance as 1x2 cell range");

/// Copy of the incoming range
#[unsafe(no_mangle)]
pub extern "system" fn xlMatrixRef(cells: Parm<&Operand, DataRange>) -> ResultOperandPtr {
    let cells = cells.into_inner();
    guard(move || cells.as_matrix())
}
xlkit_register!(xlMatrixRef(Parm<&Operand, DataRange>) -> ResultOperandPtr, "Reference a cell range");

/// Arithmetic mean of the numbers in a range
/// * cells: cell range of data
/// * ret: the mean
#[xl_func(name = "xlMean", category = "Statistics")]
fn mean(cells: &Operand) -> Result<f64, XlKitError> {
    let xs = stats::numbers(cells)?;
    Ok(stats::summarize(&xs)?.mean)
}

/// Kind of value Excel passed in, e.g. xltypeNum
/// * value: any cell or range
#[xl_func(name = "xlTypeOf", category = "Information")]
fn type_of(value: &Operand) -> String {
    kind_name(value.xltype())
}
