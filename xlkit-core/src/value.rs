//! An owned, safe mirror of `Operand` for code that would rather match on an enum than poke
//! at the raw union.

use crate::error::{ErrorCode, Result, XlKitError};
use crate::operand::{FromOperand, IntoOperand, Kind, Operand, kind_name};
use crate::xlcall::XLREF;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Integer(i16),
    Str(String),
    Bool(bool),
    Error(ErrorCode),
    Matrix(Matrix),
    Missing,
    Nil,
    Reference(Reference),
}

/// Row-major grid of values
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    cells: Vec<Value>,
}

impl Matrix {
    /// None when `cells` does not hold exactly `rows * cols` values
    pub fn new(rows: usize, cols: usize, cells: Vec<Value>) -> Option<Matrix> {
        (rows * cols == cells.len()).then_some(Matrix { rows, cols, cells })
    }

    /// Build from rows. Short rows are padded with `Value::Missing`.
    pub fn from_rows(rows: Vec<Vec<Value>>) -> Matrix {
        let cols = rows.iter().map(Vec::len).max().unwrap_or(0);
        let nrows = rows.len();
        let mut cells = Vec::with_capacity(nrows * cols);
        for mut row in rows {
            row.resize(cols, Value::Missing);
            cells.extend(row);
        }
        Matrix { rows: nrows, cols, cells }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, i: usize, j: usize) -> Option<&Value> {
        if i < self.rows && j < self.cols {
            self.cells.get(i * self.cols + j)
        } else {
            None
        }
    }

    pub fn cells(&self) -> &[Value] {
        &self.cells
    }
}

/// A reference to one or more rectangular areas. `sheet_id` is None for the current sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub sheet_id: Option<usize>,
    pub areas: Vec<XLREF>,
}

impl Operand {
    pub fn to_value(&self) -> Result<Value> {
        Ok(match self.kind() {
            Kind::Number => Value::Number(self.get()?),
            Kind::Integer => Value::Integer(self.get()?),
            Kind::Str => Value::Str(self.get()?),
            Kind::Bool => Value::Bool(self.get()?),
            Kind::Error => Value::Error(self.get()?),
            Kind::Missing => Value::Missing,
            Kind::Nil => Value::Nil,
            Kind::Matrix => {
                let m = self.as_matrix()?;
                let cells = m.iter().map(Operand::to_value).collect::<Result<Vec<_>>>()?;
                Value::Matrix(Matrix {
                    rows: m.rows(),
                    cols: m.cols(),
                    cells,
                })
            }
            Kind::Reference => match self.reference_areas() {
                Some((sheet_id, areas)) => Value::Reference(Reference { sheet_id, areas }),
                None => return Err(XlKitError::type_mismatch(kind_name(self.xltype()), "value")),
            },
            Kind::Flow | Kind::BigData | Kind::Unknown(_) => {
                return Err(XlKitError::type_mismatch(kind_name(self.xltype()), "value"));
            }
        })
    }

    /// Store `value`. Only current-sheet, single-area references can be written back.
    pub fn set_value(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Number(n) => self.set_number(*n),
            Value::Integer(w) => self.set_integer(*w),
            Value::Str(s) => self.set_str(s),
            Value::Bool(b) => self.set_bool(*b),
            Value::Error(e) => self.set_error(*e),
            Value::Missing => self.reset(),
            Value::Nil => self.set_nil(),
            Value::Matrix(m) => {
                let mut dst = self.set_matrix(m.rows, m.cols, None)?;
                for (cell, v) in dst.iter_mut().zip(&m.cells) {
                    cell.set_value(v)?;
                }
                Ok(())
            }
            Value::Reference(r) => match (r.sheet_id, r.areas.as_slice()) {
                (None, [area]) => self.set_sref(*area),
                _ => Err(XlKitError::type_mismatch("multi-area reference", "single-area reference")),
            },
        }
    }
}

impl FromOperand<'_> for Value {
    fn from_operand(op: &Operand) -> Result<Value> {
        op.to_value()
    }
}

impl IntoOperand for &Value {
    fn write_into(self, op: &mut Operand) -> Result<()> {
        op.set_value(self)
    }
}

impl IntoOperand for Value {
    fn write_into(self, op: &mut Operand) -> Result<()> {
        op.set_value(&self)
    }
}

impl TryFrom<&Value> for Operand {
    type Error = XlKitError;

    fn try_from(value: &Value) -> Result<Operand> {
        let mut op = Operand::missing();
        op.set_value(value)?;
        Ok(op)
    }
}

macro_rules! value_from {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Value {
                    Value::$variant(v.into())
                }
            }
        )*
    };
}

value_from! {
    f64 => Number,
    i16 => Integer,
    bool => Bool,
    ErrorCode => Error,
    String => Str,
    &str => Str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_round_trip() {
        for v in [
            Value::from(1.5),
            Value::from(-3i16),
            Value::from(true),
            Value::from("text"),
            Value::from(ErrorCode::Name),
            Value::Missing,
            Value::Nil,
        ] {
            let op = Operand::try_from(&v).unwrap();
            assert_eq!(op.to_value().unwrap(), v);
        }
    }

    #[test]
    fn matrix_converts_cell_by_cell() {
        let m = Matrix::from_rows(vec![
            vec![Value::from(1.0), Value::from("a")],
            vec![Value::from(false)],
        ]);
        assert_eq!((m.rows(), m.cols()), (2, 2));
        assert_eq!(m.get(1, 1), Some(&Value::Missing));

        let mut op = Operand::missing();
        op.set(Value::Matrix(m.clone())).unwrap();
        assert!(op.is_matrix());
        assert_eq!(op.as_matrix().unwrap()[(0, 1)].get::<String>().unwrap(), "a");
        assert_eq!(op.get::<Value>().unwrap(), Value::Matrix(m));
    }

    #[test]
    fn matrix_new_checks_cell_count() {
        assert!(Matrix::new(2, 2, vec![Value::Nil; 3]).is_none());
        assert!(Matrix::new(0, 5, Vec::new()).is_some());
    }

    #[test]
    fn only_single_area_references_are_written() {
        let area = XLREF { rwFirst: 0, rwLast: 1, colFirst: 2, colLast: 2 };
        let single = Value::Reference(Reference { sheet_id: None, areas: vec![area] });
        let op = Operand::try_from(&single).unwrap();
        assert_eq!(op.to_value().unwrap(), single);

        let multi = Value::Reference(Reference { sheet_id: Some(1), areas: vec![area, area] });
        assert!(matches!(Operand::try_from(&multi), Err(XlKitError::TypeMismatch { .. })));
    }
}
