//! Dense row-major matrix container operations (spec.md §3, §4.3).

use smallvec::SmallVec;

use crate::numeric;
use crate::status::{GuaError, Status};
use crate::value::Value;

pub type Dims = SmallVec<[usize; 4]>;

#[derive(Debug, Clone)]
pub struct MatrixData {
    dimv: Dims,
    cells: Vec<Value>,
}

fn total(dimv: &[usize]) -> usize {
    dimv.iter().product()
}

fn illegal(msg: impl Into<String>) -> GuaError {
    GuaError::new(Status::IllegalOperand, msg)
}

pub fn validate_cell(value: &Value) -> Result<(), GuaError> {
    match value {
        Value::Array(_) | Value::Matrix(_) => {
            Err(GuaError::illegal_assignment("matrix cells cannot be nested Array or Matrix values"))
        }
        _ => Ok(()),
    }
}

impl MatrixData {
    /// `matrix(value, d1[,d2...])`: fills uniformly (spec.md §4.3).
    pub fn filled(dimv: Dims, value: Value) -> Result<Self, GuaError> {
        if dimv.is_empty() || dimv.iter().any(|&d| d == 0) {
            return Err(illegal("matrix dimensions must be >= 1"));
        }
        validate_cell(&value)?;
        let n = total(&dimv);
        Ok(Self { cells: vec![value; n], dimv })
    }

    /// `matrix2D(r, c, v11, v12, ...)`: fills by enumerated row-major values
    /// (spec.md §4.3).
    pub fn from_rows(rows: usize, cols: usize, values: Vec<Value>) -> Result<Self, GuaError> {
        if rows == 0 || cols == 0 {
            return Err(illegal("matrix dimensions must be >= 1"));
        }
        if values.len() != rows * cols {
            return Err(illegal("matrix2D value count does not match dimensions"));
        }
        for v in &values {
            validate_cell(v)?;
        }
        Ok(Self { dimv: Dims::from_slice(&[rows, cols]), cells: values })
    }

    pub fn dimv(&self) -> &[usize] {
        &self.dimv
    }

    pub fn dimc(&self) -> usize {
        self.dimv.len()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    fn flatten(&self, idx: &[usize]) -> Result<usize, GuaError> {
        if idx.len() != self.dimv.len() {
            return Err(illegal("matrix index arity does not match dimensions"));
        }
        let mut flat = 0usize;
        for (i, &d) in idx.iter().enumerate() {
            if d >= self.dimv[i] {
                return Err(GuaError::new(Status::IndexOutOfBound, "matrix index out of bound"));
            }
            flat = flat * self.dimv[i] + d;
        }
        Ok(flat)
    }

    /// `getMatrixElement` (spec.md §6).
    pub fn get(&self, idx: &[usize]) -> Result<Value, GuaError> {
        let flat = self.flatten(idx)?;
        Ok(self.cells[flat].clone())
    }

    /// `setMatrixElement` (spec.md §6).
    pub fn set(&mut self, idx: &[usize], value: Value) -> Result<(), GuaError> {
        validate_cell(&value)?;
        let flat = self.flatten(idx)?;
        self.cells[flat] = value;
        Ok(())
    }

    fn require_2d_or_less(&self, other: &MatrixData) -> Result<(), GuaError> {
        if self.dimc() > 2 || other.dimc() > 2 {
            return Err(illegal("matrix operator requires dimc <= 2"));
        }
        Ok(())
    }

    fn require_same_shape(&self, other: &MatrixData) -> Result<(), GuaError> {
        if self.dimv != other.dimv {
            return Err(illegal("matrix operands must have matching dimensions"));
        }
        Ok(())
    }

    fn elementwise(
        &self,
        other: &MatrixData,
        op: impl Fn(&Value, &Value) -> Result<Value, GuaError>,
    ) -> Result<MatrixData, GuaError> {
        self.require_same_shape(other)?;
        let cells = self
            .cells
            .iter()
            .zip(other.cells.iter())
            .map(|(a, b)| op(a, b))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(MatrixData { dimv: self.dimv.clone(), cells })
    }

    /// Add (spec.md §4.3): same `dimv`, `dimc <= 2`, element-wise numeric add.
    pub fn add(&self, other: &MatrixData) -> Result<MatrixData, GuaError> {
        self.require_2d_or_less(other)?;
        self.elementwise(other, numeric::add)
    }

    /// Sub: same constraints as `add`.
    pub fn sub(&self, other: &MatrixData) -> Result<MatrixData, GuaError> {
        self.require_2d_or_less(other)?;
        self.elementwise(other, numeric::sub)
    }

    /// Element-wise unary minus; any `dimc`.
    pub fn negate(&self) -> Result<MatrixData, GuaError> {
        let cells = self.cells.iter().map(numeric::neg).collect::<Result<Vec<_>, _>>()?;
        Ok(MatrixData { dimv: self.dimv.clone(), cells })
    }

    /// Matrix * matrix: requires `A.dimv[1] == B.dimv[0]` and both `dimc <= 2`
    /// (spec.md §4.3).
    pub fn matmul(&self, other: &MatrixData) -> Result<MatrixData, GuaError> {
        self.require_2d_or_less(other)?;
        if self.dimc() != 2 || other.dimc() != 2 {
            return Err(illegal("matrix multiply requires 2-D operands"));
        }
        let (m, k) = (self.dimv[0], self.dimv[1]);
        let (k2, p) = (other.dimv[0], other.dimv[1]);
        if k != k2 {
            return Err(illegal("matrix multiply: inner dimensions do not match"));
        }
        let mut cells = Vec::with_capacity(m * p);
        for i in 0..m {
            for j in 0..p {
                let mut acc = Value::Integer(0);
                for t in 0..k {
                    let a = &self.cells[i * k + t];
                    let b = &other.cells[t * p + j];
                    acc = numeric::add(&acc, &numeric::mul(a, b)?)?;
                }
                cells.push(acc);
            }
        }
        Ok(MatrixData { dimv: Dims::from_slice(&[m, p]), cells })
    }

    /// Broadcasts a scalar against every cell (either operand order).
    pub fn scalar_mul(&self, scalar: &Value) -> Result<MatrixData, GuaError> {
        let cells = self.cells.iter().map(|c| numeric::mul(c, scalar)).collect::<Result<Vec<_>, _>>()?;
        Ok(MatrixData { dimv: self.dimv.clone(), cells })
    }

    /// n x n real identity matrix.
    pub fn ident(n: usize) -> Result<MatrixData, GuaError> {
        if n == 0 {
            return Err(illegal("ident() requires n >= 1"));
        }
        let mut cells = vec![Value::Real(0.0); n * n];
        for i in 0..n {
            cells[i * n + i] = Value::Real(1.0);
        }
        Ok(MatrixData { dimv: Dims::from_slice(&[n, n]), cells })
    }

    fn as_real_grid(&self) -> Result<(usize, Vec<f64>), GuaError> {
        if self.dimc() != 2 || self.dimv[0] != self.dimv[1] {
            return Err(illegal("inv() requires a square 2-D matrix"));
        }
        let n = self.dimv[0];
        let mut grid = Vec::with_capacity(n * n);
        for c in &self.cells {
            let s = numeric::Scalar::from_value(c).ok_or_else(|| illegal_operand_inv())?;
            grid.push(s.as_f64());
        }
        Ok((n, grid))
    }

    /// Gauss-Jordan inverse (spec.md §4.3): converts to `Real` in place and
    /// returns the inverse, or `Status::Singular` if the diagonal product is
    /// zero during elimination.
    pub fn inv(&self) -> Result<MatrixData, GuaError> {
        let (n, mut a) = self.as_real_grid()?;
        let mut inv = vec![0.0f64; n * n];
        for i in 0..n {
            inv[i * n + i] = 1.0;
        }
        for col in 0..n {
            // partial pivot
            let mut pivot_row = col;
            let mut pivot_val = a[col * n + col].abs();
            for r in (col + 1)..n {
                if a[r * n + col].abs() > pivot_val {
                    pivot_row = r;
                    pivot_val = a[r * n + col].abs();
                }
            }
            if pivot_val == 0.0 {
                return Err(GuaError::new(Status::Singular, "matrix is singular"));
            }
            if pivot_row != col {
                for c in 0..n {
                    a.swap(col * n + c, pivot_row * n + c);
                    inv.swap(col * n + c, pivot_row * n + c);
                }
            }
            let pivot = a[col * n + col];
            for c in 0..n {
                a[col * n + c] /= pivot;
                inv[col * n + c] /= pivot;
            }
            for r in 0..n {
                if r == col {
                    continue;
                }
                let factor = a[r * n + col];
                if factor != 0.0 {
                    for c in 0..n {
                        a[r * n + c] -= factor * a[col * n + c];
                        inv[r * n + c] -= factor * inv[col * n + c];
                    }
                }
            }
        }
        let cells = inv.into_iter().map(Value::Real).collect();
        Ok(MatrixData { dimv: Dims::from_slice(&[n, n]), cells })
    }

    /// `pow(A, n)` (spec.md §4.3): `n=0 -> Ident`, `n=-1 -> Inv`, `n<-1`
    /// error, `n>0` repeated multiply.
    pub fn pow(&self, n: i64) -> Result<MatrixData, GuaError> {
        if self.dimc() != 2 || self.dimv[0] != self.dimv[1] {
            return Err(illegal("matrix pow requires a square 2-D matrix"));
        }
        match n {
            0 => Self::ident(self.dimv[0]),
            -1 => self.inv(),
            n if n < -1 => Err(illegal("matrix pow exponent < -1 is undefined")),
            n => {
                let mut result = self.clone();
                for _ in 1..n {
                    result = result.matmul(self)?;
                }
                Ok(result)
            }
        }
    }

    fn elementwise_bool(
        &self,
        other: &MatrixData,
        op: impl Fn(bool, bool) -> bool,
    ) -> Result<MatrixData, GuaError> {
        self.require_same_shape(other)?;
        let cells = self
            .cells
            .iter()
            .zip(other.cells.iter())
            .map(|(a, b)| {
                let av = truthy_numeric(a)?;
                let bv = truthy_numeric(b)?;
                Ok(Value::Integer(op(av, bv) as i64))
            })
            .collect::<Result<Vec<_>, GuaError>>()?;
        Ok(MatrixData { dimv: self.dimv.clone(), cells })
    }

    pub fn and(&self, other: &MatrixData) -> Result<MatrixData, GuaError> {
        self.elementwise_bool(other, |a, b| a && b)
    }

    pub fn or(&self, other: &MatrixData) -> Result<MatrixData, GuaError> {
        self.elementwise_bool(other, |a, b| a || b)
    }

    /// `&|`: boolean matrix multiply, same shape constraint as `matmul`
    /// (spec.md §4.3, §4.4 level 13).
    pub fn and_or(&self, other: &MatrixData) -> Result<MatrixData, GuaError> {
        self.require_2d_or_less(other)?;
        if self.dimc() != 2 || other.dimc() != 2 || self.dimv[1] != other.dimv[0] {
            return Err(illegal("&| requires compatible 2-D operands"));
        }
        let (m, k, p) = (self.dimv[0], self.dimv[1], other.dimv[1]);
        let mut cells = Vec::with_capacity(m * p);
        for i in 0..m {
            for j in 0..p {
                let mut acc = false;
                for t in 0..k {
                    let a = truthy_numeric(&self.cells[i * k + t])?;
                    let b = truthy_numeric(&other.cells[t * p + j])?;
                    acc = acc || (a && b);
                }
                cells.push(Value::Integer(acc as i64));
            }
        }
        Ok(MatrixData { dimv: Dims::from_slice(&[m, p]), cells })
    }

    pub fn is_equal(&self, other: &MatrixData) -> bool {
        if self.dimv != other.dimv {
            return false;
        }
        self.cells.iter().zip(other.cells.iter()).all(|(a, b)| crate::expr::values_equal(a, b))
    }

    /// `isMatrixApproximatelyEqual`: per-element tolerance comparison
    /// (spec.md §4.3, §6).
    pub fn is_approx_equal(&self, other: &MatrixData, tolerance: f64) -> bool {
        if self.dimv != other.dimv {
            return false;
        }
        self.cells.iter().zip(other.cells.iter()).all(|(a, b)| match (a, b) {
            (Value::String(x), Value::String(y)) => x.as_ref() == y.as_ref(),
            _ => match (numeric::Scalar::from_value(a), numeric::Scalar::from_value(b)) {
                (Some(sa), Some(sb)) => (sa.as_f64() - sb.as_f64()).abs() <= tolerance,
                _ => false,
            },
        })
    }

    /// Canonical literal rendering: `,` between columns, `;` between rows for
    /// 2-D matrices; `,` between all cells for higher dimension (spec.md §6).
    pub fn to_string_literal(&self) -> String {
        let mut out = String::from("[");
        if self.dimc() == 2 {
            let (rows, cols) = (self.dimv[0], self.dimv[1]);
            for r in 0..rows {
                if r > 0 {
                    out.push(';');
                }
                for c in 0..cols {
                    if c > 0 {
                        out.push(',');
                    }
                    out.push_str(&self.cells[r * cols + c].to_string());
                }
            }
        } else {
            for (i, cell) in self.cells.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&cell.to_string());
            }
        }
        out.push(']');
        out
    }
}

fn truthy_numeric(v: &Value) -> Result<bool, GuaError> {
    match numeric::Scalar::from_value(v) {
        Some(s) => Ok(s.as_f64() != 0.0),
        None => Err(illegal("matrix logical operator requires numeric cells")),
    }
}

fn illegal_operand_inv() -> GuaError {
    illegal("inv() requires numeric cells")
}
