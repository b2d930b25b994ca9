use riskgrid_model::AbsoluteCellRange;

use super::Value;

/// A 2-D rectangle of values, either materialised from a graph range or
/// built ad hoc (array literals, vectorised results).
///
/// Values are stored row-major; `width * height == values.len()`.
#[derive(Clone, Debug, PartialEq)]
pub struct SimpleRangeValue {
    width: usize,
    height: usize,
    values: Vec<Value>,
    /// The graph range this rectangle was materialised from, when any.
    pub source: Option<AbsoluteCellRange>,
}

impl SimpleRangeValue {
    /// An ad-hoc rectangle. `values` must have `width * height` entries.
    #[must_use]
    pub fn ad_hoc(width: usize, height: usize, values: Vec<Value>) -> Self {
        debug_assert_eq!(width.saturating_mul(height), values.len());
        Self {
            width,
            height,
            values,
            source: None,
        }
    }

    /// A rectangle materialised from a finite graph range.
    #[must_use]
    pub fn from_range(range: AbsoluteCellRange, values: Vec<Value>) -> Self {
        debug_assert_eq!(range.size(), values.len());
        Self {
            width: range.width() as usize,
            height: range.height() as usize,
            values,
            source: Some(range),
        }
    }

    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub const fn height(&self) -> usize {
        self.height
    }

    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> Option<&Value> {
        if row >= self.height || col >= self.width {
            return None;
        }
        self.values.get(row * self.width + col)
    }

    /// Row-major iteration.
    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.values.iter()
    }

    #[must_use]
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.width * self.height
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use riskgrid_model::SimpleCellAddress;

    #[test]
    fn row_major_access() {
        let rect = SimpleRangeValue::ad_hoc(
            2,
            2,
            vec![
                Value::number(1.0),
                Value::number(2.0),
                Value::number(3.0),
                Value::number(4.0),
            ],
        );
        assert_eq!(rect.get(0, 1), Some(&Value::number(2.0)));
        assert_eq!(rect.get(1, 0), Some(&Value::number(3.0)));
        assert_eq!(rect.get(2, 0), None);
    }

    #[test]
    fn range_backed_rectangle_remembers_its_source() {
        let range = AbsoluteCellRange::new(
            SimpleCellAddress::new(0, 0, 0),
            SimpleCellAddress::new(0, 0, 1),
        );
        let rect =
            SimpleRangeValue::from_range(range, vec![Value::number(1.0), Value::number(2.0)]);
        assert_eq!(rect.source, Some(range));
        assert_eq!(rect.width(), 1);
        assert_eq!(rect.height(), 2);
    }
}
