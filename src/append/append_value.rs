use ndarray::{ArrayD, Dimension, IxDyn};

use super::AppendError;

/// A value appended to a path.
///
/// This is the closed set of inputs accepted by [`AppendSession::append`](super::AppendSession::append).
/// Values are normally built with [`From`], for example from primitives, [`Vec`]s, arrays, tuples, or [`ndarray::Array`]s.
///
/// Every value is normalized to an [`ndarray::ArrayD<f64>`] before it is buffered:
///  - scalars become zero dimensional arrays,
///  - sequences become arrays with a leading dimension of the sequence length, and must not be ragged,
///  - [`Text`](AppendValue::Text) is not numeric and is always rejected.
#[derive(Clone, Debug, PartialEq)]
pub enum AppendValue {
    /// A boolean, stored as `0` or `1`.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// An unsigned integer.
    UInt(u64),
    /// A floating point number.
    Float(f64),
    /// A string.
    Text(String),
    /// A list or tuple of values.
    Sequence(Vec<AppendValue>),
    /// An n-dimensional array.
    Array(ArrayD<f64>),
}

impl AppendValue {
    /// Returns true if the value is a scalar.
    #[must_use]
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Self::Bool(_) | Self::Int(_) | Self::UInt(_) | Self::Float(_)
        )
    }

    /// Normalize the value to an [`ndarray::ArrayD<f64>`] by walking nested sequences.
    ///
    /// # Errors
    /// Returns [`AppendError::InvalidValue`] if the value contains text or a ragged sequence.
    pub fn to_ndarray(&self) -> Result<ArrayD<f64>, AppendError> {
        let mut elements = Vec::new();
        let shape = self.flatten_into(&mut elements)?;
        ArrayD::from_shape_vec(IxDyn(&shape), elements)
            .map_err(|err| AppendError::InvalidValue(err.to_string()))
    }

    /// Append the elements of the value to `elements` in C order and return its shape.
    #[allow(clippy::cast_precision_loss)]
    fn flatten_into(&self, elements: &mut Vec<f64>) -> Result<Vec<usize>, AppendError> {
        match self {
            Self::Bool(value) => elements.push(f64::from(u8::from(*value))),
            Self::Int(value) => elements.push(*value as f64),
            Self::UInt(value) => elements.push(*value as f64),
            Self::Float(value) => elements.push(*value),
            Self::Text(value) => {
                return Err(AppendError::InvalidValue(format!(
                    "{value:?} is not numeric"
                )))
            }
            Self::Array(array) => {
                elements.extend(array.iter().copied());
                return Ok(array.shape().to_vec());
            }
            Self::Sequence(items) => {
                let mut item_shape: Option<Vec<usize>> = None;
                for item in items {
                    let shape = item.flatten_into(elements)?;
                    match &item_shape {
                        Some(expected) if *expected != shape => {
                            return Err(AppendError::InvalidValue(format!(
                                "ragged sequence with item shapes {expected:?} and {shape:?}"
                            )));
                        }
                        Some(_) => {}
                        None => item_shape = Some(shape),
                    }
                }
                let mut shape = vec![items.len()];
                shape.extend(item_shape.unwrap_or_default());
                return Ok(shape);
            }
        }
        Ok(Vec::new())
    }
}

/// Converts an [`AppendValue`] into the element buffered for a path.
///
/// A converter is chosen once per path from the first value appended to it and is never changed afterwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueConverter {
    /// Scalars and arrays are used as is.
    ///
    /// Selected when the first value is a scalar or an array.
    /// A sequence appended to an identity path is still coerced.
    Identity,
    /// Nested sequences are coerced to an array.
    ///
    /// Selected when the first value is a sequence.
    Coerce,
}

impl ValueConverter {
    /// Select the converter for the first value appended to a path.
    ///
    /// # Errors
    /// Returns [`AppendError::InvalidValue`] if the value is not numeric.
    pub fn for_value(value: &AppendValue) -> Result<Self, AppendError> {
        match value {
            AppendValue::Text(text) => Err(AppendError::InvalidValue(format!(
                "{text:?} is not numeric"
            ))),
            AppendValue::Sequence(_) => Ok(Self::Coerce),
            _ => Ok(Self::Identity),
        }
    }

    /// Convert `value` to an element.
    ///
    /// # Errors
    /// Returns [`AppendError::InvalidValue`] if the value cannot be normalized.
    pub fn convert(self, value: AppendValue) -> Result<ArrayD<f64>, AppendError> {
        match (self, value) {
            (Self::Identity, AppendValue::Array(array)) => Ok(array),
            (Self::Identity, AppendValue::Float(value)) => {
                Ok(ArrayD::from_elem(IxDyn(&[]), value))
            }
            (_, value) => value.to_ndarray(),
        }
    }
}

impl From<bool> for AppendValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

macro_rules! append_value_from {
    ($variant:ident, $target:ty, $($t:ty),+) => {
        $(
            impl From<$t> for AppendValue {
                fn from(value: $t) -> Self {
                    Self::$variant(<$target>::from(value))
                }
            }
        )+
    };
}

append_value_from!(Int, i64, i8, i16, i32, i64);
append_value_from!(UInt, u64, u8, u16, u32, u64);
append_value_from!(Float, f64, f32, f64);

impl From<half::f16> for AppendValue {
    fn from(value: half::f16) -> Self {
        Self::Float(value.to_f64())
    }
}

impl From<&str> for AppendValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for AppendValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl<T: Into<AppendValue>> From<Vec<T>> for AppendValue {
    fn from(values: Vec<T>) -> Self {
        Self::Sequence(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<AppendValue>, const N: usize> From<[T; N]> for AppendValue {
    fn from(values: [T; N]) -> Self {
        Self::Sequence(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Clone + Into<AppendValue>> From<&[T]> for AppendValue {
    fn from(values: &[T]) -> Self {
        Self::Sequence(values.iter().cloned().map(Into::into).collect())
    }
}

macro_rules! append_value_from_tuple {
    ($($name:ident),+) => {
        impl<$($name: Into<AppendValue>),+> From<($($name,)+)> for AppendValue {
            #[allow(non_snake_case)]
            fn from(($($name,)+): ($($name,)+)) -> Self {
                Self::Sequence(vec![$($name.into()),+])
            }
        }
    };
}

append_value_from_tuple!(A);
append_value_from_tuple!(A, B);
append_value_from_tuple!(A, B, C);
append_value_from_tuple!(A, B, C, D);

impl<A, D> From<ndarray::Array<A, D>> for AppendValue
where
    A: Clone + num::ToPrimitive,
    D: Dimension,
{
    fn from(array: ndarray::Array<A, D>) -> Self {
        Self::Array(
            array
                .mapv(|element| element.to_f64().unwrap_or(f64::NAN))
                .into_dyn(),
        )
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{array, Array2};

    use super::*;

    #[test]
    fn append_value_from() {
        assert_eq!(AppendValue::from(true), AppendValue::Bool(true));
        assert_eq!(AppendValue::from(-3i8), AppendValue::Int(-3));
        assert_eq!(AppendValue::from(3u16), AppendValue::UInt(3));
        assert_eq!(AppendValue::from(1.5f32), AppendValue::Float(1.5));
        assert_eq!(AppendValue::from("text"), AppendValue::Text("text".to_string()));
        assert_eq!(
            AppendValue::from((1, 2.5, false)),
            AppendValue::Sequence(vec![
                AppendValue::Int(1),
                AppendValue::Float(2.5),
                AppendValue::Bool(false)
            ])
        );
        assert!(AppendValue::from(1).is_scalar());
        assert!(!AppendValue::from(vec![1]).is_scalar());
    }

    #[test]
    fn append_value_to_ndarray() {
        let value = AppendValue::from([[1, 2, 3], [4, 5, 6]]);
        let array = value.to_ndarray().unwrap();
        assert_eq!(array, array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]].into_dyn());

        let array = AppendValue::from(7u8).to_ndarray().unwrap();
        assert_eq!(array.ndim(), 0);
        assert_eq!(array.sum(), 7.0);

        let value = AppendValue::from(vec![(true, 1), (false, 0)]);
        assert_eq!(value.to_ndarray().unwrap().shape(), &[2, 2]);

        let empty: Vec<f64> = Vec::new();
        assert_eq!(AppendValue::from(empty).to_ndarray().unwrap().shape(), &[0]);
    }

    #[test]
    fn append_value_to_ndarray_nested_arrays() {
        let rows = vec![Array2::<u8>::ones((2, 3)), Array2::<u8>::zeros((2, 3))];
        let array = AppendValue::from(rows).to_ndarray().unwrap();
        assert_eq!(array.shape(), &[2, 2, 3]);
        assert_eq!(array.sum(), 6.0);
    }

    #[test]
    fn append_value_invalid() {
        assert!(matches!(
            AppendValue::from("1.0").to_ndarray(),
            Err(AppendError::InvalidValue(_))
        ));
        let ragged = AppendValue::Sequence(vec![
            AppendValue::from([1, 2]),
            AppendValue::from([1, 2, 3]),
        ]);
        assert!(matches!(ragged.to_ndarray(), Err(AppendError::InvalidValue(_))));
        let mixed = AppendValue::Sequence(vec![AppendValue::from(1), AppendValue::from("a")]);
        assert!(matches!(mixed.to_ndarray(), Err(AppendError::InvalidValue(_))));
    }

    #[test]
    fn value_converter() {
        assert_eq!(
            ValueConverter::for_value(&AppendValue::from(1.0)).unwrap(),
            ValueConverter::Identity
        );
        assert_eq!(
            ValueConverter::for_value(&AppendValue::from(array![1.0, 2.0])).unwrap(),
            ValueConverter::Identity
        );
        assert_eq!(
            ValueConverter::for_value(&AppendValue::from(vec![1, 2])).unwrap(),
            ValueConverter::Coerce
        );
        assert!(ValueConverter::for_value(&AppendValue::from("abc")).is_err());

        let element = ValueConverter::Identity
            .convert(AppendValue::from(array![[1, 2]]))
            .unwrap();
        assert_eq!(element.shape(), &[1, 2]);
        let element = ValueConverter::Coerce.convert(AppendValue::from(2.0)).unwrap();
        assert_eq!(element.ndim(), 0);
        assert!(ValueConverter::Identity
            .convert(AppendValue::from("abc"))
            .is_err());
    }
}
