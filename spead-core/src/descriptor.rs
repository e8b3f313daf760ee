//! The item descriptor model.

/// Metadata describing the type, name, and shape of one item within a
/// heap. Descriptors travel on the wire as embedded sub-heaps; the codec
/// crate handles that encoding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Descriptor {
    /// ID of the item being described. Must lie in the legal item-ID
    /// range of the flavour used for encoding.
    pub id: u64,

    /// Short name of the item.
    pub name: String,

    /// Free-form description.
    pub description: String,

    /// Element format as `(type code, bit width)` pairs, e.g. `(b'u', 32)`
    /// for a 32-bit unsigned integer.
    pub format: Vec<(u8, u64)>,

    /// Array shape. A negative dimension is variable-length.
    pub shape: Vec<i64>,

    /// Optional raw numeric-dtype header, passed through verbatim.
    pub dtype: Option<Vec<u8>>,
}

impl Descriptor {
    /// Create a descriptor with the given ID and name and no further
    /// metadata.
    #[must_use]
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            ..Self::default()
        }
    }

    /// True if any dimension of the shape is variable-length.
    #[must_use]
    pub fn is_variable_size(&self) -> bool {
        self.shape.iter().any(|&dim| dim < 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variable_size() {
        let mut d = Descriptor::new(0x1000, "timestamp");
        d.shape = vec![4, 4];
        assert!(!d.is_variable_size());
        d.shape = vec![-1, 4];
        assert!(d.is_variable_size());
    }
}
