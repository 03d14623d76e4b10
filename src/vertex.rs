//! Interleaved vertex layouts.
//!
//! A [`VertexLayout`] is declared once and shared (usually through an `Arc`)
//! by every mesh that stores the same kind of vertex. Attributes are packed in
//! declaration order with no padding, and an attribute's declaration position is
//! also the index it is bound to in the shader program.
//!
//! ```ignore
//! let layout = VertexLayout::define(&[
//!     AttributeSpec::new("position", 3),
//!     AttributeSpec::new("textureCoord", 2),
//! ])?;
//! assert_eq!(layout.stride(), 20);
//! ```

use std::collections::HashMap;

use crate::error::{Result, SandboxError};

/// Numeric type of every component of one attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ComponentType {
    #[default]
    Float,
    Byte,
    UnsignedByte,
    Short,
    UnsignedShort,
}

impl ComponentType {
    /// Size of one component in bytes.
    pub fn size(&self) -> usize {
        match self {
            Self::Float => 4,
            Self::Byte | Self::UnsignedByte => 1,
            Self::Short | Self::UnsignedShort => 2,
        }
    }

    fn write(&self, value: f32, out: &mut Vec<u8>) {
        match self {
            Self::Float => out.extend_from_slice(&value.to_le_bytes()),
            Self::Byte => out.push((value as i8) as u8),
            Self::UnsignedByte => out.push(value as u8),
            Self::Short => out.extend_from_slice(&(value as i16).to_le_bytes()),
            Self::UnsignedShort => out.extend_from_slice(&(value as u16).to_le_bytes()),
        }
    }

    /// Decode one component starting at `bytes[0]`.
    pub fn read(&self, bytes: &[u8]) -> f32 {
        match self {
            Self::Float => f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            Self::Byte => bytes[0] as i8 as f32,
            Self::UnsignedByte => bytes[0] as f32,
            Self::Short => i16::from_le_bytes([bytes[0], bytes[1]]) as f32,
            Self::UnsignedShort => u16::from_le_bytes([bytes[0], bytes[1]]) as f32,
        }
    }
}

/// Declaration of one attribute, before offsets are assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeSpec {
    pub name: String,
    pub component_count: usize,
    pub component_type: ComponentType,
}

impl AttributeSpec {
    pub fn new(name: impl Into<String>, component_count: usize) -> Self {
        Self {
            name: name.into(),
            component_count,
            component_type: ComponentType::Float,
        }
    }

    pub fn with_type(mut self, component_type: ComponentType) -> Self {
        self.component_type = component_type;
        self
    }
}

/// A packed attribute inside a layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    pub name: String,
    /// Binding index, equal to the declaration position.
    pub index: u32,
    pub component_type: ComponentType,
    pub component_count: usize,
    pub byte_offset: usize,
}

impl VertexAttribute {
    pub fn byte_size(&self) -> usize {
        self.component_count * self.component_type.size()
    }
}

/// Everything the pipeline needs to fetch one attribute from a bound buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributePointer {
    pub index: u32,
    pub name: String,
    pub component_type: ComponentType,
    pub component_count: usize,
    pub byte_offset: usize,
    pub stride: usize,
}

/// Ordered set of attributes interleaved into one record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexLayout {
    attributes: Vec<VertexAttribute>,
    stride: usize,
}

impl VertexLayout {
    /// Pack `specs` in declaration order, each immediately after the previous.
    pub fn define(specs: &[AttributeSpec]) -> Result<Self> {
        let mut attributes: Vec<VertexAttribute> = Vec::with_capacity(specs.len());
        let mut byte_offset = 0;

        for (i, spec) in specs.iter().enumerate() {
            if spec.name.is_empty() {
                return Err(SandboxError::InvalidLayout(format!(
                    "attribute {i} has an empty name"
                )));
            }
            if !(1..=4).contains(&spec.component_count) {
                return Err(SandboxError::InvalidLayout(format!(
                    "attribute `{}` has {} components, expected 1 to 4",
                    spec.name, spec.component_count
                )));
            }
            if attributes.iter().any(|a| a.name == spec.name) {
                return Err(SandboxError::InvalidLayout(format!(
                    "attribute `{}` is declared twice",
                    spec.name
                )));
            }

            let attribute = VertexAttribute {
                name: spec.name.clone(),
                index: i as u32,
                component_type: spec.component_type,
                component_count: spec.component_count,
                byte_offset,
            };
            byte_offset += attribute.byte_size();
            attributes.push(attribute);
        }

        Ok(Self {
            attributes,
            stride: byte_offset,
        })
    }

    /// Bytes per vertex.
    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn attributes(&self) -> &[VertexAttribute] {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&VertexAttribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Number of whole vertices stored in `bytes`.
    pub fn vertex_count(&self, bytes: &[u8]) -> usize {
        if self.stride == 0 {
            0
        } else {
            bytes.len() / self.stride
        }
    }

    pub fn attribute_offsets(&self) -> Vec<AttributePointer> {
        self.attributes
            .iter()
            .map(|a| AttributePointer {
                index: a.index,
                name: a.name.clone(),
                component_type: a.component_type,
                component_count: a.component_count,
                byte_offset: a.byte_offset,
                stride: self.stride,
            })
            .collect()
    }
}

/// One vertex: attribute name to component values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VertexRecord {
    values: HashMap<String, Vec<f32>>,
}

impl VertexRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Vec<f32>>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Vec<f32>>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&[f32]> {
        self.values.get(name).map(Vec::as_slice)
    }
}

/// Pack `records` into one little-endian buffer in layout order.
///
/// Every record is validated before anything is written, so a mismatch never
/// yields a partial buffer.
pub fn interleave(layout: &VertexLayout, records: &[VertexRecord]) -> Result<Vec<u8>> {
    for record in records {
        for attribute in layout.attributes() {
            let found = record.get(&attribute.name).map(<[f32]>::len);
            if found != Some(attribute.component_count) {
                return Err(SandboxError::SchemaMismatch {
                    attribute: attribute.name.clone(),
                    expected: attribute.component_count,
                    found,
                });
            }
        }
    }

    let mut data = Vec::with_capacity(records.len() * layout.stride());
    for record in records {
        for attribute in layout.attributes() {
            // presence checked above
            if let Some(values) = record.get(&attribute.name) {
                for &value in values {
                    attribute.component_type.write(value, &mut data);
                }
            }
        }
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn position_uv() -> VertexLayout {
        VertexLayout::define(&[
            AttributeSpec::new("position", 3),
            AttributeSpec::new("uv", 2),
        ])
        .unwrap()
    }

    fn floats(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    #[rstest]
    #[case(&[3], 12)]
    #[case(&[3, 2], 20)]
    #[case(&[4, 3, 2, 1], 40)]
    fn stride_is_sum_of_attribute_sizes(#[case] counts: &[usize], #[case] stride: usize) {
        let specs: Vec<_> = counts
            .iter()
            .enumerate()
            .map(|(i, &n)| AttributeSpec::new(format!("a{i}"), n))
            .collect();
        let layout = VertexLayout::define(&specs).unwrap();

        assert_eq!(layout.stride(), stride);
        let mut expected_offset = 0;
        for (attribute, &n) in layout.attributes().iter().zip(counts) {
            assert_eq!(attribute.byte_offset, expected_offset);
            expected_offset += n * 4;
        }
    }

    #[test]
    fn mixed_component_types_pack_without_padding() {
        let layout = VertexLayout::define(&[
            AttributeSpec::new("position", 3),
            AttributeSpec::new("color", 4).with_type(ComponentType::UnsignedByte),
            AttributeSpec::new("id", 1).with_type(ComponentType::Short),
        ])
        .unwrap();

        let offsets: Vec<_> = layout.attributes().iter().map(|a| a.byte_offset).collect();
        assert_eq!(offsets, vec![0, 12, 16]);
        assert_eq!(layout.stride(), 18);
    }

    #[test]
    fn indices_follow_declaration_order() {
        let layout = position_uv();
        let pointers = layout.attribute_offsets();

        assert_eq!(pointers[0].index, 0);
        assert_eq!(pointers[0].name, "position");
        assert_eq!(pointers[1].index, 1);
        assert_eq!(pointers[1].byte_offset, 12);
        assert!(pointers.iter().all(|p| p.stride == 20));
    }

    #[test]
    fn interleave_orders_attributes_per_record() {
        let layout = position_uv();
        let records = [
            VertexRecord::new()
                .with("position", [1.0, 2.0, 3.0])
                .with("uv", [0.0, 1.0]),
            VertexRecord::new()
                .with("uv", [0.5, 0.25])
                .with("position", [4.0, 5.0, 6.0]),
        ];

        let data = interleave(&layout, &records).unwrap();

        assert_eq!(data.len(), records.len() * layout.stride());
        assert_eq!(
            floats(&data),
            vec![1.0, 2.0, 3.0, 0.0, 1.0, 4.0, 5.0, 6.0, 0.5, 0.25]
        );
        assert_eq!(layout.vertex_count(&data), 2);
    }

    #[test]
    fn interleave_ignores_undeclared_values() {
        let layout = VertexLayout::define(&[AttributeSpec::new("position", 2)]).unwrap();
        let record = VertexRecord::new()
            .with("position", [1.0, 2.0])
            .with("normal", [0.0, 0.0, 1.0]);

        let data = interleave(&layout, &[record]).unwrap();
        assert_eq!(floats(&data), vec![1.0, 2.0]);
    }

    #[test]
    fn interleave_rejects_missing_attribute() {
        let layout = position_uv();
        let records = [
            VertexRecord::new()
                .with("position", [0.0; 3])
                .with("uv", [0.0; 2]),
            VertexRecord::new().with("position", [0.0; 3]),
        ];

        match interleave(&layout, &records) {
            Err(SandboxError::SchemaMismatch {
                attribute,
                expected,
                found,
            }) => {
                assert_eq!(attribute, "uv");
                assert_eq!(expected, 2);
                assert_eq!(found, None);
            }
            other => panic!("expected schema mismatch, got {other:?}"),
        }
    }

    #[test]
    fn interleave_rejects_wrong_component_count() {
        let layout = position_uv();
        let record = VertexRecord::new()
            .with("position", [0.0, 0.0])
            .with("uv", [0.0, 0.0]);

        assert!(matches!(
            interleave(&layout, &[record]),
            Err(SandboxError::SchemaMismatch { found: Some(2), expected: 3, .. })
        ));
    }

    #[test]
    fn define_rejects_bad_declarations() {
        assert!(matches!(
            VertexLayout::define(&[AttributeSpec::new("position", 5)]),
            Err(SandboxError::InvalidLayout(_))
        ));
        assert!(matches!(
            VertexLayout::define(&[
                AttributeSpec::new("position", 3),
                AttributeSpec::new("position", 2)
            ]),
            Err(SandboxError::InvalidLayout(_))
        ));
        assert!(matches!(
            VertexLayout::define(&[AttributeSpec::new("", 1)]),
            Err(SandboxError::InvalidLayout(_))
        ));
    }

    #[test]
    fn non_float_components_round_through_bytes() {
        let layout = VertexLayout::define(&[
            AttributeSpec::new("color", 4).with_type(ComponentType::UnsignedByte),
            AttributeSpec::new("offset", 1).with_type(ComponentType::Short),
        ])
        .unwrap();
        let record = VertexRecord::new()
            .with("color", [255.0, 128.0, 0.0, 1.0])
            .with("offset", [-300.0]);

        let data = interleave(&layout, &[record]).unwrap();

        assert_eq!(&data[..4], &[255, 128, 0, 1]);
        assert_eq!(ComponentType::Short.read(&data[4..]), -300.0);
    }
}
