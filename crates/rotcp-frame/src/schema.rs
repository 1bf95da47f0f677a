use std::ops::Range;

use rotcp_codec::Codec;

use crate::element::{ElementDescriptor, ElementKind, ElementLength};
use crate::error::{FrameError, Result, SchemaError};

/// How the Length element's value relates to the payload size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LengthCoverage {
    /// Length counts payload plus checksum bytes.
    #[default]
    PayloadAndChecksum,
    /// Length counts every fixed element between Length and Payload plus
    /// the payload itself.
    HeaderAndPayload,
}

/// Validated, immutable ordered list of frame elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSchema {
    elements: Vec<ElementDescriptor>,
    coverage: LengthCoverage,
}

impl FrameSchema {
    /// Validate `elements` and assign each its position.
    ///
    /// Rules: the first element is the preamble and the last the checksum;
    /// each kind appears at most once; a function code is always present;
    /// a payload requires a preceding length element; only the payload has
    /// a dynamic width.
    pub fn new(
        mut elements: Vec<ElementDescriptor>,
    ) -> std::result::Result<Self, SchemaError> {
        let (first, last) = match (elements.first(), elements.last()) {
            (Some(first), Some(last)) => (first.kind(), last.kind()),
            _ => return Err(SchemaError::Empty),
        };
        if first != ElementKind::Preamble {
            return Err(SchemaError::PreambleNotFirst(first));
        }
        if last != ElementKind::Checksum {
            return Err(SchemaError::ChecksumNotLast(last));
        }

        let mut seen = Vec::with_capacity(elements.len());
        for element in &elements {
            let kind = element.kind();
            if seen.contains(&kind) {
                return Err(SchemaError::Duplicate(kind));
            }
            seen.push(kind);
            check_width(element)?;
            check_codec(element)?;
        }

        let position = |kind| seen.iter().position(|k| *k == kind);
        if position(ElementKind::FunctionCode).is_none() {
            return Err(SchemaError::Missing(ElementKind::FunctionCode));
        }
        if let Some(payload) = position(ElementKind::Payload) {
            match position(ElementKind::Length) {
                None => return Err(SchemaError::Missing(ElementKind::Length)),
                Some(length) if length > payload => return Err(SchemaError::LengthAfterPayload),
                Some(_) => {}
            }
        }

        for (index, element) in elements.iter_mut().enumerate() {
            element.set_index(index);
        }
        Ok(Self {
            elements,
            coverage: LengthCoverage::default(),
        })
    }

    pub fn with_coverage(mut self, coverage: LengthCoverage) -> Self {
        self.coverage = coverage;
        self
    }

    pub fn coverage(&self) -> LengthCoverage {
        self.coverage
    }

    pub fn elements(&self) -> &[ElementDescriptor] {
        &self.elements
    }

    /// The element of `kind`, if the schema has one.
    pub fn element(&self, kind: ElementKind) -> Option<&ElementDescriptor> {
        self.elements.iter().find(|e| e.kind() == kind)
    }

    /// The preamble element. Always present in a validated schema.
    pub fn preamble(&self) -> &ElementDescriptor {
        &self.elements[0]
    }

    /// The checksum element. Always present in a validated schema.
    pub fn checksum(&self) -> &ElementDescriptor {
        &self.elements[self.elements.len() - 1]
    }

    /// Element indices whose bytes the checksum covers: everything after the
    /// length element (or after the preamble when there is none) up to, not
    /// including, the checksum.
    pub fn checksum_range(&self) -> Range<usize> {
        let start = self
            .element(ElementKind::Length)
            .map_or(1, |length| length.index() + 1);
        start..self.checksum().index()
    }

    /// Sum of fixed widths strictly between the Length and Payload elements.
    fn inner_header_len(&self) -> usize {
        let (Some(length), Some(payload)) = (
            self.element(ElementKind::Length),
            self.element(ElementKind::Payload),
        ) else {
            return 0;
        };
        self.elements[length.index() + 1..payload.index()]
            .iter()
            .filter_map(ElementDescriptor::fixed_len)
            .sum()
    }

    /// Bytes not belonging to the payload that the Length value counts.
    fn length_overhead(&self) -> usize {
        match self.coverage {
            LengthCoverage::PayloadAndChecksum => self.checksum().fixed_len().unwrap_or(0),
            LengthCoverage::HeaderAndPayload => self.inner_header_len(),
        }
    }

    /// Payload read length for a decoded Length value.
    pub fn payload_len(&self, frame_length: u64) -> Result<usize> {
        let frame_length = usize::try_from(frame_length).map_err(|_| {
            FrameError::Malformed(format!("length value {frame_length} exceeds address space"))
        })?;
        let overhead = self.length_overhead();
        frame_length.checked_sub(overhead).ok_or_else(|| {
            FrameError::Malformed(format!(
                "length value {frame_length} smaller than {overhead} non-payload bytes"
            ))
        })
    }

    /// Length value to put on the wire for a payload of `payload_len` bytes.
    pub fn length_value(&self, payload_len: usize) -> u64 {
        (payload_len + self.length_overhead()) as u64
    }

    /// Fixed bytes of a frame, excluding the payload.
    pub fn fixed_len(&self) -> usize {
        self.elements
            .iter()
            .filter_map(ElementDescriptor::fixed_len)
            .sum()
    }
}

fn check_width(element: &ElementDescriptor) -> std::result::Result<(), SchemaError> {
    let kind = element.kind();
    match (kind, element.length_kind()) {
        (ElementKind::Payload, ElementLength::Dynamic) => Ok(()),
        (_, ElementLength::Dynamic) => Err(SchemaError::InvalidWidth { kind, width: 0 }),
        (ElementKind::Payload, ElementLength::Fixed(width)) => {
            Err(SchemaError::InvalidWidth { kind, width })
        }
        (ElementKind::Preamble, ElementLength::Fixed(0)) => Err(SchemaError::EmptyPreamble),
        (_, ElementLength::Fixed(width)) if kind.is_header_integer() && !(1..=8).contains(&width) => {
            Err(SchemaError::InvalidWidth { kind, width })
        }
        (_, ElementLength::Fixed(0)) => Err(SchemaError::InvalidWidth { kind, width: 0 }),
        _ => Ok(()),
    }
}

fn check_codec(element: &ElementDescriptor) -> std::result::Result<(), SchemaError> {
    let kind = element.kind();
    match element.codec() {
        Codec::Binary(_) => Ok(()),
        Codec::Bcd(_) if kind.is_header_integer() => Ok(()),
        codec => Err(SchemaError::UnsupportedCodec {
            kind,
            codec: codec.name(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rotcp_codec::ByteOrder;

    const BE: ByteOrder = ByteOrder::BigEndian;
    const LE: ByteOrder = ByteOrder::LittleEndian;

    fn demo_elements() -> Vec<ElementDescriptor> {
        vec![
            ElementDescriptor::preamble(vec![0x68]),
            ElementDescriptor::length(1, BE),
            ElementDescriptor::encryption_flag(1, BE),
            ElementDescriptor::function_code(1, BE),
            ElementDescriptor::payload(),
            ElementDescriptor::checksum(2, 0, LE),
        ]
    }

    #[test]
    fn assigns_positions() {
        let schema = FrameSchema::new(demo_elements()).expect("schema should build");
        let indices: Vec<usize> = schema.elements().iter().map(|e| e.index()).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(schema.checksum_range(), 2..5);
        assert_eq!(schema.fixed_len(), 6);
    }

    #[test]
    fn payload_len_subtracts_checksum_width() {
        let schema = FrameSchema::new(demo_elements()).expect("schema should build");
        assert_eq!(schema.payload_len(0x0F).expect("length should resolve"), 13);
        assert_eq!(schema.length_value(13), 0x0F);
        assert!(matches!(
            schema.payload_len(1),
            Err(FrameError::Malformed(_))
        ));
    }

    #[test]
    fn header_and_payload_coverage() {
        let schema = FrameSchema::new(vec![
            ElementDescriptor::preamble(vec![0x68]),
            ElementDescriptor::length(1, BE),
            ElementDescriptor::serial_number(2, BE),
            ElementDescriptor::encryption_flag(1, BE),
            ElementDescriptor::function_code(1, BE),
            ElementDescriptor::payload(),
            ElementDescriptor::checksum(2, 0, BE),
        ])
        .expect("schema should build")
        .with_coverage(LengthCoverage::HeaderAndPayload);

        assert_eq!(schema.payload_len(0x22).expect("length should resolve"), 30);
        assert_eq!(schema.length_value(30), 0x22);
    }

    #[test]
    fn rejects_structural_violations() {
        assert_eq!(FrameSchema::new(Vec::new()), Err(SchemaError::Empty));

        let mut swapped = demo_elements();
        swapped.swap(0, 1);
        assert_eq!(
            FrameSchema::new(swapped),
            Err(SchemaError::PreambleNotFirst(ElementKind::Length))
        );

        let mut no_checksum = demo_elements();
        no_checksum.pop();
        assert_eq!(
            FrameSchema::new(no_checksum),
            Err(SchemaError::ChecksumNotLast(ElementKind::Payload))
        );

        let mut duplicated = demo_elements();
        duplicated.insert(2, ElementDescriptor::length(1, BE));
        assert_eq!(
            FrameSchema::new(duplicated),
            Err(SchemaError::Duplicate(ElementKind::Length))
        );

        let mut no_length = demo_elements();
        no_length.remove(1);
        assert_eq!(
            FrameSchema::new(no_length),
            Err(SchemaError::Missing(ElementKind::Length))
        );

        let mut late_length = demo_elements();
        let length = late_length.remove(1);
        late_length.insert(4, length);
        assert_eq!(
            FrameSchema::new(late_length),
            Err(SchemaError::LengthAfterPayload)
        );
    }

    #[test]
    fn rejects_bad_widths() {
        let mut wide = demo_elements();
        wide[1] = ElementDescriptor::length(9, BE);
        assert_eq!(
            FrameSchema::new(wide),
            Err(SchemaError::InvalidWidth {
                kind: ElementKind::Length,
                width: 9
            })
        );

        let mut empty = demo_elements();
        empty[0] = ElementDescriptor::preamble(Vec::new());
        assert_eq!(FrameSchema::new(empty), Err(SchemaError::EmptyPreamble));
    }

    #[test]
    fn bcd_only_on_header_integers() {
        let mut decimal = demo_elements();
        decimal[1] = ElementDescriptor::length(1, BE).bcd();
        let schema = FrameSchema::new(decimal).expect("bcd length should be accepted");
        assert_eq!(schema.elements()[1].codec(), Codec::Bcd(BE));
        assert_eq!(schema.elements()[3].codec(), Codec::Binary(BE));

        let mut checksum = demo_elements();
        checksum[5] = ElementDescriptor::checksum(2, 0, LE).bcd();
        assert_eq!(
            FrameSchema::new(checksum),
            Err(SchemaError::UnsupportedCodec {
                kind: ElementKind::Checksum,
                codec: "bcd"
            })
        );
    }
}
