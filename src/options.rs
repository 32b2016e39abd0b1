//! EXI options: the running configuration of a stream (Spec 5.4,
//! Table 5-1).
//!
//! Besides the header-visible options this carries the EXI profile
//! parameters (`localValuePartitions` and the two grammar-learning caps).
//! The caps are `Option<u32>` internally, `None` meaning unbounded; the
//! profile wire format maps its zero-means-unbounded convention onto this
//! at the header-codec boundary only.

use crate::qname::QName;
use crate::{Error, Result};

/// Alignment of event codes and content items (Spec 5.4, 6.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Alignment {
    /// Fields pack tightly across octet boundaries (default).
    #[default]
    BitPacked,
    /// Every field starts on an octet boundary.
    BytePacked,
    /// Byte-aligned channel layout without the final DEFLATE step.
    PreCompression,
}

/// Schema identification for the body (Spec 5.4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaId {
    /// Explicitly schema-less (`xsi:nil="true"` on the schemaId element).
    None,
    /// No user schema; built-in XML Schema types only (empty schemaId).
    BuiltinOnly,
    /// A user-defined schema identifier, resolved externally.
    Id(String),
}

/// Fidelity options (Spec 5.4, 6.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Preserve {
    /// CM events are retained.
    pub comments: bool,
    /// PI events are retained.
    pub pis: bool,
    /// DT and ER events are retained.
    pub dtd: bool,
    /// NS events and original prefixes are retained.
    pub prefixes: bool,
    /// Lexical value forms are retained.
    pub lexical_values: bool,
}

impl Preserve {
    /// True when any flag deviates from the default.
    pub fn any(&self) -> bool {
        self.comments || self.pis || self.dtd || self.prefixes || self.lexical_values
    }
}

/// One datatype representation map entry (Spec 5.4, 7.4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatatypeRepresentation {
    /// The schema type being remapped.
    pub type_qname: QName,
    /// The representation to use instead.
    pub representation_qname: QName,
}

/// Default channel block size (Spec 9.1).
pub const DEFAULT_BLOCK_SIZE: u32 = 1_000_000;

/// The running configuration of one EXI stream (Spec 5.4).
#[derive(Debug, Clone, PartialEq)]
pub struct ExiOptions {
    pub alignment: Alignment,
    pub compression: bool,
    pub strict: bool,
    pub fragment: bool,
    pub preserve: Preserve,
    pub self_contained: bool,
    pub schema_id: Option<SchemaId>,
    pub datatype_representation_map: Vec<DatatypeRepresentation>,
    pub block_size: u32,
    pub value_max_length: Option<u32>,
    pub value_partition_capacity: Option<u32>,
    /// Profile: local value partitions in use (default true).
    pub local_value_partitions: bool,
    /// Profile: cap on built-in element grammars, `None` = unbounded.
    pub max_built_in_element_grammars: Option<u32>,
    /// Profile: cap on learned productions, `None` = unbounded.
    pub max_built_in_productions: Option<u32>,
}

impl Default for ExiOptions {
    fn default() -> Self {
        Self {
            alignment: Alignment::BitPacked,
            compression: false,
            strict: false,
            fragment: false,
            preserve: Preserve::default(),
            self_contained: false,
            schema_id: None,
            datatype_representation_map: Vec::new(),
            block_size: DEFAULT_BLOCK_SIZE,
            value_max_length: None,
            value_partition_capacity: None,
            local_value_partitions: true,
            max_built_in_element_grammars: None,
            max_built_in_productions: None,
        }
    }
}

impl ExiOptions {
    // --- Builder-Setter ---

    pub fn with_alignment(mut self, alignment: Alignment) -> Self {
        self.alignment = alignment;
        self
    }

    pub fn with_compression(mut self) -> Self {
        self.compression = true;
        self
    }

    pub fn with_strict(mut self) -> Self {
        self.strict = true;
        self
    }

    pub fn with_fragment(mut self) -> Self {
        self.fragment = true;
        self
    }

    pub fn with_preserve(mut self, preserve: Preserve) -> Self {
        self.preserve = preserve;
        self
    }

    pub fn with_self_contained(mut self) -> Self {
        self.self_contained = true;
        self
    }

    pub fn with_schema_id(mut self, schema_id: SchemaId) -> Self {
        self.schema_id = Some(schema_id);
        self
    }

    pub fn with_block_size(mut self, block_size: u32) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn with_value_max_length(mut self, len: u32) -> Self {
        self.value_max_length = Some(len);
        self
    }

    pub fn with_value_partition_capacity(mut self, cap: u32) -> Self {
        self.value_partition_capacity = Some(cap);
        self
    }

    pub fn with_datatype_representation_map(mut self, map: Vec<DatatypeRepresentation>) -> Self {
        self.datatype_representation_map = map;
        self
    }

    /// Sets the three profile parameters at once (Spec 5.4, profile).
    pub fn with_profile(
        mut self,
        local_value_partitions: bool,
        max_element_grammars: Option<u32>,
        max_productions: Option<u32>,
    ) -> Self {
        self.local_value_partitions = local_value_partitions;
        self.max_built_in_element_grammars = max_element_grammars;
        self.max_built_in_productions = max_productions;
        self
    }

    /// True when the profile parameters deviate from their defaults.
    pub fn has_profile(&self) -> bool {
        !self.local_value_partitions
            || self.max_built_in_element_grammars.is_some()
            || self.max_built_in_productions.is_some()
    }

    /// True when every quantity starts on an octet boundary (Spec 6.2):
    /// byte alignment, pre-compression or compression.
    pub fn byte_aligned(&self) -> bool {
        self.compression || self.alignment != Alignment::BitPacked
    }

    /// Validates the option combination (Spec 5.4 schema constraints).
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(Error::UnsupportedOption("blockSize 0".into()));
        }
        if let Some(SchemaId::Id(id)) = &self.schema_id {
            if id.is_empty() {
                return Err(Error::UnsupportedOption(
                    "empty schemaId requires the built-in form".into(),
                ));
            }
        }
        // "alignment" and "compression" exclude each other
        if self.compression && self.alignment != Alignment::BitPacked {
            return Err(Error::UnsupportedOption(
                "compression combined with explicit alignment".into(),
            ));
        }
        // "strict" excludes the preserve flags except lexicalValues, and SC
        let strict_conflict = self.preserve.comments
            || self.preserve.pis
            || self.preserve.dtd
            || self.preserve.prefixes
            || self.self_contained;
        if self.strict && strict_conflict {
            return Err(Error::UnsupportedOption(
                "strict combined with preserve or selfContained".into(),
            ));
        }
        // "selfContained" excludes (pre-)compression
        if self.self_contained
            && (self.compression || self.alignment == Alignment::PreCompression)
        {
            return Err(Error::UnsupportedOption(
                "selfContained combined with compression".into(),
            ));
        }
        Ok(())
    }
}
