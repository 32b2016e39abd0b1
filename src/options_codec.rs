//! The embedded options document (Spec 5.4, Appendix C).
//!
//! The header options are an EXI body coded under the fixed options-schema
//! grammar with `strict=true`. SD, ED and trailing EE events are implicit
//! (zero width) throughout; element presence follows the schema sequence,
//! so each state knows its member count and event-code width. Options at
//! their default value are omitted (Spec 5.4).
//!
//! The `uncommon` wildcard slot carries the profile element: an
//! `xsi:type=xsd:decimal` cast whose decimal packs the three profile
//! parameters (sign, integral minus 1, reverse-fractional minus 1).

use crate::bitstream::{BitReader, BitWriter};
use crate::decimal::{self, DecimalValue};
use crate::options::{Alignment, DatatypeRepresentation, ExiOptions, SchemaId};
use crate::qname::QName;
use crate::typed_value::{EXI_NS, XSD_NS};
use crate::unsigned_integer::UnsignedValue;
use crate::{
    Error, Result, bit_width, boolean, context, n_bit_unsigned_integer, string, unsigned_integer,
};

/// DoS clamp for schemaId literals.
const MAX_SCHEMA_ID_LENGTH: u64 = 65_536;

/// Element name of the profile parameters in the EXI namespace.
const PROFILE_NAME: &str = "profile";
/// Historic short form of the profile element, accepted on decode.
const PROFILE_NAME_SHORT: &str = "p";

/// Table D-5: the 46 XSD built-in type names, sorted.
const XSD_LOCAL_NAMES: &[&str] = &[
    "ENTITIES", "ENTITY", "ID", "IDREF", "IDREFS", "NCName", "NMTOKEN", "NMTOKENS",
    "NOTATION", "Name", "QName", "anySimpleType", "anyType", "anyURI", "base64Binary",
    "boolean", "byte", "date", "dateTime", "decimal", "double", "duration", "float",
    "gDay", "gMonth", "gMonthDay", "gYear", "gYearMonth", "hexBinary", "int", "integer",
    "language", "long", "negativeInteger", "nonNegativeInteger", "nonPositiveInteger",
    "normalizedString", "positiveInteger", "short", "string", "time", "token",
    "unsignedByte", "unsignedInt", "unsignedLong", "unsignedShort",
];

/// The options-schema element names in the EXI namespace, sorted
/// (Appendix C, Table D-3 applied to the options schema).
const EXI_LOCAL_NAMES: &[&str] = &[
    "alignment", "blockSize", "byte", "comments", "common", "compression",
    "datatypeRepresentationMap", "dtd", "fragment", "header", "lesscommon",
    "lexicalValues", "pis", "pre-compress", "preserve", "prefixes",
    "schemaId", "selfContained", "strict", "uncommon", "valueMaxLength",
    "valuePartitionCapacity",
];

/// Miniature name table of the options document: the Appendix D
/// pre-population for the options schema. Wire formats are the standard
/// URI and local-name partition schemes (Spec 7.3.1).
struct OptionsNameTable {
    uris: Vec<String>,
    local_names: Vec<Vec<String>>,
}

impl OptionsNameTable {
    fn new() -> Self {
        Self {
            uris: vec![
                String::new(),
                context::XML_NS.to_string(),
                context::XSI_NS.to_string(),
                XSD_NS.to_string(),
                EXI_NS.to_string(),
            ],
            local_names: vec![
                vec![],
                vec!["base".into(), "id".into(), "lang".into(), "space".into()],
                vec!["nil".into(), "type".into()],
                XSD_LOCAL_NAMES.iter().map(|s| s.to_string()).collect(),
                EXI_LOCAL_NAMES.iter().map(|s| s.to_string()).collect(),
            ],
        }
    }

    fn write_uri(&mut self, writer: &mut BitWriter, uri: &str) -> usize {
        let n = bit_width::for_count(self.uris.len() + 1);
        match self.uris.iter().position(|u| u == uri) {
            Some(id) => {
                n_bit_unsigned_integer::encode(writer, id as u64 + 1, n);
                id
            }
            None => {
                n_bit_unsigned_integer::encode(writer, 0, n);
                string::encode(writer, uri);
                self.uris.push(uri.to_string());
                self.local_names.push(Vec::new());
                self.uris.len() - 1
            }
        }
    }

    fn read_uri(&mut self, reader: &mut BitReader) -> Result<usize> {
        let n = bit_width::for_count(self.uris.len() + 1);
        let code = n_bit_unsigned_integer::decode(reader, n)?;
        if code == 0 {
            let uri = string::decode(reader)?;
            match self.uris.iter().position(|u| u == &uri) {
                Some(id) => Ok(id),
                None => {
                    self.uris.push(uri);
                    self.local_names.push(Vec::new());
                    Ok(self.uris.len() - 1)
                }
            }
        } else {
            let id = (code - 1) as usize;
            if id < self.uris.len() {
                Ok(id)
            } else {
                Err(Error::malformed("URI identifier in options document"))
            }
        }
    }

    fn write_local_name(&mut self, writer: &mut BitWriter, uri_id: usize, name: &str) {
        let partition = &mut self.local_names[uri_id];
        match partition.iter().position(|n| n == name) {
            Some(id) => {
                unsigned_integer::encode(writer, 0);
                let n = bit_width::for_count(partition.len());
                n_bit_unsigned_integer::encode(writer, id as u64, n);
            }
            None => {
                string::encode_with_offset(writer, name, 1);
                partition.push(name.to_string());
            }
        }
    }

    fn read_local_name(&mut self, reader: &mut BitReader, uri_id: usize) -> Result<String> {
        let head = unsigned_integer::decode(reader)?;
        let partition = &mut self.local_names[uri_id];
        if head == 0 {
            let n = bit_width::for_count(partition.len());
            let id = n_bit_unsigned_integer::decode(reader, n)? as usize;
            partition
                .get(id)
                .cloned()
                .ok_or_else(|| Error::malformed("local-name identifier in options document"))
        } else {
            let name = string::decode_chars(reader, head - 1)?;
            partition.push(name.clone());
            Ok(name)
        }
    }

    fn write_qname(&mut self, writer: &mut BitWriter, qname: &QName) {
        let uri_id = self.write_uri(writer, &qname.uri);
        self.write_local_name(writer, uri_id, &qname.local_name);
    }

    fn read_qname(&mut self, reader: &mut BitReader) -> Result<QName> {
        let uri_id = self.read_uri(reader)?;
        let name = self.read_local_name(reader, uri_id)?;
        Ok(QName::new(self.uris[uri_id].clone(), name))
    }
}

// === presence predicates (default-valued options are omitted) ===

fn needs_uncommon(opts: &ExiOptions) -> bool {
    opts.has_profile()
        || opts.alignment != Alignment::BitPacked
        || opts.self_contained
        || opts.value_max_length.is_some()
        || opts.value_partition_capacity.is_some()
        || !opts.datatype_representation_map.is_empty()
}

fn needs_lesscommon(opts: &ExiOptions) -> bool {
    needs_uncommon(opts) || opts.preserve.any() || opts.block_size != crate::options::DEFAULT_BLOCK_SIZE
}

fn needs_common(opts: &ExiOptions) -> bool {
    opts.compression || opts.fragment || opts.schema_id.is_some()
}

// === encoding ===

/// Encodes the options document (Spec 5.4, Appendix C).
pub fn encode(writer: &mut BitWriter, options: &ExiOptions) -> Result<()> {
    options.validate()?;

    // SD implizit; DocContent: SE(header)=0, SE(*)=1 (1 Bit)
    n_bit_unsigned_integer::encode(writer, 0, 1);

    // header content: lesscommon=0, common=1, strict=2, EE=3 (2 Bits)
    let lesscommon = needs_lesscommon(options);
    let common = needs_common(options);
    if lesscommon {
        n_bit_unsigned_integer::encode(writer, 0, 2);
        encode_lesscommon(writer, options)?;
        // danach: common=0, strict=1, EE=2 (2 Bits)
        if common {
            n_bit_unsigned_integer::encode(writer, 0, 2);
            encode_common(writer, options);
            encode_strict_or_ee(writer, options.strict);
        } else if options.strict {
            n_bit_unsigned_integer::encode(writer, 1, 2);
        } else {
            n_bit_unsigned_integer::encode(writer, 2, 2);
        }
    } else if common {
        n_bit_unsigned_integer::encode(writer, 1, 2);
        encode_common(writer, options);
        encode_strict_or_ee(writer, options.strict);
    } else if options.strict {
        n_bit_unsigned_integer::encode(writer, 2, 2);
    } else {
        n_bit_unsigned_integer::encode(writer, 3, 2);
    }
    // EE(header) und ED implizit
    Ok(())
}

/// After common: strict=0, EE=1 (1 bit).
fn encode_strict_or_ee(writer: &mut BitWriter, strict: bool) {
    n_bit_unsigned_integer::encode(writer, u64::from(!strict), 1);
}

/// lesscommon: uncommon=0, preserve=1, blockSize=2, EE=3 (2 bits).
fn encode_lesscommon(writer: &mut BitWriter, opts: &ExiOptions) -> Result<()> {
    let uncommon = needs_uncommon(opts);
    let preserve = opts.preserve.any();
    let block_size = opts.block_size != crate::options::DEFAULT_BLOCK_SIZE;

    if uncommon {
        n_bit_unsigned_integer::encode(writer, 0, 2);
        encode_uncommon(writer, opts)?;
        // danach: preserve=0, blockSize=1, EE=2 (2 Bits)
        if preserve {
            n_bit_unsigned_integer::encode(writer, 0, 2);
            encode_preserve(writer, opts);
            encode_block_size_or_ee(writer, opts, block_size);
        } else if block_size {
            n_bit_unsigned_integer::encode(writer, 1, 2);
            unsigned_integer::encode(writer, u64::from(opts.block_size));
        } else {
            n_bit_unsigned_integer::encode(writer, 2, 2);
        }
    } else if preserve {
        n_bit_unsigned_integer::encode(writer, 1, 2);
        encode_preserve(writer, opts);
        encode_block_size_or_ee(writer, opts, block_size);
    } else {
        // needs_lesscommon garantiert blockSize hier
        n_bit_unsigned_integer::encode(writer, 2, 2);
        unsigned_integer::encode(writer, u64::from(opts.block_size));
    }
    Ok(())
}

/// After preserve: blockSize=0, EE=1 (1 bit).
fn encode_block_size_or_ee(writer: &mut BitWriter, opts: &ExiOptions, present: bool) {
    if present {
        n_bit_unsigned_integer::encode(writer, 0, 1);
        unsigned_integer::encode(writer, u64::from(opts.block_size));
    } else {
        n_bit_unsigned_integer::encode(writer, 1, 1);
    }
}

/// Event ordinals of the `uncommon` sequence; the wildcard slot sits
/// first (Appendix C: `xsd:any` precedes the named members).
#[derive(Clone, Copy)]
enum UncommonEvent {
    Wildcard = 0,
    Alignment = 1,
    SelfContained = 2,
    ValueMaxLength = 3,
    ValuePartitionCapacity = 4,
    DatatypeRepMap = 5,
    EndElement = 6,
}

/// Sequence position inside `uncommon`; width and ordinal offset per
/// state follow the remaining member count.
#[derive(Clone, Copy)]
enum UncommonState {
    Start,
    AfterAlignment,
    AfterSelfContained,
    AfterValueMaxLength,
    AfterValuePartitionCapacity,
    AfterDtrm,
}

impl UncommonState {
    fn width(self) -> u8 {
        match self {
            // Start: 7 Mitglieder, nach alignment noch 5
            Self::Start | Self::AfterAlignment => 3,
            Self::AfterSelfContained | Self::AfterValueMaxLength => 2,
            Self::AfterValuePartitionCapacity | Self::AfterDtrm => 1,
        }
    }

    fn offset(self) -> u64 {
        match self {
            Self::Start => 0,
            Self::AfterAlignment => 2,
            Self::AfterSelfContained => 3,
            Self::AfterValueMaxLength => 4,
            Self::AfterValuePartitionCapacity | Self::AfterDtrm => 5,
        }
    }
}

fn emit_uncommon(writer: &mut BitWriter, state: &mut UncommonState, event: UncommonEvent) {
    let code = event as u64 - state.offset();
    n_bit_unsigned_integer::encode(writer, code, state.width());
    *state = match event {
        UncommonEvent::Wildcard => UncommonState::Start,
        UncommonEvent::Alignment => UncommonState::AfterAlignment,
        UncommonEvent::SelfContained => UncommonState::AfterSelfContained,
        UncommonEvent::ValueMaxLength => UncommonState::AfterValueMaxLength,
        UncommonEvent::ValuePartitionCapacity => UncommonState::AfterValuePartitionCapacity,
        UncommonEvent::DatatypeRepMap | UncommonEvent::EndElement => UncommonState::AfterDtrm,
    };
}

fn encode_uncommon(writer: &mut BitWriter, opts: &ExiOptions) -> Result<()> {
    let mut state = UncommonState::Start;
    let mut names = OptionsNameTable::new();

    if opts.has_profile() {
        emit_uncommon(writer, &mut state, UncommonEvent::Wildcard);
        encode_profile(writer, &mut names, opts);
    }
    if opts.alignment != Alignment::BitPacked {
        emit_uncommon(writer, &mut state, UncommonEvent::Alignment);
        // choice: byte=0, pre-compress=1 (1 Bit)
        let code = u64::from(opts.alignment == Alignment::PreCompression);
        n_bit_unsigned_integer::encode(writer, code, 1);
    }
    if opts.self_contained {
        emit_uncommon(writer, &mut state, UncommonEvent::SelfContained);
    }
    if let Some(len) = opts.value_max_length {
        emit_uncommon(writer, &mut state, UncommonEvent::ValueMaxLength);
        unsigned_integer::encode(writer, u64::from(len));
    }
    if let Some(cap) = opts.value_partition_capacity {
        emit_uncommon(writer, &mut state, UncommonEvent::ValuePartitionCapacity);
        unsigned_integer::encode(writer, u64::from(cap));
    }
    for entry in &opts.datatype_representation_map {
        emit_uncommon(writer, &mut state, UncommonEvent::DatatypeRepMap);
        names.write_qname(writer, &entry.type_qname);
        names.write_qname(writer, &entry.representation_qname);
    }
    emit_uncommon(writer, &mut state, UncommonEvent::EndElement);
    Ok(())
}

/// The profile element behind the wildcard: qname, then an
/// `xsi:type=xsd:decimal` cast and the parameter decimal, closed by EE.
/// The attribute and character codes are the built-in StartTagContent
/// deviation codes under default fidelity (Spec 8.4.3).
fn encode_profile(writer: &mut BitWriter, names: &mut OptionsNameTable, opts: &ExiOptions) {
    names.write_qname(writer, &QName::new(EXI_NS, PROFILE_NAME));

    // AT(*) = Deviation-Code 1 von [EE, AT(*), SE(*), CH] (2 Bits)
    n_bit_unsigned_integer::encode(writer, 1, 2);
    names.write_qname(writer, &QName::new(context::XSI_NS, "type"));
    // Wert des xsi:type: der QName xsd:decimal
    names.write_qname(writer, &QName::new(XSD_NS, "decimal"));

    // CH = Deviation-Code 3 (2 Bits), typisiert als Decimal
    n_bit_unsigned_integer::encode(writer, 3, 2);
    let integral = opts.max_built_in_element_grammars.map_or(0, |c| u64::from(c) + 1);
    let rev_fractional = opts.max_built_in_productions.map_or(0, |c| u64::from(c) + 1);
    let dv = DecimalValue {
        negative: opts.local_value_partitions,
        integral: UnsignedValue::from(integral),
        rev_fractional: UnsignedValue::from(rev_fractional),
    };
    decimal::encode(writer, &dv, false);

    // EE im ElementContent: Code 0 in 1 Bit (EE + Deviations)
    n_bit_unsigned_integer::encode(writer, 0, 1);
}

/// preserve: dtd=0, prefixes=1, lexicalValues=2, comments=3, pis=4, EE=5.
fn encode_preserve(writer: &mut BitWriter, opts: &ExiOptions) {
    // Breiten je Zustand: 3,3,2,2,1, dann implizites EE
    let mut present: Vec<u64> = Vec::new();
    let p = opts.preserve;
    for (ordinal, on) in [
        (0, p.dtd),
        (1, p.prefixes),
        (2, p.lexical_values),
        (3, p.comments),
        (4, p.pis),
    ] {
        if on {
            present.push(ordinal);
        }
    }
    let mut offset: u64 = 0;
    for ordinal in present {
        let width = preserve_width(offset);
        n_bit_unsigned_integer::encode(writer, ordinal - offset, width);
        offset = ordinal + 1;
    }
    if offset < 5 {
        // explizites EE
        n_bit_unsigned_integer::encode(writer, 5 - offset, preserve_width(offset));
    }
}

/// Width of the preserve state whose first remaining ordinal is `offset`.
fn preserve_width(offset: u64) -> u8 {
    bit_width::for_count(6 - offset as usize)
}

/// common: compression=0, fragment=1, schemaId=2, EE=3 (2 bits).
fn encode_common(writer: &mut BitWriter, opts: &ExiOptions) {
    let schema_id = opts.schema_id.as_ref();
    if opts.compression {
        n_bit_unsigned_integer::encode(writer, 0, 2);
        // danach: fragment=0, schemaId=1, EE=2 (2 Bits)
        if opts.fragment {
            n_bit_unsigned_integer::encode(writer, 0, 2);
            encode_schema_id_or_ee(writer, schema_id);
        } else if let Some(id) = schema_id {
            n_bit_unsigned_integer::encode(writer, 1, 2);
            encode_schema_id(writer, id);
        } else {
            n_bit_unsigned_integer::encode(writer, 2, 2);
        }
    } else if opts.fragment {
        n_bit_unsigned_integer::encode(writer, 1, 2);
        encode_schema_id_or_ee(writer, schema_id);
    } else if let Some(id) = schema_id {
        n_bit_unsigned_integer::encode(writer, 2, 2);
        encode_schema_id(writer, id);
    } else {
        n_bit_unsigned_integer::encode(writer, 3, 2);
    }
}

/// After fragment: schemaId=0, EE=1 (1 bit).
fn encode_schema_id_or_ee(writer: &mut BitWriter, schema_id: Option<&SchemaId>) {
    match schema_id {
        Some(id) => {
            n_bit_unsigned_integer::encode(writer, 0, 1);
            encode_schema_id(writer, id);
        }
        None => n_bit_unsigned_integer::encode(writer, 1, 1),
    }
}

/// schemaId content: a nillable string. CH = `0`; AT(xsi:nil) = `10`
/// followed by the boolean and the closing EE bit; EE = `11`.
fn encode_schema_id(writer: &mut BitWriter, schema_id: &SchemaId) {
    match schema_id {
        SchemaId::Id(s) => {
            n_bit_unsigned_integer::encode(writer, 0, 1);
            string::encode_with_offset(writer, s, 2);
        }
        SchemaId::None => {
            n_bit_unsigned_integer::encode(writer, 1, 1);
            n_bit_unsigned_integer::encode(writer, 0, 1);
            boolean::encode(writer, true);
            n_bit_unsigned_integer::encode(writer, 1, 1);
        }
        SchemaId::BuiltinOnly => {
            n_bit_unsigned_integer::encode(writer, 1, 1);
            n_bit_unsigned_integer::encode(writer, 1, 1);
        }
    }
}

// === decoding ===

/// Decodes the options document (Spec 5.4, Appendix C).
pub fn decode(reader: &mut BitReader) -> Result<ExiOptions> {
    let mut options = ExiOptions::default();

    let se = n_bit_unsigned_integer::decode(reader, 1)?;
    if se != 0 {
        return Err(Error::malformed("options document must start with header"));
    }

    match n_bit_unsigned_integer::decode(reader, 2)? {
        0 => {
            decode_lesscommon(reader, &mut options)?;
            match n_bit_unsigned_integer::decode(reader, 2)? {
                0 => {
                    decode_common(reader, &mut options)?;
                    options.strict = n_bit_unsigned_integer::decode(reader, 1)? == 0;
                }
                1 => options.strict = true,
                2 => {}
                _ => return Err(Error::malformed("event code after lesscommon")),
            }
        }
        1 => {
            decode_common(reader, &mut options)?;
            options.strict = n_bit_unsigned_integer::decode(reader, 1)? == 0;
        }
        2 => options.strict = true,
        3 => {}
        _ => unreachable!("2-bit code"),
    }

    options.validate()?;
    Ok(options)
}

fn decode_lesscommon(reader: &mut BitReader, opts: &mut ExiOptions) -> Result<()> {
    match n_bit_unsigned_integer::decode(reader, 2)? {
        0 => {
            decode_uncommon(reader, opts)?;
            match n_bit_unsigned_integer::decode(reader, 2)? {
                0 => {
                    decode_preserve(reader, opts)?;
                    if n_bit_unsigned_integer::decode(reader, 1)? == 0 {
                        opts.block_size = decode_u32(reader)?;
                    }
                }
                1 => opts.block_size = decode_u32(reader)?,
                2 => {}
                _ => return Err(Error::malformed("event code after uncommon")),
            }
        }
        1 => {
            decode_preserve(reader, opts)?;
            if n_bit_unsigned_integer::decode(reader, 1)? == 0 {
                opts.block_size = decode_u32(reader)?;
            }
        }
        2 => opts.block_size = decode_u32(reader)?,
        3 => {}
        _ => unreachable!("2-bit code"),
    }
    Ok(())
}

fn decode_uncommon(reader: &mut BitReader, opts: &mut ExiOptions) -> Result<()> {
    let mut state = UncommonState::Start;
    let mut names = OptionsNameTable::new();
    let mut dtrm_types: Vec<QName> = Vec::new();
    let mut dtrm_reprs: Vec<QName> = Vec::new();

    loop {
        let code = n_bit_unsigned_integer::decode(reader, state.width())?;
        let ordinal = code + state.offset();
        match ordinal {
            0 => {
                decode_wildcard(reader, &mut names, opts)?;
                state = UncommonState::Start;
            }
            1 => {
                opts.alignment = match n_bit_unsigned_integer::decode(reader, 1)? {
                    0 => Alignment::BytePacked,
                    _ => Alignment::PreCompression,
                };
                state = UncommonState::AfterAlignment;
            }
            2 => {
                opts.self_contained = true;
                state = UncommonState::AfterSelfContained;
            }
            3 => {
                opts.value_max_length = Some(decode_u32(reader)?);
                state = UncommonState::AfterValueMaxLength;
            }
            4 => {
                opts.value_partition_capacity = Some(decode_u32(reader)?);
                state = UncommonState::AfterValuePartitionCapacity;
            }
            5 => {
                dtrm_types.push(names.read_qname(reader)?);
                dtrm_reprs.push(names.read_qname(reader)?);
                state = UncommonState::AfterDtrm;
            }
            6 => break,
            _ => return Err(Error::malformed("event code in uncommon")),
        }
    }

    // Typ- und Repraesentationsliste muessen paarig sein
    if dtrm_types.len() != dtrm_reprs.len() {
        return Err(Error::malformed(
            "datatype representation map with unpaired entries",
        ));
    }
    for (type_qname, representation_qname) in dtrm_types.into_iter().zip(dtrm_reprs) {
        if crate::typed_value::Datatype::from_representation(&representation_qname).is_none() {
            return Err(Error::UnsupportedOption(format!(
                "datatype representation {representation_qname}"
            )));
        }
        opts.datatype_representation_map.push(DatatypeRepresentation {
            type_qname,
            representation_qname,
        });
    }
    Ok(())
}

/// Decodes one wildcard element inside `uncommon`: the profile element,
/// or an unknown extension that is skipped when it carries no table hits.
fn decode_wildcard(
    reader: &mut BitReader,
    names: &mut OptionsNameTable,
    opts: &mut ExiOptions,
) -> Result<()> {
    let qname = names.read_qname(reader)?;
    let is_profile = &*qname.uri == EXI_NS
        && (&*qname.local_name == PROFILE_NAME || &*qname.local_name == PROFILE_NAME_SHORT);
    if !is_profile {
        log::warn!("skipping unknown header extension element {qname}");
        return skip_wildcard_content(reader, names);
    }

    // AT(*) xsi:type, Wert xsd:decimal
    if n_bit_unsigned_integer::decode(reader, 2)? != 1 {
        return Err(Error::UnsupportedOption("profile element without type cast".into()));
    }
    let at = names.read_qname(reader)?;
    if &*at.uri != context::XSI_NS || &*at.local_name != "type" {
        return Err(Error::UnsupportedOption("profile element without xsi:type".into()));
    }
    let cast = names.read_qname(reader)?;
    if &*cast.uri != XSD_NS || &*cast.local_name != "decimal" {
        return Err(Error::UnsupportedOption(format!("profile cast to {cast}")));
    }

    if n_bit_unsigned_integer::decode(reader, 2)? != 3 {
        return Err(Error::UnsupportedOption("profile element without value".into()));
    }
    let dv = decimal::decode(reader, false)?;

    // Vorzeichen: localValuePartitions; Integral/Reverse-Fraktional:
    // Kappen, 0 bedeutet unbounded
    opts.local_value_partitions = dv.negative;
    opts.max_built_in_element_grammars = cap_from_wire(&dv.integral)?;
    opts.max_built_in_productions = cap_from_wire(&dv.rev_fractional)?;

    if n_bit_unsigned_integer::decode(reader, 1)? != 0 {
        return Err(Error::malformed("profile element not closed"));
    }
    Ok(())
}

fn cap_from_wire(v: &UnsignedValue) -> Result<Option<u32>> {
    let raw = v
        .to_u64()
        .ok_or_else(|| Error::UnsupportedOption("profile parameter beyond u64".into()))?;
    if raw == 0 {
        Ok(None)
    } else {
        u32::try_from(raw - 1)
            .map(Some)
            .map_err(|_| Error::UnsupportedOption("profile parameter beyond u32".into()))
    }
}

/// Skips an unknown wildcard element coded with built-in deviation codes
/// and literal values only. Nested elements recurse; a table hit cannot
/// be resolved while skipping and is refused.
fn skip_wildcard_content(reader: &mut BitReader, names: &mut OptionsNameTable) -> Result<()> {
    // StartTagContent: EE=0, AT(*)=1, SE(*)=2, CH=3 (2 Bits)
    loop {
        match n_bit_unsigned_integer::decode(reader, 2)? {
            0 => return Ok(()),
            1 => {
                let _at = names.read_qname(reader)?;
                skip_literal_value(reader)?;
            }
            2 => {
                let _child = names.read_qname(reader)?;
                skip_wildcard_content(reader, names)?;
                return skip_element_content(reader, names);
            }
            3 => {
                skip_literal_value(reader)?;
                return skip_element_content(reader, names);
            }
            _ => unreachable!("2-bit code"),
        }
    }
}

/// ElementContent of a skipped element: EE=0, dann SE(*)=1.0, CH=1.1.
fn skip_element_content(reader: &mut BitReader, names: &mut OptionsNameTable) -> Result<()> {
    loop {
        if n_bit_unsigned_integer::decode(reader, 1)? == 0 {
            return Ok(());
        }
        match n_bit_unsigned_integer::decode(reader, 1)? {
            0 => {
                let _child = names.read_qname(reader)?;
                skip_wildcard_content(reader, names)?;
            }
            _ => skip_literal_value(reader)?,
        }
    }
}

fn skip_literal_value(reader: &mut BitReader) -> Result<()> {
    let head = unsigned_integer::decode(reader)?;
    if head < 2 {
        return Err(Error::UnsupportedOption(
            "header extension with string-table reference".into(),
        ));
    }
    string::decode_chars(reader, head - 2)?;
    Ok(())
}

fn decode_preserve(reader: &mut BitReader, opts: &mut ExiOptions) -> Result<()> {
    let mut offset: u64 = 0;
    while offset < 5 {
        let code = n_bit_unsigned_integer::decode(reader, preserve_width(offset))?;
        let ordinal = code + offset;
        match ordinal {
            0 => opts.preserve.dtd = true,
            1 => opts.preserve.prefixes = true,
            2 => opts.preserve.lexical_values = true,
            3 => opts.preserve.comments = true,
            4 => opts.preserve.pis = true,
            5 => return Ok(()),
            _ => return Err(Error::malformed("event code in preserve")),
        }
        offset = ordinal + 1;
    }
    Ok(())
}

fn decode_common(reader: &mut BitReader, opts: &mut ExiOptions) -> Result<()> {
    match n_bit_unsigned_integer::decode(reader, 2)? {
        0 => {
            opts.compression = true;
            match n_bit_unsigned_integer::decode(reader, 2)? {
                0 => {
                    opts.fragment = true;
                    decode_schema_id_or_ee(reader, opts)?;
                }
                1 => opts.schema_id = Some(decode_schema_id(reader)?),
                2 => {}
                _ => return Err(Error::malformed("event code after compression")),
            }
        }
        1 => {
            opts.fragment = true;
            decode_schema_id_or_ee(reader, opts)?;
        }
        2 => opts.schema_id = Some(decode_schema_id(reader)?),
        3 => {}
        _ => unreachable!("2-bit code"),
    }
    Ok(())
}

fn decode_schema_id_or_ee(reader: &mut BitReader, opts: &mut ExiOptions) -> Result<()> {
    if n_bit_unsigned_integer::decode(reader, 1)? == 0 {
        opts.schema_id = Some(decode_schema_id(reader)?);
    }
    Ok(())
}

fn decode_schema_id(reader: &mut BitReader) -> Result<SchemaId> {
    if n_bit_unsigned_integer::decode(reader, 1)? == 0 {
        // CH: String-Literal mit length+2
        let head = unsigned_integer::decode(reader)?;
        if head < 2 {
            return Err(Error::malformed("schemaId value references a table"));
        }
        let len = head - 2;
        if len > MAX_SCHEMA_ID_LENGTH {
            return Err(Error::invalid_value("schemaId literal too long"));
        }
        let id = string::decode_chars(reader, len)?;
        if id.is_empty() {
            Ok(SchemaId::BuiltinOnly)
        } else {
            Ok(SchemaId::Id(id))
        }
    } else if n_bit_unsigned_integer::decode(reader, 1)? == 0 {
        // AT(xsi:nil)
        let nil = boolean::decode(reader)?;
        if n_bit_unsigned_integer::decode(reader, 1)? != 1 {
            return Err(Error::malformed("schemaId element not closed"));
        }
        if nil {
            Ok(SchemaId::None)
        } else {
            Ok(SchemaId::BuiltinOnly)
        }
    } else {
        // EE: leeres Element
        Ok(SchemaId::BuiltinOnly)
    }
}

fn decode_u32(reader: &mut BitReader) -> Result<u32> {
    let v = unsigned_integer::decode(reader)?;
    u32::try_from(v).map_err(|_| Error::invalid_value("option value beyond u32"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Preserve;

    fn round_trip(options: &ExiOptions) -> ExiOptions {
        let mut w = BitWriter::new();
        encode(&mut w, options).unwrap();
        let data = w.into_vec();
        let mut r = BitReader::new(&data);
        let decoded = decode(&mut r).unwrap();
        assert!(
            r.remaining_bits() < 8,
            "options document left {} unread bits",
            r.remaining_bits()
        );
        decoded
    }

    /// Default options: SE(header) + EE, two 1+2 = 3 bits.
    #[test]
    fn default_options_are_three_bits() {
        let opts = ExiOptions::default();
        let mut w = BitWriter::new();
        encode(&mut w, &opts).unwrap();
        assert_eq!(w.bit_position(), 3);
        assert_eq!(round_trip(&opts), opts);
    }

    #[test]
    fn strict_only() {
        let opts = ExiOptions::default().with_strict();
        assert_eq!(round_trip(&opts), opts);
    }

    #[test]
    fn alignment_variants() {
        for alignment in [Alignment::BytePacked, Alignment::PreCompression] {
            let opts = ExiOptions::default().with_alignment(alignment);
            assert_eq!(round_trip(&opts), opts, "{alignment:?}");
        }
    }

    #[test]
    fn compression_flag() {
        let opts = ExiOptions::default().with_compression();
        assert_eq!(round_trip(&opts), opts);
    }

    #[test]
    fn fragment_flag() {
        let opts = ExiOptions::default().with_fragment();
        assert_eq!(round_trip(&opts), opts);
    }

    #[test]
    fn preserve_combinations() {
        for p in [
            Preserve { comments: true, ..Preserve::default() },
            Preserve { pis: true, ..Preserve::default() },
            Preserve { dtd: true, prefixes: true, ..Preserve::default() },
            Preserve { lexical_values: true, ..Preserve::default() },
            Preserve {
                comments: true,
                pis: true,
                dtd: true,
                prefixes: true,
                lexical_values: true,
            },
        ] {
            let opts = ExiOptions::default().with_preserve(p);
            assert_eq!(round_trip(&opts), opts, "{p:?}");
        }
    }

    #[test]
    fn block_size_and_value_limits() {
        let opts = ExiOptions::default()
            .with_block_size(4096)
            .with_value_max_length(64)
            .with_value_partition_capacity(100);
        assert_eq!(round_trip(&opts), opts);
    }

    #[test]
    fn self_contained_flag() {
        let opts = ExiOptions::default().with_self_contained();
        assert_eq!(round_trip(&opts), opts);
    }

    #[test]
    fn schema_id_forms() {
        for id in [
            SchemaId::None,
            SchemaId::BuiltinOnly,
            SchemaId::Id("urn:example:schema".into()),
        ] {
            let opts = ExiOptions::default().with_schema_id(id.clone());
            assert_eq!(round_trip(&opts), opts, "{id:?}");
        }
    }

    #[test]
    fn datatype_representation_map_round_trip() {
        let opts = ExiOptions::default().with_datatype_representation_map(vec![
            DatatypeRepresentation {
                type_qname: QName::new(XSD_NS, "decimal"),
                representation_qname: QName::new(EXI_NS, "string"),
            },
            DatatypeRepresentation {
                type_qname: QName::new(XSD_NS, "double"),
                representation_qname: QName::new(EXI_NS, "decimal"),
            },
        ]);
        assert_eq!(round_trip(&opts), opts);
    }

    #[test]
    fn unknown_representation_rejected() {
        let opts = ExiOptions::default().with_datatype_representation_map(vec![
            DatatypeRepresentation {
                type_qname: QName::new(XSD_NS, "decimal"),
                representation_qname: QName::new("urn:vendor", "blob"),
            },
        ]);
        let mut w = BitWriter::new();
        encode(&mut w, &opts).unwrap();
        let data = w.into_vec();
        let mut r = BitReader::new(&data);
        assert!(matches!(
            decode(&mut r).unwrap_err(),
            Error::UnsupportedOption(_)
        ));
    }

    #[test]
    fn profile_parameters_round_trip() {
        for (lvp, grammars, productions) in [
            (false, None, None),
            (true, Some(0), Some(0)),
            (false, Some(16), None),
            (true, None, Some(128)),
        ] {
            let opts = ExiOptions::default().with_profile(lvp, grammars, productions);
            if !opts.has_profile() {
                continue;
            }
            assert_eq!(
                round_trip(&opts),
                opts,
                "lvp={lvp} grammars={grammars:?} productions={productions:?}"
            );
        }
    }

    #[test]
    fn profile_combines_with_other_uncommon_members() {
        let opts = ExiOptions::default()
            .with_profile(false, Some(4), Some(8))
            .with_alignment(Alignment::BytePacked)
            .with_value_partition_capacity(10);
        assert_eq!(round_trip(&opts), opts);
    }

    #[test]
    fn kitchen_sink_round_trip() {
        let opts = ExiOptions::default()
            .with_preserve(Preserve { comments: true, pis: true, ..Preserve::default() })
            .with_block_size(512)
            .with_value_max_length(32)
            .with_schema_id(SchemaId::Id("urn:k".into()))
            .with_fragment();
        assert_eq!(round_trip(&opts), opts);
    }

    #[test]
    fn truncated_document_reports_eof() {
        let opts = ExiOptions::default().with_schema_id(SchemaId::Id("urn:x".into()));
        let mut w = BitWriter::new();
        encode(&mut w, &opts).unwrap();
        let data = w.into_vec();
        let mut r = BitReader::new(&data[..1]);
        assert!(decode(&mut r).is_err());
    }

    /// The decoded combination is validated like any other input.
    #[test]
    fn invalid_combination_from_wire_rejected() {
        // strict zusammen mit preserve.comments laesst sich ueber die
        // Zustandsmaschine gar nicht erst konstruieren; kaputte Kombination
        // direkt ueber validate() gedeckt (siehe options::tests)
        let opts = ExiOptions::default()
            .with_preserve(Preserve { comments: true, ..Preserve::default() })
            .with_strict();
        let mut w = BitWriter::new();
        assert!(encode(&mut w, &opts).is_err());
    }
}
