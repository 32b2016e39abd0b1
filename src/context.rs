//! Name contexts: URI and local-name registries (Spec 7.3.1, Appendix D).
//!
//! One [`NameRegistry`] per codec instance owns every [`QNameContext`] for
//! the lifetime of the instance. Entries split into three layers: the
//! always-present core URIs (Appendix D, Table D-1/D-3), schema-provided
//! entries (immutable, installed through the grammar builder) and runtime
//! entries appended as unknown names stream by. `init_for_each_run` drops
//! only the runtime layer.

use std::rc::Rc;

use crate::bitstream::{BitReader, BitWriter};
use crate::grammar::GrammarHandle;
use crate::typed_value::Datatype;
use crate::{Error, FastHashMap, Result, bit_width, n_bit_unsigned_integer, string, unsigned_integer};

/// The xml namespace (URI id 1).
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";
/// The xsi namespace (URI id 2).
pub const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// URI id of the xsi namespace in every registry.
pub const XSI_URI_ID: u32 = 2;
/// Local-name id of `nil` within the xsi namespace (Table D-3).
pub const XSI_NIL_ID: u32 = 0;
/// Local-name id of `type` within the xsi namespace (Table D-3).
pub const XSI_TYPE_ID: u32 = 1;

/// Compact identity of a qualified name within one codec run (Spec 7.1.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QNameId {
    pub uri_id: u32,
    pub local_name_id: u32,
}

impl QNameId {
    /// The xsi:nil attribute name.
    pub fn xsi_nil() -> Self {
        Self { uri_id: XSI_URI_ID, local_name_id: XSI_NIL_ID }
    }

    /// The xsi:type attribute name.
    pub fn xsi_type() -> Self {
        Self { uri_id: XSI_URI_ID, local_name_id: XSI_TYPE_ID }
    }
}

/// Interned identity of one qualified name (Spec 7.1.7).
///
/// Gleichheit und Hash ausschliesslich ueber die beiden IDs; Strings sind
/// nur Nutzlast. Grammar-Verknuepfungen werden vom Grammar-Builder
/// gesetzt und bleiben fuer Runtime-Eintraege leer.
#[derive(Debug, Clone)]
pub struct QNameContext {
    uri_id: u32,
    local_name_id: u32,
    local_name: Rc<str>,
    namespace_uri: Rc<str>,
    default_prefix: Rc<str>,
    default_qname: Rc<str>,
    /// Global start-element grammar for this name, when schema-informed.
    pub(crate) global_element_grammar: Option<GrammarHandle>,
    /// Type grammar for xsi:type casts, when schema-informed.
    pub(crate) type_grammar: Option<GrammarHandle>,
    /// Datatype of the global attribute declaration, when schema-informed.
    pub(crate) global_attribute_datatype: Option<Datatype>,
}

impl QNameContext {
    fn new(uri_id: u32, local_name_id: u32, namespace_uri: Rc<str>, local_name: Rc<str>) -> Self {
        // Default-Prefix-Politik: "", "xml", "xsi", sonst "ns<id>"
        let default_prefix: Rc<str> = match uri_id {
            0 => "".into(),
            1 => "xml".into(),
            2 => "xsi".into(),
            n => format!("ns{n}").into(),
        };
        let default_qname: Rc<str> = if default_prefix.is_empty() {
            Rc::clone(&local_name)
        } else {
            format!("{default_prefix}:{local_name}").into()
        };
        Self {
            uri_id,
            local_name_id,
            local_name,
            namespace_uri,
            default_prefix,
            default_qname,
            global_element_grammar: None,
            type_grammar: None,
            global_attribute_datatype: None,
        }
    }

    pub fn id(&self) -> QNameId {
        QNameId { uri_id: self.uri_id, local_name_id: self.local_name_id }
    }

    pub fn local_name(&self) -> &Rc<str> {
        &self.local_name
    }

    pub fn namespace_uri(&self) -> &Rc<str> {
        &self.namespace_uri
    }

    /// The synthesized prefix when prefixes are not preserved.
    pub fn default_prefix(&self) -> &Rc<str> {
        &self.default_prefix
    }

    /// The printable `prefix:local` form under the default policy.
    pub fn default_qname(&self) -> &Rc<str> {
        &self.default_qname
    }
}

impl PartialEq for QNameContext {
    fn eq(&self, other: &Self) -> bool {
        self.uri_id == other.uri_id && self.local_name_id == other.local_name_id
    }
}

impl Eq for QNameContext {}

/// Per-namespace container of local names and prefixes (Spec 7.3.1).
#[derive(Clone)]
pub struct UriContext {
    uri_id: u32,
    namespace_uri: Rc<str>,
    qnames: Vec<QNameContext>,
    qname_lookup: FastHashMap<Rc<str>, u32>,
    prefixes: Vec<Rc<str>>,
    schema_qname_count: usize,
    schema_prefix_count: usize,
}

impl UriContext {
    fn new(uri_id: u32, namespace_uri: Rc<str>) -> Self {
        Self {
            uri_id,
            namespace_uri,
            qnames: Vec::new(),
            qname_lookup: FastHashMap::default(),
            prefixes: Vec::new(),
            schema_qname_count: 0,
            schema_prefix_count: 0,
        }
    }

    pub fn namespace_uri(&self) -> &Rc<str> {
        &self.namespace_uri
    }

    pub fn qname_count(&self) -> usize {
        self.qnames.len()
    }

    pub fn prefix_count(&self) -> usize {
        self.prefixes.len()
    }

    pub fn qname(&self, local_name_id: u32) -> Option<&QNameContext> {
        self.qnames.get(local_name_id as usize)
    }

    pub fn lookup_local_name(&self, local_name: &str) -> Option<u32> {
        self.qname_lookup.get(local_name).copied()
    }

    pub fn prefix(&self, prefix_id: usize) -> Option<&Rc<str>> {
        self.prefixes.get(prefix_id)
    }

    pub fn lookup_prefix(&self, prefix: &str) -> Option<usize> {
        self.prefixes.iter().position(|p| &**p == prefix)
    }

    fn add_local_name(&mut self, local_name: &str) -> u32 {
        debug_assert!(self.lookup_local_name(local_name).is_none());
        let id = self.qnames.len() as u32;
        let name: Rc<str> = local_name.into();
        self.qnames.push(QNameContext::new(
            self.uri_id,
            id,
            Rc::clone(&self.namespace_uri),
            Rc::clone(&name),
        ));
        self.qname_lookup.insert(name, id);
        id
    }

    fn add_prefix(&mut self, prefix: &str) -> usize {
        let id = self.prefixes.len();
        self.prefixes.push(prefix.into());
        id
    }

    fn clear_runtime(&mut self) {
        for q in self.qnames.drain(self.schema_qname_count..) {
            self.qname_lookup.remove(q.local_name());
        }
        self.prefixes.truncate(self.schema_prefix_count);
    }
}

/// The registry of every URI and qualified name of one codec instance.
#[derive(Clone)]
pub struct NameRegistry {
    uris: Vec<UriContext>,
    uri_lookup: FastHashMap<Rc<str>, u32>,
    schema_uri_count: usize,
}

impl NameRegistry {
    /// Builds the core registry (Appendix D, Tables D-1 to D-4).
    pub fn core() -> Self {
        let mut reg = Self {
            uris: Vec::with_capacity(4),
            uri_lookup: FastHashMap::default(),
            schema_uri_count: 0,
        };
        let empty = reg.add_uri("");
        reg.add_prefix(empty, "");

        let xml = reg.add_uri(XML_NS);
        reg.add_prefix(xml, "xml");
        for name in ["base", "id", "lang", "space"] {
            reg.add_local_name(xml, name);
        }

        let xsi = reg.add_uri(XSI_NS);
        reg.add_prefix(xsi, "xsi");
        for name in ["nil", "type"] {
            reg.add_local_name(xsi, name);
        }

        reg.mark_schema_end();
        reg
    }

    /// Freezes everything added so far as the immutable schema layer.
    pub(crate) fn mark_schema_end(&mut self) {
        self.schema_uri_count = self.uris.len();
        for u in &mut self.uris {
            u.schema_qname_count = u.qnames.len();
            u.schema_prefix_count = u.prefixes.len();
        }
    }

    /// Drops runtime entries, keeping core and schema layers (Spec 5,
    /// codec reuse).
    pub fn init_for_each_run(&mut self) {
        for u in self.uris.drain(self.schema_uri_count..) {
            self.uri_lookup.remove(&u.namespace_uri);
        }
        for u in &mut self.uris {
            u.clear_runtime();
        }
    }

    pub fn uri_count(&self) -> usize {
        self.uris.len()
    }

    pub fn uri(&self, uri_id: u32) -> Option<&UriContext> {
        self.uris.get(uri_id as usize)
    }

    pub fn lookup_uri(&self, uri: &str) -> Option<u32> {
        self.uri_lookup.get(uri).copied()
    }

    pub fn add_uri(&mut self, uri: &str) -> u32 {
        debug_assert!(self.lookup_uri(uri).is_none());
        let id = self.uris.len() as u32;
        let rc: Rc<str> = uri.into();
        self.uris.push(UriContext::new(id, Rc::clone(&rc)));
        self.uri_lookup.insert(rc, id);
        id
    }

    pub fn add_local_name(&mut self, uri_id: u32, local_name: &str) -> QNameId {
        let local_name_id = self.uris[uri_id as usize].add_local_name(local_name);
        QNameId { uri_id, local_name_id }
    }

    pub fn add_prefix(&mut self, uri_id: u32, prefix: &str) -> usize {
        self.uris[uri_id as usize].add_prefix(prefix)
    }

    pub fn qname_context(&self, id: QNameId) -> &QNameContext {
        self.uris[id.uri_id as usize]
            .qname(id.local_name_id)
            .expect("QNameId stems from this registry")
    }

    pub(crate) fn qname_context_mut(&mut self, id: QNameId) -> &mut QNameContext {
        &mut self.uris[id.uri_id as usize].qnames[id.local_name_id as usize]
    }

    /// Finds or appends the context for `(uri, local_name)`.
    pub fn resolve(&mut self, uri: &str, local_name: &str) -> QNameId {
        let uri_id = match self.lookup_uri(uri) {
            Some(id) => id,
            None => self.add_uri(uri),
        };
        match self.uris[uri_id as usize].lookup_local_name(local_name) {
            Some(local_name_id) => QNameId { uri_id, local_name_id },
            None => self.add_local_name(uri_id, local_name),
        }
    }

    // === Wire formats (Spec 7.1.7, 7.3.2, 7.3.3) ===

    /// Writes a URI: `id + 1` in `⌈log₂(count + 1)⌉` bits on a hit,
    /// zero plus the literal on a miss (the miss grows the table).
    pub fn write_uri(
        &mut self,
        writer: &mut BitWriter,
        uri: &str,
        byte_aligned: bool,
    ) -> u32 {
        let n = bit_width::for_count(self.uri_count() + 1);
        match self.lookup_uri(uri) {
            Some(id) => {
                n_bit_unsigned_integer::encode_mode(writer, u64::from(id) + 1, n, byte_aligned);
                id
            }
            None => {
                n_bit_unsigned_integer::encode_mode(writer, 0, n, byte_aligned);
                string::encode(writer, uri);
                self.add_uri(uri)
            }
        }
    }

    /// Reads a URI written by [`Self::write_uri`].
    pub fn read_uri(&mut self, reader: &mut BitReader, byte_aligned: bool) -> Result<u32> {
        let n = bit_width::for_count(self.uri_count() + 1);
        let code = n_bit_unsigned_integer::decode_mode(reader, n, byte_aligned)?;
        if code == 0 {
            let uri = string::decode(reader)?;
            Ok(match self.lookup_uri(&uri) {
                // Literal einer bereits bekannten URI: Tabelle nicht erweitern
                Some(id) => id,
                None => self.add_uri(&uri),
            })
        } else {
            let id = (code - 1) as u32;
            if (id as usize) < self.uri_count() {
                Ok(id)
            } else {
                Err(Error::malformed("URI identifier out of range"))
            }
        }
    }

    /// Writes a local name within `uri_id`: `uint(0)` plus the id in
    /// `⌈log₂(count)⌉` bits on a hit, `uint(L + 1)` plus the literal on a
    /// miss (the miss grows the partition).
    pub fn write_local_name(
        &mut self,
        writer: &mut BitWriter,
        uri_id: u32,
        local_name: &str,
        byte_aligned: bool,
    ) -> QNameId {
        let uc = &self.uris[uri_id as usize];
        match uc.lookup_local_name(local_name) {
            Some(id) => {
                let n = bit_width::for_count(uc.qname_count());
                unsigned_integer::encode(writer, 0);
                n_bit_unsigned_integer::encode_mode(writer, u64::from(id), n, byte_aligned);
                QNameId { uri_id, local_name_id: id }
            }
            None => {
                string::encode_with_offset(writer, local_name, 1);
                self.add_local_name(uri_id, local_name)
            }
        }
    }

    /// Reads a local name written by [`Self::write_local_name`].
    pub fn read_local_name(
        &mut self,
        reader: &mut BitReader,
        uri_id: u32,
        byte_aligned: bool,
    ) -> Result<QNameId> {
        let prefix_len = unsigned_integer::decode(reader)?;
        if prefix_len == 0 {
            let uc = &self.uris[uri_id as usize];
            let n = bit_width::for_count(uc.qname_count());
            let id = n_bit_unsigned_integer::decode_mode(reader, n, byte_aligned)? as u32;
            if (id as usize) < uc.qname_count() {
                Ok(QNameId { uri_id, local_name_id: id })
            } else {
                Err(Error::malformed("local-name identifier out of range"))
            }
        } else {
            let name = string::decode_chars(reader, prefix_len - 1)?;
            Ok(match self.uris[uri_id as usize].lookup_local_name(&name) {
                Some(local_name_id) => QNameId { uri_id, local_name_id },
                None => self.add_local_name(uri_id, &name),
            })
        }
    }

    /// Writes an NS-event prefix with the compact-id scheme of the URI's
    /// prefix partition (Spec 7.3.2).
    pub fn write_prefix(
        &mut self,
        writer: &mut BitWriter,
        uri_id: u32,
        prefix: &str,
        byte_aligned: bool,
    ) {
        let uc = &self.uris[uri_id as usize];
        let n = bit_width::for_count(uc.prefix_count() + 1);
        match uc.lookup_prefix(prefix) {
            Some(id) => {
                n_bit_unsigned_integer::encode_mode(writer, id as u64 + 1, n, byte_aligned);
            }
            None => {
                n_bit_unsigned_integer::encode_mode(writer, 0, n, byte_aligned);
                string::encode(writer, prefix);
                self.add_prefix(uri_id, prefix);
            }
        }
    }

    /// Reads an NS-event prefix written by [`Self::write_prefix`].
    pub fn read_prefix(
        &mut self,
        reader: &mut BitReader,
        uri_id: u32,
        byte_aligned: bool,
    ) -> Result<Rc<str>> {
        let uc = &self.uris[uri_id as usize];
        let n = bit_width::for_count(uc.prefix_count() + 1);
        let code = n_bit_unsigned_integer::decode_mode(reader, n, byte_aligned)?;
        if code == 0 {
            let prefix = string::decode(reader)?;
            let id = self.add_prefix(uri_id, &prefix);
            Ok(Rc::clone(self.uris[uri_id as usize].prefix(id).unwrap()))
        } else {
            let id = (code - 1) as usize;
            self.uris[uri_id as usize]
                .prefix(id)
                .cloned()
                .ok_or_else(|| Error::malformed("prefix identifier out of range"))
        }
    }

    /// Writes the prefix of an element or attribute qname as a plain
    /// partition index (Spec 7.1.7; prefixes preserved only).
    ///
    /// Ein unbekannter Prefix faellt auf Index 0 zurueck; die zugehoerige
    /// NS-Deklaration muss ihn bereits eingetragen haben.
    pub fn write_qname_prefix(
        &self,
        writer: &mut BitWriter,
        uri_id: u32,
        prefix: &str,
        byte_aligned: bool,
    ) {
        let uc = &self.uris[uri_id as usize];
        let n = bit_width::for_count(uc.prefix_count());
        let id = uc.lookup_prefix(prefix).unwrap_or(0);
        n_bit_unsigned_integer::encode_mode(writer, id as u64, n, byte_aligned);
    }

    /// Reads a qname prefix written by [`Self::write_qname_prefix`].
    pub fn read_qname_prefix(
        &self,
        reader: &mut BitReader,
        uri_id: u32,
        byte_aligned: bool,
    ) -> Result<Option<Rc<str>>> {
        let uc = &self.uris[uri_id as usize];
        if uc.prefix_count() == 0 {
            return Ok(None);
        }
        let n = bit_width::for_count(uc.prefix_count());
        let id = n_bit_unsigned_integer::decode_mode(reader, n, byte_aligned)? as usize;
        uc.prefix(id)
            .cloned()
            .map(Some)
            .ok_or_else(|| Error::malformed("qname prefix index out of range"))
    }
}
