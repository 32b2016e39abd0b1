//! The body encoder: events in, octets out (Spec 6.1, 8).
//!
//! Per event: locate the production in the current grammar (declared
//! first level, otherwise the deviation level), emit its event code at
//! the width the grammar currently has, emit the event content through
//! the channel codecs, the string table and the name registry, then take
//! the production's transition. Built-in grammars learn as a side effect,
//! in lock-step with the decoder.

use std::rc::Rc;

use crate::bitstream::BitWriter;
use crate::coder::CoderCore;
use crate::context::QNameId;
use crate::error::ErrorHandler;
use crate::event::{DoctypeContent, ExiEvent, NsContent, PiContent};
use crate::grammar::{Deviation, Event, GrammarHandle, GrammarKind, Grammars};
use crate::header::{self, ExiHeader};
use crate::options::ExiOptions;
use crate::qname::QName;
use crate::typed_value::{Datatype, Value};
use crate::{Error, Result, boolean, options_codec, string, typed_value};

/// Encoder-surface switches that never appear inside the stream options.
#[derive(Debug, Clone, Copy, Default)]
pub struct EncoderConfig {
    /// Prepend the `$EXI` cookie (Spec 5.1).
    pub include_cookie: bool,
    /// Write the options document even when every option is default.
    pub include_options: bool,
}

/// Encodes an event stream with schema-less grammars.
pub fn encode(events: &[ExiEvent], options: &ExiOptions) -> Result<Vec<u8>> {
    encode_with_grammars(events, options, &Grammars::schema_less())
}

/// Encodes an event stream against a grammar description.
pub fn encode_with_grammars(
    events: &[ExiEvent],
    options: &ExiOptions,
    grammars: &Grammars,
) -> Result<Vec<u8>> {
    encode_with_config(events, options, grammars, EncoderConfig::default())
}

/// Encodes with explicit header switches.
pub fn encode_with_config(
    events: &[ExiEvent],
    options: &ExiOptions,
    grammars: &Grammars,
    config: EncoderConfig,
) -> Result<Vec<u8>> {
    let mut encoder = BodyEncoder::new(grammars, options.clone(), config)?;
    for event in events {
        encoder.encode_event(event)?;
    }
    encoder.finish()
}

/// How a start-element or attribute reaches the stream.
enum Access {
    /// Declared first-level production.
    Declared(usize, Option<GrammarHandle>, Datatype),
    /// Declared namespace wildcard: the URI is implied, only the
    /// local-name is coded.
    NsWildcard(usize, Option<GrammarHandle>, u32),
    /// Declared generic (wildcard) first-level production.
    Wildcard(usize, Option<GrammarHandle>),
    /// Deviation-level generic production.
    Deviation(Deviation),
}

/// A reusable single-stream encoder (Spec 6.1).
pub struct BodyEncoder {
    core: CoderCore,
    writer: BitWriter,
    config: EncoderConfig,
    done: bool,
}

impl BodyEncoder {
    /// Creates the encoder and writes the header (Spec 5).
    pub fn new(grammars: &Grammars, options: ExiOptions, config: EncoderConfig) -> Result<Self> {
        options.validate()?;
        let mut encoder = Self {
            core: CoderCore::new(grammars, options),
            writer: BitWriter::new(),
            config,
            done: false,
        };
        encoder.write_header()?;
        Ok(encoder)
    }

    /// Replaces the warning sink.
    pub fn set_error_handler(&mut self, handler: Box<dyn ErrorHandler>) {
        self.core.set_error_handler(handler);
    }

    /// Re-arms the encoder for another stream on the same grammars.
    pub fn init_for_each_run(&mut self) -> Result<()> {
        self.core.init_for_each_run();
        self.writer = BitWriter::new();
        self.done = false;
        self.write_header()
    }

    fn write_header(&mut self) -> Result<()> {
        let options_present =
            self.config.include_options || self.core.options != ExiOptions::default();
        header::encode(
            &mut self.writer,
            &ExiHeader {
                cookie: self.config.include_cookie,
                options_present,
                version: 1,
            },
        );
        if options_present {
            options_codec::encode(&mut self.writer, &self.core.options)?;
        }
        if self.core.options.byte_aligned() {
            // Header-Padding (Spec 5.2): der Body beginnt oktett-genau
            self.writer.align_to_byte();
        }
        Ok(())
    }

    /// Encodes one event (Spec 6.1).
    pub fn encode_event(&mut self, event: &ExiEvent) -> Result<()> {
        if self.done {
            return Err(Error::invariant("event after end-document"));
        }
        log::debug!("enc event {event:?}");
        match event {
            ExiEvent::StartDocument => self.encode_simple(Event::StartDocument),
            ExiEvent::EndDocument => {
                self.encode_simple(Event::EndDocument)?;
                self.done = true;
                Ok(())
            }
            ExiEvent::StartElement(qname) => self.encode_start_element(qname),
            ExiEvent::EndElement => self.encode_end_element(),
            ExiEvent::Attribute { qname, value } => self.encode_attribute(qname, value),
            ExiEvent::Characters(value) => self.encode_characters(value),
            ExiEvent::NamespaceDeclaration(ns) => self.encode_namespace(ns),
            ExiEvent::Comment(text) => self.encode_comment(text),
            ExiEvent::ProcessingInstruction(pi) => self.encode_pi(pi),
            ExiEvent::Doctype(dt) => self.encode_doctype(dt),
            ExiEvent::EntityReference(name) => self.encode_entity_reference(name),
            ExiEvent::SelfContained => Err(Error::UnsupportedOption(
                "selfContained subtree coding".into(),
            )),
        }
    }

    /// Pads the final octet and returns the stream.
    pub fn finish(mut self) -> Result<Vec<u8>> {
        if !self.done {
            return Err(Error::invariant("stream ended without end-document"));
        }
        self.writer.align_to_byte();
        Ok(self.writer.into_vec())
    }

    // === event kinds ===

    /// SD and ED: exact-match productions without content.
    fn encode_simple(&mut self, event: Event) -> Result<()> {
        let handle = self.core.current_grammar();
        let next = {
            let g = self.core.grammars.get(handle);
            let idx = g
                .find_event(event)
                .ok_or_else(|| Error::invariant("event not admitted by the current grammar"))?;
            self.core.write_production_code(&mut self.writer, g, idx);
            g.production(idx).unwrap().next
        };
        if let Some(next) = next {
            self.core.transition(next);
        }
        Ok(())
    }

    fn encode_start_element(&mut self, qname: &QName) -> Result<()> {
        let handle = self.core.current_grammar();
        let known = self.lookup_qname(qname);

        let known_uri = self.core.registry.lookup_uri(&qname.uri);
        let access = {
            let g = self.core.grammars.get(handle);
            if let Some(idx) = known.and_then(|id| g.find_start_element(id)) {
                let p = g.production(idx).unwrap();
                Access::Declared(idx, p.next, p.datatype)
            } else if let Some((idx, uri_id)) = known_uri.and_then(|uri_id| {
                g.find_event(Event::StartElementNs(uri_id)).map(|idx| (idx, uri_id))
            }) {
                let p = g.production(idx).unwrap();
                Access::NsWildcard(idx, p.next, uri_id)
            } else {
                self.generic_se_access(g)?
            }
        };

        match access {
            Access::Declared(idx, next, _) => {
                let g = self.core.grammars.get(handle);
                self.core.write_production_code(&mut self.writer, g, idx);
                let id = known.expect("declared SE implies a known qname");
                self.write_se_prefix(qname, id)?;
                let continuation = next.unwrap_or(handle);
                let child = self.core.element_grammar(id);
                self.core.push_element(continuation, id, child);
            }
            Access::NsWildcard(idx, next, uri_id) => {
                let g = self.core.grammars.get(handle);
                self.core.write_production_code(&mut self.writer, g, idx);
                let byte_aligned = self.core.options.byte_aligned();
                let id = self.core.registry.write_local_name(
                    &mut self.writer,
                    uri_id,
                    &qname.local_name,
                    byte_aligned,
                );
                self.write_se_prefix(qname, id)?;
                let continuation = next.unwrap_or(handle);
                let child = self.core.element_grammar(id);
                self.core.push_element(continuation, id, child);
            }
            Access::Wildcard(idx, next) => {
                let g = self.core.grammars.get(handle);
                self.core.write_production_code(&mut self.writer, g, idx);
                let id = self.write_qname(qname)?;
                // Built-in DocContent/FragmentContent lernen SE(qname)
                // beim SE(*)-Match (Spec 8.4.1, 8.4.2)
                self.core.learn_start_element(handle, id);
                let continuation = next.unwrap_or(handle);
                let child = self.core.element_grammar(id);
                self.core.push_element(continuation, id, child);
            }
            Access::Deviation(_) => {
                let g = self.core.grammars.get(handle);
                self.core.write_deviation_code(
                    &mut self.writer,
                    g,
                    Deviation::StartElementGeneric,
                    None,
                )?;
                if self.core.schema_informed {
                    self.core
                        .warn(Error::SchemaMismatch(format!("undeclared element {qname}")));
                }
                let id = self.write_qname(qname)?;
                self.core.learn_start_element(handle, id);
                let continuation = self.deviation_continuation(handle, Deviation::StartElementGeneric);
                let child = self.core.element_grammar(id);
                self.core.push_element(continuation, id, child);
            }
        }
        self.core.context_mut().prefix = qname.prefix.clone();
        Ok(())
    }

    fn generic_se_access(&self, g: &crate::grammar::Grammar) -> Result<Access> {
        if let Some(idx) = g.find_event(Event::StartElementGeneric) {
            let p = g.production(idx).unwrap();
            Ok(Access::Wildcard(idx, p.next))
        } else if g
            .deviations(&self.core.options)
            .contains(&Deviation::StartElementGeneric)
        {
            Ok(Access::Deviation(Deviation::StartElementGeneric))
        } else {
            Err(Error::invariant("start-element not admitted here"))
        }
    }

    fn encode_end_element(&mut self) -> Result<()> {
        let handle = self.core.current_grammar();
        let declared = {
            let g = self.core.grammars.get(handle);
            g.find_event(Event::EndElement)
        };
        match declared {
            Some(idx) => {
                let g = self.core.grammars.get(handle);
                self.core.write_production_code(&mut self.writer, g, idx);
            }
            None => {
                {
                    let g = self.core.grammars.get(handle);
                    self.core.write_deviation_code(
                        &mut self.writer,
                        g,
                        Deviation::EndElement,
                        None,
                    )?;
                }
                self.core.learn_end_element(handle);
            }
        }
        self.core.pop_element()?;
        Ok(())
    }

    fn encode_attribute(&mut self, qname: &QName, value: &Value) -> Result<()> {
        let known = self.lookup_qname(qname);

        // xsi:type und xsi:nil besitzen eigene Productions in
        // schema-informierten Grammatiken (Spec 8.5.4.4)
        if known == Some(QNameId::xsi_type()) && self.xsi_deviation(Deviation::AttributeXsiType) {
            return self.encode_xsi_type(value);
        }
        if known == Some(QNameId::xsi_nil()) && self.xsi_deviation(Deviation::AttributeXsiNil) {
            return self.encode_xsi_nil(value);
        }

        let handle = self.core.current_grammar();
        let known_uri = self.core.registry.lookup_uri(&qname.uri);
        let access = {
            let g = self.core.grammars.get(handle);
            if let Some(idx) = known.and_then(|id| g.find_attribute(id)) {
                let p = g.production(idx).unwrap();
                Access::Declared(idx, p.next, p.datatype)
            } else if let Some((idx, uri_id)) = known_uri.and_then(|uri_id| {
                g.find_event(Event::AttributeNs(uri_id)).map(|idx| (idx, uri_id))
            }) {
                let p = g.production(idx).unwrap();
                Access::NsWildcard(idx, p.next, uri_id)
            } else if let Some(idx) = g.find_event(Event::AttributeGeneric) {
                let p = g.production(idx).unwrap();
                Access::Wildcard(idx, p.next)
            } else if g
                .deviations(&self.core.options)
                .contains(&Deviation::AttributeGeneric)
            {
                Access::Deviation(Deviation::AttributeGeneric)
            } else {
                return Err(Error::invariant("attribute not admitted here"));
            }
        };

        let qname_id = match access {
            Access::Declared(idx, next, datatype) => {
                let g = self.core.grammars.get(handle);
                self.core.write_production_code(&mut self.writer, g, idx);
                let id = known.expect("declared AT implies a known qname");
                self.write_at_prefix(qname, id)?;
                self.write_attribute_value(id, value, datatype)?;
                if let Some(next) = next {
                    self.core.transition(next);
                }
                id
            }
            Access::NsWildcard(idx, next, uri_id) => {
                let g = self.core.grammars.get(handle);
                self.core.write_production_code(&mut self.writer, g, idx);
                let byte_aligned = self.core.options.byte_aligned();
                let id = self.core.registry.write_local_name(
                    &mut self.writer,
                    uri_id,
                    &qname.local_name,
                    byte_aligned,
                );
                self.write_at_prefix(qname, id)?;
                self.write_generic_attribute_value(id, value)?;
                if let Some(next) = next {
                    self.core.transition(next);
                }
                id
            }
            Access::Wildcard(idx, next) => {
                let g = self.core.grammars.get(handle);
                self.core.write_production_code(&mut self.writer, g, idx);
                let id = self.write_qname(qname)?;
                self.write_generic_attribute_value(id, value)?;
                if let Some(next) = next {
                    self.core.transition(next);
                }
                id
            }
            Access::Deviation(_) => {
                {
                    let g = self.core.grammars.get(handle);
                    self.core.write_deviation_code(
                        &mut self.writer,
                        g,
                        Deviation::AttributeGeneric,
                        None,
                    )?;
                }
                let id = self.write_qname(qname)?;
                self.write_generic_attribute_value(id, value)?;
                self.core.learn_attribute(handle, id);
                id
            }
        };

        self.core.note_xml_space(qname_id, value);
        Ok(())
    }

    /// True when the current grammar reaches the xsi deviation.
    fn xsi_deviation(&self, deviation: Deviation) -> bool {
        let g = self.core.grammars.get(self.core.current_grammar());
        g.deviations(&self.core.options).contains(&deviation)
    }

    fn encode_xsi_type(&mut self, value: &Value) -> Result<()> {
        let Value::QName(type_qname) = value else {
            return Err(Error::invalid_value("xsi:type value must be a qname"));
        };
        let handle = self.core.current_grammar();
        {
            let g = self.core.grammars.get(handle);
            self.core.write_deviation_code(
                &mut self.writer,
                g,
                Deviation::AttributeXsiType,
                None,
            )?;
        }
        let type_id = self.write_qname(type_qname)?;

        // Grammatik-Wechsel zum benannten Typ (Spec 8.5.4.4)
        let type_grammar = self.core.registry.qname_context(type_id).type_grammar;
        match type_grammar {
            Some(g) => self.core.transition(g),
            None if self.core.options.strict => {
                return Err(Error::SchemaMismatch(format!(
                    "xsi:type names unknown type {type_qname}"
                )));
            }
            None => self.core.warn(Error::SchemaMismatch(format!(
                "xsi:type names unknown type {type_qname}"
            ))),
        }

        // DTRM: Typ-Umbelegung auf eine andere Repraesentation (Spec 7.4)
        let remapped = match self
            .core
            .options
            .datatype_representation_map
            .iter()
            .find(|e| &e.type_qname == type_qname)
        {
            Some(entry) => match Datatype::from_representation(&entry.representation_qname) {
                Some(datatype) => Some(datatype),
                None => {
                    return Err(Error::UnsupportedOption(format!(
                        "datatype representation {}",
                        entry.representation_qname
                    )));
                }
            },
            None => None,
        };
        if remapped.is_some() {
            self.core.context_mut().datatype_override = remapped;
        }
        Ok(())
    }

    fn encode_xsi_nil(&mut self, value: &Value) -> Result<()> {
        let nil = match value {
            Value::Boolean(b) => *b,
            Value::String(s) => matches!(&**s, "true" | "1"),
            _ => return Err(Error::invalid_value("xsi:nil value must be boolean")),
        };
        let handle = self.core.current_grammar();
        {
            let g = self.core.grammars.get(handle);
            self.core.write_deviation_code(&mut self.writer, g, Deviation::AttributeXsiNil, None)?;
        }
        boolean::encode_mode(&mut self.writer, nil, self.core.options.byte_aligned());
        if nil {
            let type_empty = match &self.core.grammars.get(handle).kind {
                GrammarKind::SchemaInformed { type_empty, .. } => *type_empty,
                _ => None,
            };
            match type_empty {
                Some(g) => self.core.transition(g),
                None => self.core.warn(Error::invariant("xsi:nil without empty-type grammar")),
            }
        }
        Ok(())
    }

    fn encode_characters(&mut self, value: &Value) -> Result<()> {
        let handle = self.core.current_grammar();
        let declared = {
            let g = self.core.grammars.get(handle);
            g.find_event(Event::Characters)
                .map(|idx| (idx, g.production(idx).unwrap().next, g.production(idx).unwrap().datatype))
        };
        match declared {
            Some((idx, next, datatype)) => {
                let g = self.core.grammars.get(handle);
                self.core.write_production_code(&mut self.writer, g, idx);
                let datatype = self.core.context().datatype_override.unwrap_or(datatype);
                self.write_content_value(value, datatype)?;
                if let Some(next) = next {
                    self.core.transition(next);
                }
            }
            None => {
                {
                    let g = self.core.grammars.get(handle);
                    let deviations = g.deviations(&self.core.options);
                    if !deviations.contains(&Deviation::CharactersGeneric) {
                        return Err(Error::invariant("characters not admitted here"));
                    }
                    self.core.write_deviation_code(
                        &mut self.writer,
                        g,
                        Deviation::CharactersGeneric,
                        None,
                    )?;
                }
                let Value::String(text) = value else {
                    return Err(Error::invalid_value("untyped characters must be a string"));
                };
                let owner = self
                    .core
                    .context()
                    .qname
                    .ok_or_else(|| Error::invariant("characters outside any element"))?;
                self.core.values.write_value(
                    &mut self.writer,
                    owner,
                    text,
                    self.core.options.byte_aligned(),
                );
                self.core.learn_characters(handle);
                let next = self.deviation_continuation(handle, Deviation::CharactersGeneric);
                self.core.transition(next);
            }
        }
        Ok(())
    }

    fn encode_namespace(&mut self, ns: &NsContent) -> Result<()> {
        let handle = self.core.current_grammar();
        {
            let g = self.core.grammars.get(handle);
            self.core
                .write_deviation_code(&mut self.writer, g, Deviation::NamespaceDecl, None)?;
        }
        let byte_aligned = self.core.options.byte_aligned();
        let uri_id = self.core.registry.write_uri(&mut self.writer, &ns.uri, byte_aligned);
        self.core
            .registry
            .write_prefix(&mut self.writer, uri_id, &ns.prefix, byte_aligned);
        boolean::encode_mode(&mut self.writer, ns.local_element_ns, byte_aligned);

        let context = self.core.context_mut();
        context
            .ns_declarations
            .push((Rc::clone(&ns.uri), Rc::clone(&ns.prefix)));
        if ns.local_element_ns {
            context.prefix = Some(Rc::clone(&ns.prefix));
        }
        Ok(())
    }

    fn encode_comment(&mut self, text: &str) -> Result<()> {
        let handle = self.core.current_grammar();
        {
            let g = self.core.grammars.get(handle);
            self.core.write_deviation_code(
                &mut self.writer,
                g,
                Deviation::CommentPi,
                Some(crate::coder::ThirdLevel::Comment),
            )?;
        }
        string::encode(&mut self.writer, text);
        let next = self.deviation_continuation(handle, Deviation::CommentPi);
        self.core.transition(next);
        Ok(())
    }

    fn encode_pi(&mut self, pi: &PiContent) -> Result<()> {
        let handle = self.core.current_grammar();
        {
            let g = self.core.grammars.get(handle);
            self.core.write_deviation_code(
                &mut self.writer,
                g,
                Deviation::CommentPi,
                Some(crate::coder::ThirdLevel::Pi),
            )?;
        }
        string::encode(&mut self.writer, &pi.target);
        string::encode(&mut self.writer, &pi.data);
        let next = self.deviation_continuation(handle, Deviation::CommentPi);
        self.core.transition(next);
        Ok(())
    }

    fn encode_doctype(&mut self, dt: &DoctypeContent) -> Result<()> {
        let handle = self.core.current_grammar();
        {
            let g = self.core.grammars.get(handle);
            self.core
                .write_deviation_code(&mut self.writer, g, Deviation::Doctype, None)?;
        }
        string::encode(&mut self.writer, &dt.name);
        string::encode(&mut self.writer, &dt.public_id);
        string::encode(&mut self.writer, &dt.system_id);
        string::encode(&mut self.writer, &dt.text);
        Ok(())
    }

    fn encode_entity_reference(&mut self, name: &str) -> Result<()> {
        let handle = self.core.current_grammar();
        {
            let g = self.core.grammars.get(handle);
            self.core
                .write_deviation_code(&mut self.writer, g, Deviation::EntityReference, None)?;
        }
        string::encode(&mut self.writer, name);
        let next = self.deviation_continuation(handle, Deviation::EntityReference);
        self.core.transition(next);
        Ok(())
    }

    // === content helpers ===

    fn lookup_qname(&self, qname: &QName) -> Option<QNameId> {
        let uri_id = self.core.registry.lookup_uri(&qname.uri)?;
        self.core
            .registry
            .uri(uri_id)?
            .lookup_local_name(&qname.local_name)
            .map(|local_name_id| QNameId { uri_id, local_name_id })
    }

    /// Writes uri and local-name of a generic SE or AT (Spec 7.1.7).
    fn write_qname(&mut self, qname: &QName) -> Result<QNameId> {
        let byte_aligned = self.core.options.byte_aligned();
        let uri_id = self
            .core
            .registry
            .write_uri(&mut self.writer, &qname.uri, byte_aligned);
        let id = self.core.registry.write_local_name(
            &mut self.writer,
            uri_id,
            &qname.local_name,
            byte_aligned,
        );
        if self.core.options.preserve.prefixes {
            let prefix = self.effective_prefix(qname);
            self.core
                .registry
                .write_qname_prefix(&mut self.writer, uri_id, &prefix, byte_aligned);
        }
        Ok(id)
    }

    /// Prefix of a declared SE (the qname itself is implied).
    fn write_se_prefix(&mut self, qname: &QName, id: QNameId) -> Result<()> {
        if self.core.options.preserve.prefixes {
            let prefix = self.effective_prefix(qname);
            self.core.registry.write_qname_prefix(
                &mut self.writer,
                id.uri_id,
                &prefix,
                self.core.options.byte_aligned(),
            );
        }
        Ok(())
    }

    /// The prefix as written, falling back to an in-scope declaration.
    fn effective_prefix(&self, qname: &QName) -> Rc<str> {
        qname
            .prefix
            .clone()
            .or_else(|| self.core.declared_prefix(&qname.uri))
            .unwrap_or_else(|| "".into())
    }

    fn write_at_prefix(&mut self, qname: &QName, id: QNameId) -> Result<()> {
        self.write_se_prefix(qname, id)
    }

    fn write_attribute_value(&mut self, id: QNameId, value: &Value, datatype: Datatype) -> Result<()> {
        match datatype {
            Datatype::String => {
                let Value::String(text) = value else {
                    return Err(Error::invalid_value("string-typed attribute value"));
                };
                self.core.values.write_value(
                    &mut self.writer,
                    id,
                    text,
                    self.core.options.byte_aligned(),
                );
                Ok(())
            }
            typed => typed_value::encode_typed(
                &mut self.writer,
                value,
                typed,
                self.core.options.byte_aligned(),
            ),
        }
    }

    /// Value of a generic AT: xsi:type values are qname-coded, everything
    /// else goes through the string table.
    fn write_generic_attribute_value(&mut self, id: QNameId, value: &Value) -> Result<()> {
        if id == QNameId::xsi_type() {
            let Value::QName(type_qname) = value else {
                return Err(Error::invalid_value("xsi:type value must be a qname"));
            };
            self.write_qname(type_qname)?;
            return Ok(());
        }
        let Value::String(text) = value else {
            return Err(Error::invalid_value("untyped attribute value must be a string"));
        };
        self.core
            .values
            .write_value(&mut self.writer, id, text, self.core.options.byte_aligned());
        Ok(())
    }

    fn write_content_value(&mut self, value: &Value, datatype: Datatype) -> Result<()> {
        match datatype {
            Datatype::String => {
                let Value::String(text) = value else {
                    return Err(Error::invalid_value("string-typed character content"));
                };
                let owner = self
                    .core
                    .context()
                    .qname
                    .ok_or_else(|| Error::invariant("characters outside any element"))?;
                self.core.values.write_value(
                    &mut self.writer,
                    owner,
                    text,
                    self.core.options.byte_aligned(),
                );
                Ok(())
            }
            typed => typed_value::encode_typed(
                &mut self.writer,
                value,
                typed,
                self.core.options.byte_aligned(),
            ),
        }
    }

    fn deviation_continuation(&self, handle: GrammarHandle, deviation: Deviation) -> GrammarHandle {
        self.core.deviation_continuation(handle, deviation)
    }

    /// Bytes written so far (complete octets).
    pub fn byte_len(&self) -> usize {
        self.writer.byte_len()
    }

    /// Effective `xml:space` state at the current element (Spec 6.1).
    pub fn xml_space_preserve(&self) -> Option<bool> {
        self.core.xml_space_preserve()
    }
}
