//! The body decoder: octets in, events out (Spec 6.1, 8).
//!
//! The exact mirror of the encoder: read the event code at the width the
//! current grammar has, dispatch to the matching production or deviation,
//! read the event content, perform the identical table insertions and
//! grammar learning, and deliver the event in document order.

use std::rc::Rc;

use crate::bitstream::BitReader;
use crate::coder::{CodedEvent, CoderCore, ThirdLevel};
use crate::context::QNameId;
use crate::error::ErrorHandler;
use crate::event::{DoctypeContent, ExiEvent, NsContent, PiContent};
use crate::grammar::{Deviation, Event, GrammarHandle, GrammarKind, Grammars, Production};
use crate::header;
use crate::options::{ExiOptions, SchemaId};
use crate::qname::QName;
use crate::typed_value::{Datatype, Value};
use crate::{Error, Result, boolean, options_codec, string, typed_value};

/// Resolves a header schemaId to a grammar description (Spec 5.4).
pub trait SchemaIdResolver {
    fn resolve(&mut self, schema_id: &str) -> Result<Grammars>;
}

/// Decodes a schema-less stream (or one whose header says so).
pub fn decode(data: &[u8]) -> Result<(Vec<ExiEvent>, ExiOptions)> {
    decode_with_resolver(data, &Grammars::schema_less(), None)
}

/// Decodes against a caller-provided grammar description; the header may
/// still downgrade to schema-less via `schemaId xsi:nil`.
pub fn decode_with_grammars(
    data: &[u8],
    grammars: &Grammars,
) -> Result<(Vec<ExiEvent>, ExiOptions)> {
    decode_with_resolver(data, grammars, None)
}

/// Full decoding entry point with schemaId resolution (Spec 5.4).
pub fn decode_with_resolver(
    data: &[u8],
    default_grammars: &Grammars,
    mut resolver: Option<&mut dyn SchemaIdResolver>,
) -> Result<(Vec<ExiEvent>, ExiOptions)> {
    let mut reader = BitReader::new(data);
    let outer = header::decode(&mut reader)?;
    let options = if outer.options_present {
        options_codec::decode(&mut reader)?
    } else {
        ExiOptions::default()
    };

    let schema_less = Grammars::schema_less();
    let resolved;
    let grammars = match &options.schema_id {
        None => default_grammars,
        Some(SchemaId::None) => &schema_less,
        Some(SchemaId::BuiltinOnly) => default_grammars,
        Some(SchemaId::Id(id)) => match resolver.as_mut() {
            Some(r) => {
                resolved = r.resolve(id)?;
                &resolved
            }
            None => {
                return Err(Error::SchemaMismatch(format!(
                    "schemaId '{id}' without a resolver"
                )));
            }
        },
    };

    if options.byte_aligned() {
        reader.align_to_byte();
    }

    let mut decoder = BodyDecoder::new(grammars, options.clone(), reader);
    let mut events = Vec::new();
    loop {
        let event = decoder.decode_event()?;
        let end = matches!(event, ExiEvent::EndDocument);
        events.push(event);
        if end {
            break;
        }
    }
    Ok((events, options))
}

/// A single-stream decoder delivering events in order (Spec 6.1).
pub struct BodyDecoder<'a> {
    core: CoderCore,
    reader: BitReader<'a>,
    done: bool,
}

impl<'a> BodyDecoder<'a> {
    /// Takes over a reader positioned at the first body bit.
    pub fn new(grammars: &Grammars, options: ExiOptions, reader: BitReader<'a>) -> Self {
        Self {
            core: CoderCore::new(grammars, options),
            reader,
            done: false,
        }
    }

    /// Replaces the warning sink.
    pub fn set_error_handler(&mut self, handler: Box<dyn ErrorHandler>) {
        self.core.set_error_handler(handler);
    }

    /// Effective `xml:space` state at the current element (Spec 6.1).
    pub fn xml_space_preserve(&self) -> Option<bool> {
        self.core.xml_space_preserve()
    }

    /// Decodes the next event (Spec 6.1).
    pub fn decode_event(&mut self) -> Result<ExiEvent> {
        if self.done {
            return Err(Error::invariant("read past end-document"));
        }
        let handle = self.core.current_grammar();
        let coded = {
            let g = self.core.grammars.get(handle);
            self.core.read_event_code(&mut self.reader, g)?
        };
        let event = match coded {
            CodedEvent::Production(idx) => {
                let production = *self
                    .core
                    .grammars
                    .get(handle)
                    .production(idx)
                    .expect("read_event_code checked the index");
                self.apply_production(handle, production)?
            }
            CodedEvent::Deviation(deviation, third) => {
                self.apply_deviation(handle, deviation, third)?
            }
        };
        log::debug!("dec event {event:?}");
        if matches!(event, ExiEvent::EndDocument) {
            self.done = true;
        }
        Ok(event)
    }

    // === declared productions ===

    fn apply_production(&mut self, handle: GrammarHandle, p: Production) -> Result<ExiEvent> {
        match p.event {
            Event::StartDocument => {
                if let Some(next) = p.next {
                    self.core.transition(next);
                }
                Ok(ExiEvent::StartDocument)
            }
            Event::EndDocument => Ok(ExiEvent::EndDocument),
            Event::StartElement(id) => {
                let prefix = self.read_se_prefix(id)?;
                let qname = self.make_qname(id, prefix);
                let continuation = p.next.unwrap_or(handle);
                let child = self.core.element_grammar(id);
                self.core.push_element(continuation, id, child);
                self.core.context_mut().prefix = qname.prefix.clone();
                Ok(ExiEvent::StartElement(Rc::new(qname)))
            }
            Event::StartElementNs(uri_id) => {
                let byte_aligned = self.core.options.byte_aligned();
                let id = self
                    .core
                    .registry
                    .read_local_name(&mut self.reader, uri_id, byte_aligned)?;
                let prefix = self.read_se_prefix(id)?;
                let qname = self.make_qname(id, prefix);
                let continuation = p.next.unwrap_or(handle);
                let child = self.core.element_grammar(id);
                self.core.push_element(continuation, id, child);
                self.core.context_mut().prefix = qname.prefix.clone();
                Ok(ExiEvent::StartElement(Rc::new(qname)))
            }
            Event::StartElementGeneric => {
                let (id, prefix) = self.read_qname()?;
                // Built-in DocContent/FragmentContent lernen SE(qname)
                // beim SE(*)-Match (Spec 8.4.1, 8.4.2)
                self.core.learn_start_element(handle, id);
                let qname = self.make_qname(id, prefix);
                let continuation = p.next.unwrap_or(handle);
                let child = self.core.element_grammar(id);
                self.core.push_element(continuation, id, child);
                self.core.context_mut().prefix = qname.prefix.clone();
                Ok(ExiEvent::StartElement(Rc::new(qname)))
            }
            Event::EndElement => {
                self.core.pop_element()?;
                Ok(ExiEvent::EndElement)
            }
            Event::Attribute(id) => {
                let prefix = self.read_se_prefix(id)?;
                let value = self.read_attribute_value(id, p.datatype)?;
                self.core.note_xml_space(id, &value);
                if let Some(next) = p.next {
                    self.core.transition(next);
                }
                let qname = self.make_qname(id, prefix);
                Ok(ExiEvent::Attribute { qname: Rc::new(qname), value })
            }
            Event::AttributeNs(uri_id) => {
                let byte_aligned = self.core.options.byte_aligned();
                let id = self
                    .core
                    .registry
                    .read_local_name(&mut self.reader, uri_id, byte_aligned)?;
                let prefix = self.read_se_prefix(id)?;
                let value = self.read_generic_attribute_value(id)?;
                self.core.note_xml_space(id, &value);
                if let Some(next) = p.next {
                    self.core.transition(next);
                }
                let qname = self.make_qname(id, prefix);
                Ok(ExiEvent::Attribute { qname: Rc::new(qname), value })
            }
            Event::AttributeGeneric => {
                let (id, prefix) = self.read_qname()?;
                let value = self.read_generic_attribute_value(id)?;
                self.core.note_xml_space(id, &value);
                if let Some(next) = p.next {
                    self.core.transition(next);
                }
                let qname = self.make_qname(id, prefix);
                Ok(ExiEvent::Attribute { qname: Rc::new(qname), value })
            }
            Event::Characters => {
                let datatype = self
                    .core
                    .context()
                    .datatype_override
                    .unwrap_or(p.datatype);
                let value = self.read_content_value(datatype)?;
                if let Some(next) = p.next {
                    self.core.transition(next);
                }
                Ok(ExiEvent::Characters(value))
            }
            _ => Err(Error::malformed("production kind not usable in this stream")),
        }
    }

    // === deviations ===

    fn apply_deviation(
        &mut self,
        handle: GrammarHandle,
        deviation: Deviation,
        third: Option<ThirdLevel>,
    ) -> Result<ExiEvent> {
        match deviation {
            Deviation::EndElement => {
                self.core.learn_end_element(handle);
                self.core.pop_element()?;
                Ok(ExiEvent::EndElement)
            }
            Deviation::AttributeGeneric => {
                let (id, prefix) = self.read_qname()?;
                let value = self.read_generic_attribute_value(id)?;
                self.core.note_xml_space(id, &value);
                self.core.learn_attribute(handle, id);
                let qname = self.make_qname(id, prefix);
                Ok(ExiEvent::Attribute { qname: Rc::new(qname), value })
            }
            Deviation::AttributeXsiType => self.apply_xsi_type(),
            Deviation::AttributeXsiNil => self.apply_xsi_nil(handle),
            Deviation::NamespaceDecl => {
                let byte_aligned = self.core.options.byte_aligned();
                let uri_id = self.core.registry.read_uri(&mut self.reader, byte_aligned)?;
                let prefix = self
                    .core
                    .registry
                    .read_prefix(&mut self.reader, uri_id, byte_aligned)?;
                let local_element_ns = boolean::decode_mode(&mut self.reader, byte_aligned)?;
                let uri = Rc::clone(
                    self.core
                        .registry
                        .uri(uri_id)
                        .expect("uri id stems from read_uri")
                        .namespace_uri(),
                );
                let context = self.core.context_mut();
                context.ns_declarations.push((Rc::clone(&uri), Rc::clone(&prefix)));
                if local_element_ns {
                    context.prefix = Some(Rc::clone(&prefix));
                }
                Ok(ExiEvent::NamespaceDeclaration(NsContent {
                    uri,
                    prefix,
                    local_element_ns,
                }))
            }
            Deviation::StartElementGeneric => {
                let (id, prefix) = self.read_qname()?;
                self.core.learn_start_element(handle, id);
                let continuation = self
                    .core
                    .deviation_continuation(handle, Deviation::StartElementGeneric);
                let child = self.core.element_grammar(id);
                let qname = self.make_qname(id, prefix);
                self.core.push_element(continuation, id, child);
                self.core.context_mut().prefix = qname.prefix.clone();
                Ok(ExiEvent::StartElement(Rc::new(qname)))
            }
            Deviation::CharactersGeneric => {
                let owner = self
                    .core
                    .context()
                    .qname
                    .ok_or_else(|| Error::malformed("characters outside any element"))?;
                let text = self.core.values.read_value(
                    &mut self.reader,
                    owner,
                    self.core.options.byte_aligned(),
                )?;
                self.core.learn_characters(handle);
                let continuation = self
                    .core
                    .deviation_continuation(handle, Deviation::CharactersGeneric);
                self.core.transition(continuation);
                Ok(ExiEvent::Characters(Value::String(text)))
            }
            Deviation::Doctype => {
                let name = string::decode(&mut self.reader)?;
                let public_id = string::decode(&mut self.reader)?;
                let system_id = string::decode(&mut self.reader)?;
                let text = string::decode(&mut self.reader)?;
                Ok(ExiEvent::Doctype(DoctypeContent {
                    name: name.into(),
                    public_id: public_id.into(),
                    system_id: system_id.into(),
                    text: text.into(),
                }))
            }
            Deviation::EntityReference => {
                let name = string::decode(&mut self.reader)?;
                let continuation = self
                    .core
                    .deviation_continuation(handle, Deviation::EntityReference);
                self.core.transition(continuation);
                Ok(ExiEvent::EntityReference(name.into()))
            }
            Deviation::CommentPi => {
                let continuation = self.core.deviation_continuation(handle, Deviation::CommentPi);
                let event = match third.expect("read_event_code resolves the third level") {
                    ThirdLevel::Comment => {
                        ExiEvent::Comment(string::decode(&mut self.reader)?.into())
                    }
                    ThirdLevel::Pi => {
                        let target = string::decode(&mut self.reader)?;
                        let data = string::decode(&mut self.reader)?;
                        ExiEvent::ProcessingInstruction(PiContent {
                            target: target.into(),
                            data: data.into(),
                        })
                    }
                };
                self.core.transition(continuation);
                Ok(event)
            }
            Deviation::SelfContained => Err(Error::UnsupportedOption(
                "selfContained subtree coding".into(),
            )),
        }
    }

    fn apply_xsi_type(&mut self) -> Result<ExiEvent> {
        let (type_id, _) = self.read_qname()?;
        let type_qname = self.make_qname(type_id, None);

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

        let remapped = match self
            .core
            .options
            .datatype_representation_map
            .iter()
            .find(|e| e.type_qname == type_qname)
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

        let at = self.make_qname(QNameId::xsi_type(), None);
        Ok(ExiEvent::Attribute {
            qname: Rc::new(at),
            value: Value::QName(type_qname),
        })
    }

    fn apply_xsi_nil(&mut self, handle: GrammarHandle) -> Result<ExiEvent> {
        let nil = boolean::decode_mode(&mut self.reader, self.core.options.byte_aligned())?;
        if nil {
            let type_empty = match &self.core.grammars.get(handle).kind {
                GrammarKind::SchemaInformed { type_empty, .. } => *type_empty,
                _ => None,
            };
            match type_empty {
                Some(g) => self.core.transition(g),
                None => self
                    .core
                    .warn(Error::invariant("xsi:nil without empty-type grammar")),
            }
        }
        let at = self.make_qname(QNameId::xsi_nil(), None);
        Ok(ExiEvent::Attribute {
            qname: Rc::new(at),
            value: Value::Boolean(nil),
        })
    }

    // === content helpers (mirrors of the encoder) ===

    fn read_qname(&mut self) -> Result<(QNameId, Option<Rc<str>>)> {
        let byte_aligned = self.core.options.byte_aligned();
        let uri_id = self.core.registry.read_uri(&mut self.reader, byte_aligned)?;
        let id = self
            .core
            .registry
            .read_local_name(&mut self.reader, uri_id, byte_aligned)?;
        let prefix = if self.core.options.preserve.prefixes {
            self.core
                .registry
                .read_qname_prefix(&mut self.reader, uri_id, byte_aligned)?
        } else {
            None
        };
        Ok((id, prefix))
    }

    fn read_se_prefix(&mut self, id: QNameId) -> Result<Option<Rc<str>>> {
        if self.core.options.preserve.prefixes {
            self.core.registry.read_qname_prefix(
                &mut self.reader,
                id.uri_id,
                self.core.options.byte_aligned(),
            )
        } else {
            Ok(None)
        }
    }

    /// Builds the caller-facing qname; without prefix preservation the
    /// default-prefix policy supplies a synthesized prefix (Spec 7.1.7).
    fn make_qname(&self, id: QNameId, prefix: Option<Rc<str>>) -> QName {
        let qnc = self.core.registry.qname_context(id);
        let prefix = match prefix {
            Some(p) => Some(p),
            None if !qnc.namespace_uri().is_empty() => Some(Rc::clone(qnc.default_prefix())),
            None => None,
        };
        QName {
            uri: Rc::clone(qnc.namespace_uri()),
            local_name: Rc::clone(qnc.local_name()),
            prefix,
        }
    }

    fn read_attribute_value(&mut self, id: QNameId, datatype: Datatype) -> Result<Value> {
        match datatype {
            Datatype::String => {
                let text = self.core.values.read_value(
                    &mut self.reader,
                    id,
                    self.core.options.byte_aligned(),
                )?;
                Ok(Value::String(text))
            }
            typed => typed_value::decode_typed(
                &mut self.reader,
                typed,
                self.core.options.byte_aligned(),
            ),
        }
    }

    fn read_generic_attribute_value(&mut self, id: QNameId) -> Result<Value> {
        if id == QNameId::xsi_type() {
            let (type_id, _) = self.read_qname()?;
            return Ok(Value::QName(self.make_qname(type_id, None)));
        }
        let text = self
            .core
            .values
            .read_value(&mut self.reader, id, self.core.options.byte_aligned())?;
        Ok(Value::String(text))
    }

    fn read_content_value(&mut self, datatype: Datatype) -> Result<Value> {
        match datatype {
            Datatype::String => {
                let owner = self
                    .core
                    .context()
                    .qname
                    .ok_or_else(|| Error::malformed("characters outside any element"))?;
                let text = self.core.values.read_value(
                    &mut self.reader,
                    owner,
                    self.core.options.byte_aligned(),
                )?;
                Ok(Value::String(text))
            }
            typed => typed_value::decode_typed(
                &mut self.reader,
                typed,
                self.core.options.byte_aligned(),
            ),
        }
    }
}
