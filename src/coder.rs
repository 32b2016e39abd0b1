//! Shared state of the body encoder and decoder (Spec 6, 8.4.3).
//!
//! Both sides drive the same grammar walk: an element-context stack whose
//! top holds the current grammar, the runtime element grammars with their
//! learning counters, the name registry and the value string table.
//! `init_for_each_run` restores a reusable instance by dropping exactly
//! the runtime layers.

use std::rc::Rc;

use crate::bitstream::{BitReader, BitWriter};
use crate::context::{NameRegistry, QNameId};
use crate::error::{ErrorHandler, LogErrorHandler};
use crate::grammar::{Deviation, Grammar, GrammarHandle, Grammars, RuntimeGrammars};
use crate::options::ExiOptions;
use crate::string_table::ValueStringTable;
use crate::typed_value::{Datatype, Value};
use crate::{Error, FastIndexMap, Result, n_bit_unsigned_integer};

/// Initial element-stack capacity; the stack grows by doubling.
pub(crate) const INITIAL_STACK_CAPACITY: usize = 16;

/// One stack frame of the element walk.
#[derive(Debug)]
pub(crate) struct ElementContext {
    /// `None` only for the document-level frame.
    pub qname: Option<QNameId>,
    /// Current grammar; reassigned on every transition.
    pub grammar: GrammarHandle,
    /// The element's prefix as written (prefixes preserved only).
    pub prefix: Option<Rc<str>>,
    /// State of `xml:space` at this element, when declared.
    pub xml_space_preserve: Option<bool>,
    /// Prefix declarations of this element (prefixes preserved only).
    pub ns_declarations: Vec<(Rc<str>, Rc<str>)>,
    /// Content datatype forced by an xsi:type cast remapped through the
    /// datatype representation map.
    pub datatype_override: Option<Datatype>,
}

impl ElementContext {
    fn new(qname: Option<QNameId>, grammar: GrammarHandle) -> Self {
        Self {
            qname,
            grammar,
            prefix: None,
            xml_space_preserve: None,
            ns_declarations: Vec::new(),
            datatype_override: None,
        }
    }
}

/// A decoded event code: a first-level production or a deviation, the
/// latter possibly refined by the CM/PI third level.
#[derive(Debug)]
pub(crate) enum CodedEvent {
    Production(usize),
    Deviation(Deviation, Option<ThirdLevel>),
}

/// Members of the CM/PI third level (Spec 8.4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ThirdLevel {
    Comment,
    Pi,
}

/// State shared between [`crate::encoder::BodyEncoder`] and
/// [`crate::decoder::BodyDecoder`].
pub(crate) struct CoderCore {
    pub options: ExiOptions,
    pub registry: NameRegistry,
    pub values: ValueStringTable,
    pub grammars: RuntimeGrammars,
    pub schema_informed: bool,
    document_grammar: GrammarHandle,
    fragment_grammar: GrammarHandle,
    /// Runtime element grammars per qname, in discovery order (Spec 8.4.3).
    pub runtime_global_elements: FastIndexMap<QNameId, GrammarHandle>,
    pub stack: Vec<ElementContext>,
    /// Learned productions this run, compared against the profile cap.
    pub learned_productions: u32,
    pub handler: Box<dyn ErrorHandler>,
}

impl CoderCore {
    pub fn new(grammars: &Grammars, options: ExiOptions) -> Self {
        let set = Rc::clone(grammars.set());
        let document_grammar = set.document_grammar();
        let fragment_grammar = set.fragment_grammar();
        let mut core = Self {
            registry: grammars.new_registry(),
            values: ValueStringTable::new(),
            grammars: RuntimeGrammars::new(set),
            schema_informed: grammars.is_schema_informed(),
            document_grammar,
            fragment_grammar,
            runtime_global_elements: FastIndexMap::default(),
            stack: Vec::with_capacity(INITIAL_STACK_CAPACITY),
            learned_productions: 0,
            handler: Box::new(LogErrorHandler),
            options,
        };
        core.init_for_each_run();
        core
    }

    /// Clears the runtime layers and arms the document (or fragment)
    /// grammar for the next run (Spec 5).
    pub fn init_for_each_run(&mut self) {
        self.registry.init_for_each_run();
        self.values = ValueStringTable::with_options(
            self.options.value_max_length.map(|v| v as usize),
            self.options.value_partition_capacity.map(|v| v as usize),
            self.options.local_value_partitions,
        );
        self.grammars.init_for_each_run();
        self.runtime_global_elements.clear();
        self.learned_productions = 0;
        self.stack.clear();
        let mut start = if self.options.fragment {
            self.fragment_grammar
        } else {
            self.document_grammar
        };
        if !self.schema_informed {
            // Built-in DocContent/FragmentContent lernen SE(qname);
            // dafuer wandert die Kette in den Overlay (Spec 8.4.1, 8.4.2)
            start = self.clone_document_chain(start);
        }
        self.stack.push(ElementContext::new(None, start));
    }

    /// Clones a built-in start grammar and its content grammar into the
    /// runtime overlay, rewiring the SD production.
    fn clone_document_chain(&mut self, start: GrammarHandle) -> GrammarHandle {
        let sd_next = self
            .grammars
            .get(start)
            .find_event(crate::grammar::Event::StartDocument)
            .and_then(|idx| self.grammars.get(start).production(idx).unwrap().next);
        let new_start = self.grammars.clone_to_runtime(start);
        if let Some(content) = sd_next {
            let new_content = self.grammars.clone_to_runtime(content);
            self.grammars.rewire_start_document(new_start, new_content);
            // Der SE(*)-Loop der Fragment-Grammatik bleibt im Overlay
            self.grammars.rewire_next(new_content, content, new_content);
        }
        new_start
    }

    pub fn set_error_handler(&mut self, handler: Box<dyn ErrorHandler>) {
        self.handler = handler;
    }

    pub fn warn(&mut self, error: Error) {
        self.handler.warning(&error);
    }

    // === element stack ===

    pub fn context(&self) -> &ElementContext {
        self.stack.last().expect("stack never empty while coding")
    }

    pub fn context_mut(&mut self) -> &mut ElementContext {
        self.stack.last_mut().expect("stack never empty while coding")
    }

    pub fn current_grammar(&self) -> GrammarHandle {
        self.context().grammar
    }

    pub fn transition(&mut self, next: GrammarHandle) {
        self.context_mut().grammar = next;
    }

    /// Sets the parent's continuation and opens the child frame.
    pub fn push_element(
        &mut self,
        continuation: GrammarHandle,
        qname: QNameId,
        child_grammar: GrammarHandle,
    ) {
        self.context_mut().grammar = continuation;
        self.stack.push(ElementContext::new(Some(qname), child_grammar));
    }

    pub fn pop_element(&mut self) -> Result<ElementContext> {
        if self.stack.len() < 2 {
            return Err(Error::invariant("end-element without open element"));
        }
        Ok(self.stack.pop().expect("checked depth"))
    }

    /// Resolves the prefix bound to `uri` on the open-element chain,
    /// innermost declaration first (Spec 7.1.7).
    pub fn declared_prefix(&self, uri: &str) -> Option<Rc<str>> {
        for context in self.stack.iter().rev() {
            for (declared_uri, prefix) in context.ns_declarations.iter().rev() {
                if &**declared_uri == uri {
                    return Some(Rc::clone(prefix));
                }
            }
        }
        None
    }

    /// Records an `xml:space` attribute on the current element context.
    /// Encoder and decoder call this from their attribute paths, so the
    /// flag survives the wire in both directions.
    pub fn note_xml_space(&mut self, id: QNameId, value: &Value) {
        // xml:space (URI 1, Local-Name 3 in Table D-3)
        if id.uri_id != 1 || id.local_name_id != 3 {
            return;
        }
        if let Value::String(s) = value {
            match &**s {
                "preserve" => self.context_mut().xml_space_preserve = Some(true),
                "default" => self.context_mut().xml_space_preserve = Some(false),
                _ => {}
            }
        }
    }

    /// Effective `xml:space` state: the innermost declaration wins,
    /// `None` when no open element declared one.
    pub fn xml_space_preserve(&self) -> Option<bool> {
        self.stack.iter().rev().find_map(|c| c.xml_space_preserve)
    }

    // === runtime element grammars and learning (Spec 8.4.3) ===

    /// The grammar a start tag of `qname` opens: the schema-bound grammar,
    /// an already known runtime grammar, or a fresh built-in pair. The
    /// profile cap stops the runtime map from growing; beyond it every
    /// unknown element codes against a throwaway grammar, identically on
    /// both sides.
    pub fn element_grammar(&mut self, qname: QNameId) -> GrammarHandle {
        if let Some(handle) = self.registry.qname_context(qname).global_element_grammar {
            return handle;
        }
        if let Some(handle) = self.runtime_global_elements.get(&qname) {
            return *handle;
        }
        let handle = self.grammars.new_element_grammar();
        let capped = self.schema_informed
            && self
                .options
                .max_built_in_element_grammars
                .is_some_and(|cap| self.runtime_global_elements.len() >= cap as usize);
        if !capped {
            self.runtime_global_elements.insert(qname, handle);
        }
        handle
    }

    /// True while the profile production cap permits learning. Schema-less
    /// coding always learns (the caps are a schema-informed profile
    /// feature).
    pub fn may_learn(&self) -> bool {
        if !self.schema_informed {
            return true;
        }
        self.options
            .max_built_in_productions
            .map_or(true, |cap| self.learned_productions < cap)
    }

    /// True when `handle` is a mutable grammar of a learnable kind.
    fn learns(&self, handle: GrammarHandle) -> bool {
        self.grammars.is_runtime(handle)
            && self.grammars.get(handle).is_learnable_kind()
            && self.may_learn()
    }

    pub fn learn_start_element(&mut self, handle: GrammarHandle, qname: QNameId) {
        if self.learns(handle) {
            self.grammars.learn_start_element(handle, qname);
            self.learned_productions += 1;
        }
    }

    pub fn learn_attribute(&mut self, handle: GrammarHandle, qname: QNameId) {
        // xsi-Attribute werden nie gelernt (Spec 8.4.3)
        if qname == QNameId::xsi_type() || qname == QNameId::xsi_nil() {
            return;
        }
        if self.learns(handle) {
            self.grammars.learn_attribute(handle, qname);
            self.learned_productions += 1;
        }
    }

    pub fn learn_characters(&mut self, handle: GrammarHandle) {
        if self.learns(handle) {
            self.grammars.learn_characters(handle);
            self.learned_productions += 1;
        }
    }

    pub fn learn_end_element(&mut self, handle: GrammarHandle) {
        if self.learns(handle) {
            self.grammars.learn_end_element(handle);
            self.learned_productions += 1;
        }
    }

    /// Continuation of a deviation production (Spec 8.4.3: content-ish
    /// events move a built-in start tag to its element content; attributes
    /// and namespace declarations stay).
    pub fn deviation_continuation(
        &self,
        handle: GrammarHandle,
        deviation: Deviation,
    ) -> GrammarHandle {
        match (&self.grammars.get(handle).kind, deviation) {
            (
                crate::grammar::GrammarKind::BuiltInStartTag { .. },
                Deviation::AttributeGeneric | Deviation::NamespaceDecl,
            ) => handle,
            (crate::grammar::GrammarKind::BuiltInStartTag { content }, _) => *content,
            _ => handle,
        }
    }

    // === event codes (Spec 6.2) ===

    /// Emits the event code of first-level production `idx`.
    pub fn write_production_code(&self, writer: &mut BitWriter, grammar: &Grammar, idx: usize) {
        let width = grammar.first_part_width(&self.options);
        n_bit_unsigned_integer::encode_mode(
            writer,
            idx as u64,
            width,
            self.options.byte_aligned(),
        );
    }

    /// Emits the escape plus the deviation's second (and third) part.
    pub fn write_deviation_code(
        &self,
        writer: &mut BitWriter,
        grammar: &Grammar,
        deviation: Deviation,
        third: Option<ThirdLevel>,
    ) -> Result<()> {
        let byte_aligned = self.options.byte_aligned();
        let deviations = grammar.deviations(&self.options);
        let part2 = deviations
            .iter()
            .position(|d| *d == deviation)
            .ok_or_else(|| Error::invariant("event not admitted by the current grammar"))?;

        let width1 = grammar.first_part_width(&self.options);
        n_bit_unsigned_integer::encode_mode(writer, grammar.escape_code(), width1, byte_aligned);
        let width2 = crate::bit_width::for_count(deviations.len());
        n_bit_unsigned_integer::encode_mode(writer, part2 as u64, width2, byte_aligned);

        if deviation == Deviation::CommentPi {
            let members = self.comment_pi_members();
            let third = third.ok_or_else(|| Error::invariant("CM/PI event without third part"))?;
            let part3 = members
                .iter()
                .position(|m| *m == third)
                .ok_or_else(|| Error::invariant("CM/PI kind disabled by fidelity options"))?;
            let width3 = crate::bit_width::for_count(members.len());
            n_bit_unsigned_integer::encode_mode(writer, part3 as u64, width3, byte_aligned);
        }
        Ok(())
    }

    /// Reads one event code against the current grammar.
    pub fn read_event_code(
        &self,
        reader: &mut BitReader,
        grammar: &Grammar,
    ) -> Result<CodedEvent> {
        let byte_aligned = self.options.byte_aligned();
        let width1 = grammar.first_part_width(&self.options);
        let part1 = n_bit_unsigned_integer::decode_mode(reader, width1, byte_aligned)?;

        if (part1 as usize) < grammar.production_count() {
            return Ok(CodedEvent::Production(part1 as usize));
        }
        let deviations = grammar.deviations(&self.options);
        if part1 != grammar.escape_code() || deviations.is_empty() {
            return Err(Error::malformed("event code outside production count"));
        }
        let width2 = crate::bit_width::for_count(deviations.len());
        let part2 = n_bit_unsigned_integer::decode_mode(reader, width2, byte_aligned)? as usize;
        let deviation = *deviations
            .get(part2)
            .ok_or_else(|| Error::malformed("deviation code out of range"))?;

        if deviation == Deviation::CommentPi {
            let members = self.comment_pi_members();
            let width3 = crate::bit_width::for_count(members.len());
            let part3 = n_bit_unsigned_integer::decode_mode(reader, width3, byte_aligned)? as usize;
            let third = *members
                .get(part3)
                .ok_or_else(|| Error::malformed("CM/PI code out of range"))?;
            Ok(CodedEvent::Deviation(deviation, Some(third)))
        } else {
            Ok(CodedEvent::Deviation(deviation, None))
        }
    }

    /// The third-level members admitted by the fidelity options.
    fn comment_pi_members(&self) -> Vec<ThirdLevel> {
        let mut members = Vec::with_capacity(2);
        if self.options.preserve.comments {
            members.push(ThirdLevel::Comment);
        }
        if self.options.preserve.pis {
            members.push(ThirdLevel::Pi);
        }
        members
    }
}
