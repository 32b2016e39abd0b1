//! Grammars, productions and event codes (Spec 6.2, 8.2, 8.4, 8.5).
//!
//! Grammars live in an arena addressed by stable integer handles;
//! productions reference their successor grammar by handle, so cyclic
//! grammar graphs (content loops, fragment loops) need no reference
//! counting. A grammar owns only its first-level productions. The
//! deviation (second and third level) productions are derived from the
//! grammar kind and the fidelity options on every consultation, because
//! learning may change the first-level count between two consultations
//! and the event-code width follows it (Spec 8.4.3).
//!
//! Zwei Schichten: das unveraenderliche [`GrammarSet`] (built-in Dokument-
//! und Fragment-Grammatiken oder ein schema-informiertes Set aus dem
//! externen Schema-Compiler) und der Laufzeit-Overlay in
//! [`RuntimeGrammars`] mit den lernenden Element-Grammatiken.

use std::rc::Rc;

use crate::context::{NameRegistry, QNameId};
use crate::options::ExiOptions;
use crate::typed_value::Datatype;
use crate::bit_width;

/// Stable index of a grammar in its arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GrammarHandle(pub(crate) u32);

/// Grammar-level events, the closed union behind every production
/// (Spec 8.2). The undeclared escapes of Spec 8.4.3/8.5.4.4 are not
/// events of their own: they live on the deviation level ([`Deviation`])
/// and never appear inside a production.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    StartDocument,
    EndDocument,
    StartElement(QNameId),
    StartElementNs(u32),
    StartElementGeneric,
    EndElement,
    Attribute(QNameId),
    AttributeXsiType,
    AttributeXsiNil,
    AttributeNs(u32),
    AttributeGeneric,
    AttributeInvalidValue,
    AttributeAnyInvalidValue,
    Characters,
    CharactersGeneric,
    NamespaceDeclaration,
    Comment,
    ProcessingInstruction,
    DocType,
    EntityReference,
    SelfContained,
}

/// One production: an event bound to its successor grammar (Spec 8.1).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Production {
    pub event: Event,
    /// Successor; `None` for terminal events (EE, ED).
    pub next: Option<GrammarHandle>,
    /// Wire representation of the content, schema-informed only.
    pub datatype: Datatype,
}

impl Production {
    pub fn new(event: Event, next: Option<GrammarHandle>) -> Self {
        Self { event, next, datatype: Datatype::String }
    }

    pub fn typed(event: Event, next: Option<GrammarHandle>, datatype: Datatype) -> Self {
        Self { event, next, datatype }
    }
}

/// Deviation productions reachable through the escape code (Spec 8.4.3,
/// 8.5.4.4). Comments and processing instructions share one second-level
/// slot and split on the third level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deviation {
    EndElement,
    AttributeXsiType,
    AttributeXsiNil,
    AttributeGeneric,
    NamespaceDecl,
    SelfContained,
    StartElementGeneric,
    CharactersGeneric,
    Doctype,
    EntityReference,
    CommentPi,
}

/// Structural role of a grammar, fixing its deviation set.
#[derive(Debug, Clone, PartialEq)]
pub enum GrammarKind {
    /// Document: the sole SD production (Spec 8.4.1).
    Document,
    /// DocContent: SE (\*), with DT/CM/PI deviations (Spec 8.4.2).
    DocContent,
    /// DocEnd: ED, with CM/PI deviations.
    DocEnd,
    /// Fragment: the sole SD production.
    Fragment,
    /// FragmentContent: SE (\*) loop and ED, with CM/PI deviations.
    FragmentContent,
    /// Built-in StartTagContent; learns, content grammar alongside
    /// (Spec 8.4.3).
    BuiltInStartTag { content: GrammarHandle },
    /// Built-in ElementContent; EE at code 0, learns SE/CH.
    BuiltInElementContent,
    /// Schema-informed element or type grammar (Spec 8.5).
    SchemaInformed {
        /// First start-tag grammars admit xsi:type and xsi:nil.
        first_start_tag: bool,
        nillable: bool,
        type_castable: bool,
        /// Grammar coding the content of a nilled element.
        type_empty: Option<GrammarHandle>,
    },
}

/// A finite set of productions (Spec 8.1).
#[derive(Debug, Clone)]
pub struct Grammar {
    pub kind: GrammarKind,
    /// First-level productions in event-code order.
    productions: Vec<Production>,
}

impl Grammar {
    pub fn new(kind: GrammarKind) -> Self {
        Self { kind, productions: Vec::new() }
    }

    pub fn with_productions(kind: GrammarKind, productions: Vec<Production>) -> Self {
        Self { kind, productions }
    }

    pub fn production_count(&self) -> usize {
        self.productions.len()
    }

    pub fn production(&self, code: usize) -> Option<&Production> {
        self.productions.get(code)
    }

    pub fn productions(&self) -> &[Production] {
        &self.productions
    }

    /// Finds the first-level production for an exact event match.
    pub fn find_event(&self, event: Event) -> Option<usize> {
        self.productions.iter().position(|p| p.event == event)
    }

    /// Finds the first-level SE production for a qname.
    pub fn find_start_element(&self, qname: QNameId) -> Option<usize> {
        self.find_event(Event::StartElement(qname))
    }

    /// Finds the first-level AT production for a qname.
    pub fn find_attribute(&self, qname: QNameId) -> Option<usize> {
        self.find_event(Event::Attribute(qname))
    }

    /// True when learning may extend this grammar (Spec 8.4.3).
    pub fn is_built_in(&self) -> bool {
        matches!(
            self.kind,
            GrammarKind::BuiltInStartTag { .. } | GrammarKind::BuiltInElementContent
        )
    }

    /// Kinds whose built-in variant learns: the element grammars plus the
    /// document and fragment content grammars (Spec 8.4.1, 8.4.2, 8.4.3).
    pub fn is_learnable_kind(&self) -> bool {
        self.is_built_in()
            || matches!(self.kind, GrammarKind::DocContent | GrammarKind::FragmentContent)
    }

    /// Learning inserts at the front: the newest production takes event
    /// code 0 and shifts the older ones (Spec 8.4.3).
    pub(crate) fn learn(&mut self, production: Production) {
        debug_assert!(self.is_learnable_kind(), "this grammar kind never learns");
        self.productions.insert(0, production);
    }

    /// The deviation entries reachable through the escape code, derived
    /// from kind and options on every call (Spec 8.3, 8.4.3, 8.5.4.4.1).
    pub fn deviations(&self, options: &ExiOptions) -> Vec<Deviation> {
        let mut out = Vec::new();
        let comment_pi = options.preserve.comments || options.preserve.pis;
        match &self.kind {
            GrammarKind::Document | GrammarKind::Fragment => {}
            GrammarKind::DocContent => {
                if options.preserve.dtd {
                    out.push(Deviation::Doctype);
                }
                if comment_pi {
                    out.push(Deviation::CommentPi);
                }
            }
            GrammarKind::DocEnd | GrammarKind::FragmentContent => {
                if comment_pi {
                    out.push(Deviation::CommentPi);
                }
            }
            GrammarKind::BuiltInStartTag { .. } => {
                out.push(Deviation::EndElement);
                out.push(Deviation::AttributeGeneric);
                if options.preserve.prefixes {
                    out.push(Deviation::NamespaceDecl);
                }
                if options.self_contained {
                    out.push(Deviation::SelfContained);
                }
                out.push(Deviation::StartElementGeneric);
                out.push(Deviation::CharactersGeneric);
                if options.preserve.dtd {
                    out.push(Deviation::EntityReference);
                }
                if comment_pi {
                    out.push(Deviation::CommentPi);
                }
            }
            GrammarKind::BuiltInElementContent => {
                out.push(Deviation::StartElementGeneric);
                out.push(Deviation::CharactersGeneric);
                if options.preserve.dtd {
                    out.push(Deviation::EntityReference);
                }
                if comment_pi {
                    out.push(Deviation::CommentPi);
                }
            }
            GrammarKind::SchemaInformed {
                first_start_tag,
                nillable,
                type_castable,
                ..
            } => {
                if options.strict {
                    // Spec 8.5.4.4.2: nur xsi:type/xsi:nil am ersten
                    // Start-Tag, und nur wenn zulaessig
                    if *first_start_tag {
                        if *type_castable {
                            out.push(Deviation::AttributeXsiType);
                        }
                        if *nillable {
                            out.push(Deviation::AttributeXsiNil);
                        }
                    }
                    return out;
                }
                if self.find_event(Event::EndElement).is_none() {
                    out.push(Deviation::EndElement);
                }
                if *first_start_tag {
                    out.push(Deviation::AttributeXsiType);
                    out.push(Deviation::AttributeXsiNil);
                }
                out.push(Deviation::AttributeGeneric);
                if *first_start_tag {
                    if options.preserve.prefixes {
                        out.push(Deviation::NamespaceDecl);
                    }
                    if options.self_contained {
                        out.push(Deviation::SelfContained);
                    }
                }
                out.push(Deviation::StartElementGeneric);
                out.push(Deviation::CharactersGeneric);
                if options.preserve.dtd {
                    out.push(Deviation::EntityReference);
                }
                if comment_pi {
                    out.push(Deviation::CommentPi);
                }
            }
        }
        out
    }

    /// Width of the first event-code part: `⌈log₂(n₁ + e)⌉` where e
    /// counts the escape to the deviation level (Spec 6.2).
    pub fn first_part_width(&self, options: &ExiOptions) -> u8 {
        let escape = usize::from(!self.deviations(options).is_empty());
        bit_width::for_count(self.production_count() + escape)
    }

    /// The escape value selecting the deviation level.
    pub fn escape_code(&self) -> u64 {
        self.production_count() as u64
    }
}

/// An immutable, shareable grammar arena with its entry points
/// (the §6.4 boundary object).
pub struct GrammarSet {
    pool: Vec<Grammar>,
    document: GrammarHandle,
    fragment: GrammarHandle,
    schema_informed: bool,
    schema_id: Option<String>,
}

impl GrammarSet {
    /// The built-in (schema-less) document and fragment grammars
    /// (Spec 8.4.1, 8.4.2).
    pub fn built_in() -> Self {
        let mut pool = Vec::with_capacity(5);

        // 0 Document, 1 DocContent, 2 DocEnd
        pool.push(Grammar::with_productions(
            GrammarKind::Document,
            vec![Production::new(Event::StartDocument, Some(GrammarHandle(1)))],
        ));
        pool.push(Grammar::with_productions(
            GrammarKind::DocContent,
            vec![Production::new(Event::StartElementGeneric, Some(GrammarHandle(2)))],
        ));
        pool.push(Grammar::with_productions(
            GrammarKind::DocEnd,
            vec![Production::new(Event::EndDocument, None)],
        ));

        // 3 Fragment, 4 FragmentContent
        pool.push(Grammar::with_productions(
            GrammarKind::Fragment,
            vec![Production::new(Event::StartDocument, Some(GrammarHandle(4)))],
        ));
        pool.push(Grammar::with_productions(
            GrammarKind::FragmentContent,
            vec![
                Production::new(Event::StartElementGeneric, Some(GrammarHandle(4))),
                Production::new(Event::EndDocument, None),
            ],
        ));

        Self {
            pool,
            document: GrammarHandle(0),
            fragment: GrammarHandle(3),
            schema_informed: false,
            schema_id: None,
        }
    }

    pub fn document_grammar(&self) -> GrammarHandle {
        self.document
    }

    pub fn fragment_grammar(&self) -> GrammarHandle {
        self.fragment
    }

    pub fn is_schema_informed(&self) -> bool {
        self.schema_informed
    }

    pub fn schema_id(&self) -> Option<&str> {
        self.schema_id.as_deref()
    }

    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    pub fn get(&self, handle: GrammarHandle) -> &Grammar {
        &self.pool[handle.0 as usize]
    }
}

/// The grammar description consumed by the coder: an immutable set plus
/// the name registry carrying the per-qname grammar associations.
#[derive(Clone)]
pub struct Grammars {
    set: Rc<GrammarSet>,
    registry_template: NameRegistry,
}

impl Grammars {
    /// Schema-less coding: built-in grammars over the core registry.
    pub fn schema_less() -> Self {
        Self {
            set: Rc::new(GrammarSet::built_in()),
            registry_template: NameRegistry::core(),
        }
    }

    pub(crate) fn from_parts(set: GrammarSet, registry: NameRegistry) -> Self {
        Self { set: Rc::new(set), registry_template: registry }
    }

    pub fn set(&self) -> &Rc<GrammarSet> {
        &self.set
    }

    pub fn is_schema_informed(&self) -> bool {
        self.set.schema_informed
    }

    pub fn schema_id(&self) -> Option<&str> {
        self.set.schema_id()
    }

    /// A fresh registry for one codec instance.
    pub fn new_registry(&self) -> NameRegistry {
        self.registry_template.clone()
    }
}

/// Assembles a schema-informed grammar description (the boundary with the
/// external schema compiler, Spec 8.5).
///
/// Der Compiler registriert Namespaces, Namen und Grammatiken und
/// verknuepft globale Elemente und Typen; `finish` ergaenzt Dokument- und
/// Fragment-Grammatik ueber den globalen Elementen.
pub struct GrammarBuilder {
    registry: NameRegistry,
    pool: Vec<Grammar>,
    global_elements: Vec<QNameId>,
}

impl GrammarBuilder {
    pub fn new() -> Self {
        Self {
            registry: NameRegistry::core(),
            pool: Vec::new(),
            global_elements: Vec::new(),
        }
    }

    /// Registers a namespace; idempotent.
    pub fn namespace(&mut self, uri: &str) -> u32 {
        match self.registry.lookup_uri(uri) {
            Some(id) => id,
            None => self.registry.add_uri(uri),
        }
    }

    /// Registers a name; idempotent.
    pub fn name(&mut self, uri: &str, local_name: &str) -> QNameId {
        self.registry.resolve(uri, local_name)
    }

    /// Creates an empty grammar of the given kind.
    pub fn grammar(&mut self, kind: GrammarKind) -> GrammarHandle {
        let handle = GrammarHandle((self.pool.len() + RESERVED_DOCUMENT_GRAMMARS) as u32);
        self.pool.push(Grammar::new(kind));
        handle
    }

    /// Appends a production; order defines the event codes.
    pub fn production(&mut self, grammar: GrammarHandle, production: Production) {
        let idx = grammar.0 as usize - RESERVED_DOCUMENT_GRAMMARS;
        self.pool[idx].productions.push(production);
    }

    /// Declares a global element with its grammar (Spec 8.5.2).
    pub fn global_element(&mut self, qname: QNameId, grammar: GrammarHandle) {
        self.registry.qname_context_mut(qname).global_element_grammar = Some(grammar);
        self.global_elements.push(qname);
    }

    /// Associates a named type's grammar for xsi:type casts (Spec 8.5.4.4).
    pub fn type_grammar(&mut self, qname: QNameId, grammar: GrammarHandle) {
        self.registry.qname_context_mut(qname).type_grammar = Some(grammar);
    }

    /// Declares a global attribute's datatype.
    pub fn global_attribute(&mut self, qname: QNameId, datatype: Datatype) {
        self.registry.qname_context_mut(qname).global_attribute_datatype = Some(datatype);
    }

    /// Finalises the description: builds the schema-informed document and
    /// fragment grammars over the global elements, sorted by local-name
    /// then URI (Spec 8.5.1), and freezes the registry's schema layer.
    pub fn finish(mut self, schema_id: Option<String>) -> Grammars {
        let mut sorted = self.global_elements.clone();
        sorted.sort_by(|a, b| {
            let qa = self.registry.qname_context(*a);
            let qb = self.registry.qname_context(*b);
            qa.local_name()
                .cmp(qb.local_name())
                .then_with(|| qa.namespace_uri().cmp(qb.namespace_uri()))
        });

        let mut pool = Vec::with_capacity(self.pool.len() + RESERVED_DOCUMENT_GRAMMARS);

        // 0 Document, 1 DocContent, 2 DocEnd (Spec 8.5.1: SE(G_0) ..
        // SE(G_n-1), dann SE(*))
        let mut doc_content = Vec::with_capacity(sorted.len() + 1);
        for qname in &sorted {
            debug_assert!(
                self.registry
                    .qname_context(*qname)
                    .global_element_grammar
                    .is_some(),
                "global element without grammar"
            );
            // Die Element-Grammatik haengt am QNameContext; der Nachfolger
            // des SE ist DocEnd
            doc_content.push(Production::new(
                Event::StartElement(*qname),
                Some(GrammarHandle(2)),
            ));
        }
        doc_content.push(Production::new(Event::StartElementGeneric, Some(GrammarHandle(2))));

        pool.push(Grammar::with_productions(
            GrammarKind::Document,
            vec![Production::new(Event::StartDocument, Some(GrammarHandle(1)))],
        ));
        pool.push(Grammar::with_productions(GrammarKind::DocContent, doc_content));
        pool.push(Grammar::with_productions(
            GrammarKind::DocEnd,
            vec![Production::new(Event::EndDocument, None)],
        ));

        // 3 Fragment, 4 FragmentContent
        let mut fragment_content = Vec::with_capacity(sorted.len() + 2);
        for qname in &sorted {
            fragment_content.push(Production::new(
                Event::StartElement(*qname),
                Some(GrammarHandle(4)),
            ));
        }
        fragment_content.push(Production::new(Event::StartElementGeneric, Some(GrammarHandle(4))));
        fragment_content.push(Production::new(Event::EndDocument, None));
        pool.push(Grammar::with_productions(
            GrammarKind::Fragment,
            vec![Production::new(Event::StartDocument, Some(GrammarHandle(4)))],
        ));
        pool.push(Grammar::with_productions(
            GrammarKind::FragmentContent,
            fragment_content,
        ));

        pool.append(&mut self.pool);

        self.registry.mark_schema_end();
        Grammars::from_parts(
            GrammarSet {
                pool,
                document: GrammarHandle(0),
                fragment: GrammarHandle(3),
                schema_informed: true,
                schema_id,
            },
            self.registry,
        )
    }
}

impl Default for GrammarBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Handles 0..=4 of a schema-informed set are the document and fragment
/// grammars built by [`GrammarBuilder::finish`].
const RESERVED_DOCUMENT_GRAMMARS: usize = 5;

/// The per-run grammar state: the shared immutable set plus the mutable
/// overlay of learning built-in element grammars (Spec 8.4.3).
pub struct RuntimeGrammars {
    base: Rc<GrammarSet>,
    runtime: Vec<Grammar>,
}

impl RuntimeGrammars {
    pub fn new(base: Rc<GrammarSet>) -> Self {
        Self { base, runtime: Vec::new() }
    }

    /// Drops every runtime grammar (Spec 5, codec reuse).
    pub fn init_for_each_run(&mut self) {
        self.runtime.clear();
    }

    pub fn get(&self, handle: GrammarHandle) -> &Grammar {
        let idx = handle.0 as usize;
        if idx < self.base.len() {
            self.base.get(handle)
        } else {
            &self.runtime[idx - self.base.len()]
        }
    }

    /// True for grammars living in the mutable overlay.
    pub fn is_runtime(&self, handle: GrammarHandle) -> bool {
        handle.0 as usize >= self.base.len()
    }

    /// Copies a base grammar into the overlay so it can learn; used for
    /// the built-in document and fragment content grammars (Spec 8.4.1,
    /// 8.4.2).
    pub fn clone_to_runtime(&mut self, handle: GrammarHandle) -> GrammarHandle {
        let clone = self.get(handle).clone();
        let new = GrammarHandle((self.base.len() + self.runtime.len()) as u32);
        self.runtime.push(clone);
        new
    }

    /// Repoints the SD production of a runtime copy.
    pub fn rewire_start_document(&mut self, handle: GrammarHandle, next: GrammarHandle) {
        let g = self.get_runtime_mut(handle);
        if let Some(idx) = g.find_event(Event::StartDocument) {
            g.productions[idx].next = Some(next);
        }
    }

    /// Replaces successor `old` with `new` in a runtime copy; keeps
    /// self-loops (fragment content) inside the overlay.
    pub fn rewire_next(&mut self, handle: GrammarHandle, old: GrammarHandle, new: GrammarHandle) {
        let g = self.get_runtime_mut(handle);
        for p in &mut g.productions {
            if p.next == Some(old) {
                p.next = Some(new);
            }
        }
    }

    fn get_runtime_mut(&mut self, handle: GrammarHandle) -> &mut Grammar {
        let idx = handle.0 as usize;
        debug_assert!(idx >= self.base.len(), "base grammars are immutable");
        &mut self.runtime[idx - self.base.len()]
    }

    /// Creates a fresh built-in element grammar pair and returns the
    /// StartTagContent handle (Spec 8.4.3).
    pub fn new_element_grammar(&mut self) -> GrammarHandle {
        let content = GrammarHandle((self.base.len() + self.runtime.len()) as u32);
        self.runtime.push(Grammar::new(GrammarKind::BuiltInElementContent));
        self.get_runtime_mut(content)
            .productions
            .push(Production::new(Event::EndElement, None));

        let start_tag = GrammarHandle((self.base.len() + self.runtime.len()) as u32);
        self.runtime
            .push(Grammar::new(GrammarKind::BuiltInStartTag { content }));
        start_tag
    }

    /// The ElementContent partner of a built-in grammar: the grammar
    /// itself for content grammars, the linked content for start tags.
    pub fn content_of(&self, handle: GrammarHandle) -> GrammarHandle {
        match self.get(handle).kind {
            GrammarKind::BuiltInStartTag { content } => content,
            _ => handle,
        }
    }

    /// Learns SE(qname) at the front of a built-in grammar. Start tags
    /// continue in their content grammar; the document and fragment
    /// content grammars inherit the successor of their SE (\*) production
    /// (Spec 8.4.1, 8.4.2, 8.4.3).
    pub fn learn_start_element(&mut self, handle: GrammarHandle, qname: QNameId) {
        let g = self.get(handle);
        let next = match g.kind {
            GrammarKind::BuiltInStartTag { content } => Some(content),
            GrammarKind::DocContent | GrammarKind::FragmentContent => g
                .find_event(Event::StartElementGeneric)
                .and_then(|idx| g.production(idx).unwrap().next),
            _ => Some(handle),
        };
        self.get_runtime_mut(handle)
            .learn(Production::new(Event::StartElement(qname), next));
    }

    /// Learns AT(qname); the grammar state is unchanged by attributes.
    pub fn learn_attribute(&mut self, handle: GrammarHandle, qname: QNameId) {
        self.get_runtime_mut(handle)
            .learn(Production::new(Event::Attribute(qname), Some(handle)));
    }

    /// Learns CH; the successor is the content grammar.
    pub fn learn_characters(&mut self, handle: GrammarHandle) {
        let next = self.content_of(handle);
        self.get_runtime_mut(handle)
            .learn(Production::new(Event::Characters, Some(next)));
    }

    /// Learns EE.
    pub fn learn_end_element(&mut self, handle: GrammarHandle) {
        self.get_runtime_mut(handle)
            .learn(Production::new(Event::EndElement, None));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Preserve;

    fn qn(uri: u32, local: u32) -> QNameId {
        QNameId { uri_id: uri, local_name_id: local }
    }

    // --- built-in document grammars (Spec 8.4.1, 8.4.2) ---

    #[test]
    fn document_grammar_is_single_sd() {
        let set = GrammarSet::built_in();
        let doc = set.get(set.document_grammar());
        assert_eq!(doc.production_count(), 1);
        assert_eq!(doc.production(0).unwrap().event, Event::StartDocument);
        // Eine Produktion, kein Deviation-Level: 0 Bits
        assert_eq!(doc.first_part_width(&ExiOptions::default()), 0);
    }

    #[test]
    fn doc_content_width_default_options() {
        let set = GrammarSet::built_in();
        let dc = set.get(GrammarHandle(1));
        let opts = ExiOptions::default();
        assert!(dc.deviations(&opts).is_empty());
        assert_eq!(dc.first_part_width(&opts), 0);
    }

    #[test]
    fn doc_content_deviations_with_fidelity() {
        let set = GrammarSet::built_in();
        let dc = set.get(GrammarHandle(1));
        let opts = ExiOptions::default().with_preserve(Preserve {
            dtd: true,
            comments: true,
            ..Preserve::default()
        });
        assert_eq!(
            dc.deviations(&opts),
            vec![Deviation::Doctype, Deviation::CommentPi]
        );
        // SE(*) + Escape: 1 Bit
        assert_eq!(dc.first_part_width(&opts), 1);
    }

    #[test]
    fn fragment_content_loops() {
        let set = GrammarSet::built_in();
        let fc = set.get(GrammarHandle(4));
        assert_eq!(fc.production(0).unwrap().next, Some(GrammarHandle(4)));
        assert_eq!(fc.production(1).unwrap().event, Event::EndDocument);
    }

    // --- built-in element grammars and learning (Spec 8.4.3) ---

    #[test]
    fn start_tag_deviations_default_options() {
        let base = Rc::new(GrammarSet::built_in());
        let mut rt = RuntimeGrammars::new(base);
        let st = rt.new_element_grammar();
        let opts = ExiOptions::default();
        let g = rt.get(st);
        assert_eq!(
            g.deviations(&opts),
            vec![
                Deviation::EndElement,
                Deviation::AttributeGeneric,
                Deviation::StartElementGeneric,
                Deviation::CharactersGeneric,
            ]
        );
        // Keine First-Level-Produktionen, nur der Escape: 0 Bits Part 1
        assert_eq!(g.first_part_width(&opts), 0);
        assert_eq!(g.escape_code(), 0);
    }

    #[test]
    fn element_content_has_ee_at_code_zero() {
        let base = Rc::new(GrammarSet::built_in());
        let mut rt = RuntimeGrammars::new(base);
        let st = rt.new_element_grammar();
        let content = rt.content_of(st);
        let g = rt.get(content);
        assert_eq!(g.production(0).unwrap().event, Event::EndElement);
        // EE + Escape -> 1 Bit
        assert_eq!(g.first_part_width(&ExiOptions::default()), 1);
    }

    #[test]
    fn learning_prepends_newest_at_code_zero() {
        let base = Rc::new(GrammarSet::built_in());
        let mut rt = RuntimeGrammars::new(base);
        let st = rt.new_element_grammar();

        rt.learn_characters(st);
        rt.learn_attribute(st, qn(0, 0));
        let g = rt.get(st);
        assert_eq!(g.production(0).unwrap().event, Event::Attribute(qn(0, 0)));
        assert_eq!(g.production(1).unwrap().event, Event::Characters);
        // 2 Produktionen + Escape: 2 Bits
        assert_eq!(g.first_part_width(&ExiOptions::default()), 2);
        assert_eq!(g.escape_code(), 2);
    }

    #[test]
    fn learned_se_points_to_content() {
        let base = Rc::new(GrammarSet::built_in());
        let mut rt = RuntimeGrammars::new(base);
        let st = rt.new_element_grammar();
        let content = rt.content_of(st);

        rt.learn_start_element(st, qn(0, 1));
        assert_eq!(
            rt.get(st).production(0).unwrap().next,
            Some(content),
            "SE learned in a start tag continues in element content"
        );

        rt.learn_start_element(content, qn(0, 1));
        assert_eq!(
            rt.get(content).production(0).unwrap().next,
            Some(content),
            "SE learned in element content loops"
        );
    }

    #[test]
    fn runtime_layer_clears_per_run() {
        let base = Rc::new(GrammarSet::built_in());
        let mut rt = RuntimeGrammars::new(base);
        let st = rt.new_element_grammar();
        rt.learn_characters(st);
        rt.init_for_each_run();
        let st2 = rt.new_element_grammar();
        assert_eq!(rt.get(st2).production_count(), 0, "fresh grammar after reset");
    }

    // --- schema-informed sets (Spec 8.5) ---

    fn tiny_schema() -> Grammars {
        let mut b = GrammarBuilder::new();
        let root = b.name("", "root");
        let content = b.grammar(GrammarKind::SchemaInformed {
            first_start_tag: false,
            nillable: false,
            type_castable: false,
            type_empty: None,
        });
        b.production(content, Production::new(Event::EndElement, None));
        let element = b.grammar(GrammarKind::SchemaInformed {
            first_start_tag: true,
            nillable: true,
            type_castable: false,
            type_empty: Some(content),
        });
        b.production(
            element,
            Production::typed(Event::Characters, Some(content), Datatype::Integer),
        );
        b.global_element(root, element);
        b.finish(Some("urn:tiny".into()))
    }

    #[test]
    fn builder_document_grammar_lists_global_elements() {
        let grammars = tiny_schema();
        assert!(grammars.is_schema_informed());
        assert_eq!(grammars.schema_id(), Some("urn:tiny"));
        let set = grammars.set();
        let dc = set.get(GrammarHandle(1));
        assert_eq!(dc.production_count(), 2);
        assert!(matches!(
            dc.production(0).unwrap().event,
            Event::StartElement(_)
        ));
        assert_eq!(dc.production(1).unwrap().event, Event::StartElementGeneric);
    }

    #[test]
    fn strict_first_start_tag_offers_only_xsi_deviations() {
        let grammars = tiny_schema();
        let registry = grammars.new_registry();
        let root = registry.lookup_uri("").unwrap();
        let root_id = registry
            .uri(root)
            .unwrap()
            .lookup_local_name("root")
            .unwrap();
        let qnc = registry.qname_context(qn(root, root_id));
        let element = qnc.global_element_grammar.unwrap();

        let opts = ExiOptions::default().with_strict();
        let g = grammars.set().get(element);
        assert_eq!(g.deviations(&opts), vec![Deviation::AttributeXsiNil]);
    }

    #[test]
    fn non_strict_first_start_tag_full_deviation_set() {
        let grammars = tiny_schema();
        let set = grammars.set();
        // Element-Grammar liegt hinter den 5 Dokument-Grammatiken
        let g = set.get(GrammarHandle(6));
        assert!(matches!(
            g.kind,
            GrammarKind::SchemaInformed { first_start_tag: true, .. }
        ));
        let devs = g.deviations(&ExiOptions::default());
        assert_eq!(
            devs,
            vec![
                Deviation::EndElement,
                Deviation::AttributeXsiType,
                Deviation::AttributeXsiNil,
                Deviation::AttributeGeneric,
                Deviation::StartElementGeneric,
                Deviation::CharactersGeneric,
            ]
        );
    }

    #[test]
    fn typed_production_carries_datatype() {
        let grammars = tiny_schema();
        let g = grammars.set().get(GrammarHandle(6));
        let ch = g.production(0).unwrap();
        assert_eq!(ch.event, Event::Characters);
        assert_eq!(ch.datatype, Datatype::Integer);
    }
}
