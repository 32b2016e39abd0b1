//! exicore: the core of an EXI 1.0 (W3C) codec.
//!
//! A bidirectional converter between in-order XML event streams and the
//! compact EXI binary form: bit-level channels, typed-value codecs, the
//! string table, name contexts, the grammar state machine, the event
//! coder and the header codec. The XML schema compiler, SAX/DOM event
//! sources and sinks, CLI surface and the DEFLATE layer of the
//! compression modes are external collaborators.
//!
//! # Beispiel
//!
//! ```
//! use exicore::{ExiEvent, ExiOptions};
//! use exicore::encoder::encode;
//! use exicore::decoder::decode;
//!
//! let events = vec![
//!     ExiEvent::StartDocument,
//!     ExiEvent::start_element("greeting"),
//!     ExiEvent::characters("Hello"),
//!     ExiEvent::EndElement,
//!     ExiEvent::EndDocument,
//! ];
//! let bytes = encode(&events, &ExiOptions::default()).unwrap();
//!
//! let (decoded, _opts) = decode(&bytes).unwrap();
//! assert_eq!(decoded.len(), 5);
//! ```

pub mod binary;
pub mod bit_width;
pub mod bitstream;
pub mod boolean;
pub mod coder;
pub mod context;
pub mod datetime;
pub mod decimal;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod event;
pub mod float;
pub mod grammar;
pub mod header;
pub mod integer;
pub mod n_bit_unsigned_integer;
pub mod options;
pub mod options_codec;
pub mod qname;
pub mod string;
pub mod string_table;
pub mod typed_value;
pub mod unsigned_integer;

pub use error::{Error, ErrorHandler, LogErrorHandler, Result};

/// HashMap mit ahash (schnell, nicht DoS-resistent; nur fuer interne
/// Datenstrukturen).
pub(crate) type FastHashMap<K, V> = hashbrown::HashMap<K, V, ahash::RandomState>;

/// IndexMap mit ahash: deterministische Reihenfolge fuer Strukturen, die
/// Encoder und Decoder im Gleichschritt fuehren.
pub(crate) type FastIndexMap<K, V> = indexmap::IndexMap<K, V, ahash::RandomState>;

// Public API: events and names
pub use event::{DoctypeContent, ExiEvent, NsContent, PiContent};
pub use qname::QName;

// Public API: options and header
pub use header::ExiHeader;
pub use options::{Alignment, DatatypeRepresentation, ExiOptions, Preserve, SchemaId};

// Public API: typed values
pub use typed_value::{Datatype, IntegerValue, Value};

// Public API: coding
pub use decoder::{BodyDecoder, SchemaIdResolver, decode, decode_with_grammars, decode_with_resolver};
pub use encoder::{BodyEncoder, EncoderConfig, encode, encode_with_config, encode_with_grammars};

// Public API: grammar description boundary
pub use grammar::{GrammarBuilder, GrammarHandle, Grammars};
