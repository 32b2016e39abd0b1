//! Value string table: local and global partitions (Spec 7.3, 7.3.3).
//!
//! Repeated string content is replaced by compact identifiers. Every value
//! inserted on a miss joins the local partition of the qname it first
//! appeared under and the global partition; a later occurrence is a local
//! hit (same qname) or a global hit (any other qname). Encoder and decoder
//! never exchange table state; both sides replay the identical insertion
//! schedule and therefore agree on every identifier and field width.

use std::rc::Rc;

use crate::bitstream::{BitReader, BitWriter};
use crate::context::QNameId;
use crate::{Error, FastHashMap, Result, bit_width, n_bit_unsigned_integer, string, unsigned_integer};

/// Where a value was found during encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueHit {
    Local(usize),
    Global(usize),
    Miss,
}

#[derive(Clone)]
struct ValueEntry {
    owner: QNameId,
    local_id: usize,
    global_id: usize,
}

#[derive(Default)]
struct LocalPartition {
    /// Dense ids; eviction clears a slot but never renumbers.
    slots: Vec<Option<Rc<str>>>,
}

/// The value partitions of one stream (Spec 7.3.3).
pub struct ValueStringTable {
    /// Encoder-side value lookup; mirrors the live global content.
    lookup: FastHashMap<Rc<str>, ValueEntry>,
    /// Global id to value; bounded tables wrap instead of growing.
    global: Vec<Option<Rc<str>>>,
    /// Owner and local id per global slot, for eviction.
    global_meta: Vec<Option<(QNameId, usize)>>,
    locals: FastHashMap<QNameId, LocalPartition>,
    /// Total insertions performed, before any modulo.
    inserted: u64,
    local_enabled: bool,
    value_max_length: Option<usize>,
    capacity: Option<usize>,
}

impl ValueStringTable {
    /// Creates an unbounded table with local partitions enabled.
    pub fn new() -> Self {
        Self::with_options(None, None, true)
    }

    /// Creates a table honouring `valueMaxLength`, `valuePartitionCapacity`
    /// and the profile's `localValuePartitions` parameter (Spec 5.4).
    pub fn with_options(
        value_max_length: Option<usize>,
        capacity: Option<usize>,
        local_enabled: bool,
    ) -> Self {
        Self {
            lookup: FastHashMap::default(),
            global: Vec::new(),
            global_meta: Vec::new(),
            locals: FastHashMap::default(),
            inserted: 0,
            local_enabled,
            value_max_length,
            capacity,
        }
    }

    /// Forgets all content for the next run.
    pub fn init_for_each_run(&mut self) {
        self.lookup.clear();
        self.global.clear();
        self.global_meta.clear();
        self.locals.clear();
        self.inserted = 0;
    }

    /// Live entries in the global partition, the count behind the
    /// global-hit field width (Spec 7.3.3).
    pub fn global_size(&self) -> usize {
        match self.capacity {
            Some(cap) => (self.inserted as usize).min(cap),
            None => self.global.len(),
        }
    }

    /// Slot count of a local partition, the count behind the local-hit
    /// field width.
    pub fn local_size(&self, qname: QNameId) -> usize {
        self.locals.get(&qname).map_or(0, |p| p.slots.len())
    }

    /// Looks a value up without touching the stream.
    pub fn probe(&self, qname: QNameId, value: &str) -> ValueHit {
        match self.lookup.get(value) {
            Some(entry) if self.local_enabled && entry.owner == qname => {
                ValueHit::Local(entry.local_id)
            }
            Some(entry) => ValueHit::Global(entry.global_id),
            None => ValueHit::Miss,
        }
    }

    /// Encodes a value (Spec 7.3.3): local hit as `uint(0)` plus the local
    /// id, global hit as `uint(1)` plus the global id, miss as the literal
    /// with length + 2 followed by table insertion.
    pub fn write_value(
        &mut self,
        writer: &mut BitWriter,
        qname: QNameId,
        value: &str,
        byte_aligned: bool,
    ) {
        match self.probe(qname, value) {
            ValueHit::Local(id) => {
                log::trace!("value local partition hit, id {id}");
                unsigned_integer::encode(writer, 0);
                let n = bit_width::for_count(self.local_size(qname));
                n_bit_unsigned_integer::encode_mode(writer, id as u64, n, byte_aligned);
            }
            ValueHit::Global(id) => {
                log::trace!("value global partition hit, id {id}");
                unsigned_integer::encode(writer, 1);
                let n = bit_width::for_count(self.global_size());
                n_bit_unsigned_integer::encode_mode(writer, id as u64, n, byte_aligned);
            }
            ValueHit::Miss => {
                log::trace!("value partition miss, literal of {} chars", value.chars().count());
                string::encode_with_offset(writer, value, 2);
                self.insert(qname, value);
            }
        }
    }

    /// Decodes a value (mirror of [`Self::write_value`]).
    pub fn read_value(
        &mut self,
        reader: &mut BitReader,
        qname: QNameId,
        byte_aligned: bool,
    ) -> Result<Rc<str>> {
        let head = unsigned_integer::decode(reader)?;
        match head {
            0 => {
                let n = bit_width::for_count(self.local_size(qname));
                let id = n_bit_unsigned_integer::decode_mode(reader, n, byte_aligned)? as usize;
                self.locals
                    .get(&qname)
                    .and_then(|p| p.slots.get(id))
                    .and_then(|slot| slot.clone())
                    .ok_or_else(|| Error::malformed("local value identifier out of range"))
            }
            1 => {
                let n = bit_width::for_count(self.global_size());
                let id = n_bit_unsigned_integer::decode_mode(reader, n, byte_aligned)? as usize;
                self.global
                    .get(id)
                    .and_then(|slot| slot.clone())
                    .ok_or_else(|| Error::malformed("global value identifier out of range"))
            }
            len_plus_2 => {
                let text = string::decode_chars(reader, len_plus_2 - 2)?;
                let rc: Rc<str> = text.into();
                if len_plus_2 > 2 {
                    self.insert(qname, &rc);
                }
                Ok(rc)
            }
        }
    }

    /// Inserts a missed value into both partitions (Spec 7.3.3).
    ///
    /// Leere Werte werden nie aufgenommen; `valueMaxLength` und die
    /// Kapazitaet filtern zusaetzlich. Bei erreichter Kapazitaet wird der
    /// aelteste Eintrag verdraengt (FIFO), IDs werden nicht umnummeriert.
    fn insert(&mut self, qname: QNameId, value: &str) {
        if value.is_empty() {
            return;
        }
        if let Some(max) = self.value_max_length {
            if value.chars().count() > max {
                return;
            }
        }
        let global_id = match self.capacity {
            Some(0) => return,
            Some(cap) => (self.inserted % cap as u64) as usize,
            None => self.global.len(),
        };

        let rc: Rc<str> = value.into();

        if global_id < self.global.len() {
            // Slot-Wiederverwendung: alten Eintrag vollstaendig austragen
            if let Some(old) = self.global[global_id].take() {
                self.lookup.remove(&old);
            }
            if let Some((owner, local_id)) = self.global_meta[global_id].take() {
                if let Some(partition) = self.locals.get_mut(&owner) {
                    partition.slots[local_id] = None;
                }
            }
            self.global[global_id] = Some(Rc::clone(&rc));
        } else {
            self.global.push(Some(Rc::clone(&rc)));
            self.global_meta.push(None);
        }

        let local_id = if self.local_enabled {
            let partition = self.locals.entry(qname).or_default();
            partition.slots.push(Some(Rc::clone(&rc)));
            let local_id = partition.slots.len() - 1;
            self.global_meta[global_id] = Some((qname, local_id));
            local_id
        } else {
            0
        };

        log::trace!(
            "value partition addition, localId {local_id}, globalId {global_id}"
        );
        self.lookup.insert(rc, ValueEntry { owner: qname, local_id, global_id });
        self.inserted += 1;
    }
}

impl Default for ValueStringTable {
    fn default() -> Self {
        Self::new()
    }
}
