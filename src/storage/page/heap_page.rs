use std::sync::Arc;

use bytes::{BufMut, BytesMut};

use crate::common::{HeapError, PageId, RecordId, Result, SlotId, TransactionId};
use crate::tuple::{Schema, Tuple};

/// Heap page layout:
///
/// ```text
/// +------------------+
/// | Presence Bitmap  |  ceil(num_slots / 8) bytes
/// +------------------+
/// | [slot 0]         |  schema.byte_size() bytes each
/// | [slot 1]         |
/// | ...              |
/// | [slot n-1]       |
/// +------------------+
/// | Zero Padding     |
/// +------------------+
/// ```
///
/// Bit `i` of the bitmap (byte `i / 8`, bit `i % 8`, least significant first)
/// is set iff slot `i` holds a live tuple. The slot count is
/// `floor(8 * page_size / (8 * tuple_size + 1))`, which charges every slot one
/// bitmap bit.
#[derive(Debug, Clone)]
pub struct HeapPage {
    pid: PageId,
    schema: Arc<Schema>,
    page_size: usize,
    header: Vec<u8>,
    tuples: Vec<Option<Tuple>>,
    /// Transaction that last dirtied this page, if it has unflushed changes
    dirtier: Option<TransactionId>,
}

impl HeapPage {
    /// Decodes a page from exactly `page_size` bytes.
    pub fn new(pid: PageId, data: &[u8], schema: Arc<Schema>) -> Result<Self> {
        let page_size = data.len();
        let num_slots = Self::slots_for(page_size, &schema);
        let header_size = Self::header_size_for(num_slots);
        let tuple_size = schema.byte_size();

        if header_size + num_slots * tuple_size > page_size {
            return Err(HeapError::CorruptPage(
                pid,
                format!("{} bytes cannot hold {} slots", page_size, num_slots),
            ));
        }

        let header = data[..header_size].to_vec();
        let mut tuples = Vec::with_capacity(num_slots);

        for slot in 0..num_slots {
            if !bit_is_set(&header, slot) {
                tuples.push(None);
                continue;
            }
            let start = header_size + slot * tuple_size;
            let mut tuple = Tuple::from_bytes(schema.clone(), &data[start..start + tuple_size])
                .ok_or_else(|| {
                    HeapError::CorruptPage(pid, format!("slot {} does not decode", slot))
                })?;
            tuple.set_record_id(Some(RecordId::new(pid, SlotId::new(slot as u16))));
            tuples.push(Some(tuple));
        }

        Ok(Self {
            pid,
            schema,
            page_size,
            header,
            tuples,
            dirtier: None,
        })
    }

    /// Returns the bytes of a page with every slot free.
    pub fn empty_page_data(page_size: usize) -> Vec<u8> {
        vec![0u8; page_size]
    }

    /// Number of tuple slots a page of `page_size` bytes provides for `schema`.
    pub fn slots_for(page_size: usize, schema: &Schema) -> usize {
        let slots = (page_size * 8) / (schema.byte_size() * 8 + 1);
        // Slot ids are 16 bits wide
        slots.min(u16::MAX as usize + 1)
    }

    fn header_size_for(num_slots: usize) -> usize {
        num_slots.div_ceil(8)
    }

    /// Returns the page ID.
    pub fn id(&self) -> PageId {
        self.pid
    }

    /// Returns the schema of the tuples on this page.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Returns the page size in bytes.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Returns the number of tuple slots.
    pub fn num_slots(&self) -> usize {
        self.tuples.len()
    }

    /// Returns the bitmap size in bytes.
    pub fn header_size(&self) -> usize {
        self.header.len()
    }

    /// Returns the number of free slots.
    pub fn empty_slot_count(&self) -> usize {
        (0..self.num_slots())
            .filter(|&i| !self.is_slot_used(i))
            .count()
    }

    /// Returns whether slot `i` holds a live tuple. Out-of-range slots are never used.
    pub fn is_slot_used(&self, i: usize) -> bool {
        i < self.num_slots() && bit_is_set(&self.header, i)
    }

    /// Sets or clears the presence bit of slot `i`.
    pub fn mark_slot_used(&mut self, i: usize, used: bool) {
        if i >= self.num_slots() {
            return;
        }
        let mask = 1u8 << (i % 8);
        if used {
            self.header[i / 8] |= mask;
        } else {
            self.header[i / 8] &= !mask;
        }
    }

    /// Stores `tuple` in the lowest-numbered free slot and stamps its record id.
    pub fn insert_tuple(&mut self, tuple: &mut Tuple) -> Result<RecordId> {
        if tuple.schema().as_ref() != self.schema.as_ref() {
            return Err(HeapError::SchemaMismatch {
                expected: self.schema.to_string(),
                found: tuple.schema().to_string(),
            });
        }

        let slot = (0..self.num_slots())
            .find(|&i| !self.is_slot_used(i))
            .ok_or(HeapError::PageFull(self.pid))?;

        let record_id = RecordId::new(self.pid, SlotId::new(slot as u16));
        tuple.set_record_id(Some(record_id));
        self.tuples[slot] = Some(tuple.clone());
        self.mark_slot_used(slot, true);

        Ok(record_id)
    }

    /// Frees the slot `tuple` occupies on this page.
    pub fn delete_tuple(&mut self, tuple: &Tuple) -> Result<()> {
        let record_id = tuple.record_id().ok_or(HeapError::MissingRecordId)?;
        let slot = record_id.slot_id.as_usize();

        if record_id.page_id != self.pid || slot >= self.num_slots() {
            return Err(HeapError::TupleNotOnPage(self.pid));
        }
        if !self.is_slot_used(slot) {
            return Err(HeapError::SlotAlreadyEmpty(self.pid, record_id.slot_id.as_u16()));
        }

        self.tuples[slot] = None;
        self.mark_slot_used(slot, false);
        Ok(())
    }

    /// Returns the live tuples in increasing slot order.
    pub fn iter(&self) -> impl Iterator<Item = &Tuple> + '_ {
        self.tuples
            .iter()
            .enumerate()
            .filter(|(i, _)| bit_is_set(&self.header, *i))
            .filter_map(|(_, t)| t.as_ref())
    }

    /// Encodes the page into exactly `page_size` bytes.
    pub fn page_data(&self) -> Vec<u8> {
        let tuple_size = self.schema.byte_size();
        let mut buf = BytesMut::with_capacity(self.page_size);

        buf.put_slice(&self.header);
        for slot in &self.tuples {
            match slot {
                Some(tuple) => tuple.serialize(&mut buf),
                None => buf.put_bytes(0, tuple_size),
            }
        }
        buf.put_bytes(0, self.page_size - buf.len());

        buf.to_vec()
    }

    /// Records which transaction dirtied the page, or clears the flag with None.
    pub fn mark_dirty(&mut self, tid: Option<TransactionId>) {
        self.dirtier = tid;
    }

    /// Returns the transaction that dirtied the page, if it is dirty.
    pub fn dirtier(&self) -> Option<TransactionId> {
        self.dirtier
    }

    /// Returns true if the page has changes not yet written to disk.
    pub fn is_dirty(&self) -> bool {
        self.dirtier.is_some()
    }
}

fn bit_is_set(bitmap: &[u8], i: usize) -> bool {
    bitmap[i / 8] & (1 << (i % 8)) != 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{TableId, DEFAULT_PAGE_SIZE, STRING_LEN};
    use crate::tuple::{Field, Type};

    fn two_int_schema() -> Arc<Schema> {
        Schema::builder()
            .field("a", Type::Int)
            .field("b", Type::Int)
            .build_arc()
    }

    fn pid() -> PageId {
        PageId::new(TableId::new(7), 0)
    }

    fn empty_page(schema: Arc<Schema>) -> HeapPage {
        HeapPage::new(pid(), &HeapPage::empty_page_data(DEFAULT_PAGE_SIZE), schema).unwrap()
    }

    fn int_tuple(schema: &Arc<Schema>, a: i32, b: i32) -> Tuple {
        Tuple::new(schema.clone(), vec![Field::Int(a), Field::Int(b)]).unwrap()
    }

    #[test]
    fn test_slot_math() {
        let schema = two_int_schema();
        // 8 * 4096 / (8 * 8 + 1) = 504
        let page = empty_page(schema);
        assert_eq!(page.num_slots(), 504);
        assert_eq!(page.header_size(), 63);
        assert_eq!(page.empty_slot_count(), 504);
    }

    #[test]
    fn test_fill_page() {
        let schema = two_int_schema();
        let mut page = empty_page(schema.clone());
        let slots = page.num_slots();

        for i in 0..slots {
            let mut t = int_tuple(&schema, i as i32, 0);
            let rid = page.insert_tuple(&mut t).unwrap();
            assert_eq!(rid.slot_id.as_usize(), i);
            assert_eq!(t.record_id(), Some(rid));
        }
        assert_eq!(page.empty_slot_count(), 0);

        let mut extra = int_tuple(&schema, -1, -1);
        assert!(matches!(
            page.insert_tuple(&mut extra),
            Err(HeapError::PageFull(_))
        ));

        // Free one slot; exactly one more insert fits, and it reuses the slot
        let victim = page.iter().nth(10).unwrap().clone();
        page.delete_tuple(&victim).unwrap();
        let rid = page.insert_tuple(&mut extra).unwrap();
        assert_eq!(rid.slot_id.as_usize(), 10);
        assert!(page.insert_tuple(&mut int_tuple(&schema, 0, 0)).is_err());
    }

    #[test]
    fn test_delete_errors() {
        let schema = two_int_schema();
        let mut page = empty_page(schema.clone());

        let unstored = int_tuple(&schema, 1, 1);
        assert!(matches!(
            page.delete_tuple(&unstored),
            Err(HeapError::MissingRecordId)
        ));

        let mut t = int_tuple(&schema, 1, 1);
        page.insert_tuple(&mut t).unwrap();

        let mut foreign = t.clone();
        foreign.set_record_id(Some(RecordId::new(
            PageId::new(TableId::new(7), 1),
            SlotId::new(0),
        )));
        assert!(matches!(
            page.delete_tuple(&foreign),
            Err(HeapError::TupleNotOnPage(_))
        ));

        page.delete_tuple(&t).unwrap();
        assert!(matches!(
            page.delete_tuple(&t),
            Err(HeapError::SlotAlreadyEmpty(_, 0))
        ));
    }

    #[test]
    fn test_insert_wrong_schema() {
        let mut page = empty_page(two_int_schema());
        let other = Schema::builder().field("s", Type::Str).build_arc();
        let mut t = Tuple::new(other, vec![Field::from("x")]).unwrap();
        assert!(matches!(
            page.insert_tuple(&mut t),
            Err(HeapError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn test_encode_decode() {
        let schema = Schema::builder()
            .field("id", Type::Int)
            .field("name", Type::Str)
            .build_arc();
        let mut page = empty_page(schema.clone());

        let long = "z".repeat(128);
        let names: [&str; 3] = ["", "bob", long.as_str()];
        for (i, name) in names.iter().enumerate() {
            let mut t = Tuple::new(schema.clone(), vec![Field::Int(i as i32), Field::from(*name)])
                .unwrap();
            page.insert_tuple(&mut t).unwrap();
        }
        let first = page.iter().next().unwrap().clone();
        page.delete_tuple(&first).unwrap();

        let data = page.page_data();
        assert_eq!(data.len(), DEFAULT_PAGE_SIZE);

        let decoded = HeapPage::new(pid(), &data, schema).unwrap();
        assert!(!decoded.is_slot_used(0));
        assert!(decoded.is_slot_used(1));
        assert!(decoded.is_slot_used(2));

        let original: Vec<_> = page.iter().cloned().collect();
        let recovered: Vec<_> = decoded.iter().cloned().collect();
        assert_eq!(original, recovered);
        assert_eq!(
            recovered[1].record_id(),
            Some(RecordId::new(pid(), SlotId::new(2)))
        );
    }

    #[test]
    fn test_cached_long_string_matches_encoding() {
        let schema = Schema::builder().field("name", Type::Str).build_arc();
        let mut page = empty_page(schema.clone());

        let mut t = Tuple::new(schema.clone(), vec![Field::Str("x".repeat(200))]).unwrap();
        page.insert_tuple(&mut t).unwrap();

        let decoded = HeapPage::new(pid(), &page.page_data(), schema).unwrap();
        let cached: Vec<_> = page.iter().cloned().collect();
        let on_disk: Vec<_> = decoded.iter().cloned().collect();
        assert_eq!(cached, on_disk);
        assert_eq!(cached[0].field(0).unwrap(), &Field::Str("x".repeat(STRING_LEN)));
    }

    #[test]
    fn test_slots_for_oversized_tuple() {
        let schema = Schema::builder().field("name", Type::Str).build_arc();
        assert_eq!(HeapPage::slots_for(64, &schema), 0);
        assert_eq!(HeapPage::slots_for(133, &schema), 1);
    }

    #[test]
    fn test_iter_is_restartable() {
        let schema = two_int_schema();
        let mut page = empty_page(schema.clone());
        for i in 0..5 {
            page.insert_tuple(&mut int_tuple(&schema, i, i)).unwrap();
        }
        page.mark_slot_used(2, false);

        let first: Vec<_> = page.iter().map(|t| t.field(0).unwrap().clone()).collect();
        let second: Vec<_> = page.iter().map(|t| t.field(0).unwrap().clone()).collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 4);
        assert!(!first.contains(&Field::Int(2)));
    }

    #[test]
    fn test_bitmap_layout() {
        let schema = two_int_schema();
        let mut page = empty_page(schema);
        page.mark_slot_used(0, true);
        page.mark_slot_used(9, true);

        let data = page.page_data();
        assert_eq!(data[0], 0b0000_0001);
        assert_eq!(data[1], 0b0000_0010);
        assert!(page.is_slot_used(9));
        assert!(!page.is_slot_used(10_000));
    }

    #[test]
    fn test_dirty_tracking() {
        let mut page = empty_page(two_int_schema());
        assert!(!page.is_dirty());
        let tid = TransactionId::next();
        page.mark_dirty(Some(tid));
        assert_eq!(page.dirtier(), Some(tid));
        page.mark_dirty(None);
        assert!(!page.is_dirty());
    }
}
