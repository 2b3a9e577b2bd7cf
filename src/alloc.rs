/// The occupancy state of a single tracked slot.
#[derive(Debug, PartialEq)]
pub enum State {
    Free,
    Used,
}

/// A fixed-capacity bit vector packed into bytes, one bit per tracked slot.
/// The capacity is chosen at construction and never changes; the backing
/// storage is `ceil(capacity / 8)` bytes with every bit initially clear.
///
/// The bitmap knows nothing about blocks. It only answers which slot
/// numbers are marked used and which free.
pub struct Bitmap {
    bits: Vec<u8>,
    capacity: usize,
}

impl Bitmap {
    /// Creates a bitmap tracking `capacity` slots, all free. Returns `None`
    /// for a zero capacity.
    pub fn new(capacity: usize) -> Option<Self> {
        if capacity == 0 {
            return None;
        }
        Some(Self {
            bits: vec![0; (capacity + 7) / 8],
            capacity,
        })
    }

    /// Rebuilds a bitmap from its packed byte representation. Returns `None`
    /// if the buffer is too short for the capacity or the capacity is zero.
    /// Bits past `capacity` in the final byte are cleared so they can never
    /// leak into `used_count`.
    pub fn from_bytes(buf: &[u8], capacity: usize) -> Option<Self> {
        let byte_len = (capacity + 7) / 8;
        if capacity == 0 || buf.len() < byte_len {
            return None;
        }
        let mut bits = buf[0..byte_len].to_vec();
        let tail_bits = capacity % 8;
        if tail_bits != 0 {
            bits[byte_len - 1] &= (1 << tail_bits) - 1;
        }
        Some(Self { bits, capacity })
    }

    /// The packed byte representation, lowest slot number in bit 0 of byte 0.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bits
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the state of slot `slot`. Slots out of range read as `Free`;
    /// they are never backed by memory outside the vector.
    pub fn get(&self, slot: usize) -> State {
        if slot >= self.capacity {
            return State::Free;
        }
        if self.bits[slot / 8] & (1 << (slot % 8)) != 0 {
            State::Used
        } else {
            State::Free
        }
    }

    /// Marks slot `slot` used. Out-of-range slots are ignored.
    pub fn set_used(&mut self, slot: usize) {
        if slot < self.capacity {
            self.bits[slot / 8] |= 1 << (slot % 8);
        }
    }

    /// Marks slot `slot` free. Out-of-range slots are ignored.
    pub fn set_free(&mut self, slot: usize) {
        if slot < self.capacity {
            self.bits[slot / 8] &= !(1 << (slot % 8));
        }
    }

    /// Finds the lowest free slot numbered `start` or higher, scanning
    /// upward. Returns `None` when every slot from `start` on is used.
    pub fn first_free_from(&self, start: usize) -> Option<usize> {
        let mut slot = start;
        while slot < self.capacity {
            // Saturated bytes are stepped over whole.
            if slot % 8 == 0 && self.bits[slot / 8] == 0xFF {
                slot += 8;
                continue;
            }
            if self.bits[slot / 8] & (1 << (slot % 8)) == 0 {
                return Some(slot);
            }
            slot += 1;
        }
        None
    }

    /// The number of used slots across the whole vector.
    pub fn used_count(&self) -> usize {
        self.bits.iter().map(|b| b.count_ones() as usize).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_capacity_is_rejected() {
        assert!(Bitmap::new(0).is_none());
    }

    #[test]
    fn new_bitmap_has_all_slots_free() {
        let map = Bitmap::new(100).unwrap();
        for slot in 0..100 {
            assert_eq!(map.get(slot), State::Free);
        }
        assert_eq!(map.used_count(), 0);
    }

    #[test]
    fn set_and_clear_round_trip() {
        let mut map = Bitmap::new(16).unwrap();
        map.set_used(3);
        assert_eq!(map.get(3), State::Used);
        assert_eq!(map.used_count(), 1);
        map.set_free(3);
        assert_eq!(map.get(3), State::Free);
        assert_eq!(map.used_count(), 0);
    }

    #[test]
    fn slots_straddling_byte_boundaries_are_independent() {
        let mut map = Bitmap::new(16).unwrap();
        map.set_used(7);
        map.set_used(8);
        assert_eq!(map.get(7), State::Used);
        assert_eq!(map.get(8), State::Used);
        assert_eq!(map.get(6), State::Free);
        assert_eq!(map.get(9), State::Free);
        map.set_free(7);
        assert_eq!(map.get(8), State::Used);
    }

    #[test]
    fn out_of_range_slots_are_ignored() {
        let mut map = Bitmap::new(8).unwrap();
        map.set_used(8);
        map.set_used(10_000);
        assert_eq!(map.used_count(), 0);
        assert_eq!(map.get(8), State::Free);
        map.set_free(8);
        assert_eq!(map.used_count(), 0);
    }

    #[test]
    fn first_free_scans_from_the_start_index() {
        let mut map = Bitmap::new(32).unwrap();
        assert_eq!(map.first_free_from(0), Some(0));
        assert_eq!(map.first_free_from(5), Some(5));
        map.set_used(5);
        map.set_used(6);
        assert_eq!(map.first_free_from(5), Some(7));
    }

    #[test]
    fn first_free_skips_saturated_bytes() {
        let mut map = Bitmap::new(24).unwrap();
        for slot in 0..16 {
            map.set_used(slot);
        }
        assert_eq!(map.first_free_from(0), Some(16));
    }

    #[test]
    fn full_bitmap_has_no_free_slot() {
        let mut map = Bitmap::new(9).unwrap();
        for slot in 0..9 {
            map.set_used(slot);
        }
        assert_eq!(map.first_free_from(0), None);
        assert_eq!(map.used_count(), 9);
    }

    #[test]
    fn from_bytes_masks_bits_past_capacity() {
        // 9 slots packed into two bytes; the top bits of the second byte
        // are junk and must not count as used.
        let map = Bitmap::from_bytes(&[0xFF, 0xFF], 9).unwrap();
        assert_eq!(map.used_count(), 9);
        assert_eq!(map.get(9), State::Free);
        assert_eq!(map.first_free_from(0), None);
    }

    #[test]
    fn from_bytes_rejects_short_buffers() {
        assert!(Bitmap::from_bytes(&[0xFF], 9).is_none());
    }
}
