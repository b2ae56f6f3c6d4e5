//! Dynamic (ring sub-allocated) uniform buffers (`SPEC_FULL.md` §3, §4.A,
//! §5: "each frame slot writes to a disjoint offset range; readers address
//! `buffer + offset(frame_index)` so no explicit synchronisation between
//! slots is needed").
//!
//! Each dynamic buffer is carved out of a per-usage ring sized
//! `32 MiB x frames_in_flight`, 64-byte aligned; `Upload` bump-allocates
//! inside the current frame slot's region and hands back the offset to
//! bind per-draw. Allocations are reset at `begin_frame` -- a dynamic
//! buffer's content from two frames ago is never read, only overwritten.

const FRAME_REGION_SIZE: usize = 32 * 1024 * 1024;
const ALIGNMENT: usize = 64;

fn align_up(offset: usize, align: usize) -> usize {
    (offset + align - 1) & !(align - 1)
}

/// An allocation returned by [`DynamicRingAllocator::allocate`]: an offset
/// into the backing storage (already including the frame-slot's region
/// base) plus the size actually reserved (post-alignment).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DynamicAllocation {
    pub offset: usize,
    pub size: usize,
}

/// One ring buffer, `frames_in_flight` regions of `FRAME_REGION_SIZE` bytes
/// each, backing a particular dynamic-buffer usage (e.g. "per-mesh model
/// uniforms").
pub struct DynamicRingAllocator {
    frames_in_flight: usize,
    storage: Vec<u8>,
    cursor: Vec<usize>,
}

impl DynamicRingAllocator {
    #[must_use]
    pub fn new(frames_in_flight: usize) -> Self {
        let frames_in_flight = frames_in_flight.max(1);
        Self {
            frames_in_flight,
            storage: vec![0u8; FRAME_REGION_SIZE * frames_in_flight],
            cursor: vec![0usize; frames_in_flight],
        }
    }

    /// Resets the bump cursor for `slot`; called from `RhiContext::begin_frame`.
    pub fn begin_frame(&mut self, slot: usize) {
        self.cursor[slot % self.frames_in_flight] = 0;
    }

    /// Bump-allocates `size` bytes (64-byte aligned) inside `slot`'s region.
    ///
    /// # Panics
    /// Panics if the per-frame 32 MiB budget is exhausted -- a
    /// `ResourceCreationError`-class fatal condition per §7 (the ring is
    /// sized generously enough that exhausting it indicates a leak or a
    /// pathological scene, not ordinary operation).
    pub fn allocate(&mut self, slot: usize, size: usize) -> DynamicAllocation {
        let slot = slot % self.frames_in_flight;
        let local = align_up(self.cursor[slot], ALIGNMENT);
        assert!(
            local + size <= FRAME_REGION_SIZE,
            "dynamic ring buffer exhausted: requested {size} bytes with {local} already used of {FRAME_REGION_SIZE}"
        );
        self.cursor[slot] = local + size;
        DynamicAllocation {
            offset: slot * FRAME_REGION_SIZE + local,
            size,
        }
    }

    pub fn write(&mut self, alloc: DynamicAllocation, data: &[u8]) {
        debug_assert!(data.len() <= alloc.size);
        self.storage[alloc.offset..alloc.offset + data.len()].copy_from_slice(data);
    }

    #[must_use]
    pub fn read(&self, alloc: DynamicAllocation) -> &[u8] {
        &self.storage[alloc.offset..alloc.offset + alloc.size]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_in_one_slot_are_invisible_to_another() {
        let mut ring = DynamicRingAllocator::new(2);
        ring.begin_frame(0);
        let a0 = ring.allocate(0, 4);
        ring.write(a0, &[1, 2, 3, 4]);

        ring.begin_frame(1);
        let a1 = ring.allocate(1, 4);
        ring.write(a1, &[9, 9, 9, 9]);

        assert_eq!(ring.read(a0), &[1, 2, 3, 4]);
        assert_eq!(ring.read(a1), &[9, 9, 9, 9]);
    }

    #[test]
    fn allocations_are_aligned() {
        let mut ring = DynamicRingAllocator::new(1);
        ring.begin_frame(0);
        let a = ring.allocate(0, 3);
        let b = ring.allocate(0, 16);
        assert_eq!(a.offset % ALIGNMENT, 0);
        assert_eq!(b.offset % ALIGNMENT, 0);
    }

    #[test]
    fn begin_frame_resets_cursor() {
        let mut ring = DynamicRingAllocator::new(1);
        ring.begin_frame(0);
        ring.allocate(0, 1000);
        ring.begin_frame(0);
        let a = ring.allocate(0, 8);
        assert_eq!(a.offset, 0);
    }
}
