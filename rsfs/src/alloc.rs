#[derive(Debug, PartialEq)]
pub enum State {
    Free,
    Used,
}

/// One bit per allocatable unit (data block, inode or descriptor slot). Bits
/// are packed into u64 words; bits past `len` in the last word are never set.
#[derive(Debug, Clone)]
pub struct Bitmap {
    bitmap: Vec<u64>,
    len: usize,
}

impl Bitmap {
    pub fn new(len: usize) -> Self {
        Self {
            bitmap: vec![0; (len + 63) / 64],
            len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn get(&self, nr: usize) -> State {
        assert!(nr < self.len, "bit {} out of range for bitmap of {}", nr, self.len);
        // Grab the u64 containing the significant bit.
        let outer_offset = self.bitmap[nr / 64];

        let inner_offset = nr % 64;
        let mask = 0b01_u64 << inner_offset;
        match (outer_offset & mask) >> inner_offset {
            0 => State::Free,
            _ => State::Used,
        }
    }

    pub fn set_reserved(&mut self, nr: usize) {
        assert!(nr < self.len, "bit {} out of range for bitmap of {}", nr, self.len);
        self.bitmap[nr / 64] |= 0b01_u64 << (nr % 64);
    }

    pub fn set_free(&mut self, nr: usize) {
        assert!(nr < self.len, "bit {} out of range for bitmap of {}", nr, self.len);
        self.bitmap[nr / 64] &= !(0b01_u64 << (nr % 64));
    }

    pub fn count_used(&self) -> usize {
        self.bitmap.iter().map(|word| word.count_ones() as usize).sum()
    }

    /// Indices of every reserved bit, lowest first.
    pub fn used(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len).filter(move |&nr| self.get(nr) == State::Used)
    }

    /// Reserves the lowest free bit and returns its index.
    pub fn reserve_next(&mut self) -> Option<usize> {
        let nr = NextAvailableAllocation::new(self).next()?;
        self.set_reserved(nr);
        Some(nr)
    }
}

/// Implements a naive allocation policy: scan from the front of the bitmap and
/// yield each free index in order. Each call to the iterator resumes where the
/// previous one stopped.
///
/// The iterator only observes the bitmap; reserving what it yields is up to
/// the caller.
pub struct NextAvailableAllocation<'a> {
    /// Keeps track of the next starting place for looking for available bits.
    marker: usize,
    bitmap: &'a Bitmap,
}

impl<'a> NextAvailableAllocation<'a> {
    pub fn new(bitmap: &'a Bitmap) -> Self {
        Self { marker: 0, bitmap }
    }
}

impl<'a> Iterator for NextAvailableAllocation<'a> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        for i in self.marker..self.bitmap.len() {
            if let State::Free = self.bitmap.get(i) {
                self.marker = i + 1;
                return Some(i);
            }
        }
        self.marker = self.bitmap.len();
        None
    }
}
