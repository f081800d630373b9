use log::debug;
use rand::Rng;

/// Outcome of choosing a load address for a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relocation {
    pub load_address: u32,
    pub delta: i64,
}

impl Relocation {
    #[must_use]
    pub fn new(load_address: u32, start_address: u32) -> Self {
        Self {
            load_address,
            delta: i64::from(load_address) - i64::from(start_address),
        }
    }

    /// Moves a link-time address by the delta. The result may be negative
    /// or too wide; callers range-check it.
    #[must_use]
    pub fn apply(&self, address: u32) -> i64 {
        i64::from(address) + self.delta
    }
}

/// Picks page-aligned load addresses inside an inclusive window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relocator {
    page_size: u32,
    first: u32,
    count: u32,
}

impl Relocator {
    /// Returns `None` when the window holds no multiple of `page_size`.
    #[must_use]
    pub fn new(page_size: u32, min: u32, max: u32) -> Option<Self> {
        if page_size == 0 || min > max {
            return None;
        }
        let first = min.checked_next_multiple_of(page_size)?;
        if first > max {
            return None;
        }
        let count = (max - first) / page_size + 1;
        Some(Self {
            page_size,
            first,
            count,
        })
    }

    #[must_use]
    pub fn candidate_count(&self) -> u32 {
        self.count
    }

    #[must_use]
    pub fn candidate(&self, index: u32) -> Option<u32> {
        (index < self.count).then(|| self.first + index * self.page_size)
    }

    #[must_use]
    pub fn is_candidate(&self, address: u32) -> bool {
        address >= self.first
            && address % self.page_size == 0
            && (address - self.first) / self.page_size < self.count
    }

    /// Draws one candidate uniformly and returns the relocation that moves
    /// `start_address` onto it.
    pub fn choose<R: Rng>(&self, rng: &mut R, start_address: u32) -> Relocation {
        let index = rng.gen_range(0..self.count);
        let load_address = self.first + index * self.page_size;
        let relocation = Relocation::new(load_address, start_address);
        debug!(
            "picked candidate {index} of {}: load address {load_address:#06x}, delta {}",
            self.count, relocation.delta
        );
        relocation
    }
}
