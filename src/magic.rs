//! Magic bitboards for sliding-piece attacks.
//!
//! For every square, the squares that can block a rook or bishop (its "relevant occupancy",
//! board edges excluded) are hashed into a dense table via
//! `((occupied & mask) * magic) >> (64 - bits)`. The magic multipliers are not hard-coded:
//! they are found at start-up by random search, keeping the first candidate that maps every
//! blocker subset to a slot holding exactly that subset's attack set.

use rand::Rng;
use tracing::{debug, trace};

/// Table entries per square reserved for rooks (2^12, the largest rook mask).
pub const ROOK_TABLE_STRIDE: usize = 4096;
/// Table entries per square reserved for bishops (2^9, the largest bishop mask).
pub const BISHOP_TABLE_STRIDE: usize = 512;

/// Upper bound on candidates tried for one square. Real searches finish in a few
/// thousand attempts; hitting this means the mask or the verification is broken.
pub const MAX_MAGIC_ATTEMPTS: u32 = 100_000_000;

const ROOK_DIRECTIONS: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];
const BISHOP_DIRECTIONS: [(i32, i32); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slider {
    Rook,
    Bishop,
}

impl Slider {
    fn directions(self) -> &'static [(i32, i32); 4] {
        match self {
            Slider::Rook => &ROOK_DIRECTIONS,
            Slider::Bishop => &BISHOP_DIRECTIONS,
        }
    }

    pub fn stride(self) -> usize {
        match self {
            Slider::Rook => ROOK_TABLE_STRIDE,
            Slider::Bishop => BISHOP_TABLE_STRIDE,
        }
    }

    /// Relevant occupancy mask: every square along the piece's rays except the last one
    /// before the board edge, since a blocker there cannot shadow anything.
    pub fn relevant_mask(self, sq: u8) -> u64 {
        let rank = (sq >> 3) as i32;
        let file = (sq & 7) as i32;
        let mut mask = 0u64;

        for &(dr, df) in self.directions() {
            let mut r = rank + dr;
            let mut f = file + df;
            while (0..8).contains(&(r + dr)) && (0..8).contains(&(f + df)) {
                mask |= 1u64 << (r * 8 + f);
                r += dr;
                f += df;
            }
        }
        mask
    }

    /// Ray-cast attacks, stopping on (and including) the first occupied square.
    pub fn attacks_slow(self, sq: u8, occupied: u64) -> u64 {
        let rank = (sq >> 3) as i32;
        let file = (sq & 7) as i32;
        let mut attacks = 0u64;

        for &(dr, df) in self.directions() {
            let mut r = rank + dr;
            let mut f = file + df;
            while (0..8).contains(&r) && (0..8).contains(&f) {
                let target = 1u64 << (r * 8 + f);
                attacks |= target;
                if occupied & target != 0 {
                    break;
                }
                r += dr;
                f += df;
            }
        }
        attacks
    }
}

/// Generate all subsets of a mask using the carry-rippler technique, empty set first.
pub fn all_subsets(mask: u64) -> impl Iterator<Item = u64> {
    let mut subset = 0u64;
    let mut done = false;
    std::iter::from_fn(move || {
        if done {
            return None;
        }
        let current = subset;
        subset = subset.wrapping_sub(mask) & mask;
        if subset == 0 {
            done = true;
        }
        Some(current)
    })
}

/// Magic lookup for one slider type over all 64 squares.
#[derive(Debug, Clone)]
pub struct MagicTable {
    pub slider: Slider,
    pub masks: [u64; 64],
    pub magics: [u64; 64],
    pub shifts: [u8; 64],
    /// Flat attack table, `stride` entries per square.
    attacks: Vec<u64>,
    stride: usize,
}

impl MagicTable {
    /// Search magics for every square and fill the attack table.
    pub fn build<R: Rng + ?Sized>(slider: Slider, rng: &mut R) -> MagicTable {
        let stride = slider.stride();
        let mut table = MagicTable {
            slider,
            masks: [0; 64],
            magics: [0; 64],
            shifts: [0; 64],
            attacks: vec![0; 64 * stride],
            stride,
        };

        let mut total_attempts = 0u64;
        for sq in 0..64u8 {
            total_attempts += table.init_square(sq, rng) as u64;
        }
        debug!(?slider, total_attempts, "magic tables ready");
        table
    }

    fn init_square<R: Rng + ?Sized>(&mut self, sq: u8, rng: &mut R) -> u32 {
        let mask = self.slider.relevant_mask(sq);
        let bits = mask.count_ones();
        debug_assert!(1usize << bits <= self.stride);

        let occupancies: Vec<u64> = all_subsets(mask).collect();
        let reference: Vec<u64> = occupancies
            .iter()
            .map(|&occ| self.slider.attacks_slow(sq, occ))
            .collect();

        let base = sq as usize * self.stride;
        let slots = &mut self.attacks[base..base + self.stride];
        // Slot `i` is valid for the current candidate only when `epoch[i] == attempt`,
        // which avoids clearing the slot array between candidates.
        let mut epoch = vec![0u32; 1 << bits];

        for attempt in 1..=MAX_MAGIC_ATTEMPTS {
            let magic = rng.gen::<u64>() & rng.gen::<u64>() & rng.gen::<u64>();
            if (mask.wrapping_mul(magic) & 0xFF00_0000_0000_0000).count_ones() < 6 {
                continue;
            }

            let mut collision = false;
            for (&occ, &attack) in occupancies.iter().zip(&reference) {
                let index = magic_index(occ, magic, bits);
                if epoch[index] != attempt {
                    epoch[index] = attempt;
                    slots[index] = attack;
                } else if slots[index] != attack {
                    collision = true;
                    break;
                }
            }

            if !collision {
                self.masks[sq as usize] = mask;
                self.magics[sq as usize] = magic;
                self.shifts[sq as usize] = (64 - bits) as u8;
                trace!(sq, attempt, bits, "magic found");
                return attempt;
            }
        }

        panic!(
            "no {:?} magic found for square {} after {} attempts",
            self.slider, sq, MAX_MAGIC_ATTEMPTS
        );
    }

    #[inline(always)]
    pub fn attacks(&self, sq: u8, occupied: u64) -> u64 {
        let s = sq as usize;
        let index = ((occupied & self.masks[s]).wrapping_mul(self.magics[s]) >> self.shifts[s]) as usize;
        self.attacks[s * self.stride + index]
    }
}

#[inline(always)]
fn magic_index(occupied: u64, magic: u64, bits: u32) -> usize {
    (occupied.wrapping_mul(magic) >> (64 - bits)) as usize
}
