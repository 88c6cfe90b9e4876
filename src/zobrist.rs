use crate::types::{CastleRights, Color, PieceType, NO_EN_PASSANT};

/// Zobrist hashing keys for chess positions.
/// These are pseudo-random u64 values XORed together to create a unique hash for each position.
///
/// Castling and en-passant keys are stored as delta tables so that a move can update the hash
/// with one lookup each, whatever the old and new state was.
#[derive(Debug, Clone)]
pub struct ZobristKeys {
    /// Keys for each (color, piece_type, square) combination: 2 * 6 * 64 = 768 keys
    /// Indexed as: pieces[color][piece_type][square]
    pub pieces: [[[u64; 64]; 6]; 2],
    /// Key XORed on every move; present in the hash when black is to move
    pub side_to_move: u64,
    /// `delta_castle[old ^ new]`, the XOR of the keys of every right that changed
    pub delta_castle: [u64; 16],
    /// `delta_en_passant[old * 9 + new]` for files 0-7 and the sentinel 8
    pub delta_en_passant: [u64; 81],
}

impl ZobristKeys {
    /// Initialize Zobrist keys with deterministic pseudo-random values.
    /// Uses a simple PRNG seeded with a fixed value for reproducibility.
    pub fn new() -> Self {
        let mut rng = XorShift64::new(1_070_372);

        let mut pieces = [[[0u64; 64]; 6]; 2];
        for color in pieces.iter_mut() {
            for piece in color.iter_mut() {
                for key in piece.iter_mut() {
                    *key = rng.next();
                }
            }
        }

        let side_to_move = rng.next();

        let castle_bits: [u64; 4] = std::array::from_fn(|_| rng.next());
        let mut delta_castle = [0u64; 16];
        for (rights, key) in delta_castle.iter_mut().enumerate() {
            *key = (0..4usize)
                .filter(|&bit| rights & (1usize << bit) != 0)
                .fold(0, |acc, bit| acc ^ castle_bits[bit]);
        }

        // The sentinel has no key, so leaving or entering "no target" only flips one file key
        let mut file_keys = [0u64; 9];
        for key in file_keys.iter_mut().take(8) {
            *key = rng.next();
        }
        let mut delta_en_passant = [0u64; 81];
        for old in 0..9 {
            for new in 0..9 {
                delta_en_passant[old * 9 + new] = file_keys[old] ^ file_keys[new];
            }
        }

        ZobristKeys {
            pieces,
            side_to_move,
            delta_castle,
            delta_en_passant,
        }
    }

    #[inline(always)]
    pub fn piece(&self, color: Color, piece: PieceType, sq: u8) -> u64 {
        self.pieces[color.index()][piece.index()][sq as usize]
    }

    #[inline(always)]
    pub fn castle(&self, old: CastleRights, new: CastleRights) -> u64 {
        self.delta_castle[((old.0 ^ new.0) & 15) as usize]
    }

    #[inline(always)]
    pub fn en_passant(&self, old_file: u8, new_file: u8) -> u64 {
        self.delta_en_passant[old_file as usize * 9 + new_file as usize]
    }

    /// Key of an absolute castle-rights state, i.e. its delta from no rights at all.
    pub fn castle_state(&self, rights: CastleRights) -> u64 {
        self.castle(CastleRights::NONE, rights)
    }

    /// Key of an absolute en-passant state.
    pub fn en_passant_state(&self, file: u8) -> u64 {
        self.en_passant(NO_EN_PASSANT, file)
    }
}

impl Default for ZobristKeys {
    fn default() -> Self {
        Self::new()
    }
}

/// xorshift64* generator for deterministic key generation
struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    fn new(seed: u64) -> Self {
        XorShift64 { state: seed }
    }

    fn next(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(2_685_821_657_736_338_717)
    }
}
