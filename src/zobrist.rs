use crate::bits::Position;
use crate::board::MAX_SIZE;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Zobrist hash tables for board states.
pub struct Zobrist {
    box_hashes: [[u64; MAX_SIZE]; MAX_SIZE],
    player_hashes: [[u64; MAX_SIZE]; MAX_SIZE],
}

impl Zobrist {
    pub fn new() -> Self {
        // Fixed seed: the tables must be identical between runs and between
        // the solver and its sub-searches
        let mut rng = ChaCha8Rng::seed_from_u64(0x50c0_ba11_5eed_0001);

        let mut box_hashes = [[0u64; MAX_SIZE]; MAX_SIZE];
        for row in box_hashes.iter_mut() {
            for cell in row.iter_mut() {
                *cell = rng.next_u64();
            }
        }

        let mut player_hashes = [[0u64; MAX_SIZE]; MAX_SIZE];
        for row in player_hashes.iter_mut() {
            for cell in row.iter_mut() {
                *cell = rng.next_u64();
            }
        }

        Zobrist {
            box_hashes,
            player_hashes,
        }
    }

    /// Hash contribution of a box on the given square.
    pub fn box_hash(&self, pos: Position) -> u64 {
        self.box_hashes[pos.1 as usize][pos.0 as usize]
    }

    /// Hash contribution of the player on the given square.
    pub fn player_hash(&self, pos: Position) -> u64 {
        self.player_hashes[pos.1 as usize][pos.0 as usize]
    }

    /// Combined hash of a set of box squares.
    pub fn boxes_hash<I: IntoIterator<Item = Position>>(&self, positions: I) -> u64 {
        positions
            .into_iter()
            .fold(0u64, |acc, pos| acc ^ self.box_hash(pos))
    }
}

impl Default for Zobrist {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic() {
        let a = Zobrist::new();
        let b = Zobrist::new();
        assert_eq!(a.box_hash(Position(3, 5)), b.box_hash(Position(3, 5)));
        assert_eq!(a.player_hash(Position(0, 0)), b.player_hash(Position(0, 0)));
    }

    #[test]
    fn test_boxes_hash_order_independent() {
        let z = Zobrist::new();
        let h1 = z.boxes_hash([Position(1, 1), Position(2, 2)]);
        let h2 = z.boxes_hash([Position(2, 2), Position(1, 1)]);
        assert_eq!(h1, h2);
        assert_ne!(h1, z.boxes_hash([Position(1, 1)]));
    }
}
