//! Sample save generation for testing.
//!
//! When no input file is specified, we generate a small build that touches
//! most of the encoding paths: procedural sizes, palette and custom colors,
//! every material, varied orientation and a few non-colliding bricks.
//!
//! # Design
//!
//! Bricks are laid out on a grid so none overlap when loaded:
//! - 70% custom RGBA colors, 30% palette colors
//! - Random material, intensity and facing
//! - Roughly one in ten bricks is a ghost brick (no player collision)

use brs_transfer_core::save::{Brick, BrickColor, Collision, Direction, Rotation, SaveData};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Palette shipped with generated saves.
const PALETTE: [[u8; 4]; 4] = [
    [200, 40, 40, 255],
    [40, 160, 60, 255],
    [40, 80, 200, 255],
    [230, 230, 230, 255],
];

/// Grid spacing between brick centres
const GRID_STEP: i32 = 40;

/// Bricks per grid row
const ROW_LEN: usize = 16;

/// Generate `count` sample bricks.
///
/// # Arguments
/// - `seed`: random seed for determinism
/// - `count`: number of bricks
pub fn generate_sample_bricks(seed: u64, count: usize) -> Vec<Brick> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    (0..count)
        .map(|i| {
            let size = [
                rng.gen_range(1..=4) * 5,
                rng.gen_range(1..=4) * 5,
                rng.gen_range(1..=6) * 2,
            ];
            let position = [
                (i % ROW_LEN) as i32 * GRID_STEP,
                (i / ROW_LEN) as i32 * GRID_STEP,
                size[2] as i32,
            ];

            let mut brick = Brick::new(position, size);
            brick.direction = random_direction(&mut rng);
            brick.rotation = random_rotation(&mut rng);
            brick.material_index = rng.gen_range(0..5);
            brick.material_intensity = rng.gen_range(0..=10);
            brick.color = if rng.gen_bool(0.3) {
                BrickColor::Index(rng.gen_range(0..PALETTE.len() as u32))
            } else {
                BrickColor::Custom([rng.gen(), rng.gen(), rng.gen(), 255])
            };
            if rng.gen_range(0..10) == 0 {
                brick.collision = Collision {
                    player: false,
                    ..Collision::default()
                };
            }
            brick
        })
        .collect()
}

/// Generate a template save holding `count` sample bricks.
pub fn generate_sample_save(seed: u64, count: usize) -> SaveData {
    let mut save = SaveData::with_bricks(generate_sample_bricks(seed, count));
    save.description = format!("Generated sample (seed {seed})");
    save.colors = PALETTE.to_vec();
    save
}

fn random_direction(rng: &mut ChaCha8Rng) -> Direction {
    match rng.gen_range(0..6) {
        0 => Direction::XPositive,
        1 => Direction::XNegative,
        2 => Direction::YPositive,
        3 => Direction::YNegative,
        4 => Direction::ZPositive,
        _ => Direction::ZNegative,
    }
}

fn random_rotation(rng: &mut ChaCha8Rng) -> Rotation {
    match rng.gen_range(0..4) {
        0 => Rotation::Deg0,
        1 => Rotation::Deg90,
        2 => Rotation::Deg180,
        _ => Rotation::Deg270,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brs_transfer_core::codec;

    #[test]
    fn test_generate_sample_bricks() {
        let bricks = generate_sample_bricks(42, 100);
        assert_eq!(bricks.len(), 100);
        assert!(bricks.iter().all(|b| b.is_procedural()));
        assert!(bricks.iter().all(|b| b.material_intensity <= 10));
    }

    #[test]
    fn test_determinism() {
        assert_eq!(generate_sample_bricks(12345, 50), generate_sample_bricks(12345, 50));
    }

    #[test]
    fn test_different_seeds() {
        assert_ne!(generate_sample_bricks(1, 50), generate_sample_bricks(2, 50));
    }

    #[test]
    fn test_sample_save_encodes() {
        for count in [0, 1, 17, 500] {
            let save = generate_sample_save(999, count);
            let bytes = codec::write_save(&save).expect("sample save must encode");
            assert_eq!(&bytes[..3], b"BRS");
        }
    }
}
