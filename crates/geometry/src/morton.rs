//! Bit interleaving for addressing tiles inside availability bitstreams.
//!
//! The 2D index takes x from the even bits and y from the odd bits and is
//! lossless for full 32 bit coordinates. The 3D index takes x, y and z from
//! bits 0, 1 and 2 of every triple and is lossless for 21 bit coordinates.

/// Spreads the 32 bits of `value` over the even bits of a `u64`.
const fn spread_by_one(value: u32) -> u64 {
    let mut v = value as u64;
    v = (v | (v << 16)) & 0x0000_FFFF_0000_FFFF;
    v = (v | (v << 8)) & 0x00FF_00FF_00FF_00FF;
    v = (v | (v << 4)) & 0x0F0F_0F0F_0F0F_0F0F;
    v = (v | (v << 2)) & 0x3333_3333_3333_3333;
    v = (v | (v << 1)) & 0x5555_5555_5555_5555;
    v
}

const fn compact_by_one(value: u64) -> u32 {
    let mut v = value & 0x5555_5555_5555_5555;
    v = (v | (v >> 1)) & 0x3333_3333_3333_3333;
    v = (v | (v >> 2)) & 0x0F0F_0F0F_0F0F_0F0F;
    v = (v | (v >> 4)) & 0x00FF_00FF_00FF_00FF;
    v = (v | (v >> 8)) & 0x0000_FFFF_0000_FFFF;
    v = (v | (v >> 16)) & 0x0000_0000_FFFF_FFFF;
    v as u32
}

/// Spreads the low 21 bits of `value` so that two zero bits follow every bit.
const fn spread_by_two(value: u32) -> u64 {
    let mut v = (value as u64) & 0x1F_FFFF;
    v = (v | (v << 32)) & 0x001F_0000_0000_FFFF;
    v = (v | (v << 16)) & 0x001F_0000_FF00_00FF;
    v = (v | (v << 8)) & 0x100F_00F0_0F00_F00F;
    v = (v | (v << 4)) & 0x10C3_0C30_C30C_30C3;
    v = (v | (v << 2)) & 0x1249_2492_4924_9249;
    v
}

const fn compact_by_two(value: u64) -> u32 {
    let mut v = value & 0x1249_2492_4924_9249;
    v = (v | (v >> 2)) & 0x10C3_0C30_C30C_30C3;
    v = (v | (v >> 4)) & 0x100F_00F0_0F00_F00F;
    v = (v | (v >> 8)) & 0x001F_0000_FF00_00FF;
    v = (v | (v >> 16)) & 0x001F_0000_0000_FFFF;
    v = (v | (v >> 32)) & 0x1F_FFFF;
    v as u32
}

pub const fn morton_index_2d(x: u32, y: u32) -> u64 {
    spread_by_one(x) | (spread_by_one(y) << 1)
}

pub const fn morton_decode_2d(index: u64) -> (u32, u32) {
    (compact_by_one(index), compact_by_one(index >> 1))
}

pub const fn morton_index_3d(x: u32, y: u32, z: u32) -> u64 {
    spread_by_two(x) | (spread_by_two(y) << 1) | (spread_by_two(z) << 2)
}

pub const fn morton_decode_3d(index: u64) -> (u32, u32, u32) {
    (
        compact_by_two(index),
        compact_by_two(index >> 1),
        compact_by_two(index >> 2),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_indices() {
        assert_eq!(morton_index_2d(0, 0), 0);
        assert_eq!(morton_index_2d(1, 0), 1);
        assert_eq!(morton_index_2d(0, 1), 2);
        assert_eq!(morton_index_2d(1, 1), 3);
        assert_eq!(morton_index_2d(2, 0), 4);
        assert_eq!(morton_index_2d(3, 5), 0b10_01_11);

        assert_eq!(morton_index_3d(1, 0, 0), 1);
        assert_eq!(morton_index_3d(0, 1, 0), 2);
        assert_eq!(morton_index_3d(0, 0, 1), 4);
        assert_eq!(morton_index_3d(2, 0, 0), 8);
    }

    #[test]
    fn full_width_coordinates() {
        assert_eq!(morton_index_2d(u32::MAX, 0), 0x5555_5555_5555_5555);
        assert_eq!(morton_index_2d(0, u32::MAX), 0xAAAA_AAAA_AAAA_AAAA);
        assert_eq!(morton_decode_2d(u64::MAX), (u32::MAX, u32::MAX));
    }

    #[test]
    fn round_trip_2d() {
        for _ in 0..10_000 {
            let x = rand::random::<u16>() as u32;
            let y = rand::random::<u16>() as u32;
            assert_eq!(morton_decode_2d(morton_index_2d(x, y)), (x, y));
        }

        for (x, y) in [(0, 0), (0xFFFF, 0), (0, 0xFFFF), (0xFFFF, 0xFFFF), (0x1234, 0xABCD)] {
            assert_eq!(morton_decode_2d(morton_index_2d(x, y)), (x, y));
        }
    }

    #[test]
    fn round_trip_3d() {
        for _ in 0..10_000 {
            let x = rand::random::<u32>() & 0x1F_FFFF;
            let y = rand::random::<u32>() & 0x1F_FFFF;
            let z = rand::random::<u32>() & 0x1F_FFFF;
            assert_eq!(morton_decode_3d(morton_index_3d(x, y, z)), (x, y, z));
        }
    }
}
