//! Bulk multiply-accumulate kernels with SIMD dispatch
//!
//! The workhorse of both encoding and decoding is `dst ^= c * src` over whole
//! packet buffers. For wide fields (m > 8) the per-coefficient
//! [`SplitMulTable`] drives a scalar word loop, and on x86_64 a PSHUFB
//! shuffle kernel based on the "Screaming Fast Galois Field Arithmetic"
//! technique (James Plank, FAST 2013): each 16-entry nibble table lives in a
//! vector register and one byte-shuffle performs sixteen table lookups at
//! once.
//!
//! The kernel to use is detected from CPU features once per process and never
//! changes afterwards.

#[cfg(target_arch = "x86_64")]
pub mod pshufb;

use std::sync::OnceLock;

use crate::galois::{GaloisField, Gf, SplitMulTable};

static SIMD_LEVEL: OnceLock<SimdLevel> = OnceLock::new();

/// SIMD implementation available on the current CPU
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimdLevel {
    /// No usable SIMD; scalar table loop only.
    None,
    /// x86_64 SSSE3, 128-bit PSHUFB.
    Ssse3,
    /// x86_64 AVX2, 256-bit PSHUFB.
    Avx2,
}

/// Kernel selected for this process, detected on first use.
pub fn simd_level() -> SimdLevel {
    *SIMD_LEVEL.get_or_init(detect_simd_level)
}

fn detect_simd_level() -> SimdLevel {
    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("avx2") {
            return SimdLevel::Avx2;
        }
        if is_x86_feature_detected!("ssse3") {
            return SimdLevel::Ssse3;
        }
        SimdLevel::None
    }

    #[cfg(not(target_arch = "x86_64"))]
    {
        SimdLevel::None
    }
}

/// `dst ^= c * src` over packed field elements.
///
/// Buffers hold one byte per element for m <= 8 and two little-endian bytes
/// per element otherwise. A zero coefficient is a no-op. Processes
/// `min(src.len(), dst.len())` bytes; for wide fields an odd trailing byte is
/// multiplied through the low-byte table.
pub fn addmul(gf: &GaloisField, src: &[u8], dst: &mut [u8], c: Gf) {
    if c == 0 {
        return;
    }
    if gf.bits() <= 8 {
        addmul_bytes(gf.mul_row(c), src, dst);
    } else {
        let tables = gf.split_mul_table(c);
        addmul_wide(&tables, src, dst);
    }
}

/// Byte-per-element kernel: one product-table load per byte.
fn addmul_bytes(row: &[u8], src: &[u8], dst: &mut [u8]) {
    for (d, &s) in dst.iter_mut().zip(src.iter()) {
        *d ^= row[s as usize];
    }
}

/// Two-bytes-per-element kernel with SIMD dispatch and scalar tail.
///
/// Public for benchmarks; [`addmul`] is the normal entry point.
pub fn addmul_wide(tables: &SplitMulTable, src: &[u8], dst: &mut [u8]) {
    let len = src.len().min(dst.len());
    let mut done = 0;

    #[cfg(target_arch = "x86_64")]
    if len >= 32 {
        done = match simd_level() {
            SimdLevel::Avx2 => unsafe { pshufb::addmul_avx2(&src[..len], &mut dst[..len], tables) },
            SimdLevel::Ssse3 => unsafe {
                pshufb::addmul_ssse3(&src[..len], &mut dst[..len], tables)
            },
            SimdLevel::None => 0,
        };
    }

    addmul_wide_scalar(tables, &src[done..len], &mut dst[done..len]);
}

/// Scalar fallback for wide fields.
///
/// A simple word loop; the compiler unrolls it better than hand-unrolled
/// variants on both x86_64 and aarch64. When both buffers happen to be
/// 2-byte aligned the words are read through a safe `bytemuck` cast,
/// otherwise byte pairs are assembled explicitly.
pub fn addmul_wide_scalar(tables: &SplitMulTable, src: &[u8], dst: &mut [u8]) {
    let len = src.len().min(dst.len());
    let even = len & !1;
    let low = &tables.low[..];
    let high = &tables.high[..];

    let mut handled = false;
    #[cfg(target_endian = "little")]
    if let Ok(in_words) = bytemuck::try_cast_slice::<u8, u16>(&src[..even]) {
        if let Ok(out_words) = bytemuck::try_cast_slice_mut::<u8, u16>(&mut dst[..even]) {
            for (d, &s) in out_words.iter_mut().zip(in_words.iter()) {
                *d ^= low[(s & 0xff) as usize] ^ high[(s >> 8) as usize];
            }
            handled = true;
        }
    }

    if !handled {
        for (d, s) in dst[..even]
            .chunks_exact_mut(2)
            .zip(src[..even].chunks_exact(2))
        {
            let w = u16::from_le_bytes([s[0], s[1]]);
            let r = low[(w & 0xff) as usize] ^ high[(w >> 8) as usize];
            let r = r.to_le_bytes();
            d[0] ^= r[0];
            d[1] ^= r[1];
        }
    }

    // Odd trailing byte: only the low half of an element exists.
    if len & 1 == 1 {
        dst[len - 1] ^= tables.low[src[len - 1] as usize].to_le_bytes()[0];
    }
}

/// Nibble lookup tables for one 256-entry split table
///
/// Four 16-byte tables per input byte half, the layout the shuffle kernels
/// load straight into vector registers. 64 bytes instead of the 512-byte
/// split table, small enough to stay resident across a whole packet.
#[derive(Debug, Clone)]
pub struct NibbleTables {
    /// Low input nibble (0x0N) -> result low byte.
    pub lo_nib_lo_byte: [u8; 16],
    /// Low input nibble (0x0N) -> result high byte.
    pub lo_nib_hi_byte: [u8; 16],
    /// High input nibble (0xN0) -> result low byte.
    pub hi_nib_lo_byte: [u8; 16],
    /// High input nibble (0xN0) -> result high byte.
    pub hi_nib_hi_byte: [u8; 16],
}

/// Split a 256-entry coefficient table into the four nibble tables the
/// shuffle kernels consume.
pub fn build_nibble_tables(table: &[Gf; 256]) -> NibbleTables {
    let mut lo_nib_lo_byte = [0u8; 16];
    let mut lo_nib_hi_byte = [0u8; 16];
    let mut hi_nib_lo_byte = [0u8; 16];
    let mut hi_nib_hi_byte = [0u8; 16];

    for nib in 0..16 {
        let r_lo = table[nib];
        lo_nib_lo_byte[nib] = (r_lo & 0xff) as u8;
        lo_nib_hi_byte[nib] = (r_lo >> 8) as u8;

        let r_hi = table[nib << 4];
        hi_nib_lo_byte[nib] = (r_hi & 0xff) as u8;
        hi_nib_hi_byte[nib] = (r_hi >> 8) as u8;
    }

    NibbleTables {
        lo_nib_lo_byte,
        lo_nib_hi_byte,
        hi_nib_lo_byte,
        hi_nib_hi_byte,
    }
}
