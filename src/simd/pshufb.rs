//! PSHUFB-based multiply-accumulate kernels for wide fields (x86_64)
//!
//! A PSHUFB byte shuffle is a 16-entry table lookup applied to every byte
//! lane at once. A 16-bit field multiplication by a fixed coefficient needs
//! 256-entry tables, so each input byte is split into two nibbles and each
//! nibble resolved against its own 16-byte table; the eight partial products
//! (two input bytes x two nibbles x two result bytes) XOR together into the
//! final packed product.
//!
//! Both kernels use unaligned loads and stores throughout; callers hand the
//! unprocessed tail to the scalar kernel.

use std::arch::x86_64::*;

use super::build_nibble_tables;
use crate::galois::SplitMulTable;

/// AVX2 kernel: 32 bytes (16 packed elements) per iteration.
///
/// Returns the number of bytes processed, a multiple of 32; the caller
/// finishes the remainder.
///
/// # Safety
/// The CPU must support AVX2 (`simd_level()` reported [`super::SimdLevel::Avx2`]).
#[target_feature(enable = "avx2")]
pub unsafe fn addmul_avx2(src: &[u8], dst: &mut [u8], tables: &SplitMulTable) -> usize {
    let len = src.len().min(dst.len());
    let end = len & !31;
    if end == 0 {
        return 0;
    }

    let low = build_nibble_tables(&tables.low);
    let high = build_nibble_tables(&tables.high);

    // Broadcast each 16-byte nibble table into both 128-bit lanes.
    let low_lo_nib_lo =
        _mm256_broadcastsi128_si256(_mm_loadu_si128(low.lo_nib_lo_byte.as_ptr() as *const __m128i));
    let low_lo_nib_hi =
        _mm256_broadcastsi128_si256(_mm_loadu_si128(low.lo_nib_hi_byte.as_ptr() as *const __m128i));
    let low_hi_nib_lo =
        _mm256_broadcastsi128_si256(_mm_loadu_si128(low.hi_nib_lo_byte.as_ptr() as *const __m128i));
    let low_hi_nib_hi =
        _mm256_broadcastsi128_si256(_mm_loadu_si128(low.hi_nib_hi_byte.as_ptr() as *const __m128i));
    let high_lo_nib_lo = _mm256_broadcastsi128_si256(_mm_loadu_si128(
        high.lo_nib_lo_byte.as_ptr() as *const __m128i,
    ));
    let high_lo_nib_hi = _mm256_broadcastsi128_si256(_mm_loadu_si128(
        high.lo_nib_hi_byte.as_ptr() as *const __m128i,
    ));
    let high_hi_nib_lo = _mm256_broadcastsi128_si256(_mm_loadu_si128(
        high.hi_nib_lo_byte.as_ptr() as *const __m128i,
    ));
    let high_hi_nib_hi = _mm256_broadcastsi128_si256(_mm_loadu_si128(
        high.hi_nib_hi_byte.as_ptr() as *const __m128i,
    ));

    let mask_0f = _mm256_set1_epi8(0x0f);
    let mask_f0 = _mm256_set1_epi8(0xf0u8 as i8);
    let byte_mask = _mm256_set1_epi16(0x00ff);

    let mut pos = 0;
    while pos < end {
        let in_vec = _mm256_loadu_si256(src.as_ptr().add(pos) as *const __m256i);
        let out_vec = _mm256_loadu_si256(dst.as_ptr().add(pos) as *const __m256i);

        // Per 16-bit lane: [low_byte, 0] and [high_byte, 0]. The zeroed odd
        // bytes index entry 0 of every nibble table, whose value is 0, so
        // they never pollute the accumulation.
        let low_bytes = _mm256_and_si256(in_vec, byte_mask);
        let high_bytes = _mm256_srli_epi16(in_vec, 8);

        let low_lo_nib = _mm256_and_si256(low_bytes, mask_0f);
        let low_hi_nib = _mm256_srli_epi16(_mm256_and_si256(low_bytes, mask_f0), 4);
        let high_lo_nib = _mm256_and_si256(high_bytes, mask_0f);
        let high_hi_nib = _mm256_srli_epi16(_mm256_and_si256(high_bytes, mask_f0), 4);

        // Eight shuffle lookups, accumulated per result byte.
        let result_lo = _mm256_xor_si256(
            _mm256_xor_si256(
                _mm256_shuffle_epi8(low_lo_nib_lo, low_lo_nib),
                _mm256_shuffle_epi8(low_hi_nib_lo, low_hi_nib),
            ),
            _mm256_xor_si256(
                _mm256_shuffle_epi8(high_lo_nib_lo, high_lo_nib),
                _mm256_shuffle_epi8(high_hi_nib_lo, high_hi_nib),
            ),
        );
        let result_hi = _mm256_xor_si256(
            _mm256_xor_si256(
                _mm256_shuffle_epi8(low_lo_nib_hi, low_lo_nib),
                _mm256_shuffle_epi8(low_hi_nib_hi, low_hi_nib),
            ),
            _mm256_xor_si256(
                _mm256_shuffle_epi8(high_lo_nib_hi, high_lo_nib),
                _mm256_shuffle_epi8(high_hi_nib_hi, high_hi_nib),
            ),
        );

        // Reassemble 16-bit products and fold into dst.
        let result = _mm256_or_si256(result_lo, _mm256_slli_epi16(result_hi, 8));
        _mm256_storeu_si256(
            dst.as_mut_ptr().add(pos) as *mut __m256i,
            _mm256_xor_si256(out_vec, result),
        );

        pos += 32;
    }

    end
}

/// SSSE3 kernel: 16 bytes (8 packed elements) per iteration.
///
/// Returns the number of bytes processed, a multiple of 16.
///
/// # Safety
/// The CPU must support SSSE3 (`simd_level()` reported [`super::SimdLevel::Ssse3`]).
#[target_feature(enable = "ssse3")]
pub unsafe fn addmul_ssse3(src: &[u8], dst: &mut [u8], tables: &SplitMulTable) -> usize {
    let len = src.len().min(dst.len());
    let end = len & !15;
    if end == 0 {
        return 0;
    }

    let low = build_nibble_tables(&tables.low);
    let high = build_nibble_tables(&tables.high);

    let low_lo_nib_lo = _mm_loadu_si128(low.lo_nib_lo_byte.as_ptr() as *const __m128i);
    let low_lo_nib_hi = _mm_loadu_si128(low.lo_nib_hi_byte.as_ptr() as *const __m128i);
    let low_hi_nib_lo = _mm_loadu_si128(low.hi_nib_lo_byte.as_ptr() as *const __m128i);
    let low_hi_nib_hi = _mm_loadu_si128(low.hi_nib_hi_byte.as_ptr() as *const __m128i);
    let high_lo_nib_lo = _mm_loadu_si128(high.lo_nib_lo_byte.as_ptr() as *const __m128i);
    let high_lo_nib_hi = _mm_loadu_si128(high.lo_nib_hi_byte.as_ptr() as *const __m128i);
    let high_hi_nib_lo = _mm_loadu_si128(high.hi_nib_lo_byte.as_ptr() as *const __m128i);
    let high_hi_nib_hi = _mm_loadu_si128(high.hi_nib_hi_byte.as_ptr() as *const __m128i);

    let mask_0f = _mm_set1_epi8(0x0f);
    let mask_f0 = _mm_set1_epi8(0xf0u8 as i8);
    let byte_mask = _mm_set1_epi16(0x00ff);

    let mut pos = 0;
    while pos < end {
        let in_vec = _mm_loadu_si128(src.as_ptr().add(pos) as *const __m128i);
        let out_vec = _mm_loadu_si128(dst.as_ptr().add(pos) as *const __m128i);

        let low_bytes = _mm_and_si128(in_vec, byte_mask);
        let high_bytes = _mm_srli_epi16(in_vec, 8);

        let low_lo_nib = _mm_and_si128(low_bytes, mask_0f);
        let low_hi_nib = _mm_srli_epi16(_mm_and_si128(low_bytes, mask_f0), 4);
        let high_lo_nib = _mm_and_si128(high_bytes, mask_0f);
        let high_hi_nib = _mm_srli_epi16(_mm_and_si128(high_bytes, mask_f0), 4);

        let result_lo = _mm_xor_si128(
            _mm_xor_si128(
                _mm_shuffle_epi8(low_lo_nib_lo, low_lo_nib),
                _mm_shuffle_epi8(low_hi_nib_lo, low_hi_nib),
            ),
            _mm_xor_si128(
                _mm_shuffle_epi8(high_lo_nib_lo, high_lo_nib),
                _mm_shuffle_epi8(high_hi_nib_lo, high_hi_nib),
            ),
        );
        let result_hi = _mm_xor_si128(
            _mm_xor_si128(
                _mm_shuffle_epi8(low_lo_nib_hi, low_lo_nib),
                _mm_shuffle_epi8(low_hi_nib_hi, low_hi_nib),
            ),
            _mm_xor_si128(
                _mm_shuffle_epi8(high_lo_nib_hi, high_lo_nib),
                _mm_shuffle_epi8(high_hi_nib_hi, high_hi_nib),
            ),
        );

        let result = _mm_or_si128(result_lo, _mm_slli_epi16(result_hi, 8));
        _mm_storeu_si128(
            dst.as_mut_ptr().add(pos) as *mut __m128i,
            _mm_xor_si128(out_vec, result),
        );

        pos += 16;
    }

    end
}
