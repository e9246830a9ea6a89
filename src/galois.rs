//! Galois field GF(2^m) arithmetic for Reed-Solomon erasure coding
//!
//! ## Field construction
//!
//! Fields of 2^m elements for any m in 2..=16 are generated from a table of
//! primitive irreducible polynomials (Lin & Costello, Appendix A). The
//! polynomial for GF(2^16) is 0x1100B (x^16 + x^12 + x^3 + x + 1); changing
//! any entry breaks interoperability with previously encoded streams.
//!
//! ## Lookup tables
//!
//! Multiplication is table driven. Every field carries exponent, logarithm and
//! inverse tables; the exponent table is stored twice back to back so that
//! `exp[log(x) + log(y)]` needs no modular reduction. Fields of 256 elements
//! or fewer additionally carry a full product table, which makes `mul` a
//! single load. Wider fields use per-coefficient split tables
//! ([`SplitMulTable`]) for the bulk kernels.
//!
//! Tables for a given width are built at most once per process and shared
//! behind a `OnceLock` registry; after construction they are read-only.

use std::sync::OnceLock;

use crate::error::{FecError, FecResult};

/// Storage type for a field element in polynomial representation.
///
/// Elements of fields with m <= 8 occupy the low byte only.
pub type Gf = u16;

/// Smallest supported field width.
pub const MIN_FIELD_BITS: u32 = 2;
/// Largest supported field width.
pub const MAX_FIELD_BITS: u32 = 16;
/// Field width used by [`crate::FecCodec::new`].
pub const DEFAULT_FIELD_BITS: u32 = 16;

/// Primitive irreducible polynomials indexed by field width.
/// Entries 0 and 1 are placeholders; no code exists for those widths.
const PRIMITIVE_POLY: [u32; 17] = [
    0x00000, 0x00000, //
    0x00007, // 2    1+x+x^2
    0x0000b, // 3    1+x+x^3
    0x00013, // 4    1+x+x^4
    0x00025, // 5    1+x^2+x^5
    0x00043, // 6    1+x+x^6
    0x00089, // 7    1+x^3+x^7
    0x0011d, // 8    1+x^2+x^3+x^4+x^8
    0x00211, // 9    1+x^4+x^9
    0x00409, // 10   1+x^3+x^10
    0x00805, // 11   1+x^2+x^11
    0x01053, // 12   1+x+x^4+x^6+x^12
    0x0201b, // 13   1+x+x^3+x^4+x^13
    0x04443, // 14   1+x+x^6+x^10+x^14
    0x08003, // 15   1+x+x^15
    0x1100b, // 16   1+x+x^3+x^12+x^16
];

const EMPTY_SLOT: OnceLock<GaloisField> = OnceLock::new();
static FIELDS: [OnceLock<GaloisField>; (MAX_FIELD_BITS + 1) as usize] =
    [EMPTY_SLOT; (MAX_FIELD_BITS + 1) as usize];

/// Force table construction for the given field width.
///
/// Idempotent; codec construction calls this implicitly. Useful to move the
/// table-build cost out of the first encode on a latency-sensitive path.
pub fn init(bits: u32) -> FecResult<()> {
    GaloisField::get(bits).map(|_| ())
}

/// Lookup tables for one GF(2^m) instance
#[derive(Debug)]
pub struct GaloisField {
    bits: u32,
    /// Number of non-zero elements, 2^m - 1.
    size: usize,
    /// `exp[i] = alpha^i`, length `2 * size` (doubled copy).
    exp: Vec<Gf>,
    /// `log[alpha^i] = i`, length `size + 1`; `log[0]` holds the sentinel `size`.
    log: Vec<Gf>,
    /// `inverse[x] * x == 1` for non-zero x; `inverse[0] == 0`.
    inverse: Vec<Gf>,
    /// Flat 256x256 product table, present only when `bits <= 8`.
    /// Rows and columns outside the field are zero so arbitrary packet
    /// bytes index safely.
    mul_table: Option<Box<[u8]>>,
}

impl GaloisField {
    /// Get the shared field instance for a width, building tables on first use.
    pub fn get(bits: u32) -> FecResult<&'static GaloisField> {
        if !(MIN_FIELD_BITS..=MAX_FIELD_BITS).contains(&bits) {
            return Err(FecError::UnsupportedFieldWidth(bits));
        }
        Ok(FIELDS[bits as usize].get_or_init(|| GaloisField::build(bits)))
    }

    fn build(bits: u32) -> Self {
        let poly = PRIMITIVE_POLY[bits as usize];
        let size = (1usize << bits) - 1;

        let mut exp = vec![0 as Gf; 2 * size];
        let mut log = vec![0 as Gf; size + 1];
        let mut inverse = vec![0 as Gf; size + 1];

        // The first `bits` powers of alpha are plain left shifts of 1. The
        // polynomial's low coefficients assemble alpha^bits, the feedback
        // value folded in whenever a shift overflows the field.
        let mut mask: u32 = 1;
        let mut feedback: u32 = 0;
        for i in 0..bits as usize {
            exp[i] = mask as Gf;
            log[mask as usize] = i as Gf;
            if poly & (1 << i) != 0 {
                feedback ^= mask;
            }
            mask <<= 1;
        }
        exp[bits as usize] = feedback as Gf;
        log[feedback as usize] = bits as Gf;

        let top = 1u32 << (bits - 1);
        for i in bits as usize + 1..size {
            let prev = exp[i - 1] as u32;
            let next = if prev & top != 0 {
                feedback ^ ((prev ^ top) << 1)
            } else {
                prev << 1
            };
            exp[i] = next as Gf;
            log[next as usize] = i as Gf;
        }

        // log(0) is undefined; park a sentinel there. It is never consulted
        // by the multiply paths, which test for zero first.
        log[0] = size as Gf;

        // Second copy of the exponent table: log sums index directly.
        for i in 0..size {
            exp[i + size] = exp[i];
        }

        inverse[0] = 0;
        inverse[1] = 1;
        for i in 2..=size {
            inverse[i] = exp[size - log[i] as usize];
        }

        let mul_table = (bits <= 8).then(|| {
            let mut table = vec![0u8; 256 * 256].into_boxed_slice();
            for x in 1..=size {
                for y in 1..=size {
                    table[(x << 8) | y] = exp[log[x] as usize + log[y] as usize] as u8;
                }
            }
            table
        });

        log::debug!("built GF(2^{bits}) tables ({size} non-zero elements)");

        GaloisField {
            bits,
            size,
            exp,
            log,
            inverse,
            mul_table,
        }
    }

    /// Field width m.
    #[inline]
    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// Number of non-zero elements, 2^m - 1.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Total number of field elements, 2^m. Also the maximum code length n.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.size + 1
    }

    /// Bytes occupied by one element in a packet buffer.
    #[inline]
    pub fn element_bytes(&self) -> usize {
        if self.bits <= 8 {
            1
        } else {
            2
        }
    }

    /// Product of two field elements.
    #[inline]
    pub fn mul(&self, x: Gf, y: Gf) -> Gf {
        debug_assert!((x as usize) <= self.size && (y as usize) <= self.size);
        if let Some(table) = &self.mul_table {
            table[((x as usize) << 8) | y as usize] as Gf
        } else {
            if x == 0 || y == 0 {
                return 0;
            }
            self.exp[self.log[x as usize] as usize + self.log[y as usize] as usize]
        }
    }

    /// Multiplicative inverse; `inv(0)` is 0 by convention.
    #[inline]
    pub fn inv(&self, x: Gf) -> Gf {
        self.inverse[x as usize]
    }

    /// `alpha^e` for an arbitrary (unreduced) exponent.
    #[inline]
    pub fn alpha_pow(&self, e: usize) -> Gf {
        self.exp[self.modnn(e)]
    }

    /// Reduce an exponent modulo 2^m - 1 without dividing: repeatedly fold
    /// the high bits down, exact because 2^m == 1 (mod 2^m - 1).
    #[inline]
    fn modnn(&self, mut x: usize) -> usize {
        while x >= self.size {
            x -= self.size;
            x = (x >> self.bits) + (x & self.size);
        }
        x
    }

    /// Product row for a fixed coefficient, fields of 256 elements or fewer.
    ///
    /// `row[b]` is `c * b` for every byte value `b`; bytes outside the field
    /// map to zero. This is the per-constant table the byte-wide bulk kernel
    /// indexes directly.
    #[inline]
    pub fn mul_row(&self, c: Gf) -> &[u8] {
        let table = self
            .mul_table
            .as_ref()
            .expect("product rows exist only for fields of <= 256 elements");
        &table[(c as usize) << 8..((c as usize) << 8) + 256]
    }

    /// Build split multiplication tables for a coefficient, wide fields only.
    ///
    /// `c * x == low[x & 0xFF] ^ high[x >> 8]` for every valid element x.
    /// Two 256-entry tables instead of one 65536-entry table: 1 KiB per
    /// coefficient, cheap enough to build on demand.
    pub fn split_mul_table(&self, c: Gf) -> SplitMulTable {
        debug_assert!(self.bits > 8);
        let mut low = Box::new([0 as Gf; 256]);
        let mut high = Box::new([0 as Gf; 256]);

        if c == 0 {
            return SplitMulTable { low, high };
        }

        for i in 1..256usize {
            low[i] = self.mul(c, i as Gf);
        }
        for i in 1..256usize {
            let x = i << 8;
            // High bytes past the field size can only come from packets that
            // violate the element-range contract; map them to zero rather
            // than out of bounds.
            if x <= self.size {
                high[i] = self.mul(c, x as Gf);
            }
        }

        SplitMulTable { low, high }
    }
}

/// Multiplication table for one coefficient, split into low/high byte tables
pub struct SplitMulTable {
    /// `low[b] = c * b`
    pub low: Box<[Gf; 256]>,
    /// `high[b] = c * (b << 8)`
    pub high: Box<[Gf; 256]>,
}
