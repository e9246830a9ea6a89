//! Systematic Reed-Solomon erasure codec
//!
//! ## Construction
//!
//! The encoding matrix starts as an n x k Vandermonde matrix over the field
//! (row 0 pinned to e_0, row r holding the powers of alpha^(r-1)). Inverting
//! its top k x k block and multiplying the bottom n-k rows by that inverse
//! yields a systematic code: the top k rows become the identity, so encoded
//! packets 0..k are the source packets verbatim, and any k rows of the result
//! remain linearly independent. That independence is what lets the decoder
//! rebuild the sources from any k received packets.
//!
//! ## Decoding
//!
//! Received packets are first shuffled so every surviving source packet sits
//! in its own slot. The k x k submatrix matching the received indices is then
//! inverted and only the missing rows are recomputed; survivors are never
//! copied.

use rayon::prelude::*;

use crate::error::{FecError, FecResult};
use crate::galois::{GaloisField, Gf, DEFAULT_FIELD_BITS};
use crate::matrix::{matmul, Matrix};
use crate::simd::addmul;

/// Constant folded into every descriptor's integrity tag.
const FEC_MAGIC: u32 = 0xFECC_0DEC;

/// Descriptor for one (n, k) systematic Reed-Solomon code.
///
/// Immutable once constructed; any number of threads may encode and decode
/// through a shared reference concurrently.
pub struct FecCodec {
    field: &'static GaloisField,
    k: usize,
    n: usize,
    /// n x k encoding matrix; rows 0..k form the identity.
    enc_matrix: Matrix,
    /// `FEC_MAGIC ^ k ^ n ^ addr(enc_matrix)`, checked on drop to catch
    /// clobbered descriptors before their buffer is released.
    magic: u32,
}

impl FecCodec {
    /// Create a codec over the default GF(2^16) field.
    ///
    /// Any k of the n encoded packets reconstruct the k source packets.
    pub fn new(k: usize, n: usize) -> FecResult<Self> {
        Self::with_field_width(DEFAULT_FIELD_BITS, k, n)
    }

    /// Create a codec over GF(2^bits), 2 <= bits <= 16.
    ///
    /// Requires `1 <= k <= n <= 2^bits`. Field tables for the width are built
    /// on first use and shared process-wide.
    pub fn with_field_width(bits: u32, k: usize, n: usize) -> FecResult<Self> {
        let field = GaloisField::get(bits)?;
        if k < 1 || k > n || n > field.capacity() {
            log::error!(
                "invalid parameters k {k} n {n} (field capacity {})",
                field.capacity()
            );
            return Err(FecError::InvalidParams {
                k,
                n,
                capacity: field.capacity(),
            });
        }

        // Vandermonde seed. Row 0 is pinned to e_0 (no exponent generates
        // it); row r >= 1, column c holds alpha^((r-1)*c).
        let mut top = Matrix::new(k, k);
        top.set(0, 0, 1);
        for row in 1..k {
            for col in 0..k {
                top.set(row, col, field.alpha_pow((row - 1) * col));
            }
        }
        let mut bottom = Matrix::new(n - k, k);
        for row in k..n {
            for col in 0..k {
                bottom.set(row - k, col, field.alpha_pow((row - 1) * col));
            }
        }

        // Systematic transform: right-multiplying every row by the inverse
        // of the top block maps the top block to the identity while keeping
        // all n rows pairwise independent.
        top.invert_vdm(field)?;
        let parity = matmul(field, &bottom, &top);

        let mut enc_matrix = Matrix::new(n, k);
        for row in 0..k {
            enc_matrix.set(row, row, 1);
        }
        for row in k..n {
            enc_matrix.row_mut(row).copy_from_slice(parity.row(row - k));
        }

        log::debug!("built systematic ({n},{k}) code over GF(2^{bits})");

        let mut codec = FecCodec {
            field,
            k,
            n,
            enc_matrix,
            magic: 0,
        };
        codec.magic = codec.expected_magic();
        Ok(codec)
    }

    /// Number of source packets.
    #[inline]
    pub fn k(&self) -> usize {
        self.k
    }

    /// Total number of encoded packets.
    #[inline]
    pub fn n(&self) -> usize {
        self.n
    }

    /// Width in bits of the underlying field.
    #[inline]
    pub fn field_bits(&self) -> u32 {
        self.field.bits()
    }

    /// Bytes per packed element. Packet lengths must be a multiple of this;
    /// elements are packed little-endian for fields wider than 8 bits.
    #[inline]
    pub fn element_bytes(&self) -> usize {
        self.field.element_bytes()
    }

    /// Encoding-matrix coefficient for (packet index, source index).
    #[inline]
    pub fn coefficient(&self, index: usize, src: usize) -> Gf {
        self.enc_matrix.get(index, src)
    }

    fn expected_magic(&self) -> u32 {
        FEC_MAGIC
            ^ self.k as u32
            ^ self.n as u32
            ^ (self.enc_matrix.as_slice().as_ptr() as usize as u32)
    }

    /// Verify the descriptor's integrity tag.
    pub fn check_integrity(&self) -> FecResult<()> {
        if self.magic != self.expected_magic() {
            return Err(FecError::Corrupt);
        }
        Ok(())
    }

    /// Produce the encoded packet with the given index into `out`.
    ///
    /// `src` must hold the k source packets, all the same length as `out`.
    /// Indices below k are the systematic fast path (a straight copy);
    /// indices in k..n produce parity as a linear combination of all k
    /// sources.
    pub fn encode(&self, src: &[&[u8]], out: &mut [u8], index: usize) -> FecResult<()> {
        if src.len() != self.k {
            return Err(FecError::PacketCountMismatch {
                expected: self.k,
                actual: src.len(),
            });
        }
        if index >= self.n {
            log::error!("invalid index {index} (max {})", self.n - 1);
            return Err(FecError::InvalidIndex {
                index,
                max: self.n - 1,
            });
        }
        let sz = out.len();
        if sz % self.element_bytes() != 0 {
            return Err(FecError::UnalignedLength {
                len: sz,
                element_bytes: self.element_bytes(),
            });
        }
        for s in src {
            if s.len() != sz {
                return Err(FecError::LengthMismatch {
                    expected: sz,
                    actual: s.len(),
                });
            }
        }

        if index < self.k {
            out.copy_from_slice(src[index]);
        } else {
            out.fill(0);
            let row = self.enc_matrix.row(index);
            for (s, &c) in src.iter().zip(row.iter()) {
                addmul(self.field, s, out, c);
            }
        }
        Ok(())
    }

    /// Reconstruct the k source packets in place from any k encoded packets.
    ///
    /// `pkts[i]` carries the packet whose code index is `indexes[i]`. Both
    /// slices are permuted during decoding; on success `pkts[i]` holds source
    /// packet i for every i.
    pub fn decode(&self, pkts: &mut [Vec<u8>], indexes: &mut [usize]) -> FecResult<()> {
        let k = self.k;
        if pkts.len() != k {
            return Err(FecError::PacketCountMismatch {
                expected: k,
                actual: pkts.len(),
            });
        }
        if indexes.len() != k {
            return Err(FecError::PacketCountMismatch {
                expected: k,
                actual: indexes.len(),
            });
        }
        for &index in indexes.iter() {
            if index >= self.n {
                log::error!("decode: invalid index {index} (max {})", self.n - 1);
                return Err(FecError::InvalidIndex {
                    index,
                    max: self.n - 1,
                });
            }
        }
        let sz = pkts[0].len();
        if sz % self.element_bytes() != 0 {
            return Err(FecError::UnalignedLength {
                len: sz,
                element_bytes: self.element_bytes(),
            });
        }
        for p in pkts.iter() {
            if p.len() != sz {
                return Err(FecError::LengthMismatch {
                    expected: sz,
                    actual: p.len(),
                });
            }
        }

        shuffle(pkts, indexes, k)?;
        debug_assert!(indexes
            .iter()
            .enumerate()
            .all(|(i, &ix)| ix >= k || ix == i));

        // Row i of the decode matrix describes how slot i was encoded:
        // survivors sit in their own slot and get an identity row, parity
        // slots get their encoding row. Inverting turns "received from
        // sources" into "sources from received".
        let mut m_dec = Matrix::new(k, k);
        for (i, &index) in indexes.iter().enumerate() {
            if index < k {
                m_dec.set(i, i, 1);
            } else {
                m_dec.row_mut(i).copy_from_slice(self.enc_matrix.row(index));
            }
        }
        m_dec.invert(self.field)?;

        // Every slot still holds a received packet until all temporaries are
        // complete, so missing rows can be rebuilt in parallel from the full
        // received set and moved into place afterwards.
        let missing: Vec<usize> = (0..k).filter(|&i| indexes[i] >= k).collect();
        let received: &[Vec<u8>] = pkts;
        let rebuilt: Vec<(usize, Vec<u8>)> = missing
            .par_iter()
            .map(|&row| {
                let mut buf = vec![0u8; sz];
                for (col, p) in received.iter().enumerate() {
                    addmul(self.field, p, &mut buf, m_dec.get(row, col));
                }
                (row, buf)
            })
            .collect();
        for (row, buf) in rebuilt {
            pkts[row] = buf;
        }

        Ok(())
    }
}

impl Drop for FecCodec {
    fn drop(&mut self) {
        if self.magic != self.expected_magic() {
            // A clobbered or double-managed descriptor: leave its buffer
            // alone rather than releasing memory we cannot vouch for.
            log::error!("bad parameters to codec free (integrity tag mismatch)");
            let matrix = std::mem::replace(&mut self.enc_matrix, Matrix::new(0, 0));
            std::mem::forget(matrix);
        }
    }
}

/// Move received packets into canonical slots: afterwards every index below
/// k equals its slot number. Packet handles are swapped, never contents.
fn shuffle(pkts: &mut [Vec<u8>], indexes: &mut [usize], k: usize) -> FecResult<()> {
    let mut i = 0;
    while i < k {
        if indexes[i] >= k || indexes[i] == i {
            i += 1;
        } else {
            // Slot indexes[i] wants this packet; if that slot already holds
            // its own packet the caller supplied the same index twice.
            let c = indexes[i];
            if indexes[c] == c {
                log::error!("decode: duplicate packet index {c}");
                return Err(FecError::DuplicateIndex(c));
            }
            indexes.swap(i, c);
            pkts.swap(i, c);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(bits: u32, k: usize, n: usize, elems: usize, drop: &[usize]) {
        let codec = FecCodec::with_field_width(bits, k, n).unwrap();
        let q = 1usize << bits;
        let eb = codec.element_bytes();
        let sz = elems * eb;
        // Packet contents must be valid field elements, packed little-endian.
        let src: Vec<Vec<u8>> = (0..k)
            .map(|i| {
                (0..elems)
                    .flat_map(|j| {
                        let e = ((i * 89 + j * 57 + 3) % q) as u16;
                        e.to_le_bytes().into_iter().take(eb)
                    })
                    .collect()
            })
            .collect();
        let src_refs: Vec<&[u8]> = src.iter().map(|p| p.as_slice()).collect();

        let mut encoded: Vec<Vec<u8>> = Vec::new();
        for index in 0..n {
            let mut out = vec![0u8; sz];
            codec.encode(&src_refs, &mut out, index).unwrap();
            encoded.push(out);
        }

        let mut pkts = Vec::new();
        let mut indexes = Vec::new();
        for index in 0..n {
            if !drop.contains(&index) && pkts.len() < k {
                pkts.push(encoded[index].clone());
                indexes.push(index);
            }
        }
        assert_eq!(pkts.len(), k, "test dropped too many packets");

        codec.decode(&mut pkts, &mut indexes).unwrap();
        for i in 0..k {
            assert_eq!(pkts[i], src[i], "source packet {i} not recovered");
        }
    }

    #[test]
    fn rejects_invalid_parameters() {
        assert!(matches!(
            FecCodec::new(5, 3),
            Err(FecError::InvalidParams { .. })
        ));
        assert!(matches!(
            FecCodec::with_field_width(8, 0, 4),
            Err(FecError::InvalidParams { .. })
        ));
        assert!(matches!(
            FecCodec::with_field_width(8, 257, 257),
            Err(FecError::InvalidParams { .. })
        ));
        assert!(matches!(
            FecCodec::with_field_width(4, 3, 17),
            Err(FecError::InvalidParams { .. })
        ));
    }

    #[test]
    fn full_capacity_code_is_accepted() {
        let codec = FecCodec::with_field_width(4, 16, 16).unwrap();
        assert_eq!((codec.k(), codec.n()), (16, 16));
    }

    #[test]
    fn top_rows_are_identity() {
        let codec = FecCodec::with_field_width(8, 4, 7).unwrap();
        for row in 0..4 {
            for col in 0..4 {
                let want = if row == col { 1 } else { 0 };
                assert_eq!(codec.coefficient(row, col), want);
            }
        }
    }

    #[test]
    fn encode_rejects_out_of_range_index() {
        let codec = FecCodec::with_field_width(8, 2, 4).unwrap();
        let a = [1u8, 2];
        let b = [3u8, 4];
        let mut out = [0u8; 2];
        assert!(matches!(
            codec.encode(&[&a, &b], &mut out, 4),
            Err(FecError::InvalidIndex { index: 4, max: 3 })
        ));
    }

    #[test]
    fn encode_rejects_length_mismatch() {
        let codec = FecCodec::with_field_width(8, 2, 3).unwrap();
        let a = [1u8, 2];
        let b = [3u8, 4, 5];
        let mut out = [0u8; 2];
        assert!(matches!(
            codec.encode(&[&a, &b], &mut out, 2),
            Err(FecError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn decode_rejects_duplicate_indexes() {
        let codec = FecCodec::with_field_width(8, 3, 5).unwrap();
        let mut pkts = vec![vec![0u8; 4], vec![1u8; 4], vec![2u8; 4]];
        let mut indexes = vec![1usize, 1, 3];
        assert_eq!(
            codec.decode(&mut pkts, &mut indexes),
            Err(FecError::DuplicateIndex(1))
        );
    }

    #[test]
    fn decode_rejects_duplicate_parity_via_singularity() {
        let codec = FecCodec::with_field_width(8, 2, 5).unwrap();
        // Two copies of parity packet 3: the decode matrix has equal rows.
        let src: Vec<Vec<u8>> = vec![vec![9, 8], vec![7, 6]];
        let src_refs: Vec<&[u8]> = src.iter().map(|p| p.as_slice()).collect();
        let mut parity = vec![0u8; 2];
        codec.encode(&src_refs, &mut parity, 3).unwrap();
        let mut pkts = vec![parity.clone(), parity];
        let mut indexes = vec![3usize, 3];
        assert!(matches!(
            codec.decode(&mut pkts, &mut indexes),
            Err(FecError::SingularMatrix(_))
        ));
    }

    #[test]
    fn roundtrip_small_field() {
        roundtrip(8, 3, 5, 4, &[0, 2]);
        roundtrip(8, 4, 6, 9, &[1, 5]);
        roundtrip(2, 2, 4, 8, &[0, 1]);
    }

    #[test]
    fn roundtrip_wide_field() {
        roundtrip(16, 4, 8, 64, &[0, 1, 2, 3]);
        roundtrip(9, 3, 6, 10, &[2, 4]);
    }

    #[test]
    fn all_survivor_subsets_decode() {
        // GF(2^4), k=3, n=6: every 3-subset of the 6 encoded packets must
        // reconstruct the sources (any k rows are non-singular).
        let bits = 4;
        let (k, n, sz) = (3usize, 6usize, 6usize);
        let codec = FecCodec::with_field_width(bits, k, n).unwrap();
        let src: Vec<Vec<u8>> = (0..k)
            .map(|i| (0..sz).map(|j| ((i * 5 + j) % 16) as u8).collect())
            .collect();
        let src_refs: Vec<&[u8]> = src.iter().map(|p| p.as_slice()).collect();
        let encoded: Vec<Vec<u8>> = (0..n)
            .map(|index| {
                let mut out = vec![0u8; sz];
                codec.encode(&src_refs, &mut out, index).unwrap();
                out
            })
            .collect();

        for a in 0..n {
            for b in a + 1..n {
                for c in b + 1..n {
                    let mut pkts = vec![encoded[a].clone(), encoded[b].clone(), encoded[c].clone()];
                    let mut indexes = vec![a, b, c];
                    codec.decode(&mut pkts, &mut indexes).unwrap();
                    assert_eq!(&pkts[..], &src[..], "subset ({a},{b},{c}) failed");
                }
            }
        }
    }

    #[test]
    fn integrity_tag_detects_corruption() {
        let mut codec = FecCodec::with_field_width(8, 2, 4).unwrap();
        codec.check_integrity().unwrap();
        codec.magic ^= 0x1;
        assert_eq!(codec.check_integrity(), Err(FecError::Corrupt));
        // Dropping the corrupted descriptor must not panic; the matrix is
        // deliberately leaked instead of freed.
        drop(codec);
    }
}
