//! vdmfec - systematic Reed-Solomon erasure coding over GF(2^m)
//!
//! An (n, k) code built from a Vandermonde matrix over GF(2^m), 2 <= m <= 16
//! (default 16, polynomial 0x1100B). The code is systematic: encoded packets
//! 0..k are the source packets verbatim, packets k..n are parity, and *any* k
//! of the n encoded packets reconstruct the k sources.
//!
//! ```
//! use vdmfec::FecCodec;
//!
//! let codec = FecCodec::new(3, 5)?;
//! let src: Vec<Vec<u8>> = (0..3).map(|i| vec![i as u8; 16]).collect();
//! let src_refs: Vec<&[u8]> = src.iter().map(|p| p.as_slice()).collect();
//!
//! // Produce all five encoded packets.
//! let mut encoded = Vec::new();
//! for index in 0..5 {
//!     let mut out = vec![0u8; 16];
//!     codec.encode(&src_refs, &mut out, index)?;
//!     encoded.push(out);
//! }
//!
//! // Lose packets 0 and 2; decode from {1, 3, 4}.
//! let mut pkts = vec![encoded[1].clone(), encoded[3].clone(), encoded[4].clone()];
//! let mut indexes = vec![1, 3, 4];
//! codec.decode(&mut pkts, &mut indexes)?;
//! assert_eq!(pkts, src);
//! # Ok::<(), vdmfec::FecError>(())
//! ```
//!
//! ## Performance
//!
//! Bulk multiply-accumulate over packet buffers is the hot path. Fields of up
//! to 256 elements use a full product table; wider fields use per-coefficient
//! split tables with PSHUFB shuffle kernels on x86_64 (AVX2 or SSSE3,
//! detected once at startup). Parity matrix products and multi-packet
//! recovery run on rayon worker threads, one output row per worker.
//!
//! Packet buffers hold packed field elements: one byte each for m <= 8, two
//! little-endian bytes each for wider fields. Packet lengths must be a
//! multiple of the element size.

pub mod codec;
pub mod error;
pub mod galois;
pub mod matrix;
pub mod reference;
pub mod simd;

pub use codec::FecCodec;
pub use error::{FecError, FecResult};
pub use galois::{init, GaloisField, Gf, DEFAULT_FIELD_BITS, MAX_FIELD_BITS, MIN_FIELD_BITS};
pub use matrix::{matmul, Matrix};
