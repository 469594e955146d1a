use ark_ff::{BigInteger, Field, PrimeField};
use log::trace;
use num_bigint::{BigUint, RandBigInt};
use rand::{CryptoRng, RngCore};

// https://docs.rs/sha2/latest/sha2/
use sha2::{Digest, Sha256};

use crate::curve::{CurvePoint, EllipticCurveGroup, Fq};
use crate::error::{Error, Result};

/// Source of secret randomness for one session.
///
/// Anything that is both an `RngCore` and a `CryptoRng` qualifies, so
/// production code passes `rand::thread_rng()` and tests pass a seeded
/// `StdRng`. Note that `ark_std::test_rng()` is only an `Rng` and does not
/// qualify.
pub trait RandomnessProvider: RngCore + CryptoRng {}

impl<T: RngCore + CryptoRng + ?Sized> RandomnessProvider for T {}

pub fn secure_random_bytes<R: RandomnessProvider + ?Sized>(rng: &mut R, len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    rng.fill_bytes(&mut bytes);
    bytes
}

/// Uniform integer in `[0, 2^bits)`.
pub fn secure_random_int<R: RandomnessProvider + ?Sized>(rng: &mut R, bits: u64) -> BigUint {
    rng.gen_biguint(bits)
}

/// Deterministically maps an identifier to a point on the curve of `group`.
///
/// Try-and-increment: candidate `i` takes `x = SHA256(SHA256(id) || i_be32) mod p`
/// and accepts it when `x^3 + ax + b` is a square. Since `p = 3 (mod 4)`
/// the root is `rhs^((p+1)/4)`.
///
/// # Arguments
///
/// * `group` - The masking group. Its base field must satisfy `p = 3 (mod 4)`
/// * `identifier` - An element of one of the private sets
/// * `max_attempts` - Bound on the number of candidates tried
///
/// # Outputs
///
/// * `point` - The same point for the same identifier on every call
pub fn hash_to_curve(group: &EllipticCurveGroup, identifier: &str, max_attempts: u32) -> Result<CurvePoint> {
    let seed = Sha256::digest(identifier.as_bytes());
    let params = group.params();
    let sqrt_exponent = sqrt_exponent();

    for counter in 0..max_attempts {
        let mut hasher = Sha256::new();
        hasher.update(seed);
        hasher.update(counter.to_be_bytes());
        let digest = hasher.finalize();

        let x = Fq::from_be_bytes_mod_order(&digest);
        let rhs = params.rhs(&x);
        let y = rhs.pow(sqrt_exponent);

        if y.square() == rhs {
            trace!("hash-to-curve accepted candidate {}", counter);
            return Ok(CurvePoint::Affine { x, y });
        }
    }

    Err(Error::HashToCurveExhausted { attempts: max_attempts })
}

/// `(p + 1) / 4` for the P-256 base field.
fn sqrt_exponent() -> <Fq as PrimeField>::BigInt {
    let mut exponent = Fq::MODULUS;
    // p + 1 still fits in 256 bits
    exponent.add_with_carry(&1u64.into());
    exponent.div2();
    exponent.div2();
    exponent
}
