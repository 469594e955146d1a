//! Paillier additively homomorphic encryption over `Z_(n^2)`.
//!
//! `Enc(m1) * Enc(m2) = Enc(m1 + m2 mod n)` and `Enc(m)^k = Enc(k * m mod n)`.
//! Party2 owns the key pair; Party1 only ever sees the public key.

use std::fmt;

use log::debug;
use num_bigint::{BigInt, BigUint, RandBigInt};
use num_integer::Integer;
use num_traits::{One, Zero};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use ark_std::cfg_iter;

use crate::config::validate_key_bits;
use crate::crypto_utils::{secure_random_int, RandomnessProvider};
use crate::curve::modular_inverse;
use crate::error::{EncodingError, ParameterError, Result};

// odd primes below 256, used to discard most candidates before Miller-Rabin
const SMALL_PRIMES: [u32; 53] = [
    3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71, 73, 79, 83, 89, 97,
    101, 103, 107, 109, 113, 127, 131, 137, 139, 149, 151, 157, 163, 167, 173, 179, 181, 191, 193,
    197, 199, 211, 223, 227, 229, 233, 239, 241, 251,
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaillierPublicKey {
    n: BigUint,
    g: BigUint,
    n_squared: BigUint,
}

#[derive(Clone, PartialEq, Eq)]
pub struct PaillierPrivateKey {
    lambda: BigUint,
    mu: BigUint,
    n: BigUint,
    n_squared: BigUint,
}

impl fmt::Debug for PaillierPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaillierPrivateKey")
            .field("n", &self.n)
            .finish_non_exhaustive()
    }
}

/// An element of `Z_(n^2)`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Ciphertext(BigUint);

impl Ciphertext {
    /// Wraps a raw value. Nothing is checked; use [`Ciphertext::from_bytes`]
    /// for data that crossed a trust boundary.
    pub fn new(value: BigUint) -> Self {
        Ciphertext(value)
    }

    pub fn value(&self) -> &BigUint {
        &self.0
    }

    /// Fixed-width big-endian encoding, `ceil(bits(n^2) / 8)` bytes.
    pub fn to_bytes(&self, public_key: &PaillierPublicKey) -> Vec<u8> {
        let width = public_key.ciphertext_len();
        let digits = self.0.to_bytes_be();
        let mut out = vec![0u8; width.saturating_sub(digits.len())];
        out.extend_from_slice(&digits);
        out
    }

    pub fn from_bytes(bytes: &[u8], public_key: &PaillierPublicKey) -> Result<Self> {
        let width = public_key.ciphertext_len();
        if bytes.len() != width {
            return Err(EncodingError::InvalidLength { expected: width, actual: bytes.len() }.into());
        }
        let value = BigUint::from_bytes_be(bytes);
        if value >= public_key.n_squared {
            return Err(EncodingError::CiphertextOutOfRange.into());
        }
        Ok(Ciphertext(value))
    }
}

/// Generates a fresh key pair with an `bits`-bit modulus.
///
/// # Arguments
///
/// * `bits` - Bit length of n. Must be even and at least 256
/// * `miller_rabin_rounds` - Witnesses tested per prime candidate
/// * `rng` - Randomness provider for prime sampling
///
/// # Outputs
///
/// * `(public_key, private_key)` - With `g = n + 1`, `lambda = lcm(p-1, q-1)`
///   and `mu = L(g^lambda mod n^2)^-1 mod n`
pub fn generate_keypair<R: RandomnessProvider + ?Sized>(
    bits: usize,
    miller_rabin_rounds: usize,
    rng: &mut R,
) -> Result<(PaillierPublicKey, PaillierPrivateKey)> {
    validate_key_bits(bits)?;
    if miller_rabin_rounds == 0 {
        return Err(ParameterError::InvalidMillerRabinRounds.into());
    }

    let p = generate_prime(bits / 2, miller_rabin_rounds, rng);
    let mut q = generate_prime(bits / 2, miller_rabin_rounds, rng);
    while q == p {
        q = generate_prime(bits / 2, miller_rabin_rounds, rng);
    }

    let one = BigUint::one();
    let n = &p * &q;
    let n_squared = &n * &n;
    let lambda = (&p - &one).lcm(&(&q - &one));
    let g = &n + &one;

    let l_of_g = l_function(&g.modpow(&lambda, &n_squared), &n, &n_squared);
    let mu = modular_inverse(&l_of_g, &n)?;

    debug!("generated {}-bit paillier modulus", n.bits());

    let public_key = PaillierPublicKey { n: n.clone(), g, n_squared: n_squared.clone() };
    let private_key = PaillierPrivateKey { lambda, mu, n, n_squared };
    Ok((public_key, private_key))
}

/// `L(x) = (x - 1) / n`. Wraps instead of underflowing on `x = 0`, which
/// only a malformed ciphertext can produce.
fn l_function(x: &BigUint, n: &BigUint, n_squared: &BigUint) -> BigUint {
    ((x + n_squared - 1u32) % n_squared) / n
}

/// Random prime with exactly `bits` bits. The two top bits are set so the
/// product of two such primes has exactly `2 * bits` bits.
fn generate_prime<R: RandomnessProvider + ?Sized>(bits: usize, rounds: usize, rng: &mut R) -> BigUint {
    let one = BigUint::one();
    loop {
        let mut candidate = secure_random_int(rng, bits as u64);
        candidate |= &one << (bits - 1);
        candidate |= &one << (bits - 2);
        candidate |= &one;

        if is_probable_prime(&candidate, rounds, rng) {
            return candidate;
        }
    }
}

/// Miller-Rabin with `rounds` random witnesses, after trial division.
pub fn is_probable_prime<R: RandomnessProvider + ?Sized>(n: &BigUint, rounds: usize, rng: &mut R) -> bool {
    let two = BigUint::from(2u32);
    if n < &two {
        return false;
    }
    if n.is_even() {
        return n == &two;
    }
    for small in SMALL_PRIMES {
        let small = BigUint::from(small);
        if n == &small {
            return true;
        }
        if (n % &small).is_zero() {
            return false;
        }
    }

    // n - 1 = d * 2^s
    let n_minus_one = n - 1u32;
    let s = n_minus_one.trailing_zeros().unwrap_or(0);
    let d = &n_minus_one >> s;

    'witness: for _ in 0..rounds {
        let a = rng.gen_biguint_range(&two, &n_minus_one);
        let mut x = a.modpow(&d, n);
        if x.is_one() || x == n_minus_one {
            continue;
        }
        for _ in 1..s {
            x = x.modpow(&two, n);
            if x == n_minus_one {
                continue 'witness;
            }
        }
        return false;
    }

    true
}

impl PaillierPublicKey {
    pub fn n(&self) -> &BigUint {
        &self.n
    }

    pub fn g(&self) -> &BigUint {
        &self.g
    }

    pub fn n_squared(&self) -> &BigUint {
        &self.n_squared
    }

    pub fn ciphertext_len(&self) -> usize {
        ((self.n_squared.bits() + 7) / 8) as usize
    }

    /// Length-prefixed big-endian n. `g = n + 1` is implied.
    pub fn to_bytes(&self) -> Vec<u8> {
        let digits = self.n.to_bytes_be();
        let mut out = Vec::with_capacity(4 + digits.len());
        out.extend_from_slice(&(digits.len() as u32).to_be_bytes());
        out.extend_from_slice(&digits);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 4 {
            return Err(EncodingError::UnexpectedEof.into());
        }
        let (prefix, digits) = bytes.split_at(4);
        let len = u32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
        if digits.len() != len {
            return Err(EncodingError::InvalidLength { expected: len, actual: digits.len() }.into());
        }

        let n = BigUint::from_bytes_be(digits);
        let bits = n.bits() as usize;
        if bits < 256 || n.is_even() {
            return Err(ParameterError::InvalidKeySize { bits }.into());
        }
        Ok(PaillierPublicKey::from_modulus(n))
    }

    fn from_modulus(n: BigUint) -> Self {
        let g = &n + 1u32;
        let n_squared = &n * &n;
        PaillierPublicKey { n, g, n_squared }
    }

    /// Uniform `r` in `[1, n)` with `gcd(r, n) = 1`.
    pub fn sample_nonce<R: RandomnessProvider + ?Sized>(&self, rng: &mut R) -> BigUint {
        let one = BigUint::one();
        loop {
            let r = rng.gen_biguint_range(&one, &self.n);
            if r.gcd(&self.n).is_one() {
                return r;
            }
        }
    }

    /// `g^m * r^n mod n^2`, with `m` reduced mod n first.
    pub fn encrypt<R: RandomnessProvider + ?Sized>(&self, plaintext: &BigUint, rng: &mut R) -> Ciphertext {
        let nonce = self.sample_nonce(rng);
        self.encrypt_with_nonce(plaintext, &nonce)
    }

    pub(crate) fn encrypt_with_nonce(&self, plaintext: &BigUint, nonce: &BigUint) -> Ciphertext {
        let m = plaintext % &self.n;
        let g_m = self.g.modpow(&m, &self.n_squared);
        let r_n = nonce.modpow(&self.n, &self.n_squared);
        Ciphertext((g_m * r_n) % &self.n_squared)
    }

    /// Encrypts `t mod n`, so negative values wrap to the top half of `Z_n`.
    pub fn encrypt_signed<R: RandomnessProvider + ?Sized>(&self, value: i64, rng: &mut R) -> Ciphertext {
        let nonce = self.sample_nonce(rng);
        self.encrypt_signed_with_nonce(value, &nonce)
    }

    pub(crate) fn encrypt_signed_with_nonce(&self, value: i64, nonce: &BigUint) -> Ciphertext {
        let modulus = BigInt::from(self.n.clone());
        let reduced = BigInt::from(value).mod_floor(&modulus);
        self.encrypt_with_nonce(reduced.magnitude(), nonce)
    }

    /// Encrypts every plaintext under its own fresh nonce.
    pub fn batch_encrypt<R: RandomnessProvider + ?Sized>(&self, plaintexts: &[BigUint], rng: &mut R) -> Vec<Ciphertext> {
        let nonces: Vec<BigUint> = plaintexts.iter().map(|_| self.sample_nonce(rng)).collect();
        cfg_iter!(plaintexts)
            .zip(nonces)
            .map(|(m, r)| self.encrypt_with_nonce(m, &r))
            .collect()
    }

    /// `c1 * c2 mod n^2`, an encryption of `m1 + m2 mod n`.
    pub fn add_ciphertexts(&self, c1: &Ciphertext, c2: &Ciphertext) -> Ciphertext {
        Ciphertext((&c1.0 * &c2.0) % &self.n_squared)
    }

    /// `c^k mod n^2`, an encryption of `k * m mod n`.
    pub fn multiply_by_scalar(&self, ciphertext: &Ciphertext, scalar: &BigUint) -> Ciphertext {
        Ciphertext(ciphertext.0.modpow(scalar, &self.n_squared))
    }

    /// Multiplies by a fresh `r^n`. The plaintext is unchanged but the result
    /// cannot be linked to the input ciphertext.
    pub fn refresh_ciphertext<R: RandomnessProvider + ?Sized>(&self, ciphertext: &Ciphertext, rng: &mut R) -> Ciphertext {
        let nonce = self.sample_nonce(rng);
        let r_n = nonce.modpow(&self.n, &self.n_squared);
        Ciphertext((&ciphertext.0 * r_n) % &self.n_squared)
    }

    /// Homomorphic sum. An empty list gives a fresh `Enc(0)`.
    pub fn sum_ciphertexts<R: RandomnessProvider + ?Sized>(&self, ciphertexts: &[Ciphertext], rng: &mut R) -> Ciphertext {
        match ciphertexts.split_first() {
            None => self.encrypt(&BigUint::zero(), rng),
            Some((first, rest)) => rest
                .iter()
                .fold(first.clone(), |acc, c| self.add_ciphertexts(&acc, c)),
        }
    }
}

impl PaillierPrivateKey {
    pub fn n(&self) -> &BigUint {
        &self.n
    }

    /// `L(c^lambda mod n^2) * mu mod n`.
    ///
    /// Never fails: a ciphertext that was not produced under the matching
    /// public key decrypts to a meaningless value rather than an error.
    pub fn decrypt(&self, ciphertext: &Ciphertext) -> BigUint {
        let c_lambda = ciphertext.0.modpow(&self.lambda, &self.n_squared);
        let l = l_function(&c_lambda, &self.n, &self.n_squared);
        (l * &self.mu) % &self.n
    }

    /// Like [`decrypt`](Self::decrypt), reading values above `n / 2` as negative.
    pub fn decrypt_signed(&self, ciphertext: &Ciphertext) -> BigInt {
        let m = self.decrypt(ciphertext);
        if &m << 1 > self.n {
            BigInt::from(m) - BigInt::from(self.n.clone())
        } else {
            BigInt::from(m)
        }
    }
}
