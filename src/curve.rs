//! Affine arithmetic on the NIST P-256 curve `y^2 = x^3 + ax + b (mod p)`.
//!
//! Coordinates live in the base field `Fq` and scalars in the prime-order
//! field `Fr`, both declared with arkworks' `MontConfig`. The group law is
//! written out by hand so the masking primitive of the protocol stays small
//! and auditable.

use std::fmt;
use std::str::FromStr;

use ark_ff::{
    fields::{Field, Fp256, MontBackend, MontConfig},
    BigInteger, MontFp, PrimeField, UniformRand, Zero,
};
use num_bigint::{BigInt, BigUint};
use num_integer::Integer;
use num_traits::One;
use rand::Rng;

use crate::error::{ArithmeticError, EncodingError, Error, ParameterError, Result};

// p = 2^256 - 2^224 + 2^192 + 2^96 - 1
// 6 generates the multiplicative group of F_p
#[derive(MontConfig)]
#[modulus = "115792089210356248762697446949407573530086143415290314195533631308867097853951"]
#[generator = "6"]
pub struct FqConfig;
pub type Fq = Fp256<MontBackend<FqConfig, 4>>;

// n, the order of the base point
#[derive(MontConfig)]
#[modulus = "115792089210356248762697446949407573529996955224135760342422259061068512044369"]
#[generator = "7"]
pub struct FrConfig;
pub type Fr = Fp256<MontBackend<FrConfig, 4>>;

/// Secret exponents `k1`, `k2`. Always reduced mod n.
pub type Scalar = Fr;

/// Length of an encoded affine point: tag byte plus two 32-byte coordinates.
pub const ENCODED_POINT_LEN: usize = 65;
pub const AFFINE_TAG: u8 = 0x04;
pub const IDENTITY_TAG: u8 = 0x00;

const COORDINATE_LEN: usize = 32;

/// A point on the curve, or the point at infinity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CurvePoint {
    Identity,
    Affine { x: Fq, y: Fq },
}

impl CurvePoint {
    pub const fn new_unchecked(x: Fq, y: Fq) -> Self {
        CurvePoint::Affine { x, y }
    }

    pub fn is_identity(&self) -> bool {
        matches!(self, CurvePoint::Identity)
    }

    pub fn x(&self) -> Option<Fq> {
        match self {
            CurvePoint::Identity => None,
            CurvePoint::Affine { x, .. } => Some(*x),
        }
    }

    pub fn y(&self) -> Option<Fq> {
        match self {
            CurvePoint::Identity => None,
            CurvePoint::Affine { y, .. } => Some(*y),
        }
    }

    /// Uncompressed SEC1-style encoding: `0x04 || x || y`, big-endian.
    /// The identity is the single byte `0x00`.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            CurvePoint::Identity => vec![IDENTITY_TAG],
            CurvePoint::Affine { x, y } => {
                let mut out = Vec::with_capacity(ENCODED_POINT_LEN);
                out.push(AFFINE_TAG);
                out.extend_from_slice(&x.into_bigint().to_bytes_be());
                out.extend_from_slice(&y.into_bigint().to_bytes_be());
                out
            }
        }
    }

    /// Inverse of [`CurvePoint::to_bytes`]. Rejects unreduced coordinates
    /// and points that are not on P-256.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let tag = *bytes.first().ok_or(EncodingError::UnexpectedEof)?;
        let point = match tag {
            IDENTITY_TAG => {
                if bytes.len() != 1 {
                    return Err(EncodingError::InvalidLength { expected: 1, actual: bytes.len() }.into());
                }
                CurvePoint::Identity
            }
            AFFINE_TAG => {
                if bytes.len() != ENCODED_POINT_LEN {
                    return Err(EncodingError::InvalidLength {
                        expected: ENCODED_POINT_LEN,
                        actual: bytes.len(),
                    }
                    .into());
                }
                let x = canonical_coordinate(&bytes[1..1 + COORDINATE_LEN])?;
                let y = canonical_coordinate(&bytes[1 + COORDINATE_LEN..])?;
                CurvePoint::Affine { x, y }
            }
            other => return Err(EncodingError::InvalidTag(other).into()),
        };

        if !CurveParams::P256.satisfies(&point) {
            return Err(EncodingError::PointNotOnCurve.into());
        }
        Ok(point)
    }
}

fn canonical_coordinate(bytes: &[u8]) -> Result<Fq> {
    let value = Fq::from_be_bytes_mod_order(bytes);
    if value.into_bigint().to_bytes_be() != bytes {
        return Err(EncodingError::NonCanonicalCoordinate.into());
    }
    Ok(value)
}

fn to_biguint(value: &Fq) -> BigUint {
    value.into_bigint().into()
}

impl fmt::Display for CurvePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CurvePoint::Identity => write!(f, "O"),
            CurvePoint::Affine { x, y } => {
                write!(f, "({:064x}, {:064x})", to_biguint(x), to_biguint(y))
            }
        }
    }
}

impl FromStr for CurvePoint {
    type Err = Error;

    /// Parses the `Display` form back. Only points on P-256 are accepted.
    fn from_str(s: &str) -> Result<Self> {
        if s == "O" {
            return Ok(CurvePoint::Identity);
        }
        let inner = s
            .strip_prefix('(')
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or(EncodingError::InvalidPointString)?;
        let (x_hex, y_hex) = inner
            .split_once(", ")
            .ok_or(EncodingError::InvalidPointString)?;

        let modulus = CurveParams::P256.modulus();
        let parse = |hex: &str| -> Result<Fq> {
            let value = BigUint::parse_bytes(hex.as_bytes(), 16)
                .ok_or(EncodingError::InvalidPointString)?;
            if value >= modulus {
                return Err(EncodingError::NonCanonicalCoordinate.into());
            }
            Ok(Fq::from(value))
        };

        let point = CurvePoint::Affine { x: parse(x_hex)?, y: parse(y_hex)? };
        if !CurveParams::P256.satisfies(&point) {
            return Err(EncodingError::PointNotOnCurve.into());
        }
        Ok(point)
    }
}

/// Short Weierstrass parameters. The field prime p and the group order n
/// are fixed by the `Fq` and `Fr` types.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CurveParams {
    pub a: Fq,
    pub b: Fq,
    pub generator: CurvePoint,
}

impl CurveParams {
    /// secp256r1 / prime256v1.
    pub const P256: CurveParams = CurveParams {
        // -3
        a: MontFp!("115792089210356248762697446949407573530086143415290314195533631308867097853948"),
        b: MontFp!("41058363725152142129326129780047268409114441015993725554835256314039467401291"),
        generator: CurvePoint::new_unchecked(
            MontFp!("48439561293906451759052585252797914202762949526041747995844080717082404635286"),
            MontFp!("36134250956749795798585127919587881956611106672985015071877198253568414405109"),
        ),
    };

    pub fn modulus(&self) -> BigUint {
        Fq::MODULUS.into()
    }

    pub fn order(&self) -> BigUint {
        Fr::MODULUS.into()
    }

    /// Right-hand side of the curve equation, `x^3 + ax + b`.
    pub fn rhs(&self, x: &Fq) -> Fq {
        x.square() * x + self.a * x + self.b
    }

    pub fn satisfies(&self, point: &CurvePoint) -> bool {
        match point {
            CurvePoint::Identity => true,
            CurvePoint::Affine { x, y } => y.square() == self.rhs(x),
        }
    }
}

/// The masking group. All operations are pure functions of their inputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EllipticCurveGroup {
    params: CurveParams,
}

impl Default for EllipticCurveGroup {
    fn default() -> Self {
        EllipticCurveGroup { params: CurveParams::P256 }
    }
}

impl EllipticCurveGroup {
    pub fn new(params: CurveParams) -> Result<Self> {
        if params.generator.is_identity() || !params.satisfies(&params.generator) {
            return Err(ParameterError::GeneratorNotOnCurve.into());
        }
        Ok(EllipticCurveGroup { params })
    }

    pub fn params(&self) -> &CurveParams {
        &self.params
    }

    pub fn generator(&self) -> CurvePoint {
        self.params.generator
    }

    pub fn is_on_curve(&self, point: &CurvePoint) -> bool {
        self.params.satisfies(point)
    }

    pub fn negate(&self, point: &CurvePoint) -> CurvePoint {
        match point {
            CurvePoint::Identity => CurvePoint::Identity,
            CurvePoint::Affine { x, y } => CurvePoint::Affine { x: *x, y: -*y },
        }
    }

    /// Affine chord rule. Handles the identity on either side and `P + (-P)`.
    pub fn point_add(&self, p: &CurvePoint, q: &CurvePoint) -> Result<CurvePoint> {
        let (x1, y1, x2, y2) = match (p, q) {
            (CurvePoint::Identity, _) => return Ok(*q),
            (_, CurvePoint::Identity) => return Ok(*p),
            (CurvePoint::Affine { x: x1, y: y1 }, CurvePoint::Affine { x: x2, y: y2 }) => {
                (*x1, *y1, *x2, *y2)
            }
        };

        if x1 == x2 {
            if y1 == y2 {
                return self.point_double(p);
            }
            return Ok(CurvePoint::Identity);
        }

        // lambda = (y2 - y1) / (x2 - x1)
        let dx_inv = (x2 - x1).inverse().ok_or(ArithmeticError::NotInvertible)?;
        let lambda = (y2 - y1) * dx_inv;

        let x3 = lambda.square() - x1 - x2;
        let y3 = lambda * (x1 - x3) - y1;
        Ok(CurvePoint::Affine { x: x3, y: y3 })
    }

    /// Tangent rule. A vertical tangent (y = 0) gives the identity.
    pub fn point_double(&self, p: &CurvePoint) -> Result<CurvePoint> {
        let (x, y) = match p {
            CurvePoint::Identity => return Ok(CurvePoint::Identity),
            CurvePoint::Affine { x, y } => (*x, *y),
        };
        if y.is_zero() {
            return Ok(CurvePoint::Identity);
        }

        // lambda = (3x^2 + a) / 2y
        let numerator = x.square() * Fq::from(3u64) + self.params.a;
        let denominator_inv = y.double().inverse().ok_or(ArithmeticError::NotInvertible)?;
        let lambda = numerator * denominator_inv;

        let x3 = lambda.square() - x.double();
        let y3 = lambda * (x - x3) - y;
        Ok(CurvePoint::Affine { x: x3, y: y3 })
    }

    /// Right-to-left double-and-add. `k` is already reduced mod n, so
    /// `k = 0` and `P = O` both give the identity.
    pub fn scalar_multiply(&self, k: &Scalar, p: &CurvePoint) -> Result<CurvePoint> {
        if p.is_identity() {
            return Ok(CurvePoint::Identity);
        }

        let bits = k.into_bigint();
        let num_bits = bits.num_bits() as usize;

        let mut result = CurvePoint::Identity;
        let mut addend = *p;
        for i in 0..num_bits {
            if bits.get_bit(i) {
                result = self.point_add(&result, &addend)?;
            }
            if i + 1 < num_bits {
                addend = self.point_double(&addend)?;
            }
        }

        Ok(result)
    }

    /// Uniform secret in `[1, n-1]`.
    pub fn generate_private_scalar<R: Rng + ?Sized>(&self, rng: &mut R) -> Scalar {
        loop {
            let k = Scalar::rand(rng);
            if !k.is_zero() {
                return k;
            }
        }
    }

    /// `k * G`.
    pub fn public_point(&self, k: &Scalar) -> Result<CurvePoint> {
        self.scalar_multiply(k, &self.params.generator)
    }
}

/// `a^-1 mod m` by the extended Euclidean algorithm.
///
/// A missing inverse is reported as [`ArithmeticError::NotInvertible`]; with
/// valid protocol parameters that never happens.
pub fn modular_inverse(a: &BigUint, m: &BigUint) -> Result<BigUint> {
    if m.is_zero() {
        return Err(ArithmeticError::ZeroModulus.into());
    }

    let m_signed = BigInt::from(m.clone());
    let egcd = BigInt::from(a % m).extended_gcd(&m_signed);
    if !egcd.gcd.is_one() {
        return Err(ArithmeticError::NotInvertible.into());
    }

    // the representative is non-negative after mod_floor
    Ok(egcd.x.mod_floor(&m_signed).magnitude().clone())
}
