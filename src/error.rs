use thiserror::Error;

#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("invalid parameter: {0}")]
    Parameter(#[from] ParameterError),
    #[error("arithmetic invariant violated: {0}")]
    Arithmetic(#[from] ArithmeticError),
    #[error("protocol state error: {0}")]
    ProtocolState(#[from] ProtocolStateError),
    #[error("malformed encoding: {0}")]
    Encoding(#[from] EncodingError),
    #[error("could not map identifier to a curve point after {attempts} attempts")]
    HashToCurveExhausted { attempts: u32 },
}

#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum ParameterError {
    #[error("paillier modulus must be an even number of at least 256 bits, got {bits}")]
    InvalidKeySize { bits: usize },
    #[error("at least one miller-rabin round is required")]
    InvalidMillerRabinRounds,
    #[error("at least one hash-to-curve attempt is required")]
    InvalidHashToCurveAttempts,
    #[error("the generator does not satisfy the curve equation")]
    GeneratorNotOnCurve,
    #[error("identifier at position {index} of the value set occurs more than once")]
    DuplicateIdentifier { index: usize },
}

/// These should be unreachable with valid parameters. Seeing one means a bug.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum ArithmeticError {
    #[error("element has no inverse modulo the given modulus")]
    NotInvertible,
    #[error("modulus must be non-zero")]
    ZeroModulus,
}

#[derive(Error, Clone, Debug, PartialEq, Eq)]
#[error("{role} cannot run `{operation}` while in state {state}")]
pub struct ProtocolStateError {
    pub role: &'static str,
    pub operation: &'static str,
    pub state: &'static str,
}

#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum EncodingError {
    #[error("expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("unknown point tag {0:#04x}")]
    InvalidTag(u8),
    #[error("coordinate is not reduced modulo the field prime")]
    NonCanonicalCoordinate,
    #[error("decoded point is not on the curve")]
    PointNotOnCurve,
    #[error("ciphertext is not in Z_(n^2)")]
    CiphertextOutOfRange,
    #[error("{0} unexpected trailing bytes")]
    TrailingBytes(usize),
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("{0} items do not fit the 32-bit count field")]
    TooManyItems(usize),
    #[error("count {0} does not fit in usize on this platform")]
    CountOverflow(u64),
    #[error("expected `O` or `(x, y)` with hexadecimal coordinates")]
    InvalidPointString,
}

pub type Result<T> = std::result::Result<T, Error>;
