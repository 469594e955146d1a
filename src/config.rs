use crate::error::{ParameterError, Result};

/// Bit length of the Paillier modulus n.
pub const DEFAULT_PAILLIER_KEY_BITS: usize = 1024;

/// Miller-Rabin rounds per prime candidate. A composite survives with
/// probability at most 4^-20. Lowering this weakens key generation.
pub const MILLER_RABIN_ROUNDS: usize = 20;

/// Try-and-increment bound for hash-to-curve. Each attempt succeeds with
/// probability about 1/2, so exhausting 256 attempts does not happen in practice.
pub const HASH_TO_CURVE_MAX_ATTEMPTS: u32 = 256;

const MIN_PAILLIER_KEY_BITS: usize = 256;

/// Tunable security parameters of one protocol session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProtocolConfig {
    pub paillier_key_bits: usize,
    pub miller_rabin_rounds: usize,
    pub hash_to_curve_attempts: u32,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        ProtocolConfig {
            paillier_key_bits: DEFAULT_PAILLIER_KEY_BITS,
            miller_rabin_rounds: MILLER_RABIN_ROUNDS,
            hash_to_curve_attempts: HASH_TO_CURVE_MAX_ATTEMPTS,
        }
    }
}

impl ProtocolConfig {
    pub fn with_paillier_key_bits(mut self, bits: usize) -> Self {
        self.paillier_key_bits = bits;
        self
    }

    pub fn with_miller_rabin_rounds(mut self, rounds: usize) -> Self {
        self.miller_rabin_rounds = rounds;
        self
    }

    pub fn with_hash_to_curve_attempts(mut self, attempts: u32) -> Self {
        self.hash_to_curve_attempts = attempts;
        self
    }

    /// Rejects parameters that would make key generation or hashing unsound.
    pub fn validate(&self) -> Result<()> {
        validate_key_bits(self.paillier_key_bits)?;
        if self.miller_rabin_rounds == 0 {
            return Err(ParameterError::InvalidMillerRabinRounds.into());
        }
        if self.hash_to_curve_attempts == 0 {
            return Err(ParameterError::InvalidHashToCurveAttempts.into());
        }
        Ok(())
    }
}

pub(crate) fn validate_key_bits(bits: usize) -> Result<()> {
    if bits < MIN_PAILLIER_KEY_BITS || bits % 2 != 0 {
        return Err(ParameterError::InvalidKeySize { bits }.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn default_config_is_valid() {
        assert!(ProtocolConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_bad_parameters() {
        let odd = ProtocolConfig::default().with_paillier_key_bits(1023);
        assert_eq!(
            odd.validate(),
            Err(Error::Parameter(ParameterError::InvalidKeySize { bits: 1023 }))
        );

        let small = ProtocolConfig::default().with_paillier_key_bits(128);
        assert!(small.validate().is_err());

        let no_rounds = ProtocolConfig::default().with_miller_rabin_rounds(0);
        assert_eq!(
            no_rounds.validate(),
            Err(Error::Parameter(ParameterError::InvalidMillerRabinRounds))
        );

        let no_attempts = ProtocolConfig::default().with_hash_to_curve_attempts(0);
        assert!(no_attempts.validate().is_err());
    }
}
