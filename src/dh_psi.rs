//! Private intersection-sum from DDH and Paillier encryption.
//!
//! Party1 holds a set of identifiers V. Party2 holds identifier/value pairs W
//! and the Paillier key pair. Both learn the intersection size; Party2 also
//! learns the sum of values attached to intersecting identifiers. Nothing else
//! about either set is revealed in the semi-honest model.
//!
//! The protocol starts with Party2 running `setup` and publishing its Paillier
//! public key. Party1 runs `round1_prepare_data` and sends the output to Party2,
//! which answers with `round2_process_and_respond`. Party1 stores that answer
//! with `round2_receive`, computes the intersection with
//! `round3_compute_intersection` and sends the result back. Finally Party2
//! runs `round3_decrypt_result` to learn the sum.
//!
//! Correctness comes from `(H(x)^k1)^k2 = (H(x)^k2)^k1`. Privacy of the
//! non-matching items comes from DDH: `H(w)^(k1*k2)` for `w` outside V looks
//! random to Party1.

use std::collections::{HashMap, HashSet};

use log::{debug, info};
use num_bigint::BigInt;
use rand::seq::SliceRandom;
use rand::thread_rng;
use zeroize::Zeroize;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use ark_std::cfg_iter;

use crate::config::ProtocolConfig;
use crate::crypto_utils::{hash_to_curve, RandomnessProvider};
use crate::curve::{CurvePoint, EllipticCurveGroup, Scalar};
use crate::error::{ParameterError, ProtocolStateError, Result};
use crate::messages::{MaskedValue, Round1Message, Round2Message, Round3Message};
use crate::paillier::{generate_keypair, Ciphertext, PaillierPrivateKey, PaillierPublicKey};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Party1State {
    Init,
    Round1Sent,
    Round2Received,
    Round3Computed,
    Aborted,
}

impl Party1State {
    fn name(&self) -> &'static str {
        match self {
            Party1State::Init => "Init",
            Party1State::Round1Sent => "Round1Sent",
            Party1State::Round2Received => "Round2Received",
            Party1State::Round3Computed => "Round3Computed",
            Party1State::Aborted => "Aborted",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Party2State {
    Init,
    Setup,
    Round2Sent,
    Terminal,
    Aborted,
}

impl Party2State {
    fn name(&self) -> &'static str {
        match self {
            Party2State::Init => "Init",
            Party2State::Setup => "Setup",
            Party2State::Round2Sent => "Round2Sent",
            Party2State::Terminal => "Terminal",
            Party2State::Aborted => "Aborted",
        }
    }
}

/// The party holding plain identifiers.
pub struct Party1 {
    group: EllipticCurveGroup,
    config: ProtocolConfig,
    state: Party1State,
    // k1
    private_scalar: Option<Scalar>,
    received: Option<Round2Message>,
}

impl Party1 {
    pub fn new(config: ProtocolConfig) -> Result<Self> {
        config.validate()?;
        Ok(Party1 {
            group: EllipticCurveGroup::default(),
            config,
            state: Party1State::Init,
            private_scalar: None,
            received: None,
        })
    }

    pub fn state(&self) -> Party1State {
        self.state
    }

    /// Called by Party1 to start the protocol.
    ///
    /// # Arguments
    ///
    /// * `set_v` - Party1's private set of identifiers
    /// * `rng` - Randomness for k1 and the shuffle
    ///
    /// # Outputs
    ///
    /// * `Round1Message` - `H(v)^k1` for every `v`, in random order
    pub fn round1_prepare_data<S, R>(&mut self, set_v: &[S], rng: &mut R) -> Result<Round1Message>
    where
        S: AsRef<str> + Sync,
        R: RandomnessProvider + ?Sized,
    {
        self.expect_state(Party1State::Init, "round1_prepare_data")?;
        let result = self.mask_own_set(set_v, rng);
        self.fail_closed(result)
    }

    fn mask_own_set<S, R>(&mut self, set_v: &[S], rng: &mut R) -> Result<Round1Message>
    where
        S: AsRef<str> + Sync,
        R: RandomnessProvider + ?Sized,
    {
        // k1 <-- [1, n-1]
        let k1 = self.group.generate_private_scalar(rng);
        self.private_scalar = Some(k1);

        let group = &self.group;
        let attempts = self.config.hash_to_curve_attempts;
        let mut masked_points = cfg_iter!(set_v)
            .map(|v| -> Result<CurvePoint> {
                let point = hash_to_curve(group, v.as_ref(), attempts)?;
                group.scalar_multiply(&k1, &point)
            })
            .collect::<Result<Vec<CurvePoint>>>()?;

        // the output order must not depend on the input order
        // https://rust-random.github.io/rand/rand/seq/trait.SliceRandom.html#example-4
        masked_points.shuffle(rng);

        self.state = Party1State::Round1Sent;
        debug!("party1: masked {} identifiers", masked_points.len());
        Ok(Round1Message { masked_points })
    }

    /// Stores Party2's answer. No computation happens here.
    pub fn round2_receive(&mut self, message: Round2Message) -> Result<()> {
        self.expect_state(Party1State::Round1Sent, "round2_receive")?;
        debug!(
            "party1: received {} doubly masked points and {} masked values",
            message.doubly_masked_points.len(),
            message.masked_values.len()
        );
        self.received = Some(message);
        self.state = Party1State::Round2Received;
        Ok(())
    }

    /// Called by Party1 after `round2_receive`.
    ///
    /// Raises every `H(w)^k2` to k1 and looks the result up in Z. Matching
    /// ciphertexts are summed homomorphically and the sum is re-randomized,
    /// so Party2 cannot tell which of its own ciphertexts went into it.
    ///
    /// # Arguments
    ///
    /// * `public_key` - Party2's Paillier public key
    /// * `rng` - Randomness for the refresh
    ///
    /// # Outputs
    ///
    /// * `Round3Message` - Match count and the refreshed `Enc(sum)`
    pub fn round3_compute_intersection<R>(&mut self, public_key: &PaillierPublicKey, rng: &mut R) -> Result<Round3Message>
    where
        R: RandomnessProvider + ?Sized,
    {
        self.expect_state(Party1State::Round2Received, "round3_compute_intersection")?;
        let result = self.intersect(public_key, rng);
        let result = self.fail_closed(result);
        if result.is_ok() {
            self.discard_secrets();
            self.state = Party1State::Round3Computed;
        }
        result
    }

    fn intersect<R>(&self, public_key: &PaillierPublicKey, rng: &mut R) -> Result<Round3Message>
    where
        R: RandomnessProvider + ?Sized,
    {
        let k1 = self.private_scalar.ok_or(ProtocolStateError {
            role: "party1",
            operation: "round3_compute_intersection",
            state: self.state.name(),
        })?;
        let received = self.received.as_ref().ok_or(ProtocolStateError {
            role: "party1",
            operation: "round3_compute_intersection",
            state: self.state.name(),
        })?;

        let set_z: HashSet<&CurvePoint> = received.doubly_masked_points.iter().collect();

        let group = &self.group;
        let unmasked = cfg_iter!(received.masked_values)
            .map(|item| group.scalar_multiply(&k1, &item.point))
            .collect::<Result<Vec<CurvePoint>>>()?;

        let matched: Vec<Ciphertext> = unmasked
            .iter()
            .zip(&received.masked_values)
            .filter(|(point, _)| set_z.contains(point))
            .map(|(_, item)| item.ciphertext.clone())
            .collect();

        let aggregate = public_key.sum_ciphertexts(&matched, rng);
        let aggregate = public_key.refresh_ciphertext(&aggregate, rng);

        debug!("party1: {} of {} masked values matched", matched.len(), unmasked.len());
        Ok(Round3Message { intersection_size: matched.len(), aggregate })
    }

    /// Drops k1 and everything received. The party cannot be resumed.
    pub fn abort(&mut self) {
        self.discard_secrets();
        self.state = Party1State::Aborted;
    }

    fn discard_secrets(&mut self) {
        if let Some(k1) = self.private_scalar.as_mut() {
            k1.zeroize();
        }
        self.private_scalar = None;
        self.received = None;
    }

    fn expect_state(&mut self, expected: Party1State, operation: &'static str) -> Result<()> {
        if self.state != expected {
            let error = ProtocolStateError { role: "party1", operation, state: self.state.name() };
            self.abort();
            return Err(error.into());
        }
        Ok(())
    }

    fn fail_closed<T>(&mut self, result: Result<T>) -> Result<T> {
        if result.is_err() {
            self.abort();
        }
        result
    }
}

impl Drop for Party1 {
    fn drop(&mut self) {
        self.discard_secrets();
    }
}

/// The party holding identifier/value pairs and the Paillier key pair.
pub struct Party2 {
    group: EllipticCurveGroup,
    config: ProtocolConfig,
    state: Party2State,
    // k2
    private_scalar: Option<Scalar>,
    public_key: Option<PaillierPublicKey>,
    private_key: Option<PaillierPrivateKey>,
}

impl Party2 {
    pub fn new(config: ProtocolConfig) -> Result<Self> {
        config.validate()?;
        Ok(Party2 {
            group: EllipticCurveGroup::default(),
            config,
            state: Party2State::Init,
            private_scalar: None,
            public_key: None,
            private_key: None,
        })
    }

    pub fn state(&self) -> Party2State {
        self.state
    }

    /// Samples k2 and a fresh Paillier key pair. Only the public key leaves.
    pub fn setup<R>(&mut self, rng: &mut R) -> Result<PaillierPublicKey>
    where
        R: RandomnessProvider + ?Sized,
    {
        self.expect_state(Party2State::Init, "setup")?;

        self.private_scalar = Some(self.group.generate_private_scalar(rng));
        let keypair = generate_keypair(self.config.paillier_key_bits, self.config.miller_rabin_rounds, rng);
        let (public_key, private_key) = self.fail_closed(keypair)?;

        self.public_key = Some(public_key.clone());
        self.private_key = Some(private_key);
        self.state = Party2State::Setup;
        debug!("party2: setup complete");
        Ok(public_key)
    }

    /// Called by Party2 after receiving the output of `round1_prepare_data`.
    ///
    /// # Arguments
    ///
    /// * `message` - Party1's masked set, `H(v)^k1`
    /// * `set_w` - Party2's private identifier/value pairs
    /// * `rng` - Randomness for encryption and the shuffles
    ///
    /// # Outputs
    ///
    /// * `Round2Message` - Z = `H(v)^(k1*k2)` shuffled, and `(H(w)^k2, Enc(t))` shuffled
    pub fn round2_process_and_respond<S, R>(
        &mut self,
        message: &Round1Message,
        set_w: &[(S, i64)],
        rng: &mut R,
    ) -> Result<Round2Message>
    where
        S: AsRef<str> + Sync,
        R: RandomnessProvider + ?Sized,
    {
        self.expect_state(Party2State::Setup, "round2_process_and_respond")?;
        let result = self.respond(message, set_w, rng);
        let result = self.fail_closed(result);
        if result.is_ok() {
            self.state = Party2State::Round2Sent;
        }
        result
    }

    fn respond<S, R>(&self, message: &Round1Message, set_w: &[(S, i64)], rng: &mut R) -> Result<Round2Message>
    where
        S: AsRef<str> + Sync,
        R: RandomnessProvider + ?Sized,
    {
        let (k2, public_key) = match (self.private_scalar, self.public_key.as_ref()) {
            (Some(k2), Some(public_key)) => (k2, public_key),
            _ => {
                return Err(ProtocolStateError {
                    role: "party2",
                    operation: "round2_process_and_respond",
                    state: self.state.name(),
                }
                .into())
            }
        };
        // W is a map from identifiers to values
        let mut seen: HashSet<&str> = HashSet::with_capacity(set_w.len());
        if let Some(index) = set_w.iter().position(|(w, _)| !seen.insert(w.as_ref())) {
            return Err(ParameterError::DuplicateIdentifier { index }.into());
        }

        let group = &self.group;
        let attempts = self.config.hash_to_curve_attempts;

        // Z = {H(v_i)^(k1*k2)}
        let mut doubly_masked_points = cfg_iter!(message.masked_points)
            .map(|point| group.scalar_multiply(&k2, point))
            .collect::<Result<Vec<CurvePoint>>>()?;
        doubly_masked_points.shuffle(rng);

        // nonces come from the provider in order, so the parallel section
        // below is deterministic for a seeded rng
        let nonces: Vec<_> = set_w.iter().map(|_| public_key.sample_nonce(rng)).collect();

        // {(H(w_j)^k2, Enc(t_j))}
        let mut masked_values = cfg_iter!(set_w)
            .zip(nonces)
            .map(|((w, t), r)| -> Result<MaskedValue> {
                let point = hash_to_curve(group, w.as_ref(), attempts)?;
                Ok(MaskedValue {
                    point: group.scalar_multiply(&k2, &point)?,
                    ciphertext: public_key.encrypt_signed_with_nonce(*t, &r),
                })
            })
            .collect::<Result<Vec<MaskedValue>>>()?;
        masked_values.shuffle(rng);

        debug!(
            "party2: answered with {} doubly masked points and {} masked values",
            doubly_masked_points.len(),
            masked_values.len()
        );
        Ok(Round2Message { doubly_masked_points, masked_values })
    }

    /// Decrypts the aggregate from Party1 and ends the session.
    ///
    /// The ciphertext is trusted to be a refreshed homomorphic sum; a
    /// malformed one decrypts to a meaningless value, it is not detected.
    pub fn round3_decrypt_result(&mut self, message: &Round3Message) -> Result<BigInt> {
        self.expect_state(Party2State::Round2Sent, "round3_decrypt_result")?;
        let sum = match self.private_key.as_ref() {
            Some(private_key) => private_key.decrypt_signed(&message.aggregate),
            None => {
                let error = ProtocolStateError {
                    role: "party2",
                    operation: "round3_decrypt_result",
                    state: self.state.name(),
                };
                self.abort();
                return Err(error.into());
            }
        };

        self.discard_secrets();
        self.state = Party2State::Terminal;
        debug!("party2: decrypted aggregate over {} matches", message.intersection_size);
        Ok(sum)
    }

    /// Drops k2 and the Paillier private key. The party cannot be resumed.
    pub fn abort(&mut self) {
        self.discard_secrets();
        self.state = Party2State::Aborted;
    }

    fn discard_secrets(&mut self) {
        if let Some(k2) = self.private_scalar.as_mut() {
            k2.zeroize();
        }
        self.private_scalar = None;
        self.private_key = None;
    }

    fn expect_state(&mut self, expected: Party2State, operation: &'static str) -> Result<()> {
        if self.state != expected {
            let error = ProtocolStateError { role: "party2", operation, state: self.state.name() };
            self.abort();
            return Err(error.into());
        }
        Ok(())
    }

    fn fail_closed<T>(&mut self, result: Result<T>) -> Result<T> {
        if result.is_err() {
            self.abort();
        }
        result
    }
}

impl Drop for Party2 {
    fn drop(&mut self) {
        self.discard_secrets();
    }
}

/// What both parties end up knowing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProtocolOutput {
    pub intersection_size: usize,
    pub intersection_sum: BigInt,
}

/// Runs one full session with the default parameters and the thread-local CSPRNG.
pub fn run_protocol<S1, S2>(set_v: &[S1], set_w: &[(S2, i64)]) -> Result<ProtocolOutput>
where
    S1: AsRef<str> + Sync,
    S2: AsRef<str> + Sync,
{
    run_protocol_with(&ProtocolConfig::default(), set_v, set_w, &mut thread_rng())
}

/// Runs setup, round 1, round 2 and round 3 in order. Any error ends the
/// session; both parties are dropped and their secrets discarded.
///
/// # Arguments
///
/// * `config` - Security parameters for this session
/// * `set_v` - Party1's identifiers
/// * `set_w` - Party2's identifier/value pairs
/// * `rng` - Randomness provider shared by both simulated parties
///
/// # Outputs
///
/// * `ProtocolOutput` - Intersection size and the sum of intersecting values
pub fn run_protocol_with<S1, S2, R>(
    config: &ProtocolConfig,
    set_v: &[S1],
    set_w: &[(S2, i64)],
    rng: &mut R,
) -> Result<ProtocolOutput>
where
    S1: AsRef<str> + Sync,
    S2: AsRef<str> + Sync,
    R: RandomnessProvider + ?Sized,
{
    info!("starting psi-sum session: |V| = {}, |W| = {}", set_v.len(), set_w.len());

    let mut party1 = Party1::new(*config)?;
    let mut party2 = Party2::new(*config)?;

    let public_key = party2.setup(rng)?;

    /* party1 sends its masked set to party2 */
    let round1 = party1.round1_prepare_data(set_v, rng)?;

    /* party2 sends Z and its masked pairs to party1 */
    let round2 = party2.round2_process_and_respond(&round1, set_w, rng)?;
    party1.round2_receive(round2)?;

    /* party1 sends the count and the encrypted sum to party2 */
    let round3 = party1.round3_compute_intersection(&public_key, rng)?;
    let intersection_sum = party2.round3_decrypt_result(&round3)?;

    info!("psi-sum session finished");
    Ok(ProtocolOutput { intersection_size: round3.intersection_size, intersection_sum })
}

/// Computes the same output in the clear. Only for checking the protocol.
///
/// W is read as a map: a repeated identifier keeps its last value, so the
/// result is `(|V ∩ keys(W)|, sum)`. The protocol itself refuses such a W
/// in `round2_process_and_respond`. Duplicates in V collapse.
pub fn plaintext_intersection_sum<S1, S2>(set_v: &[S1], set_w: &[(S2, i64)]) -> ProtocolOutput
where
    S1: AsRef<str>,
    S2: AsRef<str>,
{
    let set_v: HashSet<&str> = set_v.iter().map(|v| v.as_ref()).collect();
    let map_w: HashMap<&str, i64> = set_w.iter().map(|(w, t)| (w.as_ref(), *t)).collect();
    let matched: Vec<i64> = map_w
        .iter()
        .filter(|(w, _)| set_v.contains(*w))
        .map(|(_, t)| *t)
        .collect();

    ProtocolOutput {
        intersection_size: matched.len(),
        intersection_sum: matched.into_iter().map(BigInt::from).sum(),
    }
}
