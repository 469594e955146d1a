//! Two-party private set intersection with sum (PSI-sum).
//!
//! Party1 holds identifiers, Party2 holds identifier/value pairs. Running the
//! protocol reveals the size of the intersection and the sum of the values
//! attached to intersecting identifiers, and nothing else, assuming both
//! parties follow the protocol (semi-honest model).
//!
//! Masking uses exponentiation in the P-256 group under the DDH assumption;
//! aggregation uses Paillier encryption. Messages are plain in-memory values;
//! carrying them between processes is left to the caller, optionally through
//! the byte encodings in [`messages`].
//!
//! ```no_run
//! use ddh_psi_sum::run_protocol;
//!
//! let v = ["apple", "banana", "cherry", "date"];
//! let w = [("apple", 10), ("banana", 20), ("grape", 30), ("date", 40)];
//! let output = run_protocol(&v, &w).unwrap();
//! assert_eq!(output.intersection_size, 3);
//! ```

pub mod config;
pub mod crypto_utils;
pub mod curve;
pub mod dh_psi;
pub mod error;
pub mod messages;
pub mod paillier;

pub use config::ProtocolConfig;
pub use crypto_utils::{hash_to_curve, RandomnessProvider};
pub use curve::{CurveParams, CurvePoint, EllipticCurveGroup, Scalar};
pub use dh_psi::{
    plaintext_intersection_sum, run_protocol, run_protocol_with, Party1, Party1State, Party2,
    Party2State, ProtocolOutput,
};
pub use error::{Error, Result};
pub use messages::{MaskedValue, Round1Message, Round2Message, Round3Message};
pub use paillier::{Ciphertext, PaillierPrivateKey, PaillierPublicKey};
