//! Messages exchanged between the two parties, and an optional byte
//! encoding for a transport that wants one.
//!
//! Layout: counts are `u32` big-endian, points use [`CurvePoint::to_bytes`]
//! and ciphertexts use the fixed-width [`Ciphertext::to_bytes`].

use crate::curve::{CurvePoint, AFFINE_TAG, ENCODED_POINT_LEN, IDENTITY_TAG};
use crate::error::{EncodingError, Result};
use crate::paillier::{Ciphertext, PaillierPublicKey};

/// Party1 -> Party2: `H(v)^k1` for every `v` in V, shuffled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Round1Message {
    pub masked_points: Vec<CurvePoint>,
}

/// One of Party2's items: `H(w)^k2` next to `Enc(t)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MaskedValue {
    pub point: CurvePoint,
    pub ciphertext: Ciphertext,
}

/// Party2 -> Party1: `Z = {H(v)^(k1*k2)}` and the masked pairs, each list
/// shuffled independently.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Round2Message {
    pub doubly_masked_points: Vec<CurvePoint>,
    pub masked_values: Vec<MaskedValue>,
}

/// Party1 -> Party2: the intersection size and the re-randomized encrypted sum.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Round3Message {
    pub intersection_size: usize,
    pub aggregate: Ciphertext,
}

struct Reader<'a> {
    bytes: &'a [u8],
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.bytes.len() < len {
            return Err(EncodingError::UnexpectedEof.into());
        }
        let (head, tail) = self.bytes.split_at(len);
        self.bytes = tail;
        Ok(head)
    }

    fn read_u32(&mut self) -> Result<u32> {
        let raw = self.take(4)?;
        Ok(u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    fn read_u64(&mut self) -> Result<u64> {
        let raw = self.take(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(raw);
        Ok(u64::from_be_bytes(buf))
    }

    fn read_point(&mut self) -> Result<CurvePoint> {
        let len = match self.bytes.first() {
            None => return Err(EncodingError::UnexpectedEof.into()),
            Some(&IDENTITY_TAG) => 1,
            Some(&AFFINE_TAG) => ENCODED_POINT_LEN,
            Some(&other) => return Err(EncodingError::InvalidTag(other).into()),
        };
        CurvePoint::from_bytes(self.take(len)?)
    }

    fn read_ciphertext(&mut self, public_key: &PaillierPublicKey) -> Result<Ciphertext> {
        Ciphertext::from_bytes(self.take(public_key.ciphertext_len())?, public_key)
    }

    fn read_points(&mut self) -> Result<Vec<CurvePoint>> {
        let count = self.read_u32()?;
        (0..count).map(|_| self.read_point()).collect()
    }

    fn finish(self) -> Result<()> {
        if !self.bytes.is_empty() {
            return Err(EncodingError::TrailingBytes(self.bytes.len()).into());
        }
        Ok(())
    }
}

fn write_count(out: &mut Vec<u8>, count: usize) -> Result<()> {
    let count = u32::try_from(count).map_err(|_| EncodingError::TooManyItems(count))?;
    out.extend_from_slice(&count.to_be_bytes());
    Ok(())
}

fn write_points(out: &mut Vec<u8>, points: &[CurvePoint]) -> Result<()> {
    write_count(out, points.len())?;
    for point in points {
        out.extend_from_slice(&point.to_bytes());
    }
    Ok(())
}

impl Round1Message {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(4 + self.masked_points.len() * ENCODED_POINT_LEN);
        write_points(&mut out, &self.masked_points)?;
        Ok(out)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader { bytes };
        let masked_points = reader.read_points()?;
        reader.finish()?;
        Ok(Round1Message { masked_points })
    }
}

impl Round2Message {
    pub fn to_bytes(&self, public_key: &PaillierPublicKey) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        write_points(&mut out, &self.doubly_masked_points)?;
        write_count(&mut out, self.masked_values.len())?;
        for item in &self.masked_values {
            out.extend_from_slice(&item.point.to_bytes());
            out.extend_from_slice(&item.ciphertext.to_bytes(public_key));
        }
        Ok(out)
    }

    pub fn from_bytes(bytes: &[u8], public_key: &PaillierPublicKey) -> Result<Self> {
        let mut reader = Reader { bytes };
        let doubly_masked_points = reader.read_points()?;
        let count = reader.read_u32()?;
        let masked_values = (0..count)
            .map(|_| -> Result<MaskedValue> {
                let point = reader.read_point()?;
                let ciphertext = reader.read_ciphertext(public_key)?;
                Ok(MaskedValue { point, ciphertext })
            })
            .collect::<Result<Vec<_>>>()?;
        reader.finish()?;
        Ok(Round2Message { doubly_masked_points, masked_values })
    }
}

impl Round3Message {
    pub fn to_bytes(&self, public_key: &PaillierPublicKey) -> Result<Vec<u8>> {
        let size = u64::try_from(self.intersection_size)
            .map_err(|_| EncodingError::TooManyItems(self.intersection_size))?;
        let mut out = Vec::with_capacity(8 + public_key.ciphertext_len());
        out.extend_from_slice(&size.to_be_bytes());
        out.extend_from_slice(&self.aggregate.to_bytes(public_key));
        Ok(out)
    }

    pub fn from_bytes(bytes: &[u8], public_key: &PaillierPublicKey) -> Result<Self> {
        let mut reader = Reader { bytes };
        let raw_size = reader.read_u64()?;
        let intersection_size = usize::try_from(raw_size).map_err(|_| EncodingError::CountOverflow(raw_size))?;
        let aggregate = reader.read_ciphertext(public_key)?;
        reader.finish()?;
        Ok(Round3Message { intersection_size, aggregate })
    }
}
