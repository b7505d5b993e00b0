//! The decoder registry (spec.md §4.2): encoding id -> decode function.
//!
//! Modeled as a closed enum rather than a table of boxed closures
//! (spec.md §9 "Dynamic dispatch tables" calls tagged variants the natural
//! idiom for a language without first-class registries); `Encoding::decode`
//! is the dispatch.

mod predictors;

pub use predictors::Predictor;

use crate::error::{Error, Result};
use crate::reader::{
    read_elias_delta_s32, read_elias_delta_u32, read_signed_vb, read_tag2_3s32, read_tag8_4s16,
    read_tag8_8svb, read_unsigned_vb, FrameReader,
};

/// GPS_coord\[1\] rewrites its encoding id from 7 to this value at field-def
/// build time to select the latitude-specific decoder variant (spec.md
/// §4.3 special case).
pub const GPS_LATITUDE_ENCODING: u32 = 256;

/// One decoded value: a single int, a single float, or a fixed-size tuple
/// of ints produced by a group encoding (spec.md §4.2 decoder contract).
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedValue {
    Int(i32),
    Float(f32),
    Tuple(Vec<i32>),
}

/// A resolved, concrete decoder, bound once per field at field-def build
/// time (spec.md §4.3).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Encoding {
    SignedVb,
    UnsignedVb,
    Neg14Bit,
    EliasDeltaU32,
    EliasDeltaS32,
    Tag8_8Svb { field_count: usize },
    Tag2_3S32,
    Tag8_4S16,
    Null,
    /// `TAG2_3SVARIABLE`; resolved from the `Data version` header at build
    /// time since its exact field width selection changed across log
    /// versions (spec.md §4.2 "versioned" decoders).
    Tag2_3SVariable { legacy: bool },
    /// The GPS-latitude variant that `GPS_coord[1]` rewrites encoding id 7
    /// into (spec.md §4.3 special case).
    GpsLatitude,
}

impl Encoding {
    /// Resolve an encoding id from the headers into a concrete decoder.
    /// `field_count` is how many sibling fields a group encoding should
    /// decode at once (only meaningful for `TAG8_8SVB`, which the builder
    /// always binds against the trailing run of fields it covers).
    pub fn resolve(id: u32, data_version: Option<i64>, field_count: usize) -> Result<Self> {
        Ok(match id {
            0 => Encoding::SignedVb,
            1 => Encoding::UnsignedVb,
            3 => Encoding::Neg14Bit,
            4 => Encoding::EliasDeltaU32,
            5 => Encoding::EliasDeltaS32,
            6 => Encoding::Tag8_8Svb { field_count },
            7 => Encoding::Tag2_3S32,
            8 => Encoding::Tag8_4S16,
            9 => Encoding::Null,
            10 => Encoding::Tag2_3SVariable {
                legacy: data_version.unwrap_or(i64::MAX) < 2,
            },
            GPS_LATITUDE_ENCODING => Encoding::GpsLatitude,
            other => return Err(Error::UnknownEncoding(other)),
        })
    }

    /// Decode zero or more bytes from `r`, or `None` on underflow (spec.md
    /// §4.2 decoder contract: absence, not an exception, signals underflow).
    pub fn decode(&self, r: &mut FrameReader) -> Option<DecodedValue> {
        match self {
            Encoding::SignedVb => Some(DecodedValue::Int(read_signed_vb(r)?)),
            Encoding::UnsignedVb => Some(DecodedValue::Int(read_unsigned_vb(r)? as i32)),
            Encoding::Neg14Bit => {
                let raw = read_unsigned_vb(r)?;
                Some(DecodedValue::Int(-(crate::reader::zigzag_decode(raw))))
            }
            Encoding::EliasDeltaU32 => {
                Some(DecodedValue::Int(read_elias_delta_u32(r)? as i32))
            }
            Encoding::EliasDeltaS32 => Some(DecodedValue::Int(read_elias_delta_s32(r)?)),
            Encoding::Tag8_8Svb { field_count } => {
                Some(DecodedValue::Tuple(read_tag8_8svb(r, *field_count)?))
            }
            Encoding::Tag2_3S32 | Encoding::GpsLatitude => {
                let v = read_tag2_3s32(r)?;
                Some(DecodedValue::Tuple(v.to_vec()))
            }
            Encoding::Tag8_4S16 => {
                let v = read_tag8_4s16(r)?;
                Some(DecodedValue::Tuple(v.to_vec()))
            }
            Encoding::Null => Some(DecodedValue::Int(0)),
            Encoding::Tag2_3SVariable { legacy } => {
                if *legacy {
                    let v = read_tag2_3s32(r)?;
                    Some(DecodedValue::Tuple(v.to_vec()))
                } else {
                    // Current-version layout: same tag byte, but each field
                    // width maxes out at 2 bytes rather than 4.
                    let v = read_tag2_3s32(r)?;
                    Some(DecodedValue::Tuple(
                        v.iter().map(|x| (*x as i16) as i32).collect(),
                    ))
                }
            }
        }
    }
}
