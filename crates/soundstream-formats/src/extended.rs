//! 80-bit IEEE 754 extended precision, as used for the AIFF sample rate.
//!
//! Layout: sign bit, 15-bit exponent biased by 16383, then a 64-bit mantissa
//! with an explicit integer bit. Always big-endian.

use soundstream_core::{Error, Result};

const BIAS: i32 = 16383;

pub fn encode(value: f64) -> [u8; 10] {
    let mut out = [0u8; 10];
    if value == 0.0 || !value.is_finite() {
        return out;
    }
    let sign: u16 = if value.is_sign_negative() { 0x8000 } else { 0 };
    let bits = value.abs().to_bits();
    let exp = ((bits >> 52) & 0x7ff) as i32;
    let frac = bits & ((1u64 << 52) - 1);

    let (exp, mantissa) = if exp == 0 {
        // subnormal double
        let m = frac << 11;
        let shift = m.leading_zeros();
        (-1022 - shift as i32, m << shift)
    } else {
        (exp - 1023, (frac | 1u64 << 52) << 11)
    };

    let biased = (exp + BIAS) as u16 & 0x7fff;
    out[..2].copy_from_slice(&(sign | biased).to_be_bytes());
    out[2..].copy_from_slice(&mantissa.to_be_bytes());
    out
}

pub fn decode(bytes: &[u8; 10]) -> Result<f64> {
    let sign_exp = u16::from_be_bytes([bytes[0], bytes[1]]);
    let mut m = [0u8; 8];
    m.copy_from_slice(&bytes[2..]);
    let mantissa = u64::from_be_bytes(m);

    let exp = (sign_exp & 0x7fff) as i32;
    if exp == 0x7fff {
        return Err(Error::malformed("extended float is infinite or NaN"));
    }
    if mantissa == 0 {
        return Ok(0.0);
    }
    let magnitude = mantissa as f64 * 2f64.powi(exp - BIAS - 63);
    Ok(if sign_exp & 0x8000 != 0 {
        -magnitude
    } else {
        magnitude
    })
}
