//! Surge numeric engine: arbitrary-precision integers and floats
//!
//! Implements the big-number types backing Surge's numeric literals and
//! operations, built from scratch over little-endian 32-bit limbs:
//!
//! - [`BigUint`]: the limb arithmetic core (schoolbook add/sub/mul, long
//!   division, shifts, bitwise ops, base conversion)
//! - [`BigInt`]: sign + magnitude, with two's-complement-emulated bitwise
//!   operations and C-style truncating division
//! - [`BigFloat`]: sign, binary exponent, and a 256-bit mantissa; all
//!   normalization rounds half-to-even
//!
//! Operations return [`NumError`] on domain errors (underflow, divide by
//! zero, the limb-count ceiling); the literal boundary in [`literal`]
//! converts those into the fixed fatal-panic protocol.

mod bigfloat;
mod bigint;
mod biguint;
mod error;
pub mod literal;

pub use bigfloat::{BigFloat, MANTISSA_BITS};
pub use bigint::BigInt;
pub use biguint::{BigUint, MAX_LIMBS};
pub use error::{NumError, NumResult};
