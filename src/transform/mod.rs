//! Response content transforms: compression and fragment inlining.
//!
//! Both operations are independent and idempotent, and both degrade to the
//! untransformed payload on any failure — a transform never breaks a
//! response.

pub mod compress;
pub mod inline;

pub use compress::Encoding;
