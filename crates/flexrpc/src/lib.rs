//! # FlexRPC
//!
//! Dynamic values over Flexpack, and the frames that carry them between a
//! scene host and its remote sessions.
//!
//! ## Architecture
//!
//! - [`value`]: the `Value` tree and its immutable wire form, `EncodedBuffer`.
//! - [`codec`]: `encode` / `decode`, including the numeric tuple recovery for
//!   vectors and quaternions.
//! - [`frame`]: `Signal`, `Call` and `Reply` envelopes around encoded buffers.

pub mod codec;
pub mod error;
pub mod frame;
pub mod value;

pub use codec::decode;
pub use codec::encode;
pub use codec::Decoding;
pub use error::Error;
pub use error::Result;
pub use frame::CallFrame;
pub use frame::Frame;
pub use frame::ReplyFrame;
pub use frame::SignalFrame;
pub use value::EncodedBuffer;
pub use value::Value;
