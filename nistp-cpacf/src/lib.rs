#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![doc = include_str!("../README.md")]
#![doc(
    html_logo_url = "https://raw.githubusercontent.com/RustCrypto/meta/master/logo.svg",
    html_favicon_url = "https://raw.githubusercontent.com/RustCrypto/meta/master/logo.svg"
)]
#![deny(unsafe_code)]
#![warn(
    clippy::mod_module_files,
    clippy::unwrap_used,
    missing_docs,
    rust_2018_idioms,
    unused_lifetimes,
    unused_qualifications
)]

extern crate alloc;
#[cfg(feature = "std")]
extern crate std;

pub mod capability;
pub mod codec;
pub mod cpacf;
pub mod curve;
pub mod ecdsa;
pub mod emulator;
pub mod group;
pub mod key;
pub mod param;
pub mod point;
pub mod software;

mod error;

pub use crate::{
    capability::Capabilities,
    cpacf::{Cpacf, Family, Instructions, Outcome},
    curve::{CurveDescriptor, NistCurve, P256, P384, P521},
    ecdsa::{SignSetup, Signature, Verification},
    emulator::Emulator,
    error::{Error, Result},
    group::{Config, EcGroup, Method},
    key::EcKey,
    point::Point,
};
pub use elliptic_curve::{self, NonZeroScalar, SecretKey};
pub use num_bigint;
pub use p256;
pub use p384;
pub use p521;
pub use rand_core;
