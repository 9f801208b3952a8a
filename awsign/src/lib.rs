#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub use awsign_core::*;

#[cfg(feature = "aws")]
pub mod aws;

#[cfg(feature = "retry")]
pub mod retry;
