//! IPsec transformation (XFRM) support.
//!
//! - [`types`]: kernel ABI structs and constants from `linux/xfrm.h`
//! - [`attrs`]: `XFRMA_*` attribute encoders
//! - [`request`]: complete SA/SP requests
//! - [`spi`]: randomized SPI candidate order
//! - [`dump`]: listing of the SA and policy databases

pub mod attrs;
pub mod dump;
pub mod request;
pub mod spi;
pub mod types;

pub use dump::{
    EncapInfo, IpsecProtocol, PolicyAction, PolicyDirection, SecurityAssociation, SecurityPolicy,
    TrafficSelector, XfrmAlgorithm, XfrmMode,
};
pub use types::*;
