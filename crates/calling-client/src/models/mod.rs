//! Wire models of the calling service API.
//!
//! Responses are decoded into explicit schema structs. Unknown fields are
//! rejected so that API drift shows up as a decode error instead of silently
//! dropped data.

pub mod call;
pub mod diagnostics;
pub mod instance;

pub use call::{Call, CallPhase, CallRequest, CallStatus, ParseCallStatusError};
pub use diagnostics::{Flow, InstanceLog, MediaDirections, PacketCapture};
pub use instance::{
    Instance, InstancePhase, InstanceRequest, InstanceStatus, InstanceType,
    ParseInstanceTypeError, VersionedInstanceType,
};
