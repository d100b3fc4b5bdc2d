//! hostbridge-dispatch - Delivery of engine events onto the host thread
//!
//! This crate provides:
//! - [`Host`] the single-threaded, cooperatively scheduled host loop
//! - [`HostHandle`] the thread-safe half engine threads schedule through
//! - [`DispatchChannel`] ordered, pin-counted delivery for one event kind
//! - [`DispatchGate`] the process-wide dispatch enable/disable switch
//! - [`WeakHostRef`] revocable references to host-side objects
//! - [`HostCell`] values that may only be touched on their host thread

mod affinity;
mod channel;
mod gate;
mod host;
mod registry;
mod weak;

pub use affinity::HostCell;
pub use channel::{ChannelId, ChannelState, ChannelStats, DispatchChannel, Retire, RetireMode};
pub use gate::DispatchGate;
pub use host::{EnqueueOutcome, Host, HostHandle, HostId};
pub use registry::HostObjectId;
pub use weak::WeakHostRef;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        DispatchChannel, DispatchGate, EnqueueOutcome, Host, HostCell, HostHandle,
        HostObjectId, RetireMode, WeakHostRef,
    };
}
