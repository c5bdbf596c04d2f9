//! Spatial signaling: channels, propagation, and the mechanisms that feed
//! them

pub mod altar;
pub mod inventory;
pub mod pressure;
pub mod propagate;
pub mod sprung;

pub use altar::{check_sacrifice, matches_sacrifice, operate_altar};
pub use inventory::{check_inventory, find_in_inventory};
pub use pressure::{pedestal_active, plate_active, plate_weight};
pub use propagate::{
    propagate, push_trigger, update_all_plates, update_plate, use_handle, TriggerError,
    TriggerEvent,
};
pub use sprung::{check_trigger, release_trigger};
