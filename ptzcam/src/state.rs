use crate::protocol::CameraSink;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

bitflags! {
    #[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
    pub struct StateUpdate: u32 {
        const PAN_TILT_SPEED = 1;
        const DRIVE          = 1 << 1;
        const ZOOM_SPEED     = 1 << 2;
        const MEMORY_SET     = 1 << 3;
        const MEMORY_RECALL  = 1 << 4;
        const MEMORY_RESET   = 1 << 5;

        const MEMORY = Self::MEMORY_SET.bits() | Self::MEMORY_RECALL.bits() | Self::MEMORY_RESET.bits();
    }
}

/// Number of memory positions on a camera.
pub const MEMORY_SLOTS: usize = 6;

/// Flag which is set while the camera moves to a recalled position.
///
/// Clones share the same flag, so it can be handed to whatever actuates the
/// camera, which clears it when the move is complete.
#[derive(Debug, Default, Clone)]
pub struct BusyFlag(Arc<AtomicBool>);

impl BusyFlag {
    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// [CameraState] records all commands applied by a
/// [CameraServer][crate::CameraServer].
#[derive(Debug, Default, Clone)]
pub struct CameraState {
    /// Signed pan speed, in degrees per second.
    pub pan_speed: f32,
    /// Signed tilt speed, in degrees per second.
    pub tilt_speed: f32,
    /// Signed zoom speed.
    pub zoom_speed: i32,
    /// Number of drive commands received.
    pub drive_count: u64,
    /// Which memory positions have been stored.
    memory_slots: [bool; MEMORY_SLOTS],
    /// The memory position most recently recalled.
    recalled_position: Option<u8>,
    busy: BusyFlag,
    /// Fields changed since the last [`CameraState::take_updates()`].
    updates: StateUpdate,
}

impl CameraState {
    /// Gets a handle to the camera's busy flag.
    pub fn busy_flag(&self) -> BusyFlag {
        self.busy.clone()
    }

    /// Returns `true` if memory position `index` has been stored.
    pub fn is_position_set(&self, index: u8) -> bool {
        self.memory_slots
            .get(usize::from(index))
            .copied()
            .unwrap_or_default()
    }

    pub fn recalled_position(&self) -> Option<u8> {
        self.recalled_position
    }

    /// Returns the fields which have changed since this was last called, and
    /// resets them.
    pub fn take_updates(&mut self) -> StateUpdate {
        std::mem::take(&mut self.updates)
    }

    fn memory_slot(&mut self, index: u8) -> Option<&mut bool> {
        let slot = self.memory_slots.get_mut(usize::from(index));
        if slot.is_none() {
            warn!("memory position {index} does not exist, camera has {MEMORY_SLOTS}");
        }
        slot
    }
}

impl CameraSink for CameraState {
    fn set_pan_speed(&mut self, speed: f32) {
        self.pan_speed = speed;
        self.updates |= StateUpdate::PAN_TILT_SPEED;
    }

    fn set_tilt_speed(&mut self, speed: f32) {
        self.tilt_speed = speed;
        self.updates |= StateUpdate::PAN_TILT_SPEED;
    }

    fn drive(&mut self) {
        self.drive_count += 1;
        trace!(self.pan_speed, self.tilt_speed, "drive");
        self.updates |= StateUpdate::DRIVE;
    }

    fn set_zoom_speed(&mut self, speed: i32) {
        self.zoom_speed = speed;
        debug!(self.zoom_speed, "updated");
        self.updates |= StateUpdate::ZOOM_SPEED;
    }

    fn set_position(&mut self, index: u8) {
        let Some(slot) = self.memory_slot(index) else {
            return;
        };
        *slot = true;
        debug!("stored memory position {index}");
        self.updates |= StateUpdate::MEMORY_SET;
    }

    fn recall_position(&mut self, index: u8) {
        let Some(slot) = self.memory_slot(index) else {
            return;
        };
        if !*slot {
            debug!("recalling memory position {index}, which was never stored");
        }
        self.recalled_position = Some(index);
        self.busy.set();
        self.updates |= StateUpdate::MEMORY_RECALL;
    }

    fn reset_positions(&mut self) {
        self.memory_slots = [false; MEMORY_SLOTS];
        self.recalled_position = None;
        debug!("reset memory positions");
        self.updates |= StateUpdate::MEMORY_RESET;
    }

    fn is_busy(&self) -> bool {
        self.busy.is_set()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn pan_tilt() {
        let mut state = CameraState::default();
        state.set_pan_speed(-1.3);
        state.set_tilt_speed(100.);
        state.drive();

        assert_eq!(-1.3, state.pan_speed);
        assert_eq!(100., state.tilt_speed);
        assert_eq!(1, state.drive_count);
        assert_eq!(
            StateUpdate::PAN_TILT_SPEED | StateUpdate::DRIVE,
            state.take_updates()
        );
        assert!(state.take_updates().is_empty());
    }

    #[test]
    fn memory() {
        let mut state = CameraState::default();
        let busy = state.busy_flag();

        state.set_position(3);
        assert!(state.is_position_set(3));
        assert!(!state.is_position_set(2));
        assert!(!state.is_position_set(6));
        assert_eq!(StateUpdate::MEMORY_SET, state.take_updates());

        state.recall_position(3);
        assert_eq!(Some(3), state.recalled_position());
        assert!(state.is_busy());
        assert!(busy.is_set());
        assert_eq!(StateUpdate::MEMORY_RECALL, state.take_updates());

        // Clones share the busy flag.
        let snapshot = state.clone();
        busy.clear();
        assert!(!state.is_busy());
        assert!(!snapshot.is_busy());

        state.reset_positions();
        assert!(!state.is_position_set(3));
        assert_eq!(None, state.recalled_position());
        assert!(state.take_updates().intersects(StateUpdate::MEMORY));
    }

    #[test]
    fn memory_out_of_range() {
        let mut state = CameraState::default();
        state.set_position(6);
        state.recall_position(200);
        assert!(!state.is_busy());
        assert_eq!(None, state.recalled_position());
        assert!(state.take_updates().is_empty());
    }
}
