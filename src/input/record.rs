//! Per-device records
//!
//! A `DeviceRecord` owns everything the subsystem allocated for one connected
//! device: up to two pointer slots, a keypad slot, and the keymap state.
//! Records are assembled through `RecordBuilder`, which gives every handle
//! back to the sink if the record is never finished.

use std::path::PathBuf;

use log::trace;
use smol_str::SmolStr;

use super::classify::Capability;
use super::event::DeviceId;
use super::keyboard::{KeyCode, KeyState};
use super::sink::{GroupHandle, IndevData, IndevHandle, IndevKind, IndevState, InputSink, Point};
use crate::error::{InputError, Result};

/// Maximum pointer slots per device (primary contact + second thumb)
pub const MAX_POINTER_SLOTS: usize = 2;

/// One logical contact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointerSlot {
    pub handle: IndevHandle,
    pub point: Point,
    pub state: IndevState,
}

impl PointerSlot {
    pub fn data(&self) -> IndevData {
        IndevData::Pointer {
            point: self.point,
            state: self.state,
        }
    }
}

/// Keypad slot
pub struct KeyboardSlot {
    pub handle: IndevHandle,
    pub key: KeyCode,
    pub state: IndevState,
    /// Keymap state, only for full keyboards with a keymap configured
    pub key_state: Option<Box<dyn KeyState>>,
}

impl KeyboardSlot {
    pub fn data(&self) -> IndevData {
        IndevData::Key {
            key: self.key.clone(),
            state: self.state,
        }
    }
}

/// State owned for one connected device
pub struct DeviceRecord {
    pub id: DeviceId,
    pub node: PathBuf,
    pub name: String,
    pub capability: Capability,
    pub pointers: [Option<PointerSlot>; MAX_POINTER_SLOTS],
    pub keyboard: Option<KeyboardSlot>,
}

impl DeviceRecord {
    /// Pointer slot for a touch contact id
    ///
    /// Contact ids below 0 (single-touch devices) and 0 use the primary slot,
    /// 1 uses the second slot; higher contacts are not tracked.
    pub fn contact_slot(&mut self, contact: i32) -> Option<&mut PointerSlot> {
        let index = match contact {
            c if c <= 0 => 0,
            1 => 1,
            _ => return None,
        };
        self.pointers[index].as_mut()
    }

    pub fn pointer_count(&self) -> usize {
        self.pointers.iter().flatten().count()
    }

    /// Give every slot back to the sink, last acquired first
    pub fn release(mut self, sink: &mut dyn InputSink) {
        release_slots(sink, &mut self.pointers, &mut self.keyboard);
    }
}

fn release_slots(
    sink: &mut dyn InputSink,
    pointers: &mut [Option<PointerSlot>; MAX_POINTER_SLOTS],
    keyboard: &mut Option<KeyboardSlot>,
) {
    for slot in pointers.iter_mut().rev() {
        if let Some(slot) = slot.take() {
            sink.delete_indev(slot.handle);
        }
    }
    if let Some(mut slot) = keyboard.take() {
        drop(slot.key_state.take());
        sink.delete_indev(slot.handle);
    }
}

/// Transactional record assembly
///
/// Dropping an unfinished builder releases everything acquired so far.
pub struct RecordBuilder<'a> {
    sink: &'a mut dyn InputSink,
    id: DeviceId,
    node: PathBuf,
    name: String,
    capability: Capability,
    pointers: [Option<PointerSlot>; MAX_POINTER_SLOTS],
    keyboard: Option<KeyboardSlot>,
}

impl<'a> RecordBuilder<'a> {
    pub fn new(
        sink: &'a mut dyn InputSink,
        id: DeviceId,
        node: PathBuf,
        name: String,
        capability: Capability,
    ) -> Self {
        Self {
            sink,
            id,
            node,
            name,
            capability,
            pointers: [None, None],
            keyboard: None,
        }
    }

    /// Register a keypad indev and route it to `group`
    pub fn add_keyboard(&mut self, group: GroupHandle) -> Result<()> {
        let handle = self
            .sink
            .create_indev(IndevKind::Keypad)
            .ok_or_else(|| InputError::OutOfMemory(self.name.clone()))?;
        self.sink.set_group(handle, group);
        self.keyboard = Some(KeyboardSlot {
            handle,
            key: KeyCode::Text(SmolStr::default()),
            state: IndevState::Released,
            key_state: None,
        });
        Ok(())
    }

    /// Attach keymap state to the keypad slot
    pub fn attach_key_state(&mut self, key_state: Box<dyn KeyState>) {
        if let Some(slot) = self.keyboard.as_mut() {
            slot.key_state = Some(key_state);
        }
    }

    /// Register a pointer indev for slot `index`, resting at `at`
    pub fn add_pointer(&mut self, index: usize, at: Point) -> Result<()> {
        let handle = self
            .sink
            .create_indev(IndevKind::Pointer)
            .ok_or_else(|| InputError::OutOfMemory(self.name.clone()))?;
        self.pointers[index] = Some(PointerSlot {
            handle,
            point: at,
            state: IndevState::Released,
        });
        Ok(())
    }

    /// Complete the record
    ///
    /// A device that ended up with no slot at all is not usable.
    pub fn finish(mut self) -> Result<DeviceRecord> {
        let has_pointer = self.pointers.iter().any(Option::is_some);
        if !has_pointer && self.keyboard.is_none() {
            return Err(InputError::NoUsableSlot(self.name.clone()));
        }

        Ok(DeviceRecord {
            id: self.id,
            node: std::mem::take(&mut self.node),
            name: std::mem::take(&mut self.name),
            capability: self.capability,
            pointers: std::mem::take(&mut self.pointers),
            keyboard: self.keyboard.take(),
        })
    }
}

impl Drop for RecordBuilder<'_> {
    fn drop(&mut self) {
        if self.pointers.iter().any(Option::is_some) || self.keyboard.is_some() {
            trace!("Rolling back partial record for {}", self.node.display());
        }
        release_slots(&mut *self.sink, &mut self.pointers, &mut self.keyboard);
    }
}
