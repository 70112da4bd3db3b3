//! UI input sink interface
//!
//! The widget toolkit that consumes synthesized events lives outside this
//! crate. It registers one logical input device (indev) per pointer slot or
//! keyboard slot and reads the slot's current state whenever the subsystem
//! reports a change.

use super::keyboard::KeyCode;

/// Handle to a logical input device registered with the sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndevHandle(pub u32);

/// Handle to the cursor image owned by the sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CursorHandle(pub u32);

/// Handle to a focus group; keypad input goes to the group's focused widget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupHandle(pub u32);

/// Kind of logical input device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndevKind {
    /// Pointer (mouse, touchpad, one touch contact)
    Pointer,
    /// Keypad (keyboard, bare keys)
    Keypad,
}

/// Press state of a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndevState {
    #[default]
    Released,
    Pressed,
}

impl IndevState {
    pub fn from_pressed(pressed: bool) -> Self {
        if pressed {
            IndevState::Pressed
        } else {
            IndevState::Released
        }
    }
}

/// Point in viewport coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

/// Current state of one slot, as read by the sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndevData {
    Pointer { point: Point, state: IndevState },
    Key { key: KeyCode, state: IndevState },
}

/// Display area events are mapped into
///
/// `physical_*` is the full panel resolution touch coordinates are scaled to;
/// `offset_*` is where the visible area starts inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub hor_res: i32,
    pub ver_res: i32,
    pub physical_hor_res: i32,
    pub physical_ver_res: i32,
    pub offset_x: i32,
    pub offset_y: i32,
}

impl Viewport {
    /// Viewport covering the whole panel
    pub fn new(hor_res: i32, ver_res: i32) -> Self {
        Self {
            hor_res,
            ver_res,
            physical_hor_res: hor_res,
            physical_ver_res: ver_res,
            offset_x: 0,
            offset_y: 0,
        }
    }

    /// Center of the visible area
    pub fn center(&self) -> Point {
        Point {
            x: self.hor_res / 2,
            y: self.ver_res / 2,
        }
    }

    /// Apply a relative motion, clamping to the visible area
    pub fn move_relative(&self, from: Point, dx: f64, dy: f64) -> Point {
        let x = from.x.saturating_add(dx as i32);
        let y = from.y.saturating_add(dy as i32);
        Point {
            x: x.clamp(0, (self.hor_res - 1).max(0)),
            y: y.clamp(0, (self.ver_res - 1).max(0)),
        }
    }

    /// Map a device-normalized position (0.0..1.0 per axis) into the viewport
    ///
    /// Returns None when the point falls outside the visible area.
    pub fn transform_absolute(&self, nx: f64, ny: f64) -> Option<Point> {
        if !nx.is_finite() || !ny.is_finite() {
            return None;
        }
        let x = ((nx * self.physical_hor_res as f64) as i32).saturating_sub(self.offset_x);
        let y = ((ny * self.physical_ver_res as f64) as i32).saturating_sub(self.offset_y);
        if x < 0 || x >= self.hor_res || y < 0 || y >= self.ver_res {
            return None;
        }
        Some(Point { x, y })
    }
}

/// Consumer of synthesized input events
///
/// Allocation methods return None when the toolkit cannot create the object.
pub trait InputSink {
    /// Current display geometry
    fn viewport(&self) -> Viewport;

    /// Register a logical input device
    fn create_indev(&mut self, kind: IndevKind) -> Option<IndevHandle>;

    /// Unregister a logical input device
    fn delete_indev(&mut self, handle: IndevHandle);

    /// Deliver the current state of a slot
    fn read(&mut self, handle: IndevHandle, data: &IndevData);

    /// Create the cursor image (initially hidden)
    fn create_cursor(&mut self) -> Option<CursorHandle>;

    /// Show or hide the cursor image
    fn set_cursor_visible(&mut self, cursor: CursorHandle, visible: bool);

    /// Make the cursor follow a pointer indev
    fn bind_cursor(&mut self, pointer: IndevHandle, cursor: CursorHandle);

    /// Create an empty focus group
    fn create_group(&mut self) -> Option<GroupHandle>;

    /// Route a keypad indev to a focus group
    fn set_group(&mut self, keypad: IndevHandle, group: GroupHandle);
}
