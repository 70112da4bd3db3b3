//! Subsystem scenarios driven through fake backends
//!
//! The fakes stand in for the kernel side (libinput path context, udev) and
//! for the UI toolkit, so every scenario runs without devices or a seat.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet, VecDeque};
use std::io;
use std::os::unix::io::RawFd;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use bbx_input::input::keycodes::{KEY_ENTER, KEY_POWER};
use bbx_input::input::{
    Capability, CapabilityFilter, CursorHandle, DeviceId, DeviceInfo, DeviceMonitor, EventSource,
    GroupHandle, HotplugAction, IndevData, IndevHandle, IndevKind, IndevState, InputSink, KeyCode,
    KeyState, Keymap, KeymapSpec, Notification, Point, PollRegistrar, Properties, RawEvent,
    ReadySource, Subsystem, SubsystemOptions, Viewport,
};
use bbx_input::{InputError, Result};

const KEY_A: u32 = 30;
const KEY_LEFTSHIFT: u32 = 42;
const KEY_RIGHTSHIFT: u32 = 54;

// ============================================================================
// Fake libinput
// ============================================================================

#[derive(Default)]
struct SourceState {
    /// Nodes the "kernel" knows, with what libinput would report for them
    devices: HashMap<PathBuf, DeviceInfo>,
    live: HashMap<DeviceId, PathBuf>,
    /// Devices removed by suspend, re-added on resume
    parked: Vec<PathBuf>,
    queue: VecDeque<RawEvent>,
    next_id: u64,
    add_calls: Vec<PathBuf>,
    suspend_calls: usize,
}

impl SourceState {
    fn announce(&mut self, node: &Path) -> Option<DeviceId> {
        let info = self.devices.get(node)?.clone();
        self.next_id += 1;
        let device = DeviceId(self.next_id);
        self.live.insert(device, node.to_path_buf());
        self.queue.push_back(RawEvent::DeviceAdded { device, info });
        Some(device)
    }

    fn id_of(&self, node: &str) -> DeviceId {
        self.live
            .iter()
            .find(|(_, path)| path.as_path() == Path::new(node))
            .map(|(id, _)| *id)
            .expect("device is live")
    }
}

struct FakeSource(Rc<RefCell<SourceState>>);

impl EventSource for FakeSource {
    fn as_raw_fd(&self) -> RawFd {
        10
    }

    fn add_device(&mut self, node: &Path) -> Option<DeviceId> {
        let mut state = self.0.borrow_mut();
        state.add_calls.push(node.to_path_buf());
        state.announce(node)
    }

    fn remove_device(&mut self, device: DeviceId) {
        let mut state = self.0.borrow_mut();
        if state.live.remove(&device).is_some() {
            state.queue.push_back(RawEvent::DeviceRemoved { device });
        }
    }

    fn dispatch(&mut self) -> Result<()> {
        Ok(())
    }

    fn next_event(&mut self) -> Option<RawEvent> {
        self.0.borrow_mut().queue.pop_front()
    }

    fn suspend(&mut self) {
        let mut state = self.0.borrow_mut();
        state.suspend_calls += 1;
        let live: Vec<(DeviceId, PathBuf)> = state.live.drain().collect();
        for (device, node) in live {
            state.queue.push_back(RawEvent::DeviceRemoved { device });
            state.parked.push(node);
        }
    }

    fn resume(&mut self) -> Result<()> {
        let mut state = self.0.borrow_mut();
        let parked = std::mem::take(&mut state.parked);
        for node in parked {
            state.announce(&node);
        }
        Ok(())
    }
}

// ============================================================================
// Fake udev
// ============================================================================

#[derive(Default)]
struct MonitorState {
    present: Vec<(PathBuf, Properties)>,
    by_sysname: HashMap<String, Properties>,
    notifications: VecDeque<Notification>,
}

struct FakeMonitor(Rc<RefCell<MonitorState>>);

impl DeviceMonitor for FakeMonitor {
    fn as_raw_fd(&self) -> RawFd {
        11
    }

    fn receive(&mut self) -> Option<Notification> {
        self.0.borrow_mut().notifications.pop_front()
    }

    fn enumerate(&self) -> Vec<(PathBuf, Properties)> {
        self.0.borrow().present.clone()
    }

    fn properties(&self, sysname: &str) -> Option<Properties> {
        self.0.borrow().by_sysname.get(sysname).cloned()
    }
}

// ============================================================================
// Fake toolkit
// ============================================================================

struct FakeSink {
    viewport: Viewport,
    /// Maximum live indevs (None = unlimited)
    capacity: Option<usize>,
    next: u32,
    live: HashMap<IndevHandle, IndevKind>,
    reads: Vec<(IndevHandle, IndevData)>,
    cursors_created: usize,
    cursor_visible: bool,
    bound: HashSet<IndevHandle>,
    /// Refuse to create focus groups
    group_fail: bool,
    groups_created: u32,
    grouped: HashMap<IndevHandle, GroupHandle>,
}

impl FakeSink {
    fn new() -> Self {
        Self {
            viewport: Viewport::new(800, 480),
            capacity: None,
            next: 0,
            live: HashMap::new(),
            reads: Vec::new(),
            cursors_created: 0,
            cursor_visible: false,
            bound: HashSet::new(),
            group_fail: false,
            groups_created: 0,
            grouped: HashMap::new(),
        }
    }

    fn take_reads(&mut self) -> Vec<(IndevHandle, IndevData)> {
        std::mem::take(&mut self.reads)
    }
}

impl InputSink for FakeSink {
    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn create_indev(&mut self, kind: IndevKind) -> Option<IndevHandle> {
        if self.capacity.is_some_and(|capacity| self.live.len() >= capacity) {
            return None;
        }
        self.next += 1;
        let handle = IndevHandle(self.next);
        self.live.insert(handle, kind);
        Some(handle)
    }

    fn delete_indev(&mut self, handle: IndevHandle) {
        assert!(self.live.remove(&handle).is_some(), "double delete");
        self.bound.remove(&handle);
        self.grouped.remove(&handle);
    }

    fn read(&mut self, handle: IndevHandle, data: &IndevData) {
        assert!(self.live.contains_key(&handle), "read from dead indev");
        self.reads.push((handle, data.clone()));
    }

    fn create_cursor(&mut self) -> Option<CursorHandle> {
        self.cursors_created += 1;
        Some(CursorHandle(1))
    }

    fn set_cursor_visible(&mut self, _cursor: CursorHandle, visible: bool) {
        self.cursor_visible = visible;
    }

    fn bind_cursor(&mut self, pointer: IndevHandle, _cursor: CursorHandle) {
        self.bound.insert(pointer);
    }

    fn create_group(&mut self) -> Option<GroupHandle> {
        if self.group_fail {
            return None;
        }
        self.groups_created += 1;
        Some(GroupHandle(100 + self.groups_created))
    }

    fn set_group(&mut self, keypad: IndevHandle, group: GroupHandle) {
        assert_eq!(self.live.get(&keypad), Some(&IndevKind::Keypad));
        self.grouped.insert(keypad, group);
    }
}

// ============================================================================
// Fake keymap
// ============================================================================

/// Letters a/A with Shift tracking
#[derive(Default)]
struct FakeKeyState {
    shift: bool,
}

impl KeyState for FakeKeyState {
    fn key_get_utf8(&self, keycode: u32) -> String {
        match (keycode, self.shift) {
            (KEY_A, false) => "a".into(),
            (KEY_A, true) => "A".into(),
            _ => String::new(),
        }
    }

    fn update_key(&mut self, keycode: u32, pressed: bool) {
        if keycode == KEY_LEFTSHIFT || keycode == KEY_RIGHTSHIFT {
            self.shift = pressed;
        }
    }
}

struct FakeKeymap;

impl Keymap for FakeKeymap {
    fn new_state(&self) -> Option<Box<dyn KeyState>> {
        Some(Box::new(FakeKeyState::default()))
    }
}

#[derive(Default)]
struct FakeRegistrar {
    registered: Vec<(RawFd, ReadySource)>,
    fail: Option<ReadySource>,
}

impl PollRegistrar for FakeRegistrar {
    fn register(&mut self, fd: RawFd, source: ReadySource) -> io::Result<()> {
        if self.fail == Some(source) {
            return Err(io::Error::new(io::ErrorKind::Other, "poller refused fd"));
        }
        self.registered.push((fd, source));
        Ok(())
    }
}

// ============================================================================
// World
// ============================================================================

type TestSubsystem = Subsystem<FakeSource, FakeMonitor, FakeSink>;

/// udev properties: ID_INPUT plus the given class flags
fn props(flags: &[&str]) -> Properties {
    std::iter::once("ID_INPUT")
        .chain(flags.iter().copied())
        .map(|name| (name.to_string(), "1".to_string()))
        .collect()
}

fn info(node: &str, keyboard: bool, pointer: bool, touch_count: Option<i32>) -> DeviceInfo {
    DeviceInfo {
        sysname: sysname(node),
        name: format!("test {}", sysname(node)),
        keyboard,
        pointer,
        touch: touch_count.is_some(),
        touch_count: touch_count.unwrap_or(-1),
    }
}

fn sysname(node: &str) -> String {
    node.rsplit('/').next().unwrap_or(node).to_string()
}

fn keyboard(node: &str) -> (Properties, DeviceInfo) {
    (
        props(&["ID_INPUT_KEY", "ID_INPUT_KEYBOARD"]),
        info(node, true, false, None),
    )
}

fn mouse(node: &str) -> (Properties, DeviceInfo) {
    (props(&["ID_INPUT_MOUSE"]), info(node, false, true, None))
}

fn touchpad(node: &str) -> (Properties, DeviceInfo) {
    (props(&["ID_INPUT_TOUCHPAD"]), info(node, false, true, None))
}

fn touchscreen(node: &str, contacts: i32) -> (Properties, DeviceInfo) {
    (
        props(&["ID_INPUT_TOUCHSCREEN"]),
        info(node, false, false, Some(contacts)),
    )
}

fn power_button(node: &str) -> (Properties, DeviceInfo) {
    (props(&["ID_INPUT_KEY"]), info(node, true, false, None))
}

#[derive(Default)]
struct World {
    source: Rc<RefCell<SourceState>>,
    monitor: Rc<RefCell<MonitorState>>,
}

impl World {
    fn new() -> Self {
        Self::default()
    }

    fn register(&self, node: &str, (properties, info): (Properties, DeviceInfo)) -> Properties {
        self.source
            .borrow_mut()
            .devices
            .insert(PathBuf::from(node), info);
        self.monitor
            .borrow_mut()
            .by_sysname
            .insert(sysname(node), properties.clone());
        properties
    }

    /// Device present at start-up
    fn present(&self, node: &str, device: (Properties, DeviceInfo)) {
        let properties = self.register(node, device);
        self.monitor
            .borrow_mut()
            .present
            .push((PathBuf::from(node), properties));
    }

    /// Queue a hotplug add
    fn plug(&self, node: &str, device: (Properties, DeviceInfo)) {
        let properties = self.register(node, device);
        self.monitor
            .borrow_mut()
            .notifications
            .push_back(Notification {
                action: HotplugAction::Add,
                node: PathBuf::from(node),
                properties,
            });
    }

    /// Queue a hotplug remove; the node is gone from then on
    fn unplug(&self, node: &str) {
        self.source.borrow_mut().devices.remove(Path::new(node));
        self.monitor
            .borrow_mut()
            .notifications
            .push_back(Notification {
                action: HotplugAction::Remove,
                node: PathBuf::from(node),
                properties: Vec::new(),
            });
    }

    /// Queue a raw event from the device behind `node`
    fn emit(&self, node: &str, event: impl FnOnce(DeviceId) -> RawEvent) {
        let mut state = self.source.borrow_mut();
        let device = state.id_of(node);
        state.queue.push_back(event(device));
    }

    fn start(&self) -> TestSubsystem {
        self.start_with(
            FakeSink::new(),
            &SubsystemOptions {
                filter: CapabilityFilter::all(),
                keymap: Some(KeymapSpec::default()),
            },
        )
        .expect("init")
    }

    fn start_with(&self, sink: FakeSink, options: &SubsystemOptions) -> Result<TestSubsystem> {
        let mut registrar = FakeRegistrar::default();
        self.start_full(sink, options, &mut registrar)
    }

    fn start_full(
        &self,
        sink: FakeSink,
        options: &SubsystemOptions,
        registrar: &mut FakeRegistrar,
    ) -> Result<TestSubsystem> {
        Subsystem::init_with(
            FakeSource(self.source.clone()),
            FakeMonitor(self.monitor.clone()),
            sink,
            registrar,
            options,
            |_spec| Ok(Box::new(FakeKeymap) as Box<dyn Keymap>),
        )
    }
}

fn pointer(x: i32, y: i32, state: IndevState) -> IndevData {
    IndevData::Pointer {
        point: Point { x, y },
        state,
    }
}

fn key(key: KeyCode, state: IndevState) -> IndevData {
    IndevData::Key { key, state }
}

// ============================================================================
// Start-up
// ============================================================================

#[test]
fn test_init_connects_present_devices() {
    let world = World::new();
    world.present("/dev/input/event0", keyboard("/dev/input/event0"));
    world.present("/dev/input/event1", mouse("/dev/input/event1"));
    world.present("/dev/input/event2", touchscreen("/dev/input/event2", 10));
    // Not an input device at all
    world.present("/dev/input/event3", (Vec::new(), DeviceInfo::default()));

    let mut registrar = FakeRegistrar::default();
    let subsystem = world
        .start_full(FakeSink::new(), &SubsystemOptions::default(), &mut registrar)
        .unwrap();

    assert_eq!(subsystem.registered_sources(), 2);
    assert_eq!(
        registrar.registered,
        vec![(10, ReadySource::InputEvents), (11, ReadySource::Hotplug)]
    );
    assert_eq!(subsystem.devices().count(), 3);
    assert!(subsystem.is_keyboard_connected());
    assert_eq!(subsystem.counts().mice, 1);
    assert!(subsystem.is_cursor_visible());

    // Unsupported node never reached libinput
    let add_calls = world.source.borrow().add_calls.clone();
    assert!(!add_calls.contains(&PathBuf::from("/dev/input/event3")));
}

#[test]
fn test_keymap_failure_fails_init() {
    let world = World::new();
    world.present("/dev/input/event0", keyboard("/dev/input/event0"));

    let result = Subsystem::init_with(
        FakeSource(world.source.clone()),
        FakeMonitor(world.monitor.clone()),
        FakeSink::new(),
        &mut FakeRegistrar::default(),
        &SubsystemOptions {
            filter: CapabilityFilter::all(),
            keymap: Some(KeymapSpec {
                layout: "no-such-layout".into(),
                ..Default::default()
            }),
        },
        |spec| Err(InputError::Keymap(spec.layout.clone())),
    );

    assert!(matches!(result, Err(InputError::Keymap(_))));
    assert!(world.source.borrow().add_calls.is_empty());
}

#[test]
fn test_input_registration_failure_is_fatal() {
    let world = World::new();
    let mut registrar = FakeRegistrar {
        fail: Some(ReadySource::InputEvents),
        ..Default::default()
    };
    let result = world.start_full(FakeSink::new(), &SubsystemOptions::default(), &mut registrar);
    assert!(matches!(result, Err(InputError::Register { .. })));
}

#[test]
fn test_hotplug_registration_failure_is_degraded() {
    let world = World::new();
    world.present("/dev/input/event0", keyboard("/dev/input/event0"));
    let mut registrar = FakeRegistrar {
        fail: Some(ReadySource::Hotplug),
        ..Default::default()
    };
    let subsystem = world
        .start_full(FakeSink::new(), &SubsystemOptions::default(), &mut registrar)
        .unwrap();
    assert_eq!(subsystem.registered_sources(), 1);
    assert!(subsystem.is_keyboard_connected());
}

#[test]
fn test_filter_excludes_categories() {
    let world = World::new();
    world.present("/dev/input/event0", keyboard("/dev/input/event0"));
    world.present("/dev/input/event1", mouse("/dev/input/event1"));
    world.present("/dev/input/event2", touchscreen("/dev/input/event2", 1));
    world.present("/dev/input/event3", power_button("/dev/input/event3"));

    let subsystem = world
        .start_with(
            FakeSink::new(),
            &SubsystemOptions {
                filter: CapabilityFilter::KEYBOARD,
                keymap: None,
            },
        )
        .unwrap();

    let mut classes: Vec<Capability> = subsystem.devices().map(|(_, class)| class).collect();
    classes.sort_by_key(|class| class.to_string());
    assert_eq!(classes, vec![Capability::BareKey, Capability::Keyboard]);
    assert_eq!(world.source.borrow().add_calls.len(), 2);
    assert!(!subsystem.is_cursor_visible());
}

#[test]
fn test_connect_rejects_unsupported() {
    let world = World::new();
    let mut subsystem = world.start();
    let result = subsystem.connect(
        Path::new("/dev/input/event7"),
        &vec![("ID_INPUT".to_string(), "0".to_string())],
    );
    assert!(matches!(result, Err(InputError::Unsupported(_))));

    // Classified, but libinput does not know the node
    let result = subsystem.connect(Path::new("/dev/input/event8"), &props(&["ID_INPUT_MOUSE"]));
    assert!(matches!(result, Err(InputError::DeviceAdd(_))));
    assert_eq!(subsystem.devices().count(), 0);
}

// ============================================================================
// Hotplug
// ============================================================================

#[test]
fn test_hotplug_add_remove_and_readd() {
    let world = World::new();
    let mut subsystem = world.start();
    assert!(!subsystem.is_keyboard_connected());

    world.plug("/dev/input/event4", keyboard("/dev/input/event4"));
    subsystem.dispatch(ReadySource::Hotplug);
    assert!(subsystem.is_keyboard_connected());
    let first = subsystem
        .keypad_handle(Path::new("/dev/input/event4"))
        .unwrap();

    world.unplug("/dev/input/event4");
    subsystem.dispatch(ReadySource::Hotplug);
    assert!(!subsystem.is_keyboard_connected());
    assert_eq!(subsystem.devices().count(), 0);
    assert!(subsystem.sink().live.is_empty());

    world.plug("/dev/input/event4", keyboard("/dev/input/event4"));
    subsystem.dispatch(ReadySource::Hotplug);
    let second = subsystem
        .keypad_handle(Path::new("/dev/input/event4"))
        .unwrap();
    assert_ne!(first, second);
    assert_eq!(subsystem.devices().count(), 1);
}

#[test]
fn test_remove_of_unknown_node_is_ignored() {
    let world = World::new();
    world.present("/dev/input/event0", mouse("/dev/input/event0"));
    let mut subsystem = world.start();

    world.unplug("/dev/input/event9");
    world.unplug("/dev/input/mouse0");
    subsystem.dispatch(ReadySource::Hotplug);
    assert_eq!(subsystem.devices().count(), 1);
}

#[test]
fn test_non_event_nodes_are_skipped() {
    let world = World::new();
    let mut subsystem = world.start();
    world.plug("/dev/input/mouse0", mouse("/dev/input/mouse0"));
    subsystem.dispatch(ReadySource::Hotplug);
    assert!(world.source.borrow().add_calls.is_empty());
}

#[test]
fn test_duplicate_add_keeps_one_record() {
    let world = World::new();
    let mut subsystem = world.start();

    world.plug("/dev/input/event0", mouse("/dev/input/event0"));
    world.plug("/dev/input/event0", mouse("/dev/input/event0"));
    subsystem.dispatch(ReadySource::Hotplug);

    assert_eq!(subsystem.devices().count(), 1);
    assert_eq!(subsystem.counts().mice, 1);
    assert_eq!(world.source.borrow().add_calls.len(), 1);

    world.unplug("/dev/input/event0");
    subsystem.dispatch(ReadySource::Hotplug);
    assert_eq!(subsystem.devices().count(), 0);
    assert_eq!(subsystem.counts().mice, 0);
    assert!(!subsystem.is_cursor_visible());
    assert!(subsystem.sink().live.is_empty());
}

#[test]
fn test_enumerated_device_seen_again_by_monitor() {
    let world = World::new();
    world.present("/dev/input/event0", keyboard("/dev/input/event0"));
    let mut subsystem = world.start();

    // The monitor was listening while the enumerator ran
    let properties = world.register("/dev/input/event0", keyboard("/dev/input/event0"));
    let result = subsystem.connect(Path::new("/dev/input/event0"), &properties);
    assert!(result.is_ok());

    assert_eq!(subsystem.devices().count(), 1);
    assert_eq!(subsystem.counts().keyboards, 1);
    assert_eq!(subsystem.sink().live.len(), 1);
}

#[test]
fn test_connect_failure_rolls_back() {
    let world = World::new();
    // Keyboard-capable touchscreen needs three indevs
    let (properties, mut device) = touchscreen("/dev/input/event0", 2);
    device.keyboard = true;
    world.present("/dev/input/event0", (properties, device));
    world.present("/dev/input/event1", mouse("/dev/input/event1"));

    let mut sink = FakeSink::new();
    sink.capacity = Some(2);
    let subsystem = world
        .start_with(sink, &SubsystemOptions::default())
        .unwrap();

    // Touchscreen failed entirely and was handed back to libinput
    let classes: Vec<Capability> = subsystem.devices().map(|(_, class)| class).collect();
    assert_eq!(classes, vec![Capability::Mouse]);
    assert_eq!(subsystem.sink().live.len(), 1);
    assert_eq!(world.source.borrow().live.len(), 1);
}

// ============================================================================
// Cursor
// ============================================================================

#[test]
fn test_cursor_follows_mice_and_touchpads() {
    let world = World::new();
    world.present("/dev/input/event0", mouse("/dev/input/event0"));
    world.present("/dev/input/event1", touchscreen("/dev/input/event1", 2));
    let mut subsystem = world.start();

    assert!(subsystem.is_cursor_visible());
    assert!(subsystem.sink().cursor_visible);
    let mouse_slot = subsystem.pointer_handles(Path::new("/dev/input/event0"))[0];
    assert!(subsystem.sink().bound.contains(&mouse_slot));
    // Touchscreen slots never carry the cursor
    for handle in subsystem.pointer_handles(Path::new("/dev/input/event1")) {
        assert!(!subsystem.sink().bound.contains(&handle));
    }

    world.unplug("/dev/input/event0");
    subsystem.dispatch(ReadySource::Hotplug);
    assert!(!subsystem.is_cursor_visible());
    assert!(!subsystem.sink().cursor_visible);

    world.plug("/dev/input/event2", touchpad("/dev/input/event2"));
    subsystem.dispatch(ReadySource::Hotplug);
    assert!(subsystem.sink().cursor_visible);
    assert_eq!(subsystem.sink().cursors_created, 1);
}

#[test]
fn test_cursor_not_created_without_pointer_devices() {
    let world = World::new();
    world.present("/dev/input/event0", keyboard("/dev/input/event0"));
    let subsystem = world.start();
    assert_eq!(subsystem.sink().cursors_created, 0);
}

// ============================================================================
// Pointer events
// ============================================================================

#[test]
fn test_relative_motion_clamps() {
    let world = World::new();
    world.present("/dev/input/event0", mouse("/dev/input/event0"));
    let mut subsystem = world.start();
    let slot = subsystem.pointer_handles(Path::new("/dev/input/event0"))[0];

    // Initial state is read when the cursor is attached
    assert_eq!(
        subsystem.sink_mut().take_reads(),
        vec![(slot, pointer(400, 240, IndevState::Released))]
    );

    world.emit("/dev/input/event0", |device| RawEvent::PointerMotion {
        device,
        dx: 10.7,
        dy: -5.2,
    });
    world.emit("/dev/input/event0", |device| RawEvent::PointerMotion {
        device,
        dx: -5000.0,
        dy: 5000.0,
    });
    world.emit("/dev/input/event0", |device| RawEvent::PointerButton {
        device,
        pressed: true,
    });
    subsystem.dispatch(ReadySource::InputEvents);

    assert_eq!(
        subsystem.sink_mut().take_reads(),
        vec![
            (slot, pointer(410, 235, IndevState::Released)),
            (slot, pointer(0, 479, IndevState::Released)),
            (slot, pointer(0, 479, IndevState::Pressed)),
        ]
    );
    assert_eq!(
        subsystem.current_state(slot),
        Some(pointer(0, 479, IndevState::Pressed))
    );
}

#[test]
fn test_absolute_out_of_bounds_is_dropped() {
    let world = World::new();
    world.present("/dev/input/event0", touchscreen("/dev/input/event0", 1));
    let mut sink = FakeSink::new();
    sink.viewport = Viewport {
        hor_res: 800,
        ver_res: 480,
        physical_hor_res: 1000,
        physical_ver_res: 480,
        offset_x: 100,
        offset_y: 0,
    };
    let mut subsystem = world.start_with(sink, &SubsystemOptions::default()).unwrap();
    let slot = subsystem.pointer_handles(Path::new("/dev/input/event0"))[0];

    // Left margin of the physical panel: outside the visible area
    world.emit("/dev/input/event0", |device| RawEvent::TouchDown {
        device,
        slot: -1,
        x: 0.05,
        y: 0.5,
    });
    subsystem.dispatch(ReadySource::InputEvents);
    assert!(subsystem.sink_mut().take_reads().is_empty());
    assert_eq!(
        subsystem.current_state(slot),
        Some(pointer(400, 240, IndevState::Released))
    );

    world.emit("/dev/input/event0", |device| RawEvent::TouchDown {
        device,
        slot: -1,
        x: 0.5,
        y: 0.5,
    });
    subsystem.dispatch(ReadySource::InputEvents);
    assert_eq!(
        subsystem.sink_mut().take_reads(),
        vec![(slot, pointer(400, 240, IndevState::Pressed))]
    );
}

#[test]
fn test_single_touch_has_one_slot() {
    let world = World::new();
    world.present("/dev/input/event0", touchscreen("/dev/input/event0", 1));
    world.present("/dev/input/event1", touchscreen("/dev/input/event1", 0));
    let subsystem = world.start();
    assert_eq!(
        subsystem
            .pointer_handles(Path::new("/dev/input/event0"))
            .len(),
        1
    );
    // Unknown contact count gets both slots
    assert_eq!(
        subsystem
            .pointer_handles(Path::new("/dev/input/event1"))
            .len(),
        2
    );
}

#[test]
fn test_two_finger_touch() {
    let world = World::new();
    world.present("/dev/input/event0", touchscreen("/dev/input/event0", 10));
    let mut subsystem = world.start();
    let slots = subsystem.pointer_handles(Path::new("/dev/input/event0"));
    assert_eq!(slots.len(), 2);
    let (first, second) = if slots[0].0 < slots[1].0 {
        (slots[0], slots[1])
    } else {
        (slots[1], slots[0])
    };

    world.emit("/dev/input/event0", |device| RawEvent::TouchDown {
        device,
        slot: 0,
        x: 0.25,
        y: 0.5,
    });
    world.emit("/dev/input/event0", |device| RawEvent::TouchDown {
        device,
        slot: 1,
        x: 0.75,
        y: 0.5,
    });
    // Third contact is not tracked
    world.emit("/dev/input/event0", |device| RawEvent::TouchDown {
        device,
        slot: 2,
        x: 0.5,
        y: 0.1,
    });
    subsystem.dispatch(ReadySource::InputEvents);

    assert_eq!(
        subsystem.sink_mut().take_reads(),
        vec![
            (first, pointer(200, 240, IndevState::Pressed)),
            (second, pointer(600, 240, IndevState::Pressed)),
        ]
    );

    world.emit("/dev/input/event0", |device| RawEvent::TouchMotion {
        device,
        slot: 1,
        x: 0.5,
        y: 0.25,
    });
    world.emit("/dev/input/event0", |device| RawEvent::TouchUp { device, slot: 0 });
    subsystem.dispatch(ReadySource::InputEvents);

    assert_eq!(
        subsystem.sink_mut().take_reads(),
        vec![
            (second, pointer(400, 120, IndevState::Pressed)),
            (first, pointer(200, 240, IndevState::Released)),
        ]
    );
    assert_eq!(
        subsystem.current_state(second),
        Some(pointer(400, 120, IndevState::Pressed))
    );
}

#[test]
fn test_events_for_unknown_devices_are_ignored() {
    let world = World::new();
    world.present("/dev/input/event0", keyboard("/dev/input/event0"));
    let mut subsystem = world.start();

    // Keyboard has no pointer slot
    world.emit("/dev/input/event0", |device| RawEvent::PointerMotion {
        device,
        dx: 1.0,
        dy: 1.0,
    });
    world
        .source
        .borrow_mut()
        .queue
        .push_back(RawEvent::PointerButton {
            device: DeviceId(999),
            pressed: true,
        });
    subsystem.dispatch(ReadySource::InputEvents);
    assert!(subsystem.sink_mut().take_reads().is_empty());
}

// ============================================================================
// Keys
// ============================================================================

#[test]
fn test_keyboard_text_and_modifiers() {
    let world = World::new();
    world.present("/dev/input/event0", keyboard("/dev/input/event0"));
    let mut subsystem = world.start();
    let keypad = subsystem
        .keypad_handle(Path::new("/dev/input/event0"))
        .unwrap();

    for (code, pressed) in [
        (KEY_A, true),
        (KEY_A, false),
        (KEY_LEFTSHIFT, true),
        (KEY_A, true),
        (KEY_LEFTSHIFT, false),
        (KEY_ENTER, true),
    ] {
        world.emit("/dev/input/event0", |device| RawEvent::KeyboardKey {
            device,
            key: code,
            pressed,
        });
    }
    subsystem.dispatch(ReadySource::InputEvents);

    assert_eq!(
        subsystem.sink_mut().take_reads(),
        vec![
            (keypad, key(KeyCode::Text("a".into()), IndevState::Pressed)),
            (keypad, key(KeyCode::Text("a".into()), IndevState::Released)),
            (keypad, key(KeyCode::Text("A".into()), IndevState::Pressed)),
            (keypad, key(KeyCode::Enter, IndevState::Pressed)),
        ]
    );
}

#[test]
fn test_bare_key_device_has_no_text() {
    let world = World::new();
    world.present("/dev/input/event0", power_button("/dev/input/event0"));
    let mut subsystem = world.start();
    assert!(!subsystem.is_keyboard_connected());
    let keypad = subsystem
        .keypad_handle(Path::new("/dev/input/event0"))
        .unwrap();

    world.emit("/dev/input/event0", |device| RawEvent::KeyboardKey {
        device,
        key: KEY_A,
        pressed: true,
    });
    world.emit("/dev/input/event0", |device| RawEvent::KeyboardKey {
        device,
        key: KEY_ENTER,
        pressed: true,
    });
    subsystem.dispatch(ReadySource::InputEvents);

    assert_eq!(
        subsystem.sink_mut().take_reads(),
        vec![(keypad, key(KeyCode::Enter, IndevState::Pressed))]
    );
}

#[test]
fn test_power_key_fires_callback_once() {
    let world = World::new();
    world.present("/dev/input/event0", power_button("/dev/input/event0"));
    let mut subsystem = world.start();

    let presses = Rc::new(Cell::new(0));
    let counter = presses.clone();
    subsystem.set_power_key_callback(move || counter.set(counter.get() + 1));

    world.emit("/dev/input/event0", |device| RawEvent::KeyboardKey {
        device,
        key: KEY_POWER,
        pressed: true,
    });
    world.emit("/dev/input/event0", |device| RawEvent::KeyboardKey {
        device,
        key: KEY_POWER,
        pressed: false,
    });
    subsystem.dispatch(ReadySource::InputEvents);

    assert_eq!(presses.get(), 1);
    assert!(subsystem.sink_mut().take_reads().is_empty());
}

#[test]
fn test_keyboard_without_keymap_only_navigates() {
    let world = World::new();
    world.present("/dev/input/event0", keyboard("/dev/input/event0"));
    let mut subsystem = world
        .start_with(
            FakeSink::new(),
            &SubsystemOptions {
                filter: CapabilityFilter::all(),
                keymap: None,
            },
        )
        .unwrap();
    let keypad = subsystem
        .keypad_handle(Path::new("/dev/input/event0"))
        .unwrap();

    world.emit("/dev/input/event0", |device| RawEvent::KeyboardKey {
        device,
        key: KEY_A,
        pressed: true,
    });
    world.emit("/dev/input/event0", |device| RawEvent::KeyboardKey {
        device,
        key: KEY_ENTER,
        pressed: false,
    });
    subsystem.dispatch(ReadySource::InputEvents);

    assert_eq!(
        subsystem.sink_mut().take_reads(),
        vec![(keypad, key(KeyCode::Enter, IndevState::Released))]
    );
}

// ============================================================================
// Keyboard input group
// ============================================================================

#[test]
fn test_keypads_join_input_group() {
    let world = World::new();
    world.present("/dev/input/event0", keyboard("/dev/input/event0"));
    world.present("/dev/input/event1", power_button("/dev/input/event1"));
    world.present("/dev/input/event2", mouse("/dev/input/event2"));
    let mut subsystem = world.start();
    let group = subsystem.keyboard_input_group();
    assert_eq!(subsystem.sink().groups_created, 1);

    world.plug("/dev/input/event3", keyboard("/dev/input/event3"));
    subsystem.dispatch(ReadySource::Hotplug);

    for node in ["/dev/input/event0", "/dev/input/event1", "/dev/input/event3"] {
        let keypad = subsystem.keypad_handle(Path::new(node)).unwrap();
        assert_eq!(subsystem.sink().grouped.get(&keypad), Some(&group));
    }
    // Pointers stay out of the group
    let mouse_slot = subsystem.pointer_handles(Path::new("/dev/input/event2"))[0];
    assert!(!subsystem.sink().grouped.contains_key(&mouse_slot));
    assert_eq!(subsystem.sink().grouped.len(), 3);
}

#[test]
fn test_host_group_replaces_input_group() {
    let world = World::new();
    world.present("/dev/input/event0", keyboard("/dev/input/event0"));
    let mut subsystem = world.start();

    let host = GroupHandle(7);
    subsystem.set_keyboard_input_group(host);
    assert_eq!(subsystem.keyboard_input_group(), host);

    world.plug("/dev/input/event1", power_button("/dev/input/event1"));
    subsystem.dispatch(ReadySource::Hotplug);

    for node in ["/dev/input/event0", "/dev/input/event1"] {
        let keypad = subsystem.keypad_handle(Path::new(node)).unwrap();
        assert_eq!(subsystem.sink().grouped.get(&keypad), Some(&host));
    }
}

#[test]
fn test_group_failure_fails_init() {
    let world = World::new();
    world.present("/dev/input/event0", keyboard("/dev/input/event0"));
    let mut sink = FakeSink::new();
    sink.group_fail = true;

    let result = world.start_with(sink, &SubsystemOptions::default());
    assert!(matches!(result, Err(InputError::Group)));
    assert!(world.source.borrow().add_calls.is_empty());
}

// ============================================================================
// Suspend / resume
// ============================================================================

#[test]
fn test_suspend_is_idempotent() {
    let world = World::new();
    let mut subsystem = world.start();

    subsystem.suspend();
    subsystem.suspend();
    assert!(subsystem.is_suspended());
    assert_eq!(world.source.borrow().suspend_calls, 1);

    subsystem.resume().unwrap();
    subsystem.resume().unwrap();
    assert!(!subsystem.is_suspended());
}

#[test]
fn test_hotplug_while_suspended_resuspends() {
    let world = World::new();
    let mut subsystem = world.start();
    subsystem.suspend();

    world.plug("/dev/input/event0", keyboard("/dev/input/event0"));
    subsystem.dispatch(ReadySource::Hotplug);

    assert_eq!(world.source.borrow().suspend_calls, 2);
    assert!(subsystem.is_suspended());
    // The device is connected even though libinput dropped it again
    assert!(subsystem.is_keyboard_connected());
    assert_eq!(subsystem.devices().count(), 1);
    let keypad = subsystem
        .keypad_handle(Path::new("/dev/input/event0"))
        .unwrap();

    subsystem.resume().unwrap();
    assert_eq!(
        subsystem.keypad_handle(Path::new("/dev/input/event0")),
        Some(keypad)
    );
    world.emit("/dev/input/event0", |device| RawEvent::KeyboardKey {
        device,
        key: KEY_ENTER,
        pressed: true,
    });
    subsystem.dispatch(ReadySource::InputEvents);
    assert_eq!(
        subsystem.sink_mut().take_reads(),
        vec![(keypad, key(KeyCode::Enter, IndevState::Pressed))]
    );
}

#[test]
fn test_records_survive_suspend() {
    let world = World::new();
    world.present("/dev/input/event0", keyboard("/dev/input/event0"));
    world.present("/dev/input/event1", mouse("/dev/input/event1"));
    let mut subsystem = world.start();
    let keypad = subsystem
        .keypad_handle(Path::new("/dev/input/event0"))
        .unwrap();
    let mouse_slot = subsystem.pointer_handles(Path::new("/dev/input/event1"))[0];
    let counts = subsystem.counts();
    subsystem.sink_mut().take_reads();

    subsystem.suspend();
    subsystem.dispatch(ReadySource::InputEvents);
    assert_eq!(subsystem.devices().count(), 2);
    assert_eq!(subsystem.counts(), counts);
    assert!(subsystem.is_keyboard_connected());
    assert!(subsystem.is_cursor_visible());
    assert_eq!(subsystem.sink().live.len(), 2);

    // Re-announced devices are matched by node, not classified again
    world.monitor.borrow_mut().by_sysname.clear();
    subsystem.resume().unwrap();

    assert_eq!(subsystem.devices().count(), 2);
    assert_eq!(subsystem.counts(), counts);
    assert_eq!(
        subsystem.keypad_handle(Path::new("/dev/input/event0")),
        Some(keypad)
    );
    assert_eq!(
        subsystem.pointer_handles(Path::new("/dev/input/event1")),
        vec![mouse_slot]
    );
    assert_eq!(subsystem.sink().cursors_created, 1);

    // Events from the new libinput ids reach the same slots
    world.emit("/dev/input/event1", |device| RawEvent::PointerButton {
        device,
        pressed: true,
    });
    subsystem.dispatch(ReadySource::InputEvents);
    assert_eq!(
        subsystem.sink_mut().take_reads(),
        vec![(mouse_slot, pointer(400, 240, IndevState::Pressed))]
    );
}

#[test]
fn test_unplug_while_suspended() {
    let world = World::new();
    world.present("/dev/input/event0", keyboard("/dev/input/event0"));
    world.present("/dev/input/event1", mouse("/dev/input/event1"));
    let mut subsystem = world.start();
    subsystem.suspend();

    world.unplug("/dev/input/event1");
    subsystem.dispatch(ReadySource::Hotplug);
    assert_eq!(subsystem.counts().mice, 0);
    assert!(!subsystem.is_cursor_visible());
    assert_eq!(subsystem.devices().count(), 1);

    subsystem.resume().unwrap();
    let classes: Vec<Capability> = subsystem.devices().map(|(_, class)| class).collect();
    assert_eq!(classes, vec![Capability::Keyboard]);
    assert_eq!(subsystem.sink().live.len(), 1);
}

#[test]
fn test_device_missing_after_resume_is_dropped() {
    let world = World::new();
    world.present("/dev/input/event0", keyboard("/dev/input/event0"));
    world.present("/dev/input/event1", mouse("/dev/input/event1"));
    let mut subsystem = world.start();
    subsystem.suspend();

    // Gone without a udev notification
    world
        .source
        .borrow_mut()
        .parked
        .retain(|node| node.as_path() != Path::new("/dev/input/event1"));
    subsystem.resume().unwrap();

    assert_eq!(subsystem.devices().count(), 1);
    assert_eq!(subsystem.counts().mice, 0);
    assert!(!subsystem.is_cursor_visible());
    assert_eq!(subsystem.sink().live.len(), 1);
}
