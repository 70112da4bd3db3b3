//! Input device subsystem
//!
//! Ties the pieces together: devices found at start-up or hotplugged are
//! classified, added to libinput, and turned into `DeviceRecord`s when
//! libinput announces them. Raw events are then routed to the owning record
//! and delivered to the UI input sink.
//!
//! Everything runs on the host's thread. Both entry points (`dispatch` for
//! each ready descriptor) drain what is pending and return without blocking.
//!
//! libinput drops its devices on suspend and announces them again, under new
//! ids, on resume. Records outlive that: they are parked by node while the
//! subsystem is suspended and picked up again when their node comes back.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::{debug, error, info, warn};

use super::classify::{classify, Capability, CapabilityFilter};
use super::cursor::CursorManager;
use super::event::{DeviceId, DeviceInfo, EventSource, RawEvent};
use super::hotplug::{is_event_node, DeviceMonitor, HotplugAction, Properties, UdevMonitor};
use super::keyboard::{Keymap, KeymapSpec, Translator, XkbKeymap};
use super::libinput::LibinputSource;
use super::poll::{PollRegistrar, ReadySource};
use super::record::{DeviceRecord, RecordBuilder};
use super::sink::{GroupHandle, IndevData, IndevHandle, IndevState, InputSink};
use crate::error::{InputError, Result};

/// Start-up options
#[derive(Debug, Clone, Default)]
pub struct SubsystemOptions {
    /// Device categories allowed to connect
    pub filter: CapabilityFilter,
    /// Hardware keyboard keymap; None disables text translation
    pub keymap: Option<KeymapSpec>,
}

/// Live device counts by class
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceCounts {
    pub keyboards: usize,
    pub mice: usize,
    pub touchpads: usize,
}

impl DeviceCounts {
    fn adjust(&mut self, capability: Capability, connected: bool) {
        let counter = match capability {
            Capability::Keyboard => &mut self.keyboards,
            Capability::Mouse => &mut self.mice,
            Capability::Touchpad => &mut self.touchpads,
            _ => return,
        };
        if connected {
            *counter += 1;
        } else {
            debug_assert!(*counter > 0, "{} count underflow", capability);
            *counter = counter.saturating_sub(1);
        }
    }
}

/// Input device subsystem
pub struct Subsystem<S: EventSource, M: DeviceMonitor, K: InputSink> {
    source: S,
    monitor: M,
    sink: K,
    filter: CapabilityFilter,
    keymap: Option<Box<dyn Keymap>>,
    translator: Translator,
    cursor: CursorManager,
    records: HashMap<DeviceId, DeviceRecord>,
    /// Records whose libinput device went away with a suspend, by node
    parked: HashMap<PathBuf, DeviceRecord>,
    /// Devices added to the source whose `DeviceAdded` is not processed yet
    pending: HashMap<DeviceId, (PathBuf, Capability)>,
    /// Focus group every keypad joins
    group: GroupHandle,
    /// Failure of the most recent record build, for `connect`
    last_failure: Option<(DeviceId, InputError)>,
    counts: DeviceCounts,
    suspended: bool,
    registered: usize,
}

impl<K: InputSink> Subsystem<LibinputSource, UdevMonitor, K> {
    /// Create the libinput and udev backends and start the subsystem
    pub fn open(
        sink: K,
        registrar: &mut dyn PollRegistrar,
        options: &SubsystemOptions,
    ) -> Result<Self> {
        let source = LibinputSource::new().map_err(|e| {
            error!("{}", e);
            e
        })?;
        let monitor = UdevMonitor::new().map_err(|e| {
            error!("{}", e);
            e
        })?;
        Self::init(source, monitor, sink, registrar, options)
    }
}

impl<S: EventSource, M: DeviceMonitor, K: InputSink> Subsystem<S, M, K> {
    /// Start the subsystem on the given backends
    ///
    /// Compiles the keymap (if requested), creates the keyboard input group,
    /// registers both descriptors with the host poller and connects the
    /// devices that are already present.
    pub fn init(
        source: S,
        monitor: M,
        sink: K,
        registrar: &mut dyn PollRegistrar,
        options: &SubsystemOptions,
    ) -> Result<Self> {
        Self::init_with(source, monitor, sink, registrar, options, |spec| {
            Ok(Box::new(XkbKeymap::compile(spec)?))
        })
    }

    /// Like `init`, with a custom keymap compiler
    pub fn init_with<F>(
        source: S,
        monitor: M,
        sink: K,
        registrar: &mut dyn PollRegistrar,
        options: &SubsystemOptions,
        compile: F,
    ) -> Result<Self>
    where
        F: FnOnce(&KeymapSpec) -> Result<Box<dyn Keymap>>,
    {
        let keymap = match &options.keymap {
            Some(spec) => match compile(spec) {
                Ok(keymap) => Some(keymap),
                Err(e) => {
                    error!("{}", e);
                    return Err(e);
                }
            },
            None => None,
        };

        let mut sink = sink;
        let Some(group) = sink.create_group() else {
            error!("{}", InputError::Group);
            return Err(InputError::Group);
        };

        let mut subsystem = Self {
            source,
            monitor,
            sink,
            filter: options.filter,
            keymap,
            translator: Translator::default(),
            cursor: CursorManager::new(),
            records: HashMap::new(),
            parked: HashMap::new(),
            pending: HashMap::new(),
            group,
            last_failure: None,
            counts: DeviceCounts::default(),
            suspended: false,
            registered: 0,
        };

        registrar
            .register(subsystem.source.as_raw_fd(), ReadySource::InputEvents)
            .map_err(|source| {
                error!("Registering the libinput descriptor failed: {}", source);
                InputError::Register {
                    what: "libinput context",
                    source,
                }
            })?;
        subsystem.registered += 1;

        match registrar.register(subsystem.monitor.as_raw_fd(), ReadySource::Hotplug) {
            Ok(()) => subsystem.registered += 1,
            Err(e) => warn!("Registering the udev monitor failed, hotplug disabled: {}", e),
        }

        subsystem.attach_present_devices();

        info!(
            "Input subsystem ready: {} devices ({} keyboards, {} mice, {} touchpads)",
            subsystem.records.len(),
            subsystem.counts.keyboards,
            subsystem.counts.mice,
            subsystem.counts.touchpads
        );
        Ok(subsystem)
    }

    /// Number of descriptors registered with the host poller
    pub fn registered_sources(&self) -> usize {
        self.registered
    }

    /// Handle a readable descriptor
    pub fn dispatch(&mut self, ready: ReadySource) {
        match ready {
            ReadySource::InputEvents => self.process_events(),
            ReadySource::Hotplug => self.process_hotplug(),
        }
    }

    // ------------------------------------------------------------------------
    // Device record pool
    // ------------------------------------------------------------------------

    /// Classify a device node and connect it
    ///
    /// A node that already has a record (or an add in flight) is left alone.
    pub fn connect(&mut self, node: &Path, properties: &Properties) -> Result<()> {
        if self.is_node_known(node) {
            debug!("{} is already connected", node.display());
            return Ok(());
        }

        let capability = classify(properties.iter().map(|(name, value)| (name, value)));
        if !capability.is_allowed(self.filter) {
            if capability != Capability::Unsupported {
                debug!("{} {} is ignored", capability, node.display());
            }
            return Err(InputError::Unsupported(node.to_path_buf()));
        }

        let Some(device) = self.source.add_device(node) else {
            warn!("libinput can't use {}", node.display());
            return Err(InputError::DeviceAdd(node.to_path_buf()));
        };
        self.pending.insert(device, (node.to_path_buf(), capability));

        // Process DeviceAdded immediately
        self.process_events();

        if self.records.contains_key(&device) || self.pending.contains_key(&device) {
            return Ok(());
        }
        match self.last_failure.take() {
            Some((failed, e)) if failed == device => Err(e),
            _ => Err(InputError::NoUsableSlot(node.display().to_string())),
        }
    }

    /// Disconnect the device behind a node, if connected
    pub fn disconnect(&mut self, node: &Path) {
        if let Some(record) = self.parked.remove(node) {
            self.drop_record(record);
        }

        let ids: Vec<DeviceId> = self
            .records
            .values()
            .filter(|record| record.node == node)
            .map(|record| record.id)
            .chain(
                self.pending
                    .iter()
                    .filter(|(_, (pending_node, _))| pending_node == node)
                    .map(|(id, _)| *id),
            )
            .collect();

        if ids.is_empty() {
            return;
        }
        for id in ids {
            self.pending.remove(&id);
            if let Some(record) = self.records.remove(&id) {
                self.drop_record(record);
            }
            self.source.remove_device(id);
        }
        self.process_events();
    }

    fn is_node_known(&self, node: &Path) -> bool {
        self.parked.contains_key(node)
            || self.records.values().any(|record| record.node == node)
            || self.pending.values().any(|(pending, _)| pending == node)
    }

    /// Build the record for a device libinput just announced
    fn on_device_added(&mut self, device: DeviceId, info: DeviceInfo) {
        let (node, capability) = match self.pending.remove(&device) {
            Some(pending) => pending,
            None => {
                let node = Path::new("/dev/input").join(&info.sysname);
                if let Some(mut record) = self.parked.remove(&node) {
                    debug!("{} is back (id={})", node.display(), device.0);
                    record.id = device;
                    self.records.insert(device, record);
                    return;
                }

                // Announced without a connect: classify from udev
                let capability = self
                    .monitor
                    .properties(&info.sysname)
                    .map(|props| classify(props.iter().map(|(name, value)| (name, value))))
                    .unwrap_or(Capability::Unsupported);
                if !capability.is_allowed(self.filter) {
                    debug!("{} {} is ignored", capability, node.display());
                    self.source.remove_device(device);
                    return;
                }
                (node, capability)
            }
        };

        match self.build_record(device, node, &info, capability) {
            Ok(record) => self.register_record(record),
            Err(e) => {
                warn!("{}: {}", info.sysname, e);
                self.source.remove_device(device);
                self.last_failure = Some((device, e));
            }
        }
    }

    fn build_record(
        &mut self,
        device: DeviceId,
        node: PathBuf,
        info: &DeviceInfo,
        capability: Capability,
    ) -> Result<DeviceRecord> {
        let center = self.sink.viewport().center();
        let mut builder =
            RecordBuilder::new(&mut self.sink, device, node, info.name.clone(), capability);

        if info.keyboard {
            builder.add_keyboard(self.group)?;
            if capability == Capability::Keyboard {
                if let Some(keymap) = &self.keymap {
                    match keymap.new_state() {
                        Some(state) => builder.attach_key_state(state),
                        None => warn!("Can't create xkb state for {}", info.sysname),
                    }
                }
            }
        }

        if info.pointer || info.touch {
            builder.add_pointer(0, center)?;
            // Second finger for two-thumb typing
            if info.touch && info.touch_count != 1 {
                builder.add_pointer(1, center)?;
            }
        }

        builder.finish()
    }

    fn register_record(&mut self, record: DeviceRecord) {
        let capability = record.capability;
        self.counts.adjust(capability, true);
        self.cursor
            .update_visibility(&mut self.sink, self.counts.mice, self.counts.touchpads);

        if capability.shows_cursor() {
            if let Some(slot) = record.pointers[0].as_ref() {
                self.sink.read(slot.handle, &slot.data());
                if let Some(cursor) = self.cursor.handle() {
                    self.sink.bind_cursor(slot.handle, cursor);
                }
            }
        }

        info!(
            "New input device: {} ({}, {})",
            record.name,
            capability,
            record.node.display()
        );
        self.records.insert(record.id, record);
    }

    fn on_device_removed(&mut self, device: DeviceId) {
        self.pending.remove(&device);
        let Some(record) = self.records.remove(&device) else {
            return;
        };

        if self.suspended {
            debug!("Parking {} while suspended", record.node.display());
            self.parked.insert(record.node.clone(), record);
            return;
        }
        self.drop_record(record);
    }

    /// Tear a record down and update counters and cursor
    fn drop_record(&mut self, record: DeviceRecord) {
        let capability = record.capability;
        info!("Input device removed: {} ({})", record.name, record.node.display());
        record.release(&mut self.sink);

        self.counts.adjust(capability, false);
        self.cursor
            .update_visibility(&mut self.sink, self.counts.mice, self.counts.touchpads);
    }

    // ------------------------------------------------------------------------
    // Enumeration and hotplug
    // ------------------------------------------------------------------------

    fn attach_present_devices(&mut self) {
        let devices = self.monitor.enumerate();
        debug!("Enumerated {} input nodes", devices.len());
        for (node, properties) in devices {
            if let Err(e) = self.connect(&node, &properties) {
                debug!("{}: not connected ({})", node.display(), e);
            }
        }
    }

    fn process_hotplug(&mut self) {
        let mut attached = false;

        while let Some(notification) = self.monitor.receive() {
            if !is_event_node(&notification.node) {
                continue;
            }
            match notification.action {
                HotplugAction::Add => {
                    if let Err(e) = self.connect(&notification.node, &notification.properties) {
                        debug!("{}: not connected ({})", notification.node.display(), e);
                    }
                    attached = true;
                }
                HotplugAction::Remove => self.disconnect(&notification.node),
            }
        }

        // libinput activates added devices even while suspended
        if attached && self.suspended {
            self.source.suspend();
            self.process_events();
        }
    }

    // ------------------------------------------------------------------------
    // Event dispatcher
    // ------------------------------------------------------------------------

    fn process_events(&mut self) {
        if let Err(e) = self.source.dispatch() {
            warn!("libinput dispatch error: {}", e);
            return;
        }

        while let Some(event) = self.source.next_event() {
            self.handle_event(event);
        }
    }

    fn handle_event(&mut self, event: RawEvent) {
        match event {
            RawEvent::DeviceAdded { device, info } => self.on_device_added(device, info),
            RawEvent::DeviceRemoved { device } => self.on_device_removed(device),
            RawEvent::KeyboardKey {
                device,
                key,
                pressed,
            } => self.on_key(device, key, pressed),
            RawEvent::PointerMotion { device, dx, dy } => {
                let viewport = self.sink.viewport();
                let Some(slot) = self
                    .records
                    .get_mut(&device)
                    .and_then(|record| record.pointers[0].as_mut())
                else {
                    return;
                };
                slot.point = viewport.move_relative(slot.point, dx, dy);
                self.sink.read(slot.handle, &slot.data());
            }
            RawEvent::PointerButton { device, pressed } => {
                let Some(slot) = self
                    .records
                    .get_mut(&device)
                    .and_then(|record| record.pointers[0].as_mut())
                else {
                    return;
                };
                slot.state = IndevState::from_pressed(pressed);
                self.sink.read(slot.handle, &slot.data());
            }
            RawEvent::PointerMotionAbsolute { device, x, y } => {
                let viewport = self.sink.viewport();
                let Some(slot) = self
                    .records
                    .get_mut(&device)
                    .and_then(|record| record.pointers[0].as_mut())
                else {
                    return;
                };
                let Some(point) = viewport.transform_absolute(x, y) else {
                    return;
                };
                slot.point = point;
                self.sink.read(slot.handle, &slot.data());
            }
            RawEvent::TouchDown { device, slot, x, y } => {
                self.on_touch(device, slot, Some((x, y)), true)
            }
            RawEvent::TouchMotion { device, slot, x, y } => {
                self.on_touch(device, slot, Some((x, y)), false)
            }
            RawEvent::TouchUp { device, slot } => self.on_touch(device, slot, None, false),
            RawEvent::Other => {}
        }
    }

    /// Touch contact update
    ///
    /// `position` is None for up/cancel, which always releases the slot.
    fn on_touch(
        &mut self,
        device: DeviceId,
        contact: i32,
        position: Option<(f64, f64)>,
        down: bool,
    ) {
        let viewport = self.sink.viewport();
        let Some(slot) = self
            .records
            .get_mut(&device)
            .and_then(|record| record.contact_slot(contact))
        else {
            return;
        };

        match position {
            Some((x, y)) => {
                let Some(point) = viewport.transform_absolute(x, y) else {
                    return;
                };
                slot.point = point;
                if down {
                    slot.state = IndevState::Pressed;
                }
            }
            None => slot.state = IndevState::Released,
        }
        self.sink.read(slot.handle, &slot.data());
    }

    fn on_key(&mut self, device: DeviceId, keycode: u32, pressed: bool) {
        let Some(slot) = self
            .records
            .get_mut(&device)
            .and_then(|record| record.keyboard.as_mut())
        else {
            return;
        };

        let Some(event) = self
            .translator
            .translate(slot.key_state.as_deref_mut(), keycode, pressed)
        else {
            return;
        };
        slot.key = event.key;
        slot.state = event.state;
        self.sink.read(slot.handle, &slot.data());
    }

    // ------------------------------------------------------------------------
    // Suspend controller
    // ------------------------------------------------------------------------

    /// Stop event generation from connected devices
    ///
    /// Records, counters and the cursor stay as they are.
    pub fn suspend(&mut self) {
        if self.suspended {
            return;
        }
        self.suspended = true;
        self.source.suspend();
        self.process_events();
        info!("libinput is suspended");
    }

    /// Resume event generation
    ///
    /// Parked records whose device is not announced again are dropped.
    pub fn resume(&mut self) -> Result<()> {
        if !self.suspended {
            return Ok(());
        }
        self.source.resume()?;
        self.suspended = false;
        self.process_events();

        for (node, record) in std::mem::take(&mut self.parked) {
            warn!("{} did not come back after resume", node.display());
            self.drop_record(record);
        }
        info!("libinput is resumed");
        Ok(())
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Check if any keyboard is connected
    pub fn is_keyboard_connected(&self) -> bool {
        self.counts.keyboards != 0
    }

    /// Register the handler for the power key
    pub fn set_power_key_callback<F: FnMut() + 'static>(&mut self, callback: F) {
        self.translator.set_power_key_callback(Box::new(callback));
    }

    /// Focus group keypads are routed to
    pub fn keyboard_input_group(&self) -> GroupHandle {
        self.group
    }

    /// Route every keypad, present and future, to a host group
    pub fn set_keyboard_input_group(&mut self, group: GroupHandle) {
        self.group = group;
        let keypads: Vec<IndevHandle> = self
            .all_records()
            .filter_map(|record| record.keyboard.as_ref().map(|slot| slot.handle))
            .collect();
        for keypad in keypads {
            self.sink.set_group(keypad, group);
        }
    }

    fn all_records(&self) -> impl Iterator<Item = &DeviceRecord> + '_ {
        self.records.values().chain(self.parked.values())
    }

    /// Current state of a slot, for sinks that poll
    pub fn current_state(&self, handle: IndevHandle) -> Option<IndevData> {
        self.all_records().find_map(|record| {
            record
                .pointers
                .iter()
                .flatten()
                .find(|slot| slot.handle == handle)
                .map(|slot| slot.data())
                .or_else(|| {
                    record
                        .keyboard
                        .as_ref()
                        .filter(|slot| slot.handle == handle)
                        .map(|slot| slot.data())
                })
        })
    }

    pub fn counts(&self) -> DeviceCounts {
        self.counts
    }

    pub fn is_cursor_visible(&self) -> bool {
        self.cursor.is_visible()
    }

    /// Connected devices: node and class
    pub fn devices(&self) -> impl Iterator<Item = (&Path, Capability)> + '_ {
        self.all_records()
            .map(|record| (record.node.as_path(), record.capability))
    }

    /// Pointer slot handles of the device behind a node
    pub fn pointer_handles(&self, node: &Path) -> Vec<IndevHandle> {
        self.all_records()
            .filter(|record| record.node == node)
            .flat_map(|record| record.pointers.iter().flatten().map(|slot| slot.handle))
            .collect()
    }

    /// Keypad handle of the device behind a node
    pub fn keypad_handle(&self, node: &Path) -> Option<IndevHandle> {
        self.all_records()
            .find(|record| record.node == node)
            .and_then(|record| record.keyboard.as_ref().map(|slot| slot.handle))
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut K {
        &mut self.sink
    }
}
