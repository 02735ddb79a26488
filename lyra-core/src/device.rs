use thiserror::Error;

/// Playback failure reported by the device. Opaque to the engine.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("device error {code:?}: {message}")]
pub struct DeviceError {
    pub code: Option<i32>,
    pub message: String,
}

impl DeviceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(code: i32, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
        }
    }
}

/// Callbacks from the device, delivered in the order they happened
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    /// Audio actually started (or resumed)
    Play,
    Pause,
    /// Stopped and rewound
    Stop,
    /// Source played to the end
    Ended,
    Error(DeviceError),
    /// Position and duration in seconds
    TimeUpdate { position: f32, duration: f32 },
    /// Source is buffered enough to start
    CanPlay,
}

/// The single audio output the engine drives.
///
/// Every method is a request. Results come back later as [`DeviceEvent`]s
/// from [`AudioDevice::drain_events`].
pub trait AudioDevice {
    /// Point the device at a new source, abandoning whatever was loading
    fn set_source(&mut self, url: &str);

    fn play(&mut self);

    fn pause(&mut self);

    fn stop(&mut self);

    fn seek(&mut self, seconds: f32);

    /// Volume in `[0, 1]`
    fn set_volume(&mut self, volume: f32);

    fn volume(&self) -> f32;

    /// Take every event reported since the last call
    fn drain_events(&mut self) -> Vec<DeviceEvent>;
}

#[cfg(test)]
pub(crate) mod mock {
    use std::{cell::RefCell, rc::Rc};

    use super::{AudioDevice, DeviceEvent};

    /// A request the engine made of the device
    #[derive(Debug, Clone, PartialEq)]
    pub enum DeviceCall {
        SetSource(String),
        Play,
        Pause,
        Stop,
        Seek(f32),
        SetVolume(f32),
    }

    /// Shared view of what a [`MockDevice`] was asked to do
    #[derive(Debug, Default)]
    pub struct MockLog {
        pub calls: Vec<DeviceCall>,
        pub pending: Vec<DeviceEvent>,
        pub volume: f32,
    }

    /// Records requests and replays whatever events the test queues up
    pub struct MockDevice {
        log: Rc<RefCell<MockLog>>,
    }

    impl MockDevice {
        pub fn new() -> (Self, Rc<RefCell<MockLog>>) {
            let log = Rc::new(RefCell::new(MockLog {
                volume: 1.0,
                ..Default::default()
            }));
            (Self { log: Rc::clone(&log) }, log)
        }

        fn record(&self, call: DeviceCall) {
            self.log.borrow_mut().calls.push(call);
        }
    }

    impl AudioDevice for MockDevice {
        fn set_source(&mut self, url: &str) {
            self.record(DeviceCall::SetSource(url.to_string()));
        }

        fn play(&mut self) {
            self.record(DeviceCall::Play);
        }

        fn pause(&mut self) {
            self.record(DeviceCall::Pause);
        }

        fn stop(&mut self) {
            self.record(DeviceCall::Stop);
        }

        fn seek(&mut self, seconds: f32) {
            self.record(DeviceCall::Seek(seconds));
        }

        fn set_volume(&mut self, volume: f32) {
            self.record(DeviceCall::SetVolume(volume));
            self.log.borrow_mut().volume = volume;
        }

        fn volume(&self) -> f32 {
            self.log.borrow().volume
        }

        fn drain_events(&mut self) -> Vec<DeviceEvent> {
            std::mem::take(&mut self.log.borrow_mut().pending)
        }
    }
}
