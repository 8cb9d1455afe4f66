//! Trigger sources that feed the improve orchestrator.
//!
//! Buttons, the global key chord and decoupled signals all become
//! [`ImproveTrigger`] messages on one channel.

use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    /// An explicit UI or CLI action.
    Action,
    /// The Alt+Enter key chord.
    Shortcut,
    /// Raised by some other component through a [`TriggerHandle`].
    Signal,
}

impl TriggerSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Action => "action",
            Self::Shortcut => "shortcut",
            Self::Signal => "signal",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImproveTrigger {
    pub source: TriggerSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Enter,
    Char(char),
    Other,
}

/// A key press with its modifier state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPress {
    pub key: Key,
    pub alt: bool,
    pub ctrl: bool,
    pub shift: bool,
}

impl KeyPress {
    pub fn plain(key: Key) -> Self {
        Self {
            key,
            alt: false,
            ctrl: false,
            shift: false,
        }
    }

    pub fn with_alt(key: Key) -> Self {
        Self {
            alt: true,
            ..Self::plain(key)
        }
    }
}

/// Alt+Enter maps to an improve trigger; other modifiers are ignored.
pub fn shortcut_trigger(press: &KeyPress) -> Option<ImproveTrigger> {
    (press.alt && press.key == Key::Enter).then_some(ImproveTrigger {
        source: TriggerSource::Shortcut,
    })
}

/// Cloneable sending side of the trigger channel.
#[derive(Debug, Clone)]
pub struct TriggerHandle {
    tx: mpsc::UnboundedSender<ImproveTrigger>,
}

impl TriggerHandle {
    /// Sends a trigger. Returns `false` once the orchestrator has stopped.
    pub fn request(&self, source: TriggerSource) -> bool {
        self.tx.send(ImproveTrigger { source }).is_ok()
    }

    pub fn action(&self) -> bool {
        self.request(TriggerSource::Action)
    }

    pub fn signal(&self) -> bool {
        self.request(TriggerSource::Signal)
    }

    /// Forwards a key press; returns `true` only when it was the shortcut
    /// and the trigger was delivered.
    pub fn key_pressed(&self, press: KeyPress) -> bool {
        match shortcut_trigger(&press) {
            Some(trigger) => self.tx.send(trigger).is_ok(),
            None => false,
        }
    }
}

/// Creates a trigger channel: many handles, one orchestrator.
pub fn trigger_channel() -> (TriggerHandle, mpsc::UnboundedReceiver<ImproveTrigger>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (TriggerHandle { tx }, rx)
}
