use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use midir::{Ignore, MidiInput, MidiInputConnection};
use ringbuf::{HeapConsumer, HeapRb};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::input::RawMidiMessage;

const CLIENT_NAME: &str = "pianola";
const QUEUE_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MidiDevice {
    pub name: String,
}

pub struct MidiManager;

impl MidiManager {
    pub fn list_inputs() -> Result<Vec<MidiDevice>> {
        let input = MidiInput::new(CLIENT_NAME).context("open MIDI client")?;
        Ok(input
            .ports()
            .iter()
            .map(|port| MidiDevice {
                name: input.port_name(port).unwrap_or_else(|_| "Unknown".into()),
            })
            .collect())
    }
}

/// Owns the connection to the one active input device. Messages are stamped
/// on arrival in midir's callback thread and queued for the practice loop,
/// which drains them with `drain`.
#[derive(Default)]
pub struct MidiInputHub {
    connection: Option<MidiInputConnection<()>>,
    queue: Option<HeapConsumer<RawMidiMessage>>,
    active: Option<String>,
}

impl MidiInputHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_device(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Switches to the named device. The previous connection is closed
    /// before the new one opens, so no message reaches a stale handler.
    pub fn set_active_device(&mut self, name: &str) -> Result<()> {
        self.disconnect();

        let mut input = MidiInput::new(CLIENT_NAME).context("open MIDI client")?;
        input.ignore(Ignore::Sysex | Ignore::Time | Ignore::ActiveSense);
        let port = input
            .ports()
            .into_iter()
            .find(|port| input.port_name(port).map_or(false, |n| n == name))
            .ok_or_else(|| anyhow!("MIDI input {name:?} not found"))?;

        let (mut producer, consumer) = HeapRb::<RawMidiMessage>::new(QUEUE_CAPACITY).split();
        let connection = input
            .connect(
                &port,
                "pianola-input",
                move |_stamp, bytes, _| {
                    if let Some(message) = RawMidiMessage::from_bytes(bytes, Instant::now()) {
                        if producer.push(message).is_err() {
                            warn!("MIDI queue full, dropping message");
                        }
                    }
                },
                (),
            )
            .map_err(|err| anyhow!("MIDI connect error: {err}"))?;

        info!(device = name, "connected MIDI input");
        self.connection = Some(connection);
        self.queue = Some(consumer);
        self.active = Some(name.to_string());
        Ok(())
    }

    pub fn disconnect(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.close();
            info!(device = ?self.active, "disconnected MIDI input");
        }
        self.queue = None;
        self.active = None;
    }

    /// Messages received since the last call, in arrival order.
    pub fn drain(&mut self) -> Vec<RawMidiMessage> {
        let mut messages = Vec::new();
        if let Some(queue) = self.queue.as_mut() {
            while let Some(message) = queue.pop() {
                messages.push(message);
            }
        }
        messages
    }
}
