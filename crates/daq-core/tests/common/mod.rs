//! Scripted in-memory DAQ board for integration tests
#![allow(dead_code)]

use daq_core::protocol::{Client, Link, PortOpener, ProtocolError, Transport};
use daq_core::workflow::{NoticeLevel, Operator};
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

type Responder = Box<dyn FnMut(&str) -> Option<String> + Send>;

struct DeviceState {
    /// Bytes waiting to be read by the host
    rx: VecDeque<u8>,
    /// Incoming line being assembled
    partial: Vec<u8>,
    /// Every byte the host wrote, in order
    wire: Vec<u8>,
    /// Completed command lines
    lines: Vec<String>,
    responder: Responder,
    timeout: Duration,
    clears: usize,
    /// Largest chunk accepted per write call
    max_write_chunk: usize,
}

/// Shared handle to the simulated board
#[derive(Clone)]
pub struct MockDevice {
    shared: Arc<(Mutex<DeviceState>, Condvar)>,
}

impl MockDevice {
    pub fn new(responder: impl FnMut(&str) -> Option<String> + Send + 'static) -> Self {
        Self {
            shared: Arc::new((
                Mutex::new(DeviceState {
                    rx: VecDeque::new(),
                    partial: Vec::new(),
                    wire: Vec::new(),
                    lines: Vec::new(),
                    responder: Box::new(responder),
                    timeout: Duration::ZERO,
                    clears: 0,
                    max_write_chunk: usize::MAX,
                }),
                Condvar::new(),
            )),
        }
    }

    /// Board that answers every command with a JSON `ok` reply
    pub fn echo_ok() -> Self {
        Self::new(|line| Some(ok_reply(line)))
    }

    /// Board that never answers
    pub fn silent() -> Self {
        Self::new(|_| None)
    }

    fn state(&self) -> std::sync::MutexGuard<'_, DeviceState> {
        self.shared.0.lock().unwrap()
    }

    /// Accept at most `n` bytes per write call
    pub fn set_max_write_chunk(&self, n: usize) {
        self.state().max_write_chunk = n;
    }

    /// Queue bytes as if the board had sent them unprompted
    pub fn inject(&self, bytes: &[u8]) {
        self.state().rx.extend(bytes);
        self.shared.1.notify_all();
    }

    pub fn lines(&self) -> Vec<String> {
        self.state().lines.clone()
    }

    pub fn wire(&self) -> Vec<u8> {
        self.state().wire.clone()
    }

    pub fn timeout(&self) -> Duration {
        self.state().timeout
    }

    pub fn clears(&self) -> usize {
        self.state().clears
    }

    pub fn pending_rx(&self) -> usize {
        self.state().rx.len()
    }
}

/// `{"ok":true,"cmd":"<VERB>","msg":"ok"}`
pub fn ok_reply(line: &str) -> String {
    let verb = line.split_whitespace().next().unwrap_or("");
    format!(r#"{{"ok":true,"cmd":"{verb}","msg":"ok"}}"#)
}

struct MockLink {
    device: MockDevice,
}

impl Read for MockLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let (lock, cvar) = &*self.device.shared;
        let mut state = lock.lock().unwrap();
        let deadline = Instant::now() + state.timeout;
        while state.rx.is_empty() {
            let now = Instant::now();
            if now >= deadline {
                return Err(io::ErrorKind::TimedOut.into());
            }
            state = cvar.wait_timeout(state, deadline - now).unwrap().0;
        }
        let n = buf.len().min(state.rx.len());
        for slot in buf.iter_mut().take(n) {
            *slot = state.rx.pop_front().unwrap();
        }
        Ok(n)
    }
}

impl Write for MockLink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let (lock, cvar) = &*self.device.shared;
        let n = {
            let mut state = lock.lock().unwrap();
            let n = buf.len().min(state.max_write_chunk);
            for &b in &buf[..n] {
                state.wire.push(b);
                if b == b'\n' {
                    let line = String::from_utf8_lossy(&state.partial).into_owned();
                    state.partial.clear();
                    state.lines.push(line.clone());
                    if let Some(reply) = (state.responder)(&line) {
                        state.rx.extend(reply.bytes());
                        state.rx.push_back(b'\n');
                    }
                } else {
                    state.partial.push(b);
                }
            }
            n
        };
        cvar.notify_all();
        // Give a competing writer the chance to interleave.
        std::thread::yield_now();
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Link for MockLink {
    fn timeout(&self) -> Duration {
        self.device.timeout()
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<(), ProtocolError> {
        self.device.state().timeout = timeout;
        Ok(())
    }

    fn clear_input(&mut self) -> Result<(), ProtocolError> {
        let mut state = self.device.state();
        state.rx.clear();
        state.clears += 1;
        Ok(())
    }
}

/// Opens links to one [`MockDevice`]; the port name "missing" fails
pub struct MockOpener {
    device: MockDevice,
}

impl PortOpener for MockOpener {
    fn open(&self, port: &str, _baud_rate: u32, timeout: Duration) -> Result<Box<dyn Link>, ProtocolError> {
        if port == "missing" {
            return Err(ProtocolError::ConnectionFailed {
                port: port.to_string(),
                reason: "no such device".to_string(),
            });
        }
        self.device.state().timeout = timeout;
        Ok(Box::new(MockLink {
            device: self.device.clone(),
        }))
    }
}

/// Base read timeout the tests open with
pub const OPEN_TIMEOUT: Duration = Duration::from_secs(5);

/// A closed transport wired to `device`
pub fn transport(device: &MockDevice) -> Arc<Transport> {
    Arc::new(
        Transport::new(Arc::new(MockOpener {
            device: device.clone(),
        }))
        .with_settle_delay(Duration::ZERO),
    )
}

/// A client whose transport is already open on `device`
pub fn connected(device: &MockDevice) -> Client {
    let transport = transport(device);
    transport.open("ttyMOCK0", 115200, OPEN_TIMEOUT).unwrap();
    Client::new(transport)
}

/// Operator with canned answers that records every notification
pub struct ScriptedOperator {
    pub tare: bool,
    pub weight: Option<String>,
    pub notices: Mutex<Vec<(NoticeLevel, String)>>,
}

impl ScriptedOperator {
    pub fn new(tare: bool, weight: Option<&str>) -> Self {
        Self {
            tare,
            weight: weight.map(str::to_string),
            notices: Mutex::new(Vec::new()),
        }
    }

    pub fn titles(&self) -> Vec<String> {
        self.notices.lock().unwrap().iter().map(|(_, t)| t.clone()).collect()
    }

    pub fn last_level(&self) -> Option<NoticeLevel> {
        self.notices.lock().unwrap().last().map(|(l, _)| *l)
    }
}

impl Operator for ScriptedOperator {
    fn confirm(&self, _title: &str, _question: &str) -> bool {
        self.tare
    }

    fn prompt(&self, _title: &str, _question: &str) -> Option<String> {
        self.weight.clone()
    }

    fn notify(&self, level: NoticeLevel, title: &str, _message: &str) {
        self.notices.lock().unwrap().push((level, title.to_string()));
    }
}
