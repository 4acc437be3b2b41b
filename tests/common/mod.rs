#![allow(dead_code)]

use mizzen::{handle_client, App, Res, Socket};
use std::io::{Read, Write};
use std::sync::{Arc, Mutex};

/// Install a tracing subscriber once per test binary so `RUST_LOG`-filtered
/// output shows up under `cargo test -- --nocapture`.
pub fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

/// In-memory stand-in for a TCP connection: a fixed input buffer on the read
/// side, a shared output buffer on the write side.
pub struct MockSocket {
    input: Vec<u8>,
    read_offset: usize,
    output: Arc<Mutex<Vec<u8>>>,
}

/// Handle onto a mock socket's output, alive after the connection loop has
/// consumed the socket.
pub struct OutputHandle(Arc<Mutex<Vec<u8>>>);

impl OutputHandle {
    pub fn as_string(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }

    pub fn as_bytes(&self) -> Vec<u8> {
        self.0.lock().unwrap().clone()
    }
}

#[derive(Clone)]
struct SharedWriter(Arc<Mutex<Vec<u8>>>);

impl Write for SharedWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl MockSocket {
    pub fn new(input: impl Into<Vec<u8>>) -> (Self, OutputHandle) {
        let output = Arc::new(Mutex::new(Vec::new()));
        (
            MockSocket {
                input: input.into(),
                read_offset: 0,
                output: output.clone(),
            },
            OutputHandle(output),
        )
    }
}

impl Read for MockSocket {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.read_offset >= self.input.len() {
            return Ok(0);
        }
        let n = (&self.input[self.read_offset..]).read(buf)?;
        self.read_offset += n;
        Ok(n)
    }
}

impl Write for MockSocket {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.output.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Socket for MockSocket {
    fn writer(&self) -> std::io::Result<Box<dyn Write + Send>> {
        Ok(Box::new(SharedWriter(self.output.clone())))
    }
}

/// Run one framed request through the connection loop and return everything
/// written to the socket.
pub fn mock_request(app: &App, method: &str, path: &str, body: &str) -> String {
    let raw = format!(
        "{method} {path} HTTP/1.1\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    );
    raw_request(app, raw.as_bytes())
}

/// Drive the connection loop with arbitrary request bytes.
pub fn raw_request(app: &App, raw: &[u8]) -> String {
    let (socket, output) = MockSocket::new(raw);
    handle_client(socket, app);
    output.as_string()
}

/// A response writing into a shared buffer, for exercising `Res` directly.
pub fn mock_response() -> (Res, OutputHandle) {
    let output = Arc::new(Mutex::new(Vec::new()));
    let res = Res::new(Box::new(SharedWriter(output.clone())), false);
    (res, OutputHandle(output))
}

/// Same as [`mock_response`] with the pretty-print flag set.
pub fn mock_pretty_response() -> (Res, OutputHandle) {
    let output = Arc::new(Mutex::new(Vec::new()));
    let res = Res::new(Box::new(SharedWriter(output.clone())), true);
    (res, OutputHandle(output))
}
