//! Per-connection request loop.
//!
//! Each accepted socket is owned by one coroutine running [`handle_client`]:
//! read a request under a deadline, parse it, route it, run the middleware
//! chain and handler, then either loop for the next request (keep-alive) or
//! close. Handler panics are contained here and surface as a 500 before the
//! connection is dropped.

use crate::app::{App, RouteLookup};
use crate::middleware::Next;
use crate::request::Req;
use crate::response::Res;
use crate::server::wire;
use std::collections::HashMap;
use std::io::{BufReader, Read, Write};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// The connection surface the request loop drives.
///
/// Implemented for `may::net::TcpStream`; tests drive the loop with an
/// in-memory mock.
pub trait Socket: Read + Write {
    /// A second, independent write handle onto the same connection.
    fn writer(&self) -> std::io::Result<Box<dyn Write + Send>>;

    /// Arm a read deadline. The default is a no-op for transports without
    /// one.
    fn set_read_timeout(&self, _timeout: Option<Duration>) -> std::io::Result<()> {
        Ok(())
    }

    /// The local address of the connection, if known.
    fn local_addr_string(&self) -> String {
        String::new()
    }
}

impl Socket for may::net::TcpStream {
    fn writer(&self) -> std::io::Result<Box<dyn Write + Send>> {
        Ok(Box::new(self.try_clone()?))
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()> {
        may::net::TcpStream::set_read_timeout(self, timeout)
    }

    fn local_addr_string(&self) -> String {
        self.local_addr().map(|a| a.to_string()).unwrap_or_default()
    }
}

/// Drive one connection until it closes.
///
/// Requests on the connection are handled strictly in sequence. The loop
/// leaves on: EOF or a read error (including an expired deadline), a
/// malformed request line (after a 400), an unsupported method (after a
/// 405), a handler panic (after a 500), or a `Connection: close` request
/// header.
pub fn handle_client<S: Socket>(socket: S, app: &App) {
    let local_address = socket.local_addr_string();
    let mut reader = BufReader::new(socket);

    loop {
        if let Err(e) = reader
            .get_ref()
            .set_read_timeout(Some(app.config().read_timeout))
        {
            warn!(error = %e, "error arming read deadline");
            return;
        }

        let line = match wire::read_line(&mut reader) {
            Ok(Some(line)) => line,
            Ok(None) => {
                debug!("connection closed by client");
                return;
            }
            Err(e) => {
                warn!(error = %e, "error reading request line");
                return;
            }
        };
        let line = line.trim();

        let mut writer = match reader.get_ref().writer() {
            Ok(writer) => writer,
            Err(e) => {
                warn!(error = %e, "error acquiring write handle");
                return;
            }
        };

        if line.is_empty() {
            debug!("empty request line");
            wire::send_response(&mut writer, b"Bad Request", 400, "text/plain", None);
            return;
        }

        info!(request_line = %line, "incoming request");

        let parts: Vec<&str> = line.splitn(3, ' ').collect();
        if parts.len() < 2 {
            warn!(request_line = %line, "invalid request line");
            wire::send_response(&mut writer, b"Bad Request", 400, "text/plain", None);
            return;
        }
        let method = parts[0].to_string();
        let raw_path = parts[1];

        let (headers, content_length) = match wire::extract_headers(&mut reader) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "error reading header block");
                return;
            }
        };
        let body = wire::extract_body(&mut reader, content_length);
        let cookies = wire::extract_cookies(&headers);

        let (path, queries) = match raw_path.split_once('?') {
            Some((path, query)) => (path.to_string(), wire::extract_queries(query)),
            None => (raw_path.to_string(), HashMap::new()),
        };

        // Decide keep-alive up front: the header map moves into the request.
        let close_requested = headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("Connection"))
            .map(|(_, value)| value.eq_ignore_ascii_case("close"))
            .unwrap_or(false);

        match app.find_handler(&method, &path) {
            RouteLookup::MethodNotAllowed => {
                warn!(method = %method, "unsupported method");
                wire::send_response(&mut writer, b"Method Not Allowed", 405, "text/plain", None);
                return;
            }
            RouteLookup::NotFound => {
                info!(method = %method, path = %path, "no route matched");
                wire::send_response(&mut writer, b"Not Found", 404, "text/plain", None);
            }
            RouteLookup::Found {
                handler,
                params,
                chain,
            } => {
                debug!(method = %method, path = %path, "route matched");
                let mut req = Req {
                    local_address: local_address.clone(),
                    method,
                    path,
                    body,
                    headers,
                    params,
                    queries,
                    cookies,
                };
                let mut res = Res::new(writer, app.pretty_print_json);

                let outcome = catch_unwind(AssertUnwindSafe(|| {
                    Next::new(chain, handler).run(&mut req, &mut res);
                }));

                if let Err(panic) = outcome {
                    error!(panic = ?panic, "handler panicked");
                    if let Ok(mut recovery) = reader.get_ref().writer() {
                        wire::send_response(
                            &mut recovery,
                            b"Internal Server Error",
                            500,
                            "text/plain",
                            None,
                        );
                    }
                    return;
                }
            }
        }

        if close_requested {
            debug!("client requested connection close");
            return;
        }
    }
}
