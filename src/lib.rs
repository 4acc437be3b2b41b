//! # mizzen
//!
//! A minimalist HTTP/1.1 application server built directly on TCP.
//!
//! One process, one listener, one coroutine per connection. Requests are
//! parsed from the byte stream, dispatched through a routed middleware
//! pipeline, and written back through a small serializer. Bodies are
//! buffered whole; only `Content-Length` framing is supported.
//!
//! ```rust,no_run
//! use mizzen::App;
//!
//! let mut app = App::new();
//!
//! app.use_global(|req, res, next_chain| {
//!     // runs for every request
//!     next_chain.run(req, res);
//! });
//!
//! app.get("/posts/:id", |req, res| {
//!     let id = req.param("id").to_string();
//!     res.send(&format!("post {id}"));
//! });
//!
//! app.start(8080).unwrap();
//! ```

pub mod app;
pub mod config;
pub mod error;
pub mod freshness;
pub mod httpdate;
pub mod middleware;
pub mod mime;
pub mod multipart;
pub mod negotiate;
pub mod request;
pub mod response;
pub mod router;
pub mod server;

pub use app::App;
pub use config::ServerConfig;
pub use error::Error;
pub use middleware::{Handler, Middleware, MiddlewareWrapper, Next};
pub use multipart::{FormFile, MultipartForm};
pub use request::Req;
pub use response::{Cookie, Res, SameSite};
pub use router::Router;
pub use server::{handle_client, Socket};
