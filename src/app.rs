//! The application: a default router, any number of prefix-scoped routers,
//! and the accept loop.
//!
//! Registration happens before [`App::start`]; the route and middleware
//! tables are immutable afterwards. The accept loop is serial and hands each
//! connection to its own coroutine, which owns the socket until it closes.

use crate::config::ServerConfig;
use crate::middleware::{Handler, MiddlewareWrapper, Next};
use crate::request::Req;
use crate::response::Res;
use crate::router::{self, Router};
use crate::server::conn;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Result of routing one request.
pub(crate) enum RouteLookup {
    Found {
        handler: Handler,
        params: HashMap<String, String>,
        /// The effective middleware sequence for this request: the app-level
        /// wrappers, then the owning router's own wrappers.
        chain: Vec<MiddlewareWrapper>,
    },
    NotFound,
    MethodNotAllowed,
}

/// An application. Owns the default router (which the registration methods
/// below delegate to) plus any prefix-scoped routers created through
/// [`App::new_router`].
pub struct App {
    routers: Vec<Router>,
    /// Indent JSON responses with four spaces.
    pub pretty_print_json: bool,
    config: ServerConfig,
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    pub fn new() -> Self {
        App {
            routers: vec![Router::new("")],
            pretty_print_json: false,
            config: ServerConfig::from_env(),
        }
    }

    pub(crate) fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Override the per-request read deadline.
    pub fn read_timeout(&mut self, timeout: std::time::Duration) -> &mut Self {
        self.config.read_timeout = timeout;
        self
    }

    /// Create a router whose routes all live under `prefix`. Routers match
    /// after the default router, in creation order.
    pub fn new_router(&mut self, prefix: &str) -> &mut Router {
        self.routers.push(Router::new(prefix));
        self.routers.last_mut().expect("router just pushed")
    }

    /// Register a GET route on the default router.
    pub fn get<F>(&mut self, path: &str, handler: F)
    where
        F: Fn(&mut Req, &mut Res) + Send + Sync + 'static,
    {
        self.routers[0].get(path, handler);
    }

    /// Register a POST route on the default router.
    pub fn post<F>(&mut self, path: &str, handler: F)
    where
        F: Fn(&mut Req, &mut Res) + Send + Sync + 'static,
    {
        self.routers[0].post(path, handler);
    }

    /// Register a PUT route on the default router.
    pub fn put<F>(&mut self, path: &str, handler: F)
    where
        F: Fn(&mut Req, &mut Res) + Send + Sync + 'static,
    {
        self.routers[0].put(path, handler);
    }

    /// Register a DELETE route on the default router.
    pub fn delete<F>(&mut self, path: &str, handler: F)
    where
        F: Fn(&mut Req, &mut Res) + Send + Sync + 'static,
    {
        self.routers[0].delete(path, handler);
    }

    /// Register a PATCH route on the default router.
    pub fn patch<F>(&mut self, path: &str, handler: F)
    where
        F: Fn(&mut Req, &mut Res) + Send + Sync + 'static,
    {
        self.routers[0].patch(path, handler);
    }

    /// Register middleware that runs for every request.
    pub fn use_global<F>(&mut self, middleware: F)
    where
        F: Fn(&mut Req, &mut Res, Next) + Send + Sync + 'static,
    {
        self.routers[0].use_global(middleware);
    }

    /// Register middleware scoped to an exact request path.
    pub fn use_path<F>(&mut self, path: &str, middleware: F)
    where
        F: Fn(&mut Req, &mut Res, Next) + Send + Sync + 'static,
    {
        self.routers[0].use_path(path, middleware);
    }

    /// Locate the handler for `(method, path)` and assemble its middleware
    /// chain. The default router is consulted first, then each prefix router
    /// in creation order; within a router, registration order wins.
    pub(crate) fn find_handler(&self, method: &str, path: &str) -> RouteLookup {
        for (index, owner) in self.routers.iter().enumerate() {
            let Some(routes) = owner.routes_for(method) else {
                return RouteLookup::MethodNotAllowed;
            };

            if let Some((route, params)) = router::match_route(path, routes) {
                let mut chain = self.routers[0].middlewares.clone();
                if index != 0 {
                    chain.extend(owner.middlewares.iter().cloned());
                }
                return RouteLookup::Found {
                    handler: route.handler.clone(),
                    params,
                    chain,
                };
            }
        }

        RouteLookup::NotFound
    }

    /// Bind the listener and serve until the process exits. Each accepted
    /// connection gets its own coroutine.
    pub fn start(self, port: u16) -> std::io::Result<()> {
        may::config().set_stack_size(self.config.stack_size);

        let listener = may::net::TcpListener::bind(("0.0.0.0", port))?;
        info!(port, "listening");

        let app = Arc::new(self);
        for stream in listener.incoming() {
            match stream {
                Ok(socket) => {
                    let app = app.clone();
                    may::go!(move || {
                        conn::handle_client(socket, &app);
                    });
                }
                Err(e) => {
                    warn!(error = %e, "error accepting socket");
                }
            }
        }

        Ok(())
    }
}
