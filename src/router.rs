//! Path routing with positional parameters.
//!
//! Routes live in five method-keyed buckets and are matched in registration
//! order: the first pattern whose segments all agree with the request path
//! wins. A segment starting with `:` captures the corresponding request
//! segment under its name. There are no wildcards, no regexes, and no
//! specificity ranking.

use crate::middleware::{Handler, Middleware, MiddlewareWrapper, Next};
use crate::request::Req;
use crate::response::Res;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// A registered route: immutable after registration.
#[derive(Clone)]
pub struct Route {
    pub(crate) path: String,
    pub(crate) handler: Handler,
}

/// An ordered set of routes under an optional path prefix, plus the
/// middleware registered against it.
pub struct Router {
    pub(crate) prefix: String,
    get_routes: Vec<Route>,
    post_routes: Vec<Route>,
    put_routes: Vec<Route>,
    delete_routes: Vec<Route>,
    patch_routes: Vec<Route>,
    pub(crate) middlewares: Vec<MiddlewareWrapper>,
}

impl Router {
    pub(crate) fn new(prefix: &str) -> Self {
        Router {
            prefix: prefix.to_string(),
            get_routes: Vec::new(),
            post_routes: Vec::new(),
            put_routes: Vec::new(),
            delete_routes: Vec::new(),
            patch_routes: Vec::new(),
            middlewares: Vec::new(),
        }
    }

    /// Register a handler for GET requests on `path`.
    pub fn get<F>(&mut self, path: &str, handler: F)
    where
        F: Fn(&mut Req, &mut Res) + Send + Sync + 'static,
    {
        let route = self.make_route(path, handler);
        self.get_routes.push(route);
    }

    /// Register a handler for POST requests on `path`.
    pub fn post<F>(&mut self, path: &str, handler: F)
    where
        F: Fn(&mut Req, &mut Res) + Send + Sync + 'static,
    {
        let route = self.make_route(path, handler);
        self.post_routes.push(route);
    }

    /// Register a handler for PUT requests on `path`.
    pub fn put<F>(&mut self, path: &str, handler: F)
    where
        F: Fn(&mut Req, &mut Res) + Send + Sync + 'static,
    {
        let route = self.make_route(path, handler);
        self.put_routes.push(route);
    }

    /// Register a handler for DELETE requests on `path`.
    pub fn delete<F>(&mut self, path: &str, handler: F)
    where
        F: Fn(&mut Req, &mut Res) + Send + Sync + 'static,
    {
        let route = self.make_route(path, handler);
        self.delete_routes.push(route);
    }

    /// Register a handler for PATCH requests on `path`.
    pub fn patch<F>(&mut self, path: &str, handler: F)
    where
        F: Fn(&mut Req, &mut Res) + Send + Sync + 'static,
    {
        let route = self.make_route(path, handler);
        self.patch_routes.push(route);
    }

    /// Register middleware that runs for every request routed here.
    pub fn use_global<F>(&mut self, middleware: F)
    where
        F: Fn(&mut Req, &mut Res, Next) + Send + Sync + 'static,
    {
        self.middlewares.push(MiddlewareWrapper {
            path: String::new(),
            handler: Arc::new(middleware) as Middleware,
        });
    }

    /// Register middleware that runs only for requests whose path equals
    /// `path` exactly.
    pub fn use_path<F>(&mut self, path: &str, middleware: F)
    where
        F: Fn(&mut Req, &mut Res, Next) + Send + Sync + 'static,
    {
        self.middlewares.push(MiddlewareWrapper {
            path: path.to_string(),
            handler: Arc::new(middleware) as Middleware,
        });
    }

    fn make_route<F>(&self, path: &str, handler: F) -> Route
    where
        F: Fn(&mut Req, &mut Res) + Send + Sync + 'static,
    {
        let path = clean_path(&self.prefix, path);
        debug!(path = %path, "route registered");
        Route {
            path,
            handler: Arc::new(handler) as Handler,
        }
    }

    /// The route bucket for a supported method token, `None` otherwise.
    pub(crate) fn routes_for(&self, method: &str) -> Option<&[Route]> {
        match method {
            "GET" => Some(&self.get_routes),
            "POST" => Some(&self.post_routes),
            "PUT" => Some(&self.put_routes),
            "DELETE" => Some(&self.delete_routes),
            "PATCH" => Some(&self.patch_routes),
            _ => None,
        }
    }
}

/// Join a router prefix and a route path into a canonical pattern: leading
/// slash, duplicate slashes collapsed, no trailing slash except for the root.
pub fn clean_path(prefix: &str, path: &str) -> String {
    let joined = format!("{prefix}/{path}");
    let mut cleaned = String::with_capacity(joined.len());

    for segment in joined.split('/').filter(|s| !s.is_empty()) {
        cleaned.push('/');
        cleaned.push_str(segment);
    }

    if cleaned.is_empty() {
        cleaned.push('/');
    }
    cleaned
}

/// Match a request path against an ordered route list.
///
/// Returns the first matching route together with any `:name` captures. The
/// params map stays empty for fully literal patterns.
pub(crate) fn match_route<'r>(
    request_path: &str,
    routes: &'r [Route],
) -> Option<(&'r Route, HashMap<String, String>)> {
    for route in routes {
        let route_parts: Vec<&str> = route.path.split('/').collect();
        let request_parts: Vec<&str> = request_path.split('/').collect();

        if route_parts.len() != request_parts.len() {
            continue;
        }

        let mut params = HashMap::new();
        let mut matched = true;
        for (route_part, request_part) in route_parts.iter().zip(&request_parts) {
            if let Some(name) = route_part.strip_prefix(':') {
                params.insert(name.to_string(), request_part.to_string());
            } else if route_part != request_part {
                matched = false;
                break;
            }
        }

        if matched {
            return Some((route, params));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(path: &str) -> Route {
        Route {
            path: path.to_string(),
            handler: Arc::new(|_req: &mut Req, _res: &mut Res| {}),
        }
    }

    #[test]
    fn test_clean_path() {
        let cases = [
            ("/api", "/users", "/api/users"),
            ("/api/", "/users", "/api/users"),
            ("/api", "users", "/api/users"),
            ("/api", "/users/", "/api/users"),
            ("/", "/users", "/users"),
            ("/", "users", "/users"),
            ("", "/users", "/users"),
            ("", "users", "/users"),
            ("/api", "//users//profile", "/api/users/profile"),
        ];

        for (prefix, path, want) in cases {
            assert_eq!(clean_path(prefix, path), want, "clean_path({prefix:?}, {path:?})");
        }
    }

    #[test]
    fn test_literal_match() {
        let routes = [route("/users"), route("/users/active")];
        let (matched, params) = match_route("/users/active", &routes).unwrap();
        assert_eq!(matched.path, "/users/active");
        assert!(params.is_empty());
        assert!(match_route("/users/archived", &routes).is_none());
    }

    #[test]
    fn test_param_capture() {
        let routes = [route("/test/:postId/comment/:commentId")];
        let (_, params) = match_route("/test/123/comment/hello", &routes).unwrap();
        assert_eq!(params.get("postId").unwrap(), "123");
        assert_eq!(params.get("commentId").unwrap(), "hello");
    }

    #[test]
    fn test_segment_count_must_agree() {
        let routes = [route("/a/:b")];
        assert!(match_route("/a", &routes).is_none());
        assert!(match_route("/a/b/c", &routes).is_none());
    }

    #[test]
    fn test_first_registration_wins() {
        let routes = [route("/x/:param"), route("/x/literal")];
        let (matched, params) = match_route("/x/literal", &routes).unwrap();
        assert_eq!(matched.path, "/x/:param");
        assert_eq!(params.get("param").unwrap(), "literal");
    }

    #[test]
    fn test_matching_is_deterministic() {
        let routes = [route("/a/:id")];
        let first = match_route("/a/7", &routes).map(|(r, p)| (r.path.clone(), p));
        let second = match_route("/a/7", &routes).map(|(r, p)| (r.path.clone(), p));
        assert_eq!(first, second);
    }
}
