//! Routing module
//!
//! Custom route table consulted after the data API. Entries are tried in
//! registration order and the first method+path match wins.

mod matcher;

use async_trait::async_trait;
use hyper::Method;
use std::sync::Arc;

use crate::config::{ConfigError, RouteAction, RoutesConfig};
use crate::http::{AppRequest, HttpResponse};

pub use matcher::{PathPattern, PatternError, RouteParams};

/// Application-defined route endpoint
#[async_trait]
pub trait RouteHandler: Send + Sync + 'static {
    async fn handle(&self, req: &AppRequest, params: &RouteParams) -> HttpResponse;
}

/// What a matched entry does
#[derive(Clone)]
pub enum RouteTarget {
    /// Action declared in `[[routes.custom]]`
    Configured(RouteAction),
    /// Handler registered from code
    Handler(Arc<dyn RouteHandler>),
}

impl std::fmt::Debug for RouteTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configured(action) => f.debug_tuple("Configured").field(action).finish(),
            Self::Handler(_) => f.write_str("Handler(..)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RouteEntry {
    /// `None` matches any method
    pub method: Option<Method>,
    pub pattern: PathPattern,
    pub target: RouteTarget,
}

impl RouteEntry {
    fn accepts(&self, method: &Method) -> bool {
        self.method.as_ref().map_or(true, |m| m == method)
    }
}

/// Ordered list of custom routes
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from the configured routes, in file order
    pub fn from_config(routes: &RoutesConfig) -> Result<Self, ConfigError> {
        let mut table = Self::new();
        for route in &routes.custom {
            let method = match route.method.as_deref() {
                None => None,
                Some(m) if m == "*" || m.eq_ignore_ascii_case("any") => None,
                Some(m) => Some(parse_method(m)?),
            };
            let pattern = PathPattern::parse(&route.path).map_err(|e| ConfigError::Invalid {
                key: "routes.custom",
                message: e.to_string(),
            })?;
            table.entries.push(RouteEntry {
                method,
                pattern,
                target: RouteTarget::Configured(route.action.clone()),
            });
        }
        Ok(table)
    }

    /// Append a code-registered handler
    pub fn register(
        &mut self,
        method: Option<Method>,
        pattern: &str,
        handler: Arc<dyn RouteHandler>,
    ) -> Result<(), PatternError> {
        let pattern = PathPattern::parse(pattern)?;
        self.entries.push(RouteEntry {
            method,
            pattern,
            target: RouteTarget::Handler(handler),
        });
        Ok(())
    }

    /// First entry matching `method` and `path`
    pub fn find(&self, method: &Method, path: &str) -> Option<(&RouteEntry, RouteParams)> {
        self.entries
            .iter()
            .filter(|entry| entry.accepts(method))
            .find_map(|entry| entry.pattern.matches(path).map(|params| (entry, params)))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn parse_method(name: &str) -> Result<Method, ConfigError> {
    Method::from_bytes(name.to_ascii_uppercase().as_bytes()).map_err(|_| ConfigError::Invalid {
        key: "routes.custom",
        message: format!("unknown HTTP method '{name}'"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CustomRouteConfig;
    use crate::http::build_direct_response;

    struct Echo(&'static str);

    #[async_trait]
    impl RouteHandler for Echo {
        async fn handle(&self, _req: &AppRequest, _params: &RouteParams) -> HttpResponse {
            build_direct_response(200, Some(self.0), None)
        }
    }

    fn direct(status: u16) -> RouteAction {
        RouteAction::Direct {
            status,
            body: None,
            content_type: None,
        }
    }

    #[test]
    fn test_first_match_wins() {
        let config = RoutesConfig {
            custom: vec![
                CustomRouteConfig {
                    method: None,
                    path: "/share/:id".into(),
                    action: direct(200),
                },
                CustomRouteConfig {
                    method: None,
                    path: "/share/*".into(),
                    action: direct(201),
                },
            ],
        };
        let table = RouteTable::from_config(&config).unwrap();

        let (entry, params) = table.find(&Method::GET, "/share/abc").unwrap();
        assert!(matches!(
            &entry.target,
            RouteTarget::Configured(RouteAction::Direct { status: 200, .. })
        ));
        assert_eq!(params.get("id"), Some("abc"));

        let (entry, _) = table.find(&Method::GET, "/share/a/b").unwrap();
        assert!(matches!(
            &entry.target,
            RouteTarget::Configured(RouteAction::Direct { status: 201, .. })
        ));
    }

    #[test]
    fn test_method_filter() {
        let mut table = RouteTable::new();
        table
            .register(Some(Method::POST), "/hooks/:name", Arc::new(Echo("hook")))
            .unwrap();
        assert!(table.find(&Method::GET, "/hooks/deploy").is_none());
        assert!(table.find(&Method::POST, "/hooks/deploy").is_some());
    }

    #[test]
    fn test_configured_before_registered() {
        let config = RoutesConfig {
            custom: vec![CustomRouteConfig {
                method: Some("get".into()),
                path: "/about".into(),
                action: direct(204),
            }],
        };
        let mut table = RouteTable::from_config(&config).unwrap();
        table.register(None, "/about", Arc::new(Echo("code"))).unwrap();

        assert_eq!(table.len(), 2);
        let (entry, _) = table.find(&Method::GET, "/about").unwrap();
        assert!(matches!(entry.target, RouteTarget::Configured(_)));
        let (entry, _) = table.find(&Method::PUT, "/about").unwrap();
        assert!(matches!(entry.target, RouteTarget::Handler(_)));
    }

    #[test]
    fn test_invalid_config_route() {
        let config = RoutesConfig {
            custom: vec![CustomRouteConfig {
                method: None,
                path: "relative".into(),
                action: direct(200),
            }],
        };
        assert!(matches!(
            RouteTable::from_config(&config),
            Err(ConfigError::Invalid { key: "routes.custom", .. })
        ));
    }
}
