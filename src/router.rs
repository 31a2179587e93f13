use std::fmt;
use std::sync::{Arc, Mutex};

use percent_encoding::percent_decode_str;
use tracing::info;

use crate::session::service::encode_query_component;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Login,
    Register,
    TimezoneList { query: Option<String> },
    TimezoneCreate,
    TimezoneEdit { id: i64 },
}

impl Route {
    /// Resolves a view path; anything unrecognised lands on the login view.
    pub fn parse(input: &str) -> Self {
        let (path, query) = match input.split_once('?') {
            Some((path, query)) => (path, query),
            None => (input, ""),
        };
        let segments = path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect::<Vec<_>>();

        match segments.as_slice() {
            ["login"] => Route::Login,
            ["register"] => Route::Register,
            ["timezones"] => Route::TimezoneList {
                query: query_param(query, "q"),
            },
            ["timezones", "create"] => Route::TimezoneCreate,
            ["timezones", "edit", id] => match id.parse() {
                Ok(id) => Route::TimezoneEdit { id },
                Err(_) => Route::Login,
            },
            _ => Route::Login,
        }
    }

    pub fn path(&self) -> String {
        match self {
            Route::Login => "/login".to_string(),
            Route::Register => "/register".to_string(),
            Route::TimezoneList { query: Some(query) } if !query.is_empty() => {
                format!("/timezones?q={}", encode_query_component(query))
            }
            Route::TimezoneList { .. } => "/timezones".to_string(),
            Route::TimezoneCreate => "/timezones/create".to_string(),
            Route::TimezoneEdit { id } => format!("/timezones/edit/{id}"),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

fn query_param(query: &str, key: &str) -> Option<String> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(candidate, _)| *candidate == key)
        .map(|(_, raw)| {
            let spaced = raw.replace('+', " ");
            percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
        })
        .filter(|value| !value.is_empty())
}

/// Shared handle on the active view. Clones observe the same route.
#[derive(Debug, Clone)]
pub struct Navigator {
    current: Arc<Mutex<Route>>,
}

impl Navigator {
    pub fn new(initial: Route) -> Self {
        Self {
            current: Arc::new(Mutex::new(initial)),
        }
    }

    pub fn current(&self) -> Route {
        match self.current.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn navigate(&self, route: Route) {
        let mut guard = match self.current.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if *guard != route {
            info!(from = %guard.path(), to = %route.path(), "navigate");
            *guard = route;
        }
    }
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new(Route::Login)
    }
}
