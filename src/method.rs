//! Route method filter.
//!
//! A route either answers one HTTP method or every method (`"*"`).
//! Requests themselves carry a plain [`http::Method`].

use std::fmt;
use std::str::FromStr;

use http::Method;

/// The method half of a route registration.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MethodFilter {
    /// Matches every request method. Written `"*"`.
    Any,
    /// Matches exactly one method.
    Only(Method),
}

impl MethodFilter {
    /// Whether a request made with `method` is accepted by this filter.
    pub fn accepts(&self, method: &Method) -> bool {
        match self {
            Self::Any => true,
            Self::Only(m) => m == method,
        }
    }
}

/// Parses `"*"` as [`MethodFilter::Any`]; anything else is uppercased first,
/// so `"get"` and `"GET"` register the same route.
impl FromStr for MethodFilter {
    type Err = http::method::InvalidMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "*" {
            return Ok(Self::Any);
        }
        Method::from_bytes(s.to_ascii_uppercase().as_bytes()).map(Self::Only)
    }
}

impl From<Method> for MethodFilter {
    fn from(m: Method) -> Self {
        Self::Only(m)
    }
}

/// Lets `Router::route` take `"GET"`, `"*"`, or an [`http::Method`].
pub trait IntoMethodFilter {
    fn into_method_filter(self) -> MethodFilter;
}

impl IntoMethodFilter for MethodFilter {
    fn into_method_filter(self) -> MethodFilter { self }
}

impl IntoMethodFilter for Method {
    fn into_method_filter(self) -> MethodFilter { MethodFilter::Only(self) }
}

impl IntoMethodFilter for &str {
    fn into_method_filter(self) -> MethodFilter {
        self.parse()
            .unwrap_or_else(|e| panic!("invalid route method `{self}`: {e}"))
    }
}

impl fmt::Display for MethodFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("*"),
            Self::Only(m) => f.write_str(m.as_str()),
        }
    }
}
