//! Method name resolution and call arguments.
//!
//! # Design
//! Remote methods come in two shapes. Families such as `friends` or `ads`
//! are only ever invoked as `<family>.<method>`; everything else
//! (`getServerTime`, `getProfiles`) is a flat name. The families are a closed
//! enum, so `client.friends()` and `MethodPath::parse("friends.get")` resolve
//! to the same wire name without any per-method table.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use crate::client::{Namespace, VkClient};
use crate::error::Error;
use crate::http::Transport;

macro_rules! families {
    ($($accessor:ident => $variant:ident),+ $(,)?) => {
        /// Namespaces whose methods are always called as `<family>.<method>`.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Family {
            $($variant),+
        }

        impl Family {
            pub const ALL: &'static [Family] = &[$(Family::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $(Family::$variant => stringify!($accessor)),+
                }
            }
        }

        impl<T: Transport> VkClient<T> {
            $(
                #[doc = concat!("Methods of the `", stringify!($accessor), "` family.")]
                pub fn $accessor(&self) -> Namespace<'_, T> {
                    self.namespace(Family::$variant)
                }
            )+
        }
    };
}

families! {
    secure => Secure,
    ads => Ads,
    messages => Messages,
    likes => Likes,
    friends => Friends,
    groups => Groups,
    photos => Photos,
    wall => Wall,
    newsfeed => Newsfeed,
    notifications => Notifications,
    audio => Audio,
    video => Video,
    docs => Docs,
    places => Places,
    storage => Storage,
    notes => Notes,
    pages => Pages,
    activity => Activity,
    offers => Offers,
    questions => Questions,
    subscriptions => Subscriptions,
    users => Users,
    status => Status,
    polls => Polls,
    account => Account,
    auth => Auth,
    stats => Stats,
}

impl FromStr for Family {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Family::ALL
            .iter()
            .copied()
            .find(|family| family.as_str() == s)
            .ok_or_else(|| Error::InvalidMethod(s.to_string()))
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved remote method name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodPath {
    family: Option<Family>,
    name: String,
}

impl MethodPath {
    /// A method inside a family, e.g. `friends` + `get`.
    pub fn namespaced(family: Family, name: &str) -> Result<Self, Error> {
        if name.is_empty() || name.contains('.') {
            return Err(Error::InvalidMethod(format!("{family}.{name}")));
        }
        Ok(Self {
            family: Some(family),
            name: name.to_string(),
        })
    }

    /// Resolve a dotted or flat method name.
    ///
    /// `friends.get` resolves into the `friends` family. A bare family name
    /// is rejected since families have no callable root. Unknown dotted
    /// prefixes pass through as flat names.
    pub fn parse(method: &str) -> Result<Self, Error> {
        if method.is_empty() || method.split('.').any(str::is_empty) {
            return Err(Error::InvalidMethod(method.to_string()));
        }
        match method.split_once('.') {
            Some((prefix, rest)) => match prefix.parse::<Family>() {
                Ok(family) => Self::namespaced(family, rest),
                Err(_) => Ok(Self::flat(method)),
            },
            None if method.parse::<Family>().is_ok() => Err(Error::InvalidMethod(method.to_string())),
            None => Ok(Self::flat(method)),
        }
    }

    fn flat(name: &str) -> Self {
        Self {
            family: None,
            name: name.to_string(),
        }
    }

    pub fn family(&self) -> Option<Family> {
        self.family
    }

    /// The name sent in the `method` field.
    pub fn wire_name(&self) -> String {
        match self.family {
            Some(family) => format!("{family}.{}", self.name),
            None => self.name.clone(),
        }
    }
}

impl fmt::Display for MethodPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.wire_name())
    }
}

/// Ordered call arguments.
///
/// Insertion order is kept; setting an existing key replaces its value in
/// place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    pairs: Vec<(String, Value)>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        match self.pairs.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.pairs.push((key, value)),
        }
    }

    /// Take the fields of a serializable struct or map as arguments.
    ///
    /// Fields keep their declaration order; `None` fields (serialized as
    /// null) are skipped.
    pub fn from_serialize<T: Serialize>(input: &T) -> Result<Self, Error> {
        let value = serde_json::to_value(input).map_err(|e| Error::InvalidArguments(e.to_string()))?;
        match value {
            Value::Object(map) => Ok(Self {
                pairs: map.into_iter().filter(|(_, v)| !v.is_null()).collect(),
            }),
            other => Err(Error::InvalidArguments(format!("expected an object, got {other}"))),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Arguments rendered to their wire strings, in insertion order.
    pub fn to_wire(&self) -> Vec<(String, String)> {
        self.pairs
            .iter()
            .map(|(k, v)| (k.clone(), wire_value(v)))
            .collect()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Args {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut args = Args::new();
        for (k, v) in iter {
            args.insert(k, v);
        }
        args
    }
}

/// Plain string form of an argument value.
///
/// Arrays and objects become compact JSON text in a single field.
pub fn wire_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => "0".to_string(),
        Value::Number(n) => n.to_string(),
        structured => structured.to_string(),
    }
}

/// Everything needed to issue one remote call.
#[derive(Debug, Clone, PartialEq)]
pub struct CallSpec {
    pub method: MethodPath,
    pub args: Args,
    /// Per-call override of the client's default timeout.
    pub timeout: Option<Duration>,
}

impl CallSpec {
    pub fn new(method: MethodPath, args: Args) -> Self {
        Self {
            method,
            args,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}
