//! Synchronous client core for the VK `api.php` endpoint.
//!
//! # Overview
//! Turns a dotted method name plus arguments into a signed, form-encoded
//! POST, hands it to a `Transport`, and unwraps the JSON envelope(s) in the
//! answer. Any remote method can be called without a dedicated wrapper:
//!
//! ```no_run
//! use vkontakte_core::{Args, ClientConfig, UreqTransport, VkClient};
//!
//! let config = ClientConfig::new("3267523", Some("secret".to_string()));
//! let client = VkClient::new(config, UreqTransport)?;
//!
//! let time = client.method("getServerTime").send()?;
//! let friends = client.friends().method("get").arg("uid", 642177).send()?;
//! let same = client.call("friends.get", std::time::Duration::from_secs(5), Args::new().arg("uid", 642177))?;
//! # let _ = (time, friends, same);
//! # Ok::<(), vkontakte_core::Error>(())
//! ```
//!
//! # Design
//! - `VkClient` holds only immutable config and a transport.
//! - Each call is split into `build_request` and `parse_response`, so the
//!   I/O boundary is the `Transport` trait and nothing else.
//! - Response bodies may hold several concatenated documents; `stream`
//!   splits them and `Reply` decides which one the call returns.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod method;
pub mod sign;
pub mod stream;
pub mod types;

pub use client::{MethodCall, Namespace, Reply, SignedParams, VkClient};
pub use config::{ClientConfig, Credentials};
pub use error::{Error, TransportError};
pub use http::{HttpRequest, HttpResponse, Transport, UreqTransport};
pub use method::{Args, CallSpec, Family, MethodPath};
pub use sign::signature;
pub use stream::{documents, Document, StreamError};
pub use types::{RemoteError, RequestParam};
