//! REST session variant
//!
//! The same CRUD and cache surface as the SQL session, carried over an
//! HTTP transport supplied by the caller. Models travel as
//! [`RestfulModelMap`]s encoded by a [`MessageConverter`].

pub mod converter;
pub mod model_map;
pub mod session;
pub mod transport;

pub use converter::{converter_for, JsonConverter, MessageConverter, NameValueConverter};
pub use model_map::RestfulModelMap;
pub use session::RestSession;
pub use transport::{RestMethod, RestRequest, RestResponse, RestTransport};
