//! A resumable sproto session client: a schema-driven binary codec, a
//! zero-run packer, a DH/HMAC-authenticated reconnect handshake, and a
//! request/response multiplexer built on top of them.
//!
//! # Quick Start
//!
//! ```rust
//! use sproto::codec;
//! use sproto::types::{Field, FieldType, Sproto, SprotoType};
//! use sproto::value::SprotoValue;
//!
//! let mut sproto = Sproto::new();
//! sproto.types_by_name.insert("Person".into(), 0);
//! sproto.types_list.push(SprotoType {
//!     name: "Person".into(),
//!     fields: vec![
//!         Field { name: "name".into(), tag: 0, field_type: FieldType::String,
//!                 is_array: false, key_tag: -1, is_map: false, decimal_precision: 0 },
//!         Field { name: "age".into(), tag: 1, field_type: FieldType::Integer,
//!                 is_array: false, key_tag: -1, is_map: false, decimal_precision: 0 },
//!     ],
//!     base_tag: 0,
//!     maxn: 2,
//! });
//!
//! let person_type = sproto.get_type("Person").unwrap();
//! let value = SprotoValue::from_fields(vec![
//!     ("name", "Alice".into()),
//!     ("age", 30i64.into()),
//! ]);
//!
//! let encoded = codec::encode(&sproto, person_type, &value).unwrap();
//! let decoded = codec::decode(&sproto, person_type, &encoded).unwrap();
//! assert_eq!(value, decoded);
//! ```

pub mod error;
pub mod value;
pub mod types;
pub mod codec;
pub mod pack;
pub mod schema;
pub mod frame;
pub mod crypto;
pub mod replay;
pub mod transport;
pub mod sconn;
pub mod host;

pub use codec::{decode, encode, objlen, pdecode, pencode};
pub use error::SprotoError;
pub use host::Host;
pub use pack::{pack, unpack};
pub use sconn::{SConn, SConnState};
pub use types::Sproto;
pub use value::SprotoValue;
