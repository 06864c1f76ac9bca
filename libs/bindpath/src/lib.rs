//! Property-path evaluator with pluggable type conversion
//!
//! Binds flat string inputs (form fields, query parameters) onto typed object
//! graphs addressed by dotted/bracketed expressions such as
//! `user.addresses['home'].city` or `user.securityQuestions[2]`, and reads values
//! back out of the same graphs.
//!
//! # Architecture Overview
//!
//! ```text
//! Expression String
//!      |
//!   Parser -> Expression (Steps)           (cached, LRU)
//!      |
//! Member Resolver -> Slot per (type, name) (cached, additive)
//!      |
//! Navigator -> read / write with auto-vivification
//!      |
//! Converter Registry -> typed value <-> string
//! ```
//!
//! Types opt in by implementing [`Bindable`]:
//!
//! ```ignore
//! impl Bindable for User {
//!     fn schema() -> Schema {
//!         Schema::record::<Self>()
//!             .field("name", |u| &u.name, |u| &mut u.name)
//!             .field("addresses", |u| &u.addresses, |u| &mut u.addresses)
//!             .build()
//!     }
//!
//!     fn construct() -> Option<Self> {
//!         Some(Self::default())
//!     }
//! }
//!
//! let evaluator = Evaluator::default();
//! evaluator.set_value("user.name", &mut action, &["Fred"], &Attributes::new())?;
//! ```

pub mod attributes;
pub mod convert;
pub mod engine;
pub mod error;
mod expand;
mod navigator;
pub mod path;
pub mod reflect;
pub mod resolver;
pub mod types;

// Re-export main types
pub use attributes::Attributes;
pub use convert::{Capability, Converter, ConverterRegistry};
pub use engine::{Evaluator, EvaluatorOptions};
pub use error::{ConvertError, Error, Result};
pub use path::{parse, Expression, IndexKey, Step};
pub use reflect::{Accessor, Bindable, Fetched, Indexed, Reflect, Schema, Typed};
pub use resolver::{MemberResolver, Slot};
pub use types::{Shape, TypeDescriptor};
