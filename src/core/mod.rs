pub mod error;
pub mod result;
pub mod schema;

pub use error::{Result, StoreError};
pub use result::{try_call, CallError, CallResult};
pub use schema::Schema;
