//! Assembly of deployable compute units.
//!
//! A [`FunctionDefinition`] names a handler and the resources it needs. The
//! [`Assembler`] compiles those resource declarations with
//! [`tether_access::compile_access`], hands the result to the
//! [`RoleBinder`] and returns a [`ComputeUnit`] carrying the handler's
//! environment and execution role.
//!
//! ```text
//! FunctionDefinition ──► compile_access ──► RoleBinder ──► ComputeUnit
//!                         (env, statements)   (role + policy)
//! ```

mod error;
pub use error::*;

mod binder;
pub use binder::*;

mod unit;
pub use unit::*;
