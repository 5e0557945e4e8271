//! Resource-access compilation for serverless compute units.
//!
//! Application authors attach [`ResourceAccessDeclaration`]s to a compute
//! unit: "this handler may `dynamodb:GetItem` on the `todos` table", "this
//! handler may `sns:Publish` to the `events` topic". [`compile_access`]
//! turns such a list into the two things a deployable handler needs:
//!
//! - the environment variables through which the handler finds its
//!   resources at runtime, and
//! - the least-privilege [`PermissionStatement`]s its execution role must
//!   carry.
//!
//! # Example
//!
//! ```
//! use tether_access::{
//!     PlatformOptions, ResourceAccessDeclaration, TableResource, compile_access,
//! };
//!
//! let options = PlatformOptions::default();
//! let todos = TableResource::new("todos", &options.context());
//!
//! let compiled = compile_access(
//!     "getTodos",
//!     &[ResourceAccessDeclaration::table(todos, ["dynamodb:GetItem"])],
//!     &options,
//! )
//! .unwrap();
//!
//! assert_eq!(compiled.environment_variables["TODOS_TABLE_NAME"], "todos-dev");
//! assert_eq!(compiled.permission_statements.len(), 1);
//! ```
//!
//! # Resource kinds
//!
//! | Kind | Statements | Environment variable |
//! |------|------------|----------------------|
//! | [`TableResource`] | table ARN, plus `<arn>/index/*` when indexed | runtime table name |
//! | [`TopicResource`] | topic ARN | topic ARN |
//! | [`QueueResource`] | queue ARN | queue URL, else runtime name |
//! | [`NotificationResource`] | platform application ARN (GCM only) | platform application ARN |
//! | [`SecretResource`] | secret ARN | runtime secret name |
//! | [`EncryptionKeyResource`] | key ARN | key ARN, only with a definition |
//! | raw ARNs | the given ARNs | none |

mod error;
pub use error::*;

pub mod naming;

mod options;
pub use options::*;

mod resource;
pub use resource::*;

mod declaration;
pub use declaration::*;

mod statement;
pub use statement::*;

mod compiler;
pub use compiler::*;
