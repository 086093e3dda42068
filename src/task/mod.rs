mod grammar;
mod handler;
pub mod handlers;
mod router;
mod validate;

pub use grammar::{PropertySchema, Schema, SchemaType, TaskContract, TaskGrammar};
pub use handler::TaskHandler;
pub use router::TaskRouter;
pub use validate::{TaskValidator, validate};
