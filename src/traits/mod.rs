pub mod function;
pub mod observer;
pub mod resource;

pub use function::{Function, Signature};
pub use observer::{NodeObserver, NoopObserver};
pub use resource::{Body, Exchange, ForwardRequest, ForwardResponse, Request, Resource, Response};
