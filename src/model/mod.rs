pub mod common;
pub mod descriptor;
pub mod endpoint;
pub mod lifecycle;
pub mod resource;

pub use common::*;
pub use descriptor::*;
pub use endpoint::*;
pub use lifecycle::*;
pub use resource::*;
