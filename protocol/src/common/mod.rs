pub mod id;
pub mod material;
pub mod payment;
pub mod reference;
pub mod syllabus;

pub use id::*;
pub use material::*;
pub use payment::*;
pub use reference::*;
pub use syllabus::*;
