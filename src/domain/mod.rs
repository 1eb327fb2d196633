pub mod campaign;
pub mod decision;
pub mod opportunity;

pub use campaign::*;
pub use decision::*;
pub use opportunity::*;
