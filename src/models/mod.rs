pub mod community;
pub mod document;
pub mod enums;
pub mod fields;
pub mod template;

pub use community::*;
pub use document::*;
pub use enums::*;
pub use fields::*;
pub use template::*;
