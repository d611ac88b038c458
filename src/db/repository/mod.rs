pub mod community;
pub mod document;
pub mod results;
pub mod role;
pub mod template;

pub use community::*;
pub use document::*;
pub use results::*;
pub use role::*;
pub use template::*;
