mod history;
mod integrity;
mod order;
mod page;
mod status;

pub use history::*;
pub use integrity::*;
pub use order::*;
pub use page::*;
pub use status::*;
