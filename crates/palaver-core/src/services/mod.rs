pub mod reveal;
pub mod title_presenter;

pub use reveal::{RevealStream, reveal_stream};
pub use title_presenter::{TitleTarget, derive_title, present_title};
