pub mod edition;
pub mod work;

pub use edition::EditionRecord;
pub use work::WorkMetadata;
