mod content;
mod writer;

pub use content::Content;
pub use writer::FileWriter;
