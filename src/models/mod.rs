pub mod loaders;
pub mod mindmap;
pub mod outcome;
pub mod page;

pub use loaders::{read_rows, write_outcomes};
pub use mindmap::{Document, Node};
pub use outcome::{InputRow, Outcome, OutcomeStatus, Report};
pub use page::Page;
