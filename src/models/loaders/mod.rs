pub mod csv_loader;

pub use csv_loader::{read_rows, write_outcomes};
