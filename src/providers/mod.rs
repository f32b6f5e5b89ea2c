pub mod frankfurter;
pub mod util;
