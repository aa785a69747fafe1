pub mod extractor;
pub mod password;
pub mod session;
pub mod state;
pub mod test_utils;
pub mod validation;
