pub mod convert;
pub mod lex;
pub mod preprocess;
pub mod token;
pub mod transform;
