pub mod country;
pub mod filter;
pub mod levels;
pub mod observation;
pub mod series;
pub mod variable;
pub mod view;
