pub mod cards;
pub mod import;
pub mod news;
pub mod paths;
pub mod serve;
