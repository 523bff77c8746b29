pub mod utils;

mod repositories;
