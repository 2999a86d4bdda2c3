pub mod extract;
pub mod fetch;
pub mod inspect;
pub mod print_config;
