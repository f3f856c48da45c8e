pub mod brands;
pub mod products;
