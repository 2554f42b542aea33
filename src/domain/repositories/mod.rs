pub mod product_source;
