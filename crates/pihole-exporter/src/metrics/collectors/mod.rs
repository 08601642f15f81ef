pub mod pihole;
pub mod scrape;
