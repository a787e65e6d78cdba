pub mod coingecko;
pub mod exchangerate_host;
pub mod otc_scraper;
pub mod tradegate;
pub mod util;
pub mod yahoo_finance;
