// BASE URL'S
//BINANCE
pub const BINANCE_REST_API_URL_LIVE: &str = "https://fapi.binance.com";
//BYBIT
pub const BYBIT_REST_API_URL_LIVE: &str = "https://api.bybit.com";
//OKX
pub const OKX_REST_API_URL_LIVE: &str = "https://www.okx.com";
//MEXC
pub const MEXC_REST_API_URL_LIVE: &str = "https://contract.mexc.com";
//TELEGRAM
pub const TELEGRAM_API_URL: &str = "https://api.telegram.org";
// SMTP
pub const SMTP_URL: &str = "mail.privateemail.com";

// DEFAULTS
pub const FIVE_MIN: u64 = 300;
pub const ONE_DAY: u64 = 86_400;
pub const FORTY_FIVE_MIN: i64 = 2700;
pub const EIGHT_HOURS: i64 = 28800;
pub const TOP_N: usize = 3;
pub const QUOTE_SUFFIX: &str = "USDT";
pub const REQUEST_TIMEOUT_SEC: u64 = 10;
pub const LOG_LEVEL: &str = "info";
pub const USER_AGENT: &str = concat!("funding-rate-monitor/", env!("CARGO_PKG_VERSION"));

pub const CONFIG_PATH_ENV: &str = "FUNDING_MONITOR_CONFIG";
pub const RUNNING_MESSAGE: &str = "Funding rate monitor is running";
