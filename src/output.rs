use crate::funding_rates::{FundingQuote, RankedGroup};
use chrono::{DateTime, Utc};

/// Builds the alert text, or `None` when no group has a line to show.
pub fn render_alert(groups: &[RankedGroup], window_secs: i64) -> Option<String> {
    let mut msg_lines = vec![format!(
        "⚠️ Top Funding Rates ({} min before settlement):",
        window_secs / 60
    )];
    let mut surfaced = 0;
    for group in groups {
        if group.positive.is_empty() && group.negative.is_empty() {
            continue;
        }
        msg_lines.push(format!("\n📌 {}:", group.exchange));
        for quote in &group.negative {
            msg_lines.push(quote_line("🔻", quote));
        }
        for quote in &group.positive {
            msg_lines.push(quote_line("🔺", quote));
        }
        surfaced += group.negative.len() + group.positive.len();
    }
    if surfaced == 0 {
        None
    } else {
        Some(msg_lines.join("\n"))
    }
}

fn quote_line(marker: &str, quote: &FundingQuote) -> String {
    format!("{} {} — {:.4}%", marker, quote.symbol, quote.funding_rate * 100.0)
}

/// Prefixes a message with the send time in Seoul and US Pacific time.
pub fn stamp_message(body: &str, time: DateTime<Utc>) -> String {
    let pst_timestamp: String = time
        .with_timezone(&chrono_tz::US::Pacific)
        .format("%F %T")
        .to_string();
    let kst_timestamp: String = time
        .with_timezone(&chrono_tz::Asia::Seoul)
        .format("%F %T")
        .to_string();
    format!(
        "Times: \n{} KST.\n{} PST\n{}",
        kst_timestamp, pst_timestamp, body
    )
}
